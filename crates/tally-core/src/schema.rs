//! The schema contract: the one table and closed category vocabulary that
//! every other component assumes.
//!
//! Nothing here is mutable at runtime. A statement that disagrees with this
//! contract is a guard rejection, never a schema change.

use std::{fmt, str::FromStr};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ─── Table ───────────────────────────────────────────────────────────────────

/// The only table statements may reference.
pub const TABLE: &str = "Finance";

/// Table DDL, exactly as the store creates it.
pub const TABLE_DDL: &str = "CREATE TABLE IF NOT EXISTS Finance(id INTEGER PRIMARY KEY AUTOINCREMENT, purchased VARCHAR NOT NULL, categorization TEXT NOT NULL, amount REAL NOT NULL, date TEXT NOT NULL, payment_type TEXT)";

/// One column of the contracted table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
  pub name:     &'static str,
  pub sql_type: &'static str,
  pub nullable: bool,
}

/// All columns in declaration order.
pub const COLUMNS: [Column; 6] = [
  Column { name: "id",             sql_type: "INTEGER", nullable: false },
  Column { name: "purchased",      sql_type: "VARCHAR", nullable: false },
  Column { name: "categorization", sql_type: "TEXT",    nullable: false },
  Column { name: "amount",         sql_type: "REAL",    nullable: false },
  Column { name: "date",           sql_type: "TEXT",    nullable: false },
  Column { name: "payment_type",   sql_type: "TEXT",    nullable: true },
];

/// The columns an INSERT must name, in this exact order. `id` is always
/// assigned by the store.
pub const INSERT_COLUMNS: [&str; 5] =
  ["purchased", "categorization", "amount", "date", "payment_type"];

// ─── Category ────────────────────────────────────────────────────────────────

/// The closed set of expense categories.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
pub enum Category {
  Food,
  Transport,
  Utilities,
  Shopping,
  Entertainment,
  Healthcare,
  Other,
}

/// Recognisable near-matches, lowercase. Anything not here and not a
/// case-insensitive spelling of a variant is out of vocabulary.
const ALIASES: &[(&str, Category)] = &[
  ("grocery", Category::Food),
  ("groceries", Category::Food),
  ("dining", Category::Food),
  ("restaurant", Category::Food),
  ("restaurants", Category::Food),
  ("travel", Category::Transport),
  ("transportation", Category::Transport),
  ("taxi", Category::Transport),
  ("fuel", Category::Transport),
  ("utility", Category::Utilities),
  ("bills", Category::Utilities),
  ("shop", Category::Shopping),
  ("medical", Category::Healthcare),
  ("health", Category::Healthcare),
  ("health care", Category::Healthcare),
  ("movies", Category::Entertainment),
  ("misc", Category::Other),
  ("miscellaneous", Category::Other),
];

impl Category {
  pub const ALL: [Category; 7] = [
    Self::Food,
    Self::Transport,
    Self::Utilities,
    Self::Shopping,
    Self::Entertainment,
    Self::Healthcare,
    Self::Other,
  ];

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Food => "Food",
      Self::Transport => "Transport",
      Self::Utilities => "Utilities",
      Self::Shopping => "Shopping",
      Self::Entertainment => "Entertainment",
      Self::Healthcare => "Healthcare",
      Self::Other => "Other",
    }
  }

  /// Map free text to a category when it is a recognisable spelling of one:
  /// case and surrounding whitespace are ignored, and a few common synonyms
  /// are accepted. Returns `None` for anything else.
  pub fn normalize(text: &str) -> Option<Self> {
    let folded = text.trim().to_lowercase();
    if folded.is_empty() {
      return None;
    }
    Self::ALL
      .into_iter()
      .find(|c| c.as_str().eq_ignore_ascii_case(&folded))
      .or_else(|| {
        ALIASES
          .iter()
          .find(|(alias, _)| *alias == folded)
          .map(|(_, c)| *c)
      })
  }

  /// Comma-separated enumeration, as embedded in prompts.
  pub fn enumeration() -> String {
    Self::ALL.map(Category::as_str).join(", ")
  }
}

impl fmt::Display for Category {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Returned by [`Category::from_str`] for anything but an exact spelling.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown category: {0:?}")]
pub struct UnknownCategory(pub String);

impl FromStr for Category {
  type Err = UnknownCategory;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::ALL
      .into_iter()
      .find(|c| c.as_str() == s)
      .ok_or_else(|| UnknownCategory(s.to_owned()))
  }
}

// ─── Records ─────────────────────────────────────────────────────────────────

/// One logged expense, as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinanceRecord {
  pub id:             i64,
  pub purchased:      String,
  pub categorization: Category,
  pub amount:         f64,
  pub date:           NaiveDate,
  pub payment_type:   Option<String>,
}

/// Spending summed over one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryTotal {
  pub category: String,
  pub total:    f64,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn exact_parse_is_case_sensitive() {
    assert_eq!("Food".parse::<Category>(), Ok(Category::Food));
    assert!("food".parse::<Category>().is_err());
  }

  #[test]
  fn normalize_accepts_case_and_whitespace_variants() {
    assert_eq!(Category::normalize("  food "), Some(Category::Food));
    assert_eq!(Category::normalize("HEALTHCARE"), Some(Category::Healthcare));
  }

  #[test]
  fn normalize_accepts_known_synonyms_only() {
    assert_eq!(Category::normalize("Groceries"), Some(Category::Food));
    assert_eq!(Category::normalize("taxi"), Some(Category::Transport));
    assert_eq!(Category::normalize("Crypto"), None);
    assert_eq!(Category::normalize(""), None);
  }

  #[test]
  fn insert_columns_are_all_columns_but_id() {
    let names: Vec<_> = COLUMNS.iter().skip(1).map(|c| c.name).collect();
    assert_eq!(names, INSERT_COLUMNS);
    assert!(COLUMNS.iter().all(|c| c.nullable == (c.name == "payment_type")));
  }

  #[test]
  fn enumeration_lists_every_category_in_order() {
    assert_eq!(
      Category::enumeration(),
      "Food, Transport, Utilities, Shopping, Entertainment, Healthcare, Other"
    );
  }
}
