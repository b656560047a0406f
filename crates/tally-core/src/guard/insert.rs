//! Shape checks for INSERT statements: the exact column list, a single
//! VALUES tuple, and per-column value rules.

use std::ops::Range;

use chrono::NaiveDate;

use super::{
  CategoryPolicy, GuardRule, Rejection,
  lexer::{Token, TokenKind},
};
use crate::schema::{Category, INSERT_COLUMNS};

/// A replacement of one literal in the statement text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Rewrite {
  pub span:        Range<usize>,
  pub replacement: String,
}

/// Validate `INSERT INTO Finance (...) VALUES (...)`. `tokens` excludes
/// comments and any trailing separator; the first three tokens were already
/// checked to be `INSERT INTO <table>`.
///
/// Returns the rewrite needed to canonicalise the category literal, if any.
pub(crate) fn check_insert(
  tokens: &[Token<'_>],
  policy: CategoryPolicy,
) -> Result<Option<Rewrite>, Rejection> {
  let mut pos = 3;

  let columns = parenthesised(tokens, &mut pos).ok_or_else(|| {
    Rejection::new(GuardRule::ColumnMismatch, "INSERT must list its columns explicitly")
  })?;
  let names: Vec<Option<String>> = columns
    .iter()
    .map(|item| match item {
      [single] => single.identifier(),
      _ => None,
    })
    .collect();
  let matches_contract = names.len() == INSERT_COLUMNS.len()
    && names.iter().zip(INSERT_COLUMNS).all(|(name, expected)| {
      name.as_deref().is_some_and(|n| n.eq_ignore_ascii_case(expected))
    });
  if !matches_contract {
    let listed: Vec<&str> =
      columns.iter().map(|item| item_text(item)).collect();
    return Err(Rejection::new(
      GuardRule::ColumnMismatch,
      format!(
        "columns ({}) must be exactly ({})",
        listed.join(", "),
        INSERT_COLUMNS.join(", ")
      ),
    ));
  }

  if !tokens.get(pos).is_some_and(|t| t.is_word("VALUES")) {
    return Err(Rejection::new(
      GuardRule::ColumnMismatch,
      "INSERT must supply a single VALUES tuple",
    ));
  }
  pos += 1;

  let values = parenthesised(tokens, &mut pos).ok_or_else(|| {
    Rejection::new(GuardRule::ColumnMismatch, "malformed VALUES tuple")
  })?;
  if pos != tokens.len() {
    return Err(Rejection::new(
      GuardRule::ColumnMismatch,
      format!("unexpected {:?} after the VALUES tuple", tokens[pos].text),
    ));
  }
  if values.len() != INSERT_COLUMNS.len() {
    return Err(Rejection::new(
      GuardRule::ColumnMismatch,
      format!(
        "expected {} values, found {}",
        INSERT_COLUMNS.len(),
        values.len()
      ),
    ));
  }

  check_purchased(values[0])?;
  let rewrite = check_category(values[1], policy)?;
  check_amount(values[2])?;
  check_date(values[3])?;
  check_payment_type(values[4])?;

  Ok(rewrite)
}

/// Parse `( item, item, ... )` starting at `*pos`, splitting on top-level
/// commas. Advances `*pos` past the closing parenthesis.
fn parenthesised<'t, 'a>(
  tokens: &'t [Token<'a>],
  pos: &mut usize,
) -> Option<Vec<&'t [Token<'a>]>> {
  if !tokens.get(*pos)?.is_symbol('(') {
    return None;
  }
  let mut depth = 0usize;
  let mut items = Vec::new();
  let mut item_start = *pos + 1;

  for (i, token) in tokens.iter().enumerate().skip(*pos) {
    if token.is_symbol('(') {
      depth += 1;
    } else if token.is_symbol(')') {
      depth -= 1;
      if depth == 0 {
        items.push(&tokens[item_start..i]);
        *pos = i + 1;
        return items.iter().all(|item| !item.is_empty()).then_some(items);
      }
    } else if token.is_symbol(',') && depth == 1 {
      items.push(&tokens[item_start..i]);
      item_start = i + 1;
    }
  }
  None
}

fn item_text<'a>(item: &[Token<'a>]) -> &'a str {
  match item {
    [single] => single.text,
    _ => "<expression>",
  }
}

fn invalid(detail: impl Into<String>) -> Rejection {
  Rejection::new(GuardRule::InvalidValue, detail)
}

fn check_purchased(item: &[Token<'_>]) -> Result<(), Rejection> {
  match item {
    [t] if t.string_value().is_some_and(|v| !v.trim().is_empty()) => Ok(()),
    _ => Err(invalid("purchased must be a non-empty text literal")),
  }
}

fn check_category(
  item: &[Token<'_>],
  policy: CategoryPolicy,
) -> Result<Option<Rewrite>, Rejection> {
  let [token] = item else {
    return Err(invalid("categorization must be a text literal"));
  };
  let Some(value) = token.string_value() else {
    return Err(invalid("categorization must be a text literal"));
  };

  let category = match (Category::normalize(&value), policy) {
    (Some(category), _) => category,
    (None, CategoryPolicy::CoerceToOther) => Category::Other,
    (None, CategoryPolicy::Reject) => {
      return Err(invalid(format!(
        "categorization {value:?} is not one of: {}",
        Category::enumeration()
      )));
    }
  };

  if value == category.as_str() {
    return Ok(None);
  }
  Ok(Some(Rewrite {
    span:        token.span.clone(),
    replacement: format!("'{}'", category.as_str()),
  }))
}

fn check_amount(item: &[Token<'_>]) -> Result<(), Rejection> {
  match item {
    [t] if t.kind == TokenKind::Number => {
      let amount: f64 = t
        .text
        .parse()
        .map_err(|_| invalid(format!("amount {:?} is not a number", t.text)))?;
      if amount.is_finite() && amount >= 0.0 {
        Ok(())
      } else {
        Err(invalid("amount must be a finite, non-negative number"))
      }
    }
    [sign, t] if sign.is_symbol('-') && t.kind == TokenKind::Number => {
      Err(invalid("amount must not be negative"))
    }
    [sign, rest @ ..] if sign.is_symbol('+') => check_amount(rest),
    _ => Err(invalid("amount must be a numeric literal")),
  }
}

fn check_date(item: &[Token<'_>]) -> Result<(), Rejection> {
  let value = match item {
    [t] => t.string_value(),
    _ => None,
  }
  .ok_or_else(|| invalid("date must be a YYYY-MM-DD text literal"))?;

  // chrono's parser tolerates padding and signs; only the canonical
  // rendering is ISO.
  let canonical = NaiveDate::parse_from_str(&value, "%Y-%m-%d")
    .is_ok_and(|date| date.format("%Y-%m-%d").to_string() == value);
  if canonical {
    Ok(())
  } else {
    Err(invalid(format!("date {value:?} is not a valid YYYY-MM-DD date")))
  }
}

fn check_payment_type(item: &[Token<'_>]) -> Result<(), Rejection> {
  match item {
    [t] if t.is_word("NULL") || t.kind == TokenKind::Str => Ok(()),
    _ => Err(invalid("payment_type must be a text literal or NULL")),
  }
}
