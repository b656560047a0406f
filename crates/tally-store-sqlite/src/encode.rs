//! Conversions between SQLite values and core types.
//!
//! Dates are stored as `YYYY-MM-DD` text and categories as their canonical
//! spelling. BLOBs never appear in the contracted table but may come out of
//! expressions; they are rendered as lowercase hex.

use chrono::NaiveDate;
use rusqlite::types::ValueRef;
use tally_core::{executor::Cell, schema::FinanceRecord};

use crate::{Error, Result};

pub fn cell(value: ValueRef<'_>) -> Cell {
  match value {
    ValueRef::Null => Cell::Null,
    ValueRef::Integer(i) => Cell::Integer(i),
    ValueRef::Real(r) => Cell::Real(r),
    ValueRef::Text(t) => Cell::Text(String::from_utf8_lossy(t).into_owned()),
    ValueRef::Blob(b) => Cell::Text(hex::encode(b)),
  }
}

/// Column list matching [`RawRecord::from_row`].
pub const RECORD_COLUMNS: &str = "id, purchased, categorization, amount, date, payment_type";

/// A `Finance` row as SQLite hands it back.
pub struct RawRecord {
  pub id:             i64,
  pub purchased:      String,
  pub categorization: String,
  pub amount:         f64,
  pub date:           String,
  pub payment_type:   Option<String>,
}

impl RawRecord {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:             row.get(0)?,
      purchased:      row.get(1)?,
      categorization: row.get(2)?,
      amount:         row.get(3)?,
      date:           row.get(4)?,
      payment_type:   row.get(5)?,
    })
  }

  pub fn into_record(self) -> Result<FinanceRecord> {
    let id = self.id;
    let invalid = move |reason: String| Error::InvalidRecord { id, reason };
    let categorization = self
      .categorization
      .parse()
      .map_err(|e: tally_core::schema::UnknownCategory| invalid(e.to_string()))?;
    let date = NaiveDate::parse_from_str(&self.date, "%Y-%m-%d")
      .map_err(|e| invalid(format!("date {:?}: {e}", self.date)))?;

    Ok(FinanceRecord {
      id,
      purchased: self.purchased,
      categorization,
      amount: self.amount,
      date,
      payment_type: self.payment_type,
    })
  }
}
