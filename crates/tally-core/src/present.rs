//! Mapping execution outcomes to the response shape callers see.

use serde::Serialize;

use crate::executor::{Cell, ExecutionOutcome};

/// A caller-facing result. Serialises with a `kind` tag:
/// `{"kind":"insert","affected":1,"id":7}` or
/// `{"kind":"select","columns":[...],"rows":[[...]]}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Presented {
  Insert { affected: u64, id: i64 },
  Select { columns: Vec<String>, rows: Vec<Vec<Cell>> },
}

impl Presented {
  pub fn message(&self) -> String {
    match self {
      Self::Insert { .. } => "Expense successfully added!".to_owned(),
      Self::Select { rows, .. } => format!("Found {} records.", rows.len()),
    }
  }
}

pub fn present(outcome: ExecutionOutcome) -> Presented {
  match outcome {
    ExecutionOutcome::Inserted { affected, id } => Presented::Insert { affected, id },
    ExecutionOutcome::Selected { columns, rows } => Presented::Select { columns, rows },
  }
}
