//! Error type for `tally-store-sqlite`.

use tally_core::executor::{ExecutionError, ExecutionErrorKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  /// A stored row that does not satisfy the schema contract.
  #[error("record {id} is invalid: {reason}")]
  InvalidRecord { id: i64, reason: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Classify an engine error for the pipeline.
pub(crate) fn execution_error(e: rusqlite::Error) -> ExecutionError {
  use rusqlite::ErrorCode;

  let kind = match e.sqlite_error_code() {
    Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) => ExecutionErrorKind::Busy,
    Some(ErrorCode::ConstraintViolation) => ExecutionErrorKind::Constraint,
    // SQLITE_ERROR: syntax errors, unknown columns and the like.
    Some(ErrorCode::Unknown) => ExecutionErrorKind::Malformed,
    Some(_) => ExecutionErrorKind::Internal,
    None => match e {
      rusqlite::Error::MultipleStatement
      | rusqlite::Error::ExecuteReturnedResults
      | rusqlite::Error::InvalidParameterCount(..) => ExecutionErrorKind::Malformed,
      _ => ExecutionErrorKind::Internal,
    },
  };
  ExecutionError::new(kind, e.to_string())
}
