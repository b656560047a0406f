//! [`SqliteStore`]: the SQLite implementation of [`StatementExecutor`], plus
//! the fixed read-only queries behind the dashboard endpoints.

use std::{path::Path, time::Duration};

use rusqlite::OptionalExtension as _;
use tally_core::{
  executor::{ExecutionError, ExecutionErrorKind, ExecutionOutcome, StatementExecutor},
  guard::{ApprovedStatement, StatementKind},
  schema::{CategoryTotal, FinanceRecord},
};

use crate::{
  Result,
  encode::{RECORD_COLUMNS, RawRecord, cell},
  error::execution_error,
  schema,
};

/// How long a statement waits on a locked database before reporting busy.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

// ─── Store ───────────────────────────────────────────────────────────────────

/// The expense ledger, backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init().await?;
    Ok(store)
  }

  async fn init(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)?;
        schema::init(conn)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  pub async fn set_busy_timeout(&self, timeout: Duration) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.busy_timeout(timeout)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  pub async fn get_record(&self, id: i64) -> Result<Option<FinanceRecord>> {
    let raw: Option<RawRecord> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {RECORD_COLUMNS} FROM Finance WHERE id = ?1"),
            rusqlite::params![id],
            RawRecord::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawRecord::into_record).transpose()
  }

  /// The `limit` most recently added records, newest first.
  pub async fn recent(&self, limit: usize) -> Result<Vec<FinanceRecord>> {
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);

    let raws: Vec<RawRecord> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn
          .prepare(&format!("SELECT {RECORD_COLUMNS} FROM Finance ORDER BY id DESC LIMIT ?1"))?;
        let rows = stmt
          .query_map(rusqlite::params![limit], RawRecord::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawRecord::into_record).collect()
  }

  /// Spending per category, largest total first.
  pub async fn category_totals(&self) -> Result<Vec<CategoryTotal>> {
    let totals = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT categorization, SUM(amount) AS total FROM Finance
           GROUP BY categorization ORDER BY total DESC",
        )?;
        let rows = stmt
          .query_map([], |row| {
            Ok(CategoryTotal { category: row.get(0)?, total: row.get(1)? })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(totals)
  }
}

// ─── StatementExecutor impl ──────────────────────────────────────────────────

impl StatementExecutor for SqliteStore {
  async fn execute<'a>(
    &'a self,
    statement: &'a ApprovedStatement,
  ) -> Result<ExecutionOutcome, ExecutionError> {
    let sql = statement.text().to_owned();
    let kind = statement.kind();
    tracing::debug!(?kind, "executing approved statement");

    self
      .conn
      .call(move |conn| Ok(run_statement(conn, &sql, kind)))
      .await
      .map_err(|e| ExecutionError::new(ExecutionErrorKind::Internal, e.to_string()))?
  }
}

/// Run one approved statement in its own transaction. Dropping the
/// transaction on any early return rolls it back.
pub(crate) fn run_statement(
  conn: &mut rusqlite::Connection,
  sql: &str,
  kind: StatementKind,
) -> Result<ExecutionOutcome, ExecutionError> {
  let tx = conn.transaction().map_err(execution_error)?;

  let outcome = match kind {
    StatementKind::Insert => {
      let affected = tx.execute(sql, []).map_err(execution_error)?;
      if affected != 1 {
        return Err(ExecutionError::new(
          ExecutionErrorKind::Malformed,
          format!("INSERT affected {affected} rows instead of 1; rolled back"),
        ));
      }
      ExecutionOutcome::Inserted { affected: affected as u64, id: tx.last_insert_rowid() }
    }
    StatementKind::Select => select(&tx, sql)?,
  };

  tx.commit().map_err(execution_error)?;
  Ok(outcome)
}

pub(crate) fn select(
  conn: &rusqlite::Connection,
  sql: &str,
) -> Result<ExecutionOutcome, ExecutionError> {
  let mut stmt = conn.prepare(sql).map_err(execution_error)?;
  if !stmt.readonly() {
    return Err(ExecutionError::new(
      ExecutionErrorKind::Malformed,
      "approved SELECT does not compile as read-only",
    ));
  }

  let columns: Vec<String> = stmt.column_names().into_iter().map(str::to_owned).collect();
  let width = columns.len();

  let mut rows = Vec::new();
  let mut cursor = stmt.query([]).map_err(execution_error)?;
  while let Some(row) = cursor.next().map_err(execution_error)? {
    let cells = (0..width)
      .map(|i| row.get_ref(i).map(cell))
      .collect::<rusqlite::Result<Vec<_>>>()
      .map_err(execution_error)?;
    rows.push(cells);
  }

  Ok(ExecutionOutcome::Selected { columns, rows })
}
