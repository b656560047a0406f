//! Schema initialisation for the Tally SQLite store.
//!
//! The table DDL comes from the schema contract in `tally-core`; this module
//! adds connection pragmas and indexes around it. Future migrations will be
//! gated on `PRAGMA user_version`.

use tally_core::schema::TABLE_DDL;

pub const SCHEMA_VERSION: i32 = 1;

const PRAGMAS: &str = "PRAGMA journal_mode = WAL;";

const INDEXES: &str = "
CREATE INDEX IF NOT EXISTS finance_date_idx           ON Finance(date);
CREATE INDEX IF NOT EXISTS finance_categorization_idx ON Finance(categorization);
";

/// Idempotent; safe to run on every open.
pub fn init(conn: &rusqlite::Connection) -> rusqlite::Result<()> {
  conn.execute_batch(PRAGMAS)?;
  conn.execute_batch(TABLE_DDL)?;
  conn.execute_batch(INDEXES)?;
  conn.pragma_update(None, "user_version", SCHEMA_VERSION)
}
