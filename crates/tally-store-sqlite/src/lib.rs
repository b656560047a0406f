//! SQLite backend for the Tally expense ledger.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::{DEFAULT_BUSY_TIMEOUT, SqliteStore};

#[cfg(test)]
mod tests;
