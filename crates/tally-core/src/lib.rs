//! Core types and the translation pipeline for the Tally expense ledger.
//!
//! This crate is deliberately free of HTTP and database dependencies. The
//! completion service, the rate limiter and the SQL executor are capability
//! traits implemented elsewhere (`tally-server`, `tally-store-sqlite`).

// Native `async fn` in traits; the trait declarations spell out `Send` bounds
// on the returned futures explicitly.
#![allow(async_fn_in_trait)]

pub mod completion;
pub mod error;
pub mod executor;
pub mod guard;
pub mod limiter;
pub mod pipeline;
pub mod present;
pub mod prompt;
pub mod schema;
pub mod screen;

pub use error::{Error, Result};
