//! Runtime pieces of the Tally server: configuration, the hosted completion
//! client and the in-memory rate limiter. `main.rs` wires them together.

pub mod settings;
pub mod error;
pub mod groq;
pub mod limiter;

pub use error::{Error, Result};
