//! SQLite storage layer.
//!
//! The bot registry backed by SQLite with WAL mode and split read/write
//! connection pools.

pub mod bot;
pub mod pool;
