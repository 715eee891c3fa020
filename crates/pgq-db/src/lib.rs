//! PostgreSQL access for the query collector
//!
//! One connection per collector, opened on first use and reused across
//! gather cycles. No pooling.

pub mod address;
pub mod client;
pub mod cursor;

pub use address::*;
pub use client::*;
pub use cursor::*;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("Database connection error: {0}")]
    ConnectionError(#[from] sqlx::Error),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Timed out connecting after {0:?}")]
    Timeout(std::time::Duration),
}

pub type DbResult<T> = Result<T, DbError>;
