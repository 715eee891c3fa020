//! Core data types and the result-set-to-metric mapping engine
//!
//! This crate turns rows returned by arbitrary, user-supplied SQL queries
//! into metrics without knowing the result shape ahead of time. The
//! database driver and the metric sinks live behind the traits in
//! [`pipeline`] and [`accumulator`].

pub mod accumulator;
pub mod classify;
pub mod coerce;
pub mod collector;
pub mod mapper;
pub mod pipeline;
pub mod types;

pub use accumulator::*;
pub use classify::*;
pub use coerce::*;
pub use collector::*;
pub use mapper::*;
pub use pipeline::*;
pub use types::*;

use thiserror::Error;

/// Errors that abort a gather cycle
#[derive(Debug, Error)]
pub enum CollectError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Query execution error: {0}")]
    QueryExecutionError(String),

    #[error("Scan error: {0}")]
    ScanError(String),
}

pub type CollectResult<T> = Result<T, CollectError>;
