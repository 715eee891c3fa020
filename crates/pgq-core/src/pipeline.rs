use anyhow::Result;

use crate::{CollectResult, Metric, SqlValue};

/// A single result row that can be scanned positionally
pub trait Scanner {
    /// Scan the row into one value per column, in result-metadata order.
    fn scan(&self, columns: &[String]) -> CollectResult<Vec<SqlValue>>;
}

/// An open result cursor; dropping it releases the underlying result
#[async_trait::async_trait]
pub trait RowCursor: Send {
    /// Column names reported by the result metadata
    fn columns(&self) -> &[String];

    /// Fetch the next row, `None` once the result is exhausted
    async fn next_row(&mut self) -> CollectResult<Option<Box<dyn Scanner + Send>>>;
}

/// Database handle the collector executes queries against
#[async_trait::async_trait]
pub trait Database: Send {
    /// Open the connection if it is not open yet
    async fn ensure_connected(&mut self) -> CollectResult<()>;

    /// Execute query text verbatim and open a cursor over its result
    async fn query<'a>(&'a mut self, sql: &'a str) -> CollectResult<Box<dyn RowCursor + 'a>>;

    /// Close the connection, if open
    async fn close(&mut self);
}

#[async_trait::async_trait]
pub trait Sink: Send + Sync {
    async fn emit(&mut self, metric: &Metric) -> Result<()>;
}
