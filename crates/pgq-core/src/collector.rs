//! Query execution and the per-query, per-row gather loop

use crate::accumulator::Accumulator;
use crate::classify::{AdditionalTags, ColumnSet};
use crate::mapper::map_row;
use crate::pipeline::Database;
use crate::types::QuerySpec;
use crate::CollectResult;
use tracing::{debug, instrument};

/// Runs the configured queries against one database handle
pub struct Collector<D: Database> {
    db: D,
    queries: Vec<QuerySpec>,
}

impl<D: Database> Collector<D> {
    pub fn new(db: D, queries: Vec<QuerySpec>) -> Self {
        Self { db, queries }
    }

    pub fn queries(&self) -> &[QuerySpec] {
        &self.queries
    }

    pub fn database(&self) -> &D {
        &self.db
    }

    /// Run every query once and forward each row to `acc`.
    ///
    /// The first connection, execution or scan error aborts the whole call.
    /// Rows forwarded before the error stay forwarded; later queries are
    /// not attempted. Callers must not run two gathers concurrently on the
    /// same collector.
    #[instrument(skip_all, fields(queries = self.queries.len()))]
    pub async fn gather(&mut self, acc: &mut dyn Accumulator) -> CollectResult<()> {
        self.db.ensure_connected().await?;

        for spec in &self.queries {
            let measurement = spec.measurement_name();
            let mut cursor = self.db.query(&spec.sql_query).await?;

            // Recomputed every cycle; the result shape may change between runs.
            let columns = ColumnSet::new(cursor.columns().to_vec());
            let additional_tags = AdditionalTags::parse(&spec.tag_value);

            let mut rows = 0usize;
            while let Some(row) = cursor.next_row().await? {
                let (tags, fields) = map_row(&columns, &*row, &additional_tags)?;
                acc.add_fields(measurement, fields, tags);
                rows += 1;
            }

            debug!(
                measurement,
                columns = columns.len(),
                rows,
                "query gathered"
            );
        }

        Ok(())
    }

    /// Close the database handle
    pub async fn close(&mut self) {
        self.db.close().await;
    }
}
