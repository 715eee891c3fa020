use anyhow::Result;
use pgq_core::{Metric, Sink};
use sqlx::{Pool, Postgres};

/// Stores one row per metric, fields and tags kept as JSON text
pub struct PostgresSink {
    pool: Pool<Postgres>,
}

impl PostgresSink {
    pub async fn new(url: &str) -> Result<Self> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(2)
            .connect(url)
            .await?;
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS metrics (
                id BIGSERIAL PRIMARY KEY,
                measurement TEXT NOT NULL,
                ts TIMESTAMPTZ NOT NULL,
                json TEXT NOT NULL
            );",
        )
        .execute(&pool)
        .await?;
        Ok(Self { pool })
    }
}

#[async_trait::async_trait]
impl Sink for PostgresSink {
    async fn emit(&mut self, metric: &Metric) -> Result<()> {
        let json = serde_json::to_string(metric)?;
        sqlx::query("INSERT INTO metrics (measurement, ts, json) VALUES ($1, $2, $3)")
            .bind(&metric.measurement)
            .bind(metric.timestamp)
            .bind(json)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
