use anyhow::Result;
#[cfg(feature = "influx")]
pub mod influx;
pub mod line_protocol;
#[cfg(feature = "postgres")]
pub mod postgres;

use pgq_core::{Metric, Sink};
use std::fs::{create_dir_all, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Writes each metric to the log
#[derive(Debug, Default)]
pub struct LogSink;

#[async_trait::async_trait]
impl Sink for LogSink {
    async fn emit(&mut self, metric: &Metric) -> Result<()> {
        tracing::info!(
            measurement = %metric.measurement,
            tags = ?metric.tags,
            fields = ?metric.fields,
            timestamp = %metric.timestamp,
            "metric"
        );
        Ok(())
    }
}

/// Appends metrics as JSON lines to `<dir>/metrics.jsonl`
pub struct FsSink {
    file: PathBuf,
}

impl FsSink {
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        create_dir_all(dir)?;
        Ok(Self {
            file: dir.join("metrics.jsonl"),
        })
    }

    pub fn path(&self) -> &Path {
        &self.file
    }
}

#[async_trait::async_trait]
impl Sink for FsSink {
    async fn emit(&mut self, metric: &Metric) -> Result<()> {
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file)?;
        let line = serde_json::to_string(metric)?;
        f.write_all(line.as_bytes())?;
        f.write_all(b"\n")?;
        Ok(())
    }
}
