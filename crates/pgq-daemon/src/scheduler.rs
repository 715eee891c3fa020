//! Interval-driven gather and flush loop

use anyhow::{anyhow, Result};
use pgq_core::{Collector, Database, MetricBuffer, Sink};
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Scheduler runs one gather per tick and hands the results to the sinks.
///
/// Gathers never overlap: the next tick is only awaited once the current
/// cycle, including its flush, has finished.
pub struct Scheduler<D: Database> {
    collector: Collector<D>,
    buffer: MetricBuffer,
    sinks: Vec<Box<dyn Sink>>,
    interval: Duration,
    gather_timeout: Option<Duration>,
}

impl<D: Database> Scheduler<D> {
    pub fn new(collector: Collector<D>, sinks: Vec<Box<dyn Sink>>, interval: Duration) -> Self {
        Self {
            collector,
            buffer: MetricBuffer::new(),
            sinks,
            interval,
            gather_timeout: None,
        }
    }

    pub fn with_gather_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.gather_timeout = timeout;
        self
    }

    /// Run the gather loop until the future is dropped
    pub async fn run(&mut self) -> Result<()> {
        info!("Scheduler started");
        info!("Gather interval: {:?}", self.interval);
        info!("Queries: {}", self.collector.queries().len());

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            match self.run_once().await {
                Ok(count) => debug!("Gather cycle emitted {} metrics", count),
                // Retried on the next tick
                Err(e) => error!("Gather cycle failed: {:#}", e),
            }
        }
    }

    /// Run a single gather cycle, then flush whatever it produced.
    ///
    /// Metrics gathered before a failure are still flushed.
    pub async fn run_once(&mut self) -> Result<usize> {
        let gather = self.collector.gather(&mut self.buffer);
        let result = match self.gather_timeout {
            Some(limit) => match tokio::time::timeout(limit, gather).await {
                Ok(result) => result.map_err(anyhow::Error::from),
                Err(_) => Err(anyhow!("gather timed out after {:?}", limit)),
            },
            None => gather.await.map_err(anyhow::Error::from),
        };

        let flushed = self.flush().await;
        result.map(|()| flushed)
    }

    async fn flush(&mut self) -> usize {
        let metrics = self.buffer.drain();
        for metric in &metrics {
            for sink in self.sinks.iter_mut() {
                if let Err(e) = sink.emit(metric).await {
                    warn!("Error emitting metric {}: {:#}", metric.measurement, e);
                }
            }
        }
        metrics.len()
    }

    /// Flush remaining metrics and close the database connection
    pub async fn stop(&mut self) {
        info!("Stopping scheduler...");
        self.flush().await;
        self.collector.close().await;
        info!("Scheduler stopped successfully");
    }
}
