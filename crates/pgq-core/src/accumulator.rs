//! Receiving end of the gather loop

use crate::types::{Fields, Metric, Tags};
use chrono::Utc;

/// Sink for mapped rows. Emission is fire-and-forget: whatever the
/// accumulator does with a metric is not reported back to the collector.
pub trait Accumulator: Send {
    fn add_fields(&mut self, measurement: &str, fields: Fields, tags: Tags);
}

/// Accumulator that timestamps metrics on arrival and holds them until drained
#[derive(Debug, Default)]
pub struct MetricBuffer {
    metrics: Vec<Metric>,
}

impl MetricBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    pub fn metrics(&self) -> &[Metric] {
        &self.metrics
    }

    /// Take all buffered metrics, leaving the buffer empty
    pub fn drain(&mut self) -> Vec<Metric> {
        std::mem::take(&mut self.metrics)
    }
}

impl Accumulator for MetricBuffer {
    fn add_fields(&mut self, measurement: &str, fields: Fields, tags: Tags) {
        self.metrics.push(Metric {
            measurement: measurement.to_string(),
            tags,
            fields,
            timestamp: Utc::now(),
        });
    }
}
