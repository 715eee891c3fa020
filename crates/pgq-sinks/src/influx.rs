use crate::line_protocol::to_line_protocol;
use anyhow::{anyhow, Result};
use pgq_core::{Metric, Sink};
use reqwest::Client;

pub struct InfluxSink {
    client: Client,
    base_url: String,
    org: String,
    bucket: String,
    token: String,
}

impl InfluxSink {
    pub fn new(base_url: String, org: String, bucket: String, token: String) -> Result<Self> {
        if base_url.is_empty() || org.is_empty() || bucket.is_empty() || token.is_empty() {
            return Err(anyhow!("invalid influx configuration"));
        }
        let client = Client::builder().build()?;
        Ok(Self {
            client,
            base_url,
            org,
            bucket,
            token,
        })
    }
}

#[async_trait::async_trait]
impl Sink for InfluxSink {
    async fn emit(&mut self, metric: &Metric) -> Result<()> {
        let Some(line) = to_line_protocol(metric) else {
            tracing::debug!(measurement = %metric.measurement, "no writable fields, skipping");
            return Ok(());
        };
        let url = format!(
            "{}/api/v2/write?org={}&bucket={}&precision=ns",
            self.base_url, self.org, self.bucket
        );
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .header("Content-Type", "text/plain; charset=utf-8")
            .body(line)
            .send()
            .await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(anyhow!("influx write failed: {} {}", status, text));
        }
        Ok(())
    }
}
