//! InfluxDB line protocol rendering

use pgq_core::{Metric, MetricValue};

fn escape(s: &str, special: &[char]) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if special.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn escape_measurement(s: &str) -> String {
    escape(s, &[',', ' '])
}

fn escape_key(s: &str) -> String {
    escape(s, &[',', '=', ' '])
}

fn render_field(value: &MetricValue) -> Option<String> {
    match value {
        MetricValue::Integer(v) => Some(format!("{v}i")),
        MetricValue::Float(v) if v.is_finite() => Some(v.to_string()),
        MetricValue::Float(_) => None,
        MetricValue::Bool(v) => Some(v.to_string()),
        MetricValue::String(v) => Some(format!("\"{}\"", escape(v, &['"', '\\']))),
        MetricValue::Timestamp(v) => Some(format!("\"{}\"", v.to_rfc3339())),
        MetricValue::Opaque { .. } => None,
    }
}

/// Render a metric as one line, or `None` when no field can be written
pub fn to_line_protocol(metric: &Metric) -> Option<String> {
    let fields: Vec<String> = metric
        .fields
        .iter()
        .filter_map(|(k, v)| render_field(v).map(|v| format!("{}={}", escape_key(k), v)))
        .collect();
    if fields.is_empty() {
        return None;
    }

    let mut line = escape_measurement(&metric.measurement);
    for (k, v) in metric.tags.iter().filter(|(_, v)| !v.is_empty()) {
        line.push(',');
        line.push_str(&escape_key(k));
        line.push('=');
        line.push_str(&escape_key(v));
    }
    line.push(' ');
    line.push_str(&fields.join(","));
    line.push(' ');
    line.push_str(&metric.timestamp.timestamp_nanos_opt()?.to_string());
    Some(line)
}
