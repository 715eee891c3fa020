//! Conversion of scanned SQL values into metric values

use crate::types::{MetricValue, SqlValue};

/// Convert a scanned value into a metric value.
///
/// Returns `None` for SQL NULL; a null column never becomes a tag or a
/// field. Byte sequences are decoded as UTF-8 text since drivers commonly
/// hand character data back as raw bytes. Values the driver could not
/// decode into a primitive are passed through as [`MetricValue::Opaque`].
pub fn coerce(value: SqlValue) -> Option<MetricValue> {
    let coerced = match value {
        SqlValue::Null => return None,
        SqlValue::Bool(v) => MetricValue::Bool(v),
        SqlValue::Int(v) => MetricValue::Integer(v),
        SqlValue::Float(v) => MetricValue::Float(v),
        SqlValue::Text(v) => MetricValue::String(v),
        SqlValue::Bytes(v) => MetricValue::String(decode_utf8(v)),
        SqlValue::Timestamp(v) => MetricValue::Timestamp(v),
        SqlValue::Other { type_name } => MetricValue::Opaque { type_name },
    };
    Some(coerced)
}

fn decode_utf8(bytes: Vec<u8>) -> String {
    String::from_utf8(bytes)
        .unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
}
