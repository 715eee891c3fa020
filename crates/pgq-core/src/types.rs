//! Core data types for query configuration, scanned values and metrics

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Measurement name used when a query does not override it
pub const DEFAULT_MEASUREMENT: &str = "postgresql";

/// Tag mapping attached to a metric
pub type Tags = BTreeMap<String, String>;

/// Field mapping attached to a metric
pub type Fields = BTreeMap<String, MetricValue>;

/// One configured query
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct QuerySpec {
    /// Query text, executed verbatim
    #[serde(rename = "sqlquery")]
    pub sql_query: String,

    /// Server version marker (carried, not enforced)
    #[serde(default)]
    pub version: i32,

    /// Include-database-name marker (carried, not enforced)
    #[serde(default, rename = "withdbname")]
    pub with_db_name: bool,

    /// Comma separated list of columns to emit as tags
    #[serde(default, rename = "tagvalue")]
    pub tag_value: String,

    /// Measurement name override
    #[serde(default)]
    pub measurement: String,
}

impl QuerySpec {
    pub fn new(sql_query: impl Into<String>) -> Self {
        Self {
            sql_query: sql_query.into(),
            ..Default::default()
        }
    }

    pub fn with_tags(mut self, tag_value: impl Into<String>) -> Self {
        self.tag_value = tag_value.into();
        self
    }

    pub fn with_measurement(mut self, measurement: impl Into<String>) -> Self {
        self.measurement = measurement.into();
        self
    }

    /// Measurement name for rows of this query
    pub fn measurement_name(&self) -> &str {
        if self.measurement.is_empty() {
            DEFAULT_MEASUREMENT
        } else {
            &self.measurement
        }
    }
}

/// A value as scanned from the database driver
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Timestamp(DateTime<Utc>),
    /// A type the driver does not decode into a primitive
    Other { type_name: String },
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<i16> for SqlValue {
    fn from(v: i16) -> Self {
        SqlValue::Int(v.into())
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        SqlValue::Int(v.into())
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Int(v)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Float(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(v: Vec<u8>) -> Self {
        SqlValue::Bytes(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

/// A metric field value
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum MetricValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    /// Passed through from the driver unchanged
    Timestamp(DateTime<Utc>),
    /// Passed through from the driver unchanged; sinks decide whether to keep it
    Opaque { type_name: String },
}

impl MetricValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetricValue::Float(v) => Some(*v),
            MetricValue::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetricValue::String(v) => Some(v),
            _ => None,
        }
    }
}

/// A mapped row as handed to sinks
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Metric {
    pub measurement: String,
    pub tags: Tags,
    pub fields: Fields,
    pub timestamp: DateTime<Utc>,
}
