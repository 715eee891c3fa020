//! Column discovery state and tag/field classification

use crate::types::MetricValue;
use std::collections::BTreeSet;
use thiserror::Error;

/// Columns never emitted as tags or fields
pub const IGNORED_COLUMNS: &[&str] = &["stats_reset"];

/// Column holding the database name, used for the grouping tag
pub const DB_NAME_COLUMN: &str = "datname";

/// Tag key of the grouping tag
pub const DB_TAG: &str = "db";

/// Grouping tag value when the result has no usable database name
pub const DEFAULT_DB_NAME: &str = "postgres";

pub fn is_ignored(column: &str) -> bool {
    IGNORED_COLUMNS.contains(&column)
}

/// Ordered column names as reported by the result metadata
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnSet(Vec<String>);

impl ColumnSet {
    pub fn new(columns: Vec<String>) -> Self {
        Self(columns)
    }

    pub fn names(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for ColumnSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Columns a query asked to be emitted as tags
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdditionalTags(BTreeSet<String>);

impl AdditionalTags {
    /// Parse a comma separated tag column specification.
    ///
    /// Whitespace around names is trimmed and empty entries are skipped,
    /// so `""` yields no tags and `"a, b,"` yields `a` and `b`. A padded
    /// entry like `" b"` therefore tags column `b` rather than matching no
    /// column at all, which is where this differs from a plain comma split.
    pub fn parse(spec: &str) -> Self {
        Self(
            spec.split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    pub fn contains(&self, column: &str) -> bool {
        self.0.contains(column)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Tag,
    Field,
}

/// Decide whether a non-ignored, non-null column is a tag or a field
pub fn classify(column: &str, additional_tags: &AdditionalTags) -> ColumnKind {
    if additional_tags.contains(column) {
        ColumnKind::Tag
    } else {
        ColumnKind::Field
    }
}

/// A value targeted as a tag that has no textual form
#[derive(Debug, Clone, Error, PartialEq)]
#[error("failed to convert {kind} value to a tag")]
pub struct TagConversionError {
    pub kind: &'static str,
}

/// Render a coerced value as tag text
pub fn tag_text(value: &MetricValue) -> Result<String, TagConversionError> {
    match value {
        MetricValue::String(v) => Ok(v.clone()),
        MetricValue::Integer(v) => Ok(v.to_string()),
        MetricValue::Bool(v) => Ok(v.to_string()),
        MetricValue::Float(_) => Err(TagConversionError { kind: "float" }),
        MetricValue::Timestamp(_) => Err(TagConversionError { kind: "timestamp" }),
        MetricValue::Opaque { .. } => Err(TagConversionError { kind: "opaque" }),
    }
}
