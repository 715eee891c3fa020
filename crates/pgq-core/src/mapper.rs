//! Mapping of one result row into tags and fields

use crate::classify::{
    classify, is_ignored, tag_text, AdditionalTags, ColumnKind, ColumnSet, DB_NAME_COLUMN,
    DB_TAG, DEFAULT_DB_NAME,
};
use crate::coerce::coerce;
use crate::pipeline::Scanner;
use crate::types::{Fields, SqlValue, Tags};
use crate::{CollectError, CollectResult};
use std::collections::HashMap;
use tracing::{trace, warn};

/// Scanned values of one row, keyed by column name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRow {
    values: HashMap<String, SqlValue>,
}

impl RawRow {
    /// Scan a row positionally against the discovered column set.
    ///
    /// A duplicated column name keeps the value of its last occurrence.
    pub fn scan<S: Scanner + ?Sized>(columns: &ColumnSet, row: &S) -> CollectResult<Self> {
        let values = row.scan(columns.names())?;
        if values.len() != columns.len() {
            return Err(CollectError::ScanError(format!(
                "expected {} values, got {}",
                columns.len(),
                values.len()
            )));
        }

        Ok(columns.names().iter().cloned().zip(values).collect())
    }

    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.values.get(column)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, SqlValue)> for RawRow {
    fn from_iter<I: IntoIterator<Item = (S, SqlValue)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// Scan a row and map it into `(tags, fields)`.
///
/// Scan failures abort the row; a tag value without a textual form only
/// drops that column.
pub fn map_row<S: Scanner + ?Sized>(
    columns: &ColumnSet,
    row: &S,
    additional_tags: &AdditionalTags,
) -> CollectResult<(Tags, Fields)> {
    let raw = RawRow::scan(columns, row)?;
    Ok(map_raw_row(raw, additional_tags))
}

/// Map already scanned values into `(tags, fields)`
pub fn map_raw_row(mut raw: RawRow, additional_tags: &AdditionalTags) -> (Tags, Fields) {
    let mut tags = Tags::new();
    let mut fields = Fields::new();

    let db_name = raw
        .values
        .remove(DB_NAME_COLUMN)
        .and_then(grouping_value)
        .unwrap_or_else(|| DEFAULT_DB_NAME.to_string());
    tags.insert(DB_TAG.to_string(), db_name);

    for (column, value) in raw.values {
        trace!(column = %column, value = ?value, "scanned column");
        if is_ignored(&column) {
            continue;
        }
        let Some(value) = coerce(value) else {
            continue;
        };

        match classify(&column, additional_tags) {
            ColumnKind::Tag => match tag_text(&value) {
                Ok(text) => {
                    tags.insert(column, text);
                }
                Err(e) => warn!(column = %column, error = %e, "failed to add additional tag"),
            },
            ColumnKind::Field => {
                fields.insert(column, value);
            }
        }
    }

    (tags, fields)
}

fn grouping_value(value: SqlValue) -> Option<String> {
    let value = coerce(value)?;
    match tag_text(&value) {
        Ok(text) => Some(text),
        Err(e) => {
            warn!(column = DB_NAME_COLUMN, error = %e, "using default database name");
            None
        }
    }
}
