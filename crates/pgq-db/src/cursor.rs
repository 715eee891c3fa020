//! Streaming result cursor and positional row decoding

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use futures_util::stream::BoxStream;
use futures_util::TryStreamExt;
use pgq_core::{CollectError, CollectResult, RowCursor, Scanner, SqlValue};
use sqlx::postgres::types::{Oid, PgInterval};
use sqlx::postgres::{PgConnection, PgRow};
use sqlx::types::ipnetwork::IpNetwork;
use sqlx::types::mac_address::MacAddress;
use sqlx::types::{BigDecimal, JsonValue, Uuid};
use sqlx::{Column, Row, TypeInfo, ValueRef};

/// Cursor over one query's result, borrowing the connection while open
pub struct PgCursor<'c> {
    stream: BoxStream<'c, Result<PgRow, sqlx::Error>>,
    columns: Vec<String>,
    pending: Option<PgRow>,
}

impl<'c> PgCursor<'c> {
    /// Execute `sql` and wait for the first row (or the end of the result).
    ///
    /// Statements are not cached, so the result shape is rediscovered on
    /// every execution.
    pub async fn open(conn: &'c mut PgConnection, sql: &'c str) -> CollectResult<Self> {
        let mut stream = sqlx::query(sql).persistent(false).fetch(conn);
        let pending = stream.try_next().await.map_err(execution_error)?;
        let columns = pending
            .as_ref()
            .map(|row| row.columns().iter().map(|c| c.name().to_string()).collect())
            .unwrap_or_default();

        Ok(Self {
            stream,
            columns,
            pending,
        })
    }
}

#[async_trait::async_trait]
impl<'c> RowCursor for PgCursor<'c> {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    async fn next_row(&mut self) -> CollectResult<Option<Box<dyn Scanner + Send>>> {
        let row = match self.pending.take() {
            Some(row) => Some(row),
            None => self.stream.try_next().await.map_err(execution_error)?,
        };
        Ok(row.map(|row| Box::new(PgScanRow(row)) as Box<dyn Scanner + Send>))
    }
}

fn execution_error(e: sqlx::Error) -> CollectError {
    CollectError::QueryExecutionError(e.to_string())
}

/// A fetched row, decoded on scan
pub struct PgScanRow(pub PgRow);

impl Scanner for PgScanRow {
    fn scan(&self, columns: &[String]) -> CollectResult<Vec<SqlValue>> {
        let row = &self.0;
        if row.len() != columns.len() {
            return Err(CollectError::ScanError(format!(
                "row has {} columns, result metadata reported {}",
                row.len(),
                columns.len()
            )));
        }

        (0..row.len()).map(|idx| decode_column(row, idx)).collect()
    }
}

/// Decode one column into an already-discriminated value.
///
/// Types without a dedicated arm are carried as their raw wire bytes, so
/// the value is never lost even when it has no better representation.
pub fn decode_column(row: &PgRow, idx: usize) -> CollectResult<SqlValue> {
    let column = row.column(idx);
    let scan_error = |e: sqlx::Error| {
        CollectError::ScanError(format!("column \"{}\": {e}", column.name()))
    };

    if row.try_get_raw(idx).map_err(scan_error)?.is_null() {
        return Ok(SqlValue::Null);
    }

    // Types unknown to the driver are reported by their lowercase catalog name
    let type_name = column.type_info().name().to_ascii_uppercase();
    let value = match type_name.as_str() {
        "BOOL" => SqlValue::Bool(row.try_get(idx).map_err(scan_error)?),
        "\"CHAR\"" => SqlValue::Int(row.try_get::<i8, _>(idx).map_err(scan_error)?.into()),
        "INT2" => SqlValue::Int(row.try_get::<i16, _>(idx).map_err(scan_error)?.into()),
        "INT4" => SqlValue::Int(row.try_get::<i32, _>(idx).map_err(scan_error)?.into()),
        "INT8" => SqlValue::Int(row.try_get(idx).map_err(scan_error)?),
        "OID" => SqlValue::Int(row.try_get::<Oid, _>(idx).map_err(scan_error)?.0.into()),
        "XID" | "CID" | "XID8" => {
            let raw = raw_bytes(row, idx).map_err(scan_error)?;
            match be_unsigned(&raw).and_then(|v| i64::try_from(v).ok()) {
                Some(v) => SqlValue::Int(v),
                None => SqlValue::Bytes(raw),
            }
        }
        "FLOAT4" => SqlValue::Float(row.try_get::<f32, _>(idx).map_err(scan_error)?.into()),
        "FLOAT8" => SqlValue::Float(row.try_get(idx).map_err(scan_error)?),
        "NUMERIC" => {
            let raw = raw_bytes(row, idx).map_err(scan_error)?;
            match numeric_special(&raw) {
                Some(special) => SqlValue::Text(special.to_string()),
                None => {
                    let decimal: BigDecimal = row.try_get(idx).map_err(scan_error)?;
                    let decimal = match numeric_display_scale(&raw) {
                        Some(scale) => decimal.with_scale(scale),
                        None => decimal,
                    };
                    SqlValue::Text(decimal.to_string())
                }
            }
        }
        "TEXT" | "VARCHAR" | "CHAR" | "BPCHAR" | "NAME" | "UNKNOWN" => {
            SqlValue::Text(row.try_get(idx).map_err(scan_error)?)
        }
        "BYTEA" => SqlValue::Bytes(row.try_get(idx).map_err(scan_error)?),
        "TIMESTAMPTZ" => SqlValue::Timestamp(row.try_get(idx).map_err(scan_error)?),
        "TIMESTAMP" => {
            let naive: NaiveDateTime = row.try_get(idx).map_err(scan_error)?;
            SqlValue::Timestamp(DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc))
        }
        "DATE" => SqlValue::Text(
            row.try_get::<NaiveDate, _>(idx)
                .map_err(scan_error)?
                .to_string(),
        ),
        "TIME" => SqlValue::Text(
            row.try_get::<NaiveTime, _>(idx)
                .map_err(scan_error)?
                .to_string(),
        ),
        "INTERVAL" => SqlValue::Text(format_interval(
            &row.try_get::<PgInterval, _>(idx).map_err(scan_error)?,
        )),
        "UUID" => SqlValue::Text(row.try_get::<Uuid, _>(idx).map_err(scan_error)?.to_string()),
        "INET" | "CIDR" => {
            let network: IpNetwork = row.try_get(idx).map_err(scan_error)?;
            SqlValue::Text(format_inet(&network, type_name == "CIDR"))
        }
        "MACADDR" => SqlValue::Text(
            row.try_get::<MacAddress, _>(idx)
                .map_err(scan_error)?
                .to_string()
                .to_lowercase(),
        ),
        "JSON" | "JSONB" => SqlValue::Text(
            row.try_get::<JsonValue, _>(idx)
                .map_err(scan_error)?
                .to_string(),
        ),
        "PG_LSN" => {
            let raw = raw_bytes(row, idx).map_err(scan_error)?;
            match be_unsigned(&raw) {
                Some(lsn) => SqlValue::Text(format_lsn(lsn)),
                None => SqlValue::Bytes(raw),
            }
        }
        _ => SqlValue::Bytes(raw_bytes(row, idx).map_err(scan_error)?),
    };

    Ok(value)
}

/// The column's wire bytes, bypassing the type compatibility check
fn raw_bytes(row: &PgRow, idx: usize) -> Result<Vec<u8>, sqlx::Error> {
    row.try_get_unchecked::<Vec<u8>, _>(idx)
}

/// Big-endian unsigned integer of 4 or 8 bytes
fn be_unsigned(raw: &[u8]) -> Option<u64> {
    match raw.len() {
        4 => Some(u32::from_be_bytes(raw.try_into().ok()?).into()),
        8 => Some(u64::from_be_bytes(raw.try_into().ok()?)),
        _ => None,
    }
}

/// Text for numeric values that have no decimal form.
///
/// The binary header is `ndigits, weight, sign, dscale`, each 16 bits.
fn numeric_special(raw: &[u8]) -> Option<&'static str> {
    let sign = u16::from_be_bytes([*raw.get(4)?, *raw.get(5)?]);
    match sign {
        0xC000 => Some("NaN"),
        0xD000 => Some("Infinity"),
        0xF000 => Some("-Infinity"),
        _ => None,
    }
}

/// Digits after the decimal point the server would print
fn numeric_display_scale(raw: &[u8]) -> Option<i64> {
    Some(u16::from_be_bytes([*raw.get(6)?, *raw.get(7)?]).into())
}

/// Host addresses print without a prefix length unless the column is CIDR
fn format_inet(network: &IpNetwork, always_prefix: bool) -> String {
    let host_prefix = if network.is_ipv4() { 32 } else { 128 };
    if !always_prefix && network.prefix() == host_prefix {
        network.ip().to_string()
    } else {
        network.to_string()
    }
}

fn format_lsn(lsn: u64) -> String {
    format!("{:X}/{:X}", lsn >> 32, lsn & 0xFFFF_FFFF)
}

/// Render an interval the way the server's default output style does,
/// e.g. `1 year 2 mons 3 days 04:05:06.5`
fn format_interval(interval: &PgInterval) -> String {
    fn unit(n: i64, singular: &str, plural: &str) -> String {
        format!("{n} {}", if n == 1 { singular } else { plural })
    }

    let mut parts = Vec::new();
    let years = i64::from(interval.months / 12);
    let months = i64::from(interval.months % 12);
    if years != 0 {
        parts.push(unit(years, "year", "years"));
    }
    if months != 0 {
        parts.push(unit(months, "mon", "mons"));
    }
    if interval.days != 0 {
        parts.push(unit(interval.days.into(), "day", "days"));
    }

    if interval.microseconds != 0 || parts.is_empty() {
        let sign = if interval.microseconds < 0 { "-" } else { "" };
        let micros = interval.microseconds.unsigned_abs();
        let secs = micros / 1_000_000;
        let mut time = format!(
            "{sign}{:02}:{:02}:{:02}",
            secs / 3600,
            secs / 60 % 60,
            secs % 60
        );
        let frac = micros % 1_000_000;
        if frac != 0 {
            time.push_str(format!(".{frac:06}").trim_end_matches('0'));
        }
        parts.push(time);
    }

    parts.join(" ")
}
