//! Decoding of driver rows into JSON objects.
//!
//! Integers, floats, booleans and text map onto their JSON counterparts.
//! Exact numerics (`DECIMAL`/`NUMERIC`) become strings so no precision is lost,
//! date/time values become ISO-8601 strings, and binary columns become base64.

use crate::error::DbError;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use core_types::Row;
use rust_decimal::Decimal;
use serde_json::{Value, json};
use sqlx::mysql::MySqlRow;
use sqlx::postgres::PgRow;
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, ColumnIndex, Decode, Type, TypeInfo, ValueRef};

pub(crate) fn mysql_row(row: &MySqlRow) -> Result<Row, DbError> {
    decode_row(row, |row, idx, type_name| {
        let value = match type_name {
            "NULL" => Value::Null,
            "BOOLEAN" => json!(get::<bool, _>(row, idx)?),
            "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => {
                json!(get::<i64, _>(row, idx)?)
            }
            "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED" | "INT UNSIGNED"
            | "BIGINT UNSIGNED" => json!(get::<u64, _>(row, idx)?),
            "FLOAT" => json!(get::<f32, _>(row, idx)?),
            "DOUBLE" => json!(get::<f64, _>(row, idx)?),
            "DECIMAL" => json!(get::<Decimal, _>(row, idx)?.to_string()),
            "DATE" => json!(get::<NaiveDate, _>(row, idx)?.to_string()),
            "TIME" => json!(get::<NaiveTime, _>(row, idx)?.to_string()),
            "DATETIME" => json!(iso_naive(get::<NaiveDateTime, _>(row, idx)?)),
            "TIMESTAMP" => json!(iso_utc(get::<DateTime<Utc>, _>(row, idx)?)),
            "JSON" => get::<Value, _>(row, idx)?,
            "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" => {
                base64(get::<Vec<u8>, _>(row, idx)?)
            }
            _ => text_or_bytes(row, idx)?,
        };
        Ok(value)
    })
}

pub(crate) fn postgres_row(row: &PgRow) -> Result<Row, DbError> {
    decode_row(row, |row, idx, type_name| {
        let value = match type_name {
            "VOID" => Value::Null,
            "BOOL" => json!(get::<bool, _>(row, idx)?),
            "INT2" => json!(get::<i16, _>(row, idx)?),
            "INT4" => json!(get::<i32, _>(row, idx)?),
            "INT8" => json!(get::<i64, _>(row, idx)?),
            "FLOAT4" => json!(get::<f32, _>(row, idx)?),
            "FLOAT8" => json!(get::<f64, _>(row, idx)?),
            "NUMERIC" => json!(get::<Decimal, _>(row, idx)?.to_string()),
            "UUID" => json!(get::<uuid::Uuid, _>(row, idx)?.to_string()),
            "DATE" => json!(get::<NaiveDate, _>(row, idx)?.to_string()),
            "TIME" => json!(get::<NaiveTime, _>(row, idx)?.to_string()),
            "TIMESTAMP" => json!(iso_naive(get::<NaiveDateTime, _>(row, idx)?)),
            "TIMESTAMPTZ" => json!(iso_utc(get::<DateTime<Utc>, _>(row, idx)?)),
            "JSON" | "JSONB" => get::<Value, _>(row, idx)?,
            "BYTEA" => base64(get::<Vec<u8>, _>(row, idx)?),
            _ => text_or_bytes(row, idx)?,
        };
        Ok(value)
    })
}

pub(crate) fn sqlite_row(row: &SqliteRow) -> Result<Row, DbError> {
    // SQLite is dynamically typed: the storage class of the value decides, not
    // the declared column type, so decoding skips sqlx's compatibility check.
    decode_row(row, |row, idx, type_name| {
        let value = match type_name {
            "NULL" => Value::Null,
            "BOOLEAN" => json!(get_unchecked::<bool, _>(row, idx)?),
            "INTEGER" | "INT8" => json!(get_unchecked::<i64, _>(row, idx)?),
            "REAL" => json!(get_unchecked::<f64, _>(row, idx)?),
            "BLOB" => base64(get_unchecked::<Vec<u8>, _>(row, idx)?),
            _ => json!(get_unchecked::<String, _>(row, idx)?),
        };
        Ok(value)
    })
}

/// Walks the columns of `row`, short-circuiting SQL NULLs, and hands every
/// other value to `decode` together with the value's type name.
fn decode_row<R, F>(row: &R, decode: F) -> Result<Row, DbError>
where
    R: sqlx::Row,
    usize: ColumnIndex<R>,
    F: Fn(&R, usize, &str) -> Result<Value, DbError>,
{
    let mut out = Row::with_capacity(row.len());
    for (idx, column) in row.columns().iter().enumerate() {
        let raw = row.try_get_raw(idx).map_err(|e| decode_error(column.name(), e))?;
        let value = if raw.is_null() {
            Value::Null
        } else {
            let type_info = raw.type_info();
            decode(row, idx, type_info.name())?
        };
        out.insert(column.name().to_string(), value);
    }
    Ok(out)
}

fn get<'r, T, R>(row: &'r R, idx: usize) -> Result<T, DbError>
where
    R: sqlx::Row,
    usize: ColumnIndex<R>,
    T: Decode<'r, R::Database> + Type<R::Database>,
{
    row.try_get(idx)
        .map_err(|e| decode_error(row.columns()[idx].name(), e))
}

fn get_unchecked<'r, T, R>(row: &'r R, idx: usize) -> Result<T, DbError>
where
    R: sqlx::Row,
    usize: ColumnIndex<R>,
    T: Decode<'r, R::Database>,
{
    row.try_get_unchecked(idx)
        .map_err(|e| decode_error(row.columns()[idx].name(), e))
}

/// Last resort for types without a dedicated mapping: the textual form if the
/// driver has one, otherwise the raw bytes.
fn text_or_bytes<'r, R>(row: &'r R, idx: usize) -> Result<Value, DbError>
where
    R: sqlx::Row,
    usize: ColumnIndex<R>,
    String: Decode<'r, R::Database>,
    Vec<u8>: Decode<'r, R::Database>,
{
    if let Ok(text) = row.try_get_unchecked::<String, _>(idx) {
        return Ok(Value::String(text));
    }
    get_unchecked::<Vec<u8>, _>(row, idx).map(base64)
}

fn decode_error(column: &str, source: sqlx::Error) -> DbError {
    DbError::DecodeError {
        column: column.to_string(),
        source,
    }
}

fn base64(bytes: Vec<u8>) -> Value {
    Value::String(STANDARD.encode(bytes))
}

fn iso_naive(value: NaiveDateTime) -> String {
    value.format("%Y-%m-%dT%H:%M:%S%.3f").to_string()
}

fn iso_utc(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
