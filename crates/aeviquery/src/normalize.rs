//! # Record Normalization
//!
//! Two transformations turn table items into records the rest of the crate can work with.
//!
//! ## Ingest: [`normalize`]
//!
//! Runs on every item a query fetches, before it is yielded or cached:
//!
//! - `S` → [`Value::Str`]
//! - `N` → [`Value::Int`]: the integer part of the decimal (`"12.0"` → `12`, `"1.5E3"` → `1500`)
//! - `BOOL` → [`Value::Bool`], `NULL` → [`Value::Null`]
//!
//! Numbers in this table are whole by construction. A value that is not a number at all,
//! or does not fit in an `i64`, is rejected with [`QueryError::MalformedNumber`].
//!
//! ## On demand: [`unpack_sub_request`]
//!
//! `st_request` holds a JSON object serialized as a string. Unpacking copies each of its keys
//! onto the record as `st_<key>` and drops `st_request`.
//!
//! - No `st_request` → record unchanged.
//! - `st_request` is `{}` → record unchanged, `st_request` kept.
//! - `st_request` is not a JSON object → [`QueryError::Parse`].
//!
//! String fields are copied as-is; other JSON values are copied as their JSON text.

use serde_json::{Map, Value as JsonValue};

use crate::error::{QueryError, Result};
use crate::model::{Record, ResultSet, Value, WireItem, WireValue, ST_PREFIX, ST_REQUEST};

/// Converts a fetched item into a record.
pub fn normalize(item: WireItem) -> Result<Record> {
    let mut record = Record::new();
    for (attribute, value) in item {
        let value = match value {
            WireValue::S(s) => Value::Str(s),
            WireValue::N(text) => match decimal_to_i64(&text) {
                Some(n) => Value::Int(n),
                None => {
                    return Err(QueryError::MalformedNumber {
                        attribute,
                        value: text,
                    })
                }
            },
            WireValue::Bool(b) => Value::Bool(b),
            WireValue::Null(_) => Value::Null,
        };
        record.insert(attribute, value);
    }
    Ok(record)
}

/// Integer part of a decimal number in text form.
pub fn decimal_to_i64(text: &str) -> Option<i64> {
    let text = text.trim();
    if let Ok(n) = text.parse::<i64>() {
        return Some(n);
    }

    if text.contains(['e', 'E']) {
        let n = text.parse::<f64>().ok()?;
        return (n.is_finite() && n.abs() < i64::MAX as f64).then(|| n.trunc() as i64);
    }

    let (whole, fraction) = text.split_once('.')?;
    if !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    match whole {
        "" | "+" | "-" if !fraction.is_empty() => Some(0),
        _ => whole.parse().ok(),
    }
}

/// Moves the fields of `st_request` onto the record as `st_<key>`.
pub fn unpack_sub_request(mut record: Record) -> Result<Record> {
    let Some(raw) = record.get(ST_REQUEST) else {
        return Ok(record);
    };
    let Value::Str(raw) = raw else {
        return Err(QueryError::parse(
            raw.to_string(),
            "st_request is not a serialized JSON object",
        ));
    };

    let fields = parse_sub_request(raw)?;
    if fields.is_empty() {
        return Ok(record);
    }

    for (key, value) in &fields {
        record.insert(format!("{}{}", ST_PREFIX, key), sub_request_value(value));
    }
    record.remove(ST_REQUEST);
    Ok(record)
}

/// Unpacks every record in the set, keeping its shape.
pub fn unpack_result_set(results: ResultSet) -> Result<ResultSet> {
    let unpack_all =
        |records: Vec<Record>| records.into_iter().map(unpack_sub_request).collect::<Result<Vec<_>>>();

    Ok(match results {
        ResultSet::Flat(records) => ResultSet::Flat(unpack_all(records)?),
        ResultSet::ByStatus(groups) => ResultSet::ByStatus(
            groups
                .into_iter()
                .map(|(status, records)| Ok((status, unpack_all(records)?)))
                .collect::<Result<_>>()?,
        ),
    })
}

pub(crate) fn parse_sub_request(raw: &str) -> Result<Map<String, JsonValue>> {
    match serde_json::from_str::<JsonValue>(raw) {
        Ok(JsonValue::Object(fields)) => Ok(fields),
        Ok(_) => Err(QueryError::parse(raw, "st_request is not a JSON object")),
        Err(e) => Err(QueryError::parse(raw, format!("st_request is not valid JSON: {}", e))),
    }
}

pub(crate) fn sub_request_value(value: &JsonValue) -> Value {
    match value {
        JsonValue::String(s) => Value::Str(s.clone()),
        other => Value::Str(other.to_string()),
    }
}
