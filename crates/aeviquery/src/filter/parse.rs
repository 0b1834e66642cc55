//! Filter text parsing.
//!
//! Each clause has the shape `<head> <rest>`, where the head is either an attribute name or
//! the `between` keyword. Attribute names never contain whitespace, so splitting on the first
//! run of whitespace is enough to tell the two apart; values may contain anything, including
//! the operator words themselves (`errormessage is field is missing`).

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use super::condition::Condition;
use super::{FilterDescriptor, FilterValue};
use crate::error::{QueryError, Result};
use crate::model::{is_numeric_attribute, TIMESTAMP};

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DATETIME_SHAPE: &[u8] = b"dddd-dd-dd dd:dd:dd";
const DATE_FORMAT: &str = "%Y-%m-%d";
const NOW: &str = "now";

const CACHE_SEPARATORS: &[char] = &[';'];
const SERVER_SEPARATORS: &[char] = &[';', ','];

/// Compiles filter text for matching cached records.
pub fn compile(text: &str) -> Result<Vec<FilterDescriptor>> {
    compile_at(text, Utc::now())
}

/// Like [`compile`], resolving `now` to the given instant.
pub fn compile_at(text: &str, now: DateTime<Utc>) -> Result<Vec<FilterDescriptor>> {
    parse_clauses(text, CACHE_SEPARATORS, now)
}

/// Compiles filter text into a predicate for the table to evaluate.
///
/// Returns `None` when the text holds no clauses.
pub fn compile_server_predicate(text: &str) -> Result<Option<Condition>> {
    compile_server_predicate_at(text, Utc::now())
}

pub fn compile_server_predicate_at(text: &str, now: DateTime<Utc>) -> Result<Option<Condition>> {
    let descriptors = parse_clauses(text, SERVER_SEPARATORS, now)?;
    Ok(Condition::all(&descriptors))
}

fn parse_clauses(
    text: &str,
    separators: &[char],
    now: DateTime<Utc>,
) -> Result<Vec<FilterDescriptor>> {
    let descriptors = text
        .split(separators)
        .map(str::trim)
        .filter(|clause| !clause.is_empty())
        .map(|clause| parse_clause(clause, now))
        .collect::<Result<Vec<_>>>()?;

    if !descriptors.is_empty() {
        tracing::debug!(clauses = descriptors.len(), filter = text, "compiled filter");
    }
    Ok(descriptors)
}

fn parse_clause(clause: &str, now: DateTime<Utc>) -> Result<FilterDescriptor> {
    let Some((head, rest)) = clause.split_once(char::is_whitespace) else {
        return Err(QueryError::parse(
            clause,
            "expected '<attribute> is|contains <value>' or 'between <start> and <end>'",
        ));
    };
    let rest = rest.trim_start();

    if head == "between" {
        return parse_between(clause, rest, now);
    }

    if let Some(value) = operand(rest, "is").or_else(|| operand(rest, "=")) {
        let value = require_value(clause, value)?;
        return parse_equality(clause, head, value);
    }

    if let Some(substring) = operand(rest, "contains") {
        let substring = require_value(clause, substring)?;
        return Ok(FilterDescriptor::contains(head, substring));
    }

    Err(QueryError::parse(
        clause,
        format!("unknown operator after '{}'", head),
    ))
}

/// Strips a leading operator word, returning what follows it.
fn operand<'a>(rest: &'a str, operator: &str) -> Option<&'a str> {
    let after = rest.strip_prefix(operator)?;
    if after.is_empty() || after.starts_with(char::is_whitespace) {
        Some(after.trim())
    } else {
        None
    }
}

fn require_value<'a>(clause: &str, value: &'a str) -> Result<&'a str> {
    if value.is_empty() {
        Err(QueryError::parse(clause, "missing value"))
    } else {
        Ok(value)
    }
}

fn parse_equality(clause: &str, attribute: &str, value: &str) -> Result<FilterDescriptor> {
    let value = if is_numeric_attribute(attribute) {
        let number = value.parse::<i64>().map_err(|_| {
            QueryError::parse(clause, format!("'{}' needs an integer, got '{}'", attribute, value))
        })?;
        FilterValue::Int(number)
    } else {
        FilterValue::Text(value.to_string())
    };
    Ok(FilterDescriptor::equals(attribute, value))
}

fn parse_between(clause: &str, rest: &str, now: DateTime<Utc>) -> Result<FilterDescriptor> {
    let Some((start, end)) = split_on_and(rest) else {
        return Err(QueryError::parse(
            clause,
            "expected 'between <start> and <end>'",
        ));
    };

    let start = parse_datetime(clause, start.trim())?;
    let end = match end.trim() {
        NOW => now.timestamp(),
        end => parse_datetime(clause, end)?,
    };

    Ok(FilterDescriptor::between(TIMESTAMP, start, end))
}

/// Splits at the first `and` that stands alone between whitespace.
fn split_on_and(rest: &str) -> Option<(&str, &str)> {
    rest.match_indices("and").find_map(|(at, word)| {
        let before = &rest[..at];
        let after = &rest[at + word.len()..];
        (before.ends_with(char::is_whitespace) && after.starts_with(char::is_whitespace))
            .then(|| (before.trim_end(), after.trim_start()))
    })
}

/// A range of whole days, `start 00:00:00` through `end 23:59:59` UTC, on `timestamp`.
///
/// `clause` names the filter entry in errors.
pub(crate) fn between_days(clause: &str, start: &str, end: &str) -> Result<FilterDescriptor> {
    let day = |text: &str| {
        NaiveDate::parse_from_str(text.trim(), DATE_FORMAT).map_err(|_| {
            QueryError::parse(clause, format!("'{}' is not a YYYY-MM-DD date", text))
        })
    };
    let first = day(start)?.and_hms_opt(0, 0, 0);
    let last = day(end)?.and_hms_opt(23, 59, 59);
    match (first, last) {
        (Some(first), Some(last)) => Ok(FilterDescriptor::between(
            TIMESTAMP,
            first.and_utc().timestamp(),
            last.and_utc().timestamp(),
        )),
        _ => Err(QueryError::parse(clause, "date out of range")),
    }
}

/// Parses a `YYYY-MM-DD HH:MM:SS` UTC datetime into epoch seconds.
fn parse_datetime(clause: &str, text: &str) -> Result<i64> {
    let bad_date = || {
        QueryError::parse(
            clause,
            format!("'{}' is not a YYYY-MM-DD HH:MM:SS datetime", text),
        )
    };

    let well_shaped = text.len() == DATETIME_SHAPE.len()
        && text
            .bytes()
            .zip(DATETIME_SHAPE)
            .all(|(c, &expected)| match expected {
                b'd' => c.is_ascii_digit(),
                _ => c == expected,
            });
    if !well_shaped {
        return Err(bad_date());
    }

    NaiveDateTime::parse_from_str(text, DATETIME_FORMAT)
        .map(|dt| dt.and_utc().timestamp())
        .map_err(|_| bad_date())
}
