//! # Domain Model
//!
//! Transactions come back from the table as [`WireItem`]s: attribute maps whose values carry
//! the store's type tags (`S`, `N`, `BOOL`, `NULL`). Numbers travel as decimal text. Once an
//! item has gone through [`crate::normalize`] it becomes a [`Record`], where every number is a
//! plain `i64` and strings are plain strings.
//!
//! ## Records
//!
//! A [`Record`] is an ordered attribute map. Most attributes are scalar strings, a few are
//! integers (`timestamp`, `version`, `created_at`, `send_attempts`), and `st_request` holds a
//! serialized JSON object. Unpacking that object adds `st_<key>` attributes to the record.
//!
//! ## Result Sets
//!
//! Query results are held as a [`ResultSet`], which has two shapes:
//!
//! - **Flat**: the records of every queried status, concatenated in query order.
//! - **ByStatus**: one record list per status label, in the order the statuses were queried.
//!
//! Both shapes serialize to the JSON persisted in `results.json`, so loading accepts either.
//!
//! ## Streams
//!
//! Filtered queries hand back [`Yielded`] items: a record, or a [`Yielded::PageBoundary`]
//! marking the end of a fetched page.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::QueryError;

/// Attribute holding the serialized request sub-document.
pub const ST_REQUEST: &str = "st_request";

/// Prefix given to attributes unpacked from [`ST_REQUEST`].
pub const ST_PREFIX: &str = "st_";

/// Attribute carrying the transaction time in epoch seconds.
pub const TIMESTAMP: &str = "timestamp";

/// Attributes whose filter values are coerced to integers.
pub const NUMERIC_ATTRIBUTES: &[&str] = &["timestamp", "version", "created_at"];

pub fn is_numeric_attribute(name: &str) -> bool {
    NUMERIC_ATTRIBUTES.contains(&name)
}

/// A typed attribute value as delivered by the table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WireValue {
    #[serde(rename = "S")]
    S(String),
    /// Arbitrary-precision decimal, as text.
    #[serde(rename = "N")]
    N(String),
    #[serde(rename = "BOOL")]
    Bool(bool),
    #[serde(rename = "NULL")]
    Null(bool),
}

impl WireValue {
    pub fn string(value: impl Into<String>) -> Self {
        WireValue::S(value.into())
    }

    pub fn number(value: i64) -> Self {
        WireValue::N(value.to_string())
    }
}

/// A raw item (or key) as delivered by the table.
pub type WireItem = BTreeMap<String, WireValue>;

/// A normalized attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Str(String),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Str(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

/// A normalized transaction record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(BTreeMap<String, Value>);

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, attribute: &str) -> Option<&Value> {
        self.0.get(attribute)
    }

    pub fn get_str(&self, attribute: &str) -> Option<&str> {
        self.get(attribute).and_then(Value::as_str)
    }

    pub fn get_int(&self, attribute: &str) -> Option<i64> {
        self.get(attribute).and_then(Value::as_int)
    }

    pub fn insert(&mut self, attribute: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(attribute.into(), value.into());
    }

    pub fn remove(&mut self, attribute: &str) -> Option<Value> {
        self.0.remove(attribute)
    }

    pub fn contains(&self, attribute: &str) -> bool {
        self.0.contains_key(attribute)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Record(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// The known transaction statuses; the `status` index only ever holds these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Failed,
    New,
    Duplicate,
    AlreadyCancelled,
    Processing,
    Success,
}

impl Status {
    pub const ALL: [Status; 6] = [
        Status::Failed,
        Status::New,
        Status::Duplicate,
        Status::AlreadyCancelled,
        Status::Processing,
        Status::Success,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Failed => "FAILED",
            Status::New => "NEW",
            Status::Duplicate => "DUPLICATE",
            Status::AlreadyCancelled => "ALREADY_CANCELLED",
            Status::Processing => "PROCESSING",
            Status::Success => "SUCCESS",
        }
    }

    /// Parses every label, failing on the first unknown one.
    pub fn parse_all<S: AsRef<str>>(labels: &[S]) -> Result<Vec<Status>, QueryError> {
        labels.iter().map(|l| l.as_ref().parse()).collect()
    }
}

impl FromStr for Status {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let label = s.trim();
        Status::ALL
            .into_iter()
            .find(|status| status.as_str() == label)
            .ok_or_else(|| QueryError::InvalidStatus(label.to_string()))
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A set of query results, flat or grouped by status label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResultSet {
    Flat(Vec<Record>),
    ByStatus(IndexMap<String, Vec<Record>>),
}

impl Default for ResultSet {
    fn default() -> Self {
        ResultSet::Flat(Vec::new())
    }
}

impl From<Vec<Record>> for ResultSet {
    fn from(records: Vec<Record>) -> Self {
        ResultSet::Flat(records)
    }
}

impl ResultSet {
    /// Number of records across all groups.
    pub fn len(&self) -> usize {
        match self {
            ResultSet::Flat(records) => records.len(),
            ResultSet::ByStatus(groups) => groups.values().map(Vec::len).sum(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every record, in stored order (group order first for grouped sets).
    pub fn records(&self) -> Box<dyn Iterator<Item = &Record> + '_> {
        match self {
            ResultSet::Flat(records) => Box::new(records.iter()),
            ResultSet::ByStatus(groups) => Box::new(groups.values().flatten()),
        }
    }

    pub fn into_records(self) -> Vec<Record> {
        match self {
            ResultSet::Flat(records) => records,
            ResultSet::ByStatus(groups) => groups.into_values().flatten().collect(),
        }
    }
}

/// One item of a paginated query stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Yielded {
    Record(Record),
    /// End of a fetched page; the consumer may stop here.
    PageBoundary,
}

impl Yielded {
    pub fn is_page_boundary(&self) -> bool {
        matches!(self, Yielded::PageBoundary)
    }

    pub fn into_record(self) -> Option<Record> {
        match self {
            Yielded::Record(record) => Some(record),
            Yielded::PageBoundary => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parses_known_labels_with_whitespace() {
        assert_eq!(" FAILED ".parse::<Status>().unwrap(), Status::Failed);
        assert_eq!(
            "ALREADY_CANCELLED".parse::<Status>().unwrap(),
            Status::AlreadyCancelled
        );
        for status in Status::ALL {
            assert_eq!(status.as_str().parse::<Status>().unwrap(), status);
        }
    }

    #[test]
    fn test_status_rejects_unknown_label() {
        let err = "failed".parse::<Status>().unwrap_err();
        assert!(matches!(err, QueryError::InvalidStatus(label) if label == "failed"));
    }

    #[test]
    fn test_parse_all_stops_at_first_unknown() {
        let err = Status::parse_all(&["FAILED", "BOGUS", "NEW"]).unwrap_err();
        assert!(matches!(err, QueryError::InvalidStatus(label) if label == "BOGUS"));
    }

    #[test]
    fn test_result_set_loads_both_shapes() {
        let flat: ResultSet = serde_json::from_str(r#"[{"_id": "a", "timestamp": 1}]"#).unwrap();
        assert!(matches!(flat, ResultSet::Flat(ref r) if r.len() == 1));

        let grouped: ResultSet =
            serde_json::from_str(r#"{"SUCCESS": [{"_id": "b"}], "FAILED": [{"_id": "a"}]}"#)
                .unwrap();
        let ids: Vec<&str> = grouped.records().filter_map(|r| r.get_str("_id")).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert_eq!(grouped.len(), 2);
    }

    #[test]
    fn test_record_values_round_trip_through_json() {
        let record: Record = [
            ("_id", Value::from("x")),
            ("timestamp", Value::from(1634540400_i64)),
            ("flag", Value::from(true)),
            ("gone", Value::Null),
        ]
        .into_iter()
        .collect();

        let json = serde_json::to_string(&record).unwrap();
        let back: Record = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
        assert_eq!(back.get_int("timestamp"), Some(1634540400));
    }

    #[test]
    fn test_wire_value_uses_type_tags() {
        let json = serde_json::to_string(&WireValue::number(42)).unwrap();
        assert_eq!(json, r#"{"N":"42"}"#);
        let back: WireValue = serde_json::from_str(r#"{"S":"abc"}"#).unwrap();
        assert_eq!(back, WireValue::string("abc"));
    }
}
