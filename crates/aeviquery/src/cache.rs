//! # Result Cache
//!
//! Holds the last fetched (or loaded) [`ResultSet`] so it can be filtered repeatedly without
//! going back to the table. The cache is replaced wholesale and never edited in place.
//!
//! ## Filter Forms
//!
//! [`CacheFilter`] accepts two inputs:
//!
//! - **Text**: the clause language of [`crate::filter`] (`errormessage contains Invalid; ...`).
//! - **Mapping**: attribute → value pairs. Each pair holds when the value, as text, appears
//!   anywhere in the attribute's text. This is a deliberately loose match: `timestamp` →
//!   `"16345"` matches every timestamp containing those digits. The one exception is the
//!   `between` key, whose value is `{"start": "YYYY-MM-DD", "end": "YYYY-MM-DD"}`: it keeps
//!   records whose `timestamp` falls on or between those days (UTC).
//!
//! Either way, attributes are also looked up inside the `st_request` sub-document, and a record
//! must satisfy every clause to be returned.

use indexmap::IndexMap;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

use crate::error::{QueryError, Result};
use crate::filter::parse::between_days;
use crate::filter::{self, FilterDescriptor};
use crate::model::{Record, ResultSet};

/// Mapping key holding a day range instead of a substring.
pub const BETWEEN_KEY: &str = "between";

/// A filter to apply to the cached results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheFilter {
    Text(String),
    Mapping(IndexMap<String, JsonValue>),
}

impl CacheFilter {
    /// Compiles the filter into descriptors.
    pub fn descriptors(&self) -> Result<Vec<FilterDescriptor>> {
        match self {
            CacheFilter::Text(text) => filter::compile(text),
            CacheFilter::Mapping(pairs) => pairs
                .iter()
                .map(|(attribute, value)| mapping_descriptor(attribute, value))
                .collect(),
        }
    }
}

fn mapping_descriptor(attribute: &str, value: &JsonValue) -> Result<FilterDescriptor> {
    if attribute == BETWEEN_KEY {
        return day_range(value);
    }
    Ok(match value {
        JsonValue::String(s) => FilterDescriptor::contains(attribute, s.as_str()),
        other => FilterDescriptor::contains(attribute, other.to_string()),
    })
}

fn day_range(value: &JsonValue) -> Result<FilterDescriptor> {
    let clause = format!("{}: {}", BETWEEN_KEY, value);
    let bound = |key: &str| {
        value.get(key).and_then(JsonValue::as_str).ok_or_else(|| {
            QueryError::parse(
                clause.as_str(),
                format!("expected a '{}' date as YYYY-MM-DD", key),
            )
        })
    };
    between_days(&clause, bound("start")?, bound("end")?)
}

impl From<&str> for CacheFilter {
    fn from(text: &str) -> Self {
        CacheFilter::Text(text.to_string())
    }
}

impl From<String> for CacheFilter {
    fn from(text: String) -> Self {
        CacheFilter::Text(text)
    }
}

impl From<IndexMap<String, String>> for CacheFilter {
    fn from(pairs: IndexMap<String, String>) -> Self {
        CacheFilter::Mapping(
            pairs
                .into_iter()
                .map(|(k, v)| (k, JsonValue::String(v)))
                .collect(),
        )
    }
}

impl From<BTreeMap<String, String>> for CacheFilter {
    fn from(pairs: BTreeMap<String, String>) -> Self {
        CacheFilter::Mapping(
            pairs
                .into_iter()
                .map(|(k, v)| (k, JsonValue::String(v)))
                .collect(),
        )
    }
}

impl<const N: usize> From<[(&str, &str); N]> for CacheFilter {
    fn from(pairs: [(&str, &str); N]) -> Self {
        CacheFilter::Mapping(
            pairs
                .into_iter()
                .map(|(k, v)| (k.to_string(), JsonValue::from(v)))
                .collect(),
        )
    }
}

/// Accepts a JSON string (filter text) or a JSON object (mapping).
///
/// Non-string mapping values are compared by their JSON text.
impl TryFrom<JsonValue> for CacheFilter {
    type Error = QueryError;

    fn try_from(value: JsonValue) -> Result<Self> {
        match value {
            JsonValue::String(text) => Ok(CacheFilter::Text(text)),
            JsonValue::Object(pairs) => Ok(CacheFilter::Mapping(pairs.into_iter().collect())),
            other => Err(QueryError::InvalidFilterArgument(json_kind(&other).to_string())),
        }
    }
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}

/// The last result set, held in memory.
#[derive(Debug, Clone, Default)]
pub struct ResultCache {
    results: ResultSet,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> &ResultSet {
        &self.results
    }

    /// Replaces the cached results.
    pub fn set(&mut self, results: ResultSet) {
        tracing::debug!(records = results.len(), "cache replaced");
        self.results = results;
    }

    pub fn clear(&mut self) {
        self.results = ResultSet::default();
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Returns the cached records matching the filter, in cache order.
    ///
    /// Fails with [`QueryError::EmptyCache`] before looking at the filter when nothing is cached.
    pub fn filter(&self, filter: &CacheFilter) -> Result<Vec<Record>> {
        if self.is_empty() {
            return Err(QueryError::EmptyCache);
        }
        self.filter_with(&filter.descriptors()?)
    }

    /// Like [`ResultCache::filter`], with already compiled descriptors.
    pub fn filter_with(&self, descriptors: &[FilterDescriptor]) -> Result<Vec<Record>> {
        if self.is_empty() {
            return Err(QueryError::EmptyCache);
        }
        Ok(self
            .results
            .records()
            .filter(|record| filter::matches_all(descriptors, record))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Value;
    use serde_json::json;

    fn record(id: &str, timestamp: i64, errormessage: &str, site: &str) -> Record {
        [
            ("_id", Value::from(id)),
            ("timestamp", Value::from(timestamp)),
            ("errormessage", Value::from(errormessage)),
            (
                "st_request",
                Value::from(format!(r#"{{"sitereference":"{}"}}"#, site)),
            ),
        ]
        .into_iter()
        .collect()
    }

    fn cache() -> ResultCache {
        let mut cache = ResultCache::new();
        cache.set(ResultSet::Flat(vec![
            record("a", 1633849200, "Invalid field", "site1"),
            record("b", 1634540400, "Invalid card", "test_site12345"),
            record("c", 1634598734, "Timeout", "site2"),
        ]));
        cache
    }

    fn ids(records: &[Record]) -> Vec<&str> {
        records.iter().filter_map(|r| r.get_str("_id")).collect()
    }

    #[test]
    fn test_empty_cache_fails_for_any_filter() {
        let cache = ResultCache::new();
        for filter in [
            CacheFilter::from(""),
            CacheFilter::from("not a valid clause"),
            CacheFilter::Mapping(IndexMap::new()),
        ] {
            assert!(matches!(cache.filter(&filter), Err(QueryError::EmptyCache)));
        }
    }

    #[test]
    fn test_empty_filter_returns_whole_cache_in_order() {
        let cache = cache();
        assert_eq!(ids(&cache.filter(&"".into()).unwrap()), vec!["a", "b", "c"]);
        assert_eq!(
            ids(&cache.filter(&CacheFilter::Mapping(IndexMap::new())).unwrap()),
            vec!["a", "b", "c"]
        );
    }

    #[test]
    fn test_text_filter_applies_all_clauses() {
        let cache = cache();
        let hits = cache
            .filter(&"errormessage contains Invalid; between 2021-10-10 00:00:00 and 2021-10-15 00:00:00".into())
            .unwrap();
        assert_eq!(ids(&hits), vec!["a"]);
    }

    #[test]
    fn test_filtering_is_idempotent_and_leaves_cache_alone() {
        let cache = cache();
        let filter = CacheFilter::from("errormessage contains Invalid");
        let first = cache.filter(&filter).unwrap();
        let second = cache.filter(&filter).unwrap();
        assert_eq!(first, second);
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn test_mapping_matches_loosely_and_inside_sub_request() {
        let cache = cache();
        assert_eq!(
            ids(&cache.filter(&[("sitereference", "site1")].into()).unwrap()),
            vec!["a", "b"]
        );
        assert_eq!(
            ids(&cache.filter(&[("timestamp", "1634540400")].into()).unwrap()),
            vec!["b"]
        );
        assert_eq!(
            ids(&cache
                .filter(&[("timestamp", "16345"), ("sitereference", "test_")].into())
                .unwrap()),
            vec!["b"]
        );
        assert!(cache.filter(&[("derp", "herp")].into()).unwrap().is_empty());
    }

    #[test]
    fn test_mapping_between_keeps_whole_days() {
        let cache = cache();
        let range = |start: &str, end: &str| {
            CacheFilter::try_from(json!({"between": {"start": start, "end": end}})).unwrap()
        };

        let hits = cache.filter(&range("2021-10-10", "2021-10-15")).unwrap();
        assert_eq!(ids(&hits), vec!["a"]);

        // A single day runs from 00:00:00 through 23:59:59.
        let hits = cache.filter(&range("2021-10-18", "2021-10-18")).unwrap();
        assert_eq!(ids(&hits), vec!["b", "c"]);

        let filter = CacheFilter::try_from(json!({
            "between": {"start": "2021-10-10", "end": "2021-10-20"},
            "sitereference": "site2"
        }))
        .unwrap();
        assert_eq!(ids(&cache.filter(&filter).unwrap()), vec!["c"]);
    }

    #[test]
    fn test_malformed_mapping_between_is_a_parse_error() {
        let cache = cache();
        for value in [
            json!({"between": "2021-10-10"}),
            json!({"between": {"start": "2021-10-10"}}),
            json!({"between": {"start": "2021-10-10", "end": 20211015}}),
            json!({"between": {"start": "10/10/2021", "end": "2021-10-15"}}),
        ] {
            let filter = CacheFilter::try_from(value.clone()).unwrap();
            assert!(
                matches!(cache.filter(&filter), Err(QueryError::Parse { .. })),
                "accepted {}",
                value
            );
        }
    }

    #[test]
    fn test_parse_errors_surface() {
        let cache = cache();
        let err = cache.filter(&"timestamp is soon".into()).unwrap_err();
        assert!(matches!(err, QueryError::Parse { .. }));
    }

    #[test]
    fn test_grouped_results_filter_across_groups() {
        let mut groups = IndexMap::new();
        groups.insert("SUCCESS".to_string(), vec![record("s", 1, "", "x")]);
        groups.insert("FAILED".to_string(), vec![record("f", 2, "", "x")]);
        let mut cache = ResultCache::new();
        cache.set(ResultSet::ByStatus(groups));

        assert_eq!(ids(&cache.filter(&"".into()).unwrap()), vec!["s", "f"]);
    }

    #[test]
    fn test_json_arguments_convert_or_fail() {
        assert_eq!(
            CacheFilter::try_from(json!("name is x")).unwrap(),
            CacheFilter::Text("name is x".into())
        );
        assert_eq!(
            CacheFilter::try_from(json!({"timestamp": "1634540400", "sitereference": "site"}))
                .unwrap(),
            CacheFilter::from([("timestamp", "1634540400"), ("sitereference", "site")])
        );

        // Numbers match by their JSON text.
        let cache = cache();
        let filter = CacheFilter::try_from(json!({"timestamp": 1634540400})).unwrap();
        assert_eq!(ids(&cache.filter(&filter).unwrap()), vec!["b"]);
        assert!(matches!(
            CacheFilter::try_from(json!([])),
            Err(QueryError::InvalidFilterArgument(_))
        ));
    }
}
