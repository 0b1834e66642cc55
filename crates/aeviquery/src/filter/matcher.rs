//! In-process matching of cached records.
//!
//! A descriptor names an attribute, but the value may live in more than one place: on the
//! record itself, or inside its serialized `st_request` sub-document. Every candidate is tried
//! and the clause holds if any of them satisfies it:
//!
//! 1. `record[attr]`
//! 2. `st_request[attr]`
//! 3. `st_request[attr without its "st_" prefix]`
//!
//! The sub-document is parsed at most once per record, and only if a clause needs it.

use serde_json::{Map, Value as JsonValue};
use std::borrow::Cow;
use std::cell::OnceCell;

use super::{FilterDescriptor, FilterValue};
use crate::model::{Record, Value, ST_PREFIX, ST_REQUEST};
use crate::normalize::{parse_sub_request, sub_request_value};

/// True if the record satisfies every descriptor. An empty list matches everything.
pub fn matches_all(descriptors: &[FilterDescriptor], record: &Record) -> bool {
    let subject = Subject::new(record);
    descriptors.iter().all(|d| subject.satisfies(d))
}

impl FilterDescriptor {
    /// Checks this clause alone against a record.
    pub fn matches(&self, record: &Record) -> bool {
        Subject::new(record).satisfies(self)
    }
}

struct Subject<'r> {
    record: &'r Record,
    sub_request: OnceCell<Option<Map<String, JsonValue>>>,
}

impl<'r> Subject<'r> {
    fn new(record: &'r Record) -> Self {
        Self {
            record,
            sub_request: OnceCell::new(),
        }
    }

    fn satisfies(&self, descriptor: &FilterDescriptor) -> bool {
        self.candidates(descriptor.attribute())
            .iter()
            .any(|value| value_satisfies(value, descriptor))
    }

    fn candidates(&self, attribute: &str) -> Vec<Cow<'_, Value>> {
        let mut found = Vec::new();
        if let Some(value) = self.record.get(attribute) {
            found.push(Cow::Borrowed(value));
        }

        if let Some(sub) = self.sub_request() {
            let keys = [Some(attribute), attribute.strip_prefix(ST_PREFIX)];
            for key in keys.into_iter().flatten() {
                if let Some(value) = sub.get(key) {
                    found.push(Cow::Owned(sub_request_value(value)));
                }
            }
        }
        found
    }

    /// Records with a missing or unreadable sub-document simply have no nested fields.
    fn sub_request(&self) -> Option<&Map<String, JsonValue>> {
        self.sub_request
            .get_or_init(|| {
                let raw = self.record.get_str(ST_REQUEST)?;
                parse_sub_request(raw).ok()
            })
            .as_ref()
    }
}

fn value_satisfies(value: &Value, descriptor: &FilterDescriptor) -> bool {
    match descriptor {
        FilterDescriptor::Equals {
            value: FilterValue::Int(expected),
            ..
        } => as_integer(value) == Some(*expected),
        FilterDescriptor::Equals {
            value: FilterValue::Text(expected),
            ..
        } => value.to_string() == *expected,
        FilterDescriptor::Contains { substring, .. } => {
            value.to_string().contains(substring.as_str())
        }
        FilterDescriptor::Between { start, end, .. } => {
            as_integer(value).is_some_and(|n| *start <= n && n <= *end)
        }
    }
}

/// Integers, or strings holding one (sub-document fields are text).
fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Int(n) => Some(*n),
        Value::Str(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pairs: &[(&str, Value)]) -> Record {
        pairs.iter().map(|(k, v)| (*k, v.clone())).collect()
    }

    fn transaction(timestamp: i64, errormessage: &str, st_request: &str) -> Record {
        record(&[
            ("_id", "t1".into()),
            ("status", "FAILED".into()),
            ("timestamp", timestamp.into()),
            ("errormessage", errormessage.into()),
            ("st_request", st_request.into()),
        ])
    }

    #[test]
    fn test_empty_descriptor_list_matches_everything() {
        assert!(matches_all(&[], &Record::new()));
    }

    #[test]
    fn test_numeric_equality_is_exact() {
        let d = FilterDescriptor::equals("timestamp", FilterValue::Int(1634540400));
        assert!(d.matches(&transaction(1634540400, "", "{}")));
        assert!(!d.matches(&transaction(1634540401, "", "{}")));
        assert!(!d.matches(&transaction(16345404, "", "{}")));
    }

    #[test]
    fn test_text_equality_is_exact() {
        let d = FilterDescriptor::equals("errormessage", FilterValue::Text("Invalid field".into()));
        assert!(d.matches(&transaction(0, "Invalid field", "{}")));
        assert!(!d.matches(&transaction(0, "Invalid field value", "{}")));
    }

    #[test]
    fn test_contains_is_case_sensitive() {
        let d = FilterDescriptor::contains("errormessage", "Invalid");
        assert!(d.matches(&transaction(0, "Invalid field", "{}")));
        assert!(d.matches(&transaction(0, "An Invalid field", "{}")));
        assert!(!d.matches(&transaction(0, "invalid field", "{}")));
    }

    #[test]
    fn test_between_bounds_are_inclusive() {
        let d = FilterDescriptor::between("timestamp", 1633824000, 1634256000);
        assert!(d.matches(&transaction(1633824000, "", "{}")));
        assert!(d.matches(&transaction(1634256000, "", "{}")));
        assert!(!d.matches(&transaction(1633823999, "", "{}")));
        assert!(!d.matches(&transaction(1634256001, "", "{}")));
    }

    #[test]
    fn test_all_descriptors_must_hold() {
        let descriptors = vec![
            FilterDescriptor::equals("errormessage", FilterValue::Text("Invalid field".into())),
            FilterDescriptor::between("timestamp", 1633824000, 1634256000),
        ];
        assert!(matches_all(&descriptors, &transaction(1633849200, "Invalid field", "{}")));
        assert!(!matches_all(&descriptors, &transaction(1634598734, "Invalid field", "{}")));
        assert!(!matches_all(&descriptors, &transaction(1633849200, "Other", "{}")));
    }

    #[test]
    fn test_reaches_into_packed_sub_request() {
        let packed = transaction(0, "", r#"{"sitereference":"test_site12345","dccoffered":1}"#);
        assert!(FilterDescriptor::contains("sitereference", "site123").matches(&packed));
        assert!(FilterDescriptor::contains("st_sitereference", "test_").matches(&packed));
        assert!(
            FilterDescriptor::equals("dccoffered", FilterValue::Text("1".into())).matches(&packed)
        );
        assert!(!FilterDescriptor::contains("sitereference", "another").matches(&packed));
    }

    #[test]
    fn test_reads_unpacked_fields_directly() {
        let unpacked = record(&[("st_sitereference", "siteA".into())]);
        assert!(FilterDescriptor::contains("st_sitereference", "siteA").matches(&unpacked));
    }

    #[test]
    fn test_either_location_may_satisfy_the_clause() {
        let r = transaction(0, "Top level", r#"{"errormessage":"Nested Invalid"}"#);
        assert!(FilterDescriptor::contains("errormessage", "Top").matches(&r));
        assert!(FilterDescriptor::contains("errormessage", "Nested").matches(&r));
    }

    #[test]
    fn test_unreadable_sub_request_is_ignored() {
        let r = transaction(0, "x", "not json");
        assert!(!FilterDescriptor::contains("sitereference", "site").matches(&r));
        assert!(FilterDescriptor::contains("errormessage", "x").matches(&r));
    }

    #[test]
    fn test_missing_attribute_never_matches() {
        assert!(!FilterDescriptor::contains("derp", "herp").matches(&transaction(0, "", "{}")));
    }
}
