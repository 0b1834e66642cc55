//! # Storage Layer
//!
//! The crate talks to two external stores, both behind small interfaces:
//!
//! - **The transaction table**, through [`TableClient`]. A client runs one page of a key
//!   query and reports the continuation key; paging, filtering and normalization are done by
//!   [`crate::query`]. Authentication, retries and timeouts belong to the client.
//! - **Snapshot files**, through [`snapshot`]: plain JSON copies of a [`crate::model::ResultSet`].
//!
//! ## Table Shape
//!
//! ```text
//! prod-aevi-Transaction
//! ├── _id                       primary key
//! ├── status                    GSI "status"
//! └── transaction_filename_id   GSI "transaction_filename_id"
//! ```
//!
//! ## Implementations
//!
//! - [`mem_table::MemTable`]: an in-memory table for tests and offline use. It applies `Limit`
//!   before the filter, the way the hosted table does, so filtered pages can come back empty.

use crate::error::TransportError;
use crate::filter::{Condition, FilterExpression};
use crate::model::{WireItem, WireValue};

pub mod mem_table;
pub mod snapshot;

/// The key part of a query: one attribute equal to one value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyCondition {
    pub attribute: String,
    pub value: WireValue,
}

impl KeyCondition {
    pub fn eq(attribute: impl Into<String>, value: WireValue) -> Self {
        Self {
            attribute: attribute.into(),
            value,
        }
    }

    pub fn matches(&self, item: &WireItem) -> bool {
        item.get(&self.attribute) == Some(&self.value)
    }

    /// Renders as `#k = :k` with its placeholders.
    pub fn render(&self) -> FilterExpression {
        let mut expression = FilterExpression {
            expression: "#k = :k".to_string(),
            ..Default::default()
        };
        expression
            .names
            .insert("#k".to_string(), self.attribute.clone());
        expression.values.insert(":k".to_string(), self.value.clone());
        expression
    }
}

/// One page request against the table or one of its indexes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    /// Secondary index to query; `None` queries the primary key.
    pub index_name: Option<String>,
    pub key_condition: KeyCondition,
    pub filter: Option<Condition>,
    /// Continuation key from the previous page.
    pub exclusive_start_key: Option<WireItem>,
    /// Items to evaluate (not return) for this page.
    pub limit: Option<usize>,
}

impl QueryRequest {
    pub fn new(index_name: Option<String>, key_condition: KeyCondition) -> Self {
        Self {
            index_name,
            key_condition,
            filter: None,
            exclusive_start_key: None,
            limit: None,
        }
    }

    pub fn with_filter(mut self, filter: Option<Condition>) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }
}

/// One page of results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryPage {
    pub items: Vec<WireItem>,
    /// Present while more pages remain.
    pub last_evaluated_key: Option<WireItem>,
}

/// Abstract interface for the transaction table.
pub trait TableClient {
    /// Run a single page of a query.
    fn query(&self, request: &QueryRequest) -> Result<QueryPage, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_condition_renders_with_placeholders() {
        let key = KeyCondition::eq("status", WireValue::string("FAILED"));
        let rendered = key.render();

        assert_eq!(rendered.expression, "#k = :k");
        assert_eq!(rendered.names.get("#k").map(String::as_str), Some("status"));
        assert_eq!(rendered.values.get(":k"), Some(&WireValue::string("FAILED")));
    }

    #[test]
    fn test_key_condition_matches_only_equal_values() {
        let key = KeyCondition::eq("status", WireValue::string("FAILED"));
        let failed = WireItem::from([("status".to_string(), WireValue::string("FAILED"))]);
        let success = WireItem::from([("status".to_string(), WireValue::string("SUCCESS"))]);

        assert!(key.matches(&failed));
        assert!(!key.matches(&success));
        assert!(!key.matches(&WireItem::new()));
    }
}
