use super::{QueryPage, QueryRequest, TableClient};
use crate::error::TransportError;
use crate::model::WireItem;
use std::cell::RefCell;

/// In-memory transaction table.
///
/// Uses `RefCell` for interior mutability since queries are single-threaded.
/// This keeps `TableClient::query` on `&self` while still recording requests.
///
/// Items are returned in insertion order. Every request is recorded, so tests can check
/// what was asked of the table (limits, filters, continuation keys).
pub struct MemTable {
    key_attribute: String,
    items: RefCell<Vec<WireItem>>,
    requests: RefCell<Vec<QueryRequest>>,
    fail_after: RefCell<Option<usize>>,
}

impl Default for MemTable {
    fn default() -> Self {
        Self::with_key_attribute("_id")
    }
}

impl MemTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key_attribute(key_attribute: impl Into<String>) -> Self {
        Self {
            key_attribute: key_attribute.into(),
            items: RefCell::new(Vec::new()),
            requests: RefCell::new(Vec::new()),
            fail_after: RefCell::new(None),
        }
    }

    /// Insert an item, replacing any item with the same primary key.
    pub fn put_item(&self, item: WireItem) {
        let mut items = self.items.borrow_mut();
        let key = self.key_of(&item);
        match items.iter_mut().find(|existing| self.key_of(existing) == key) {
            Some(existing) => *existing = item,
            None => items.push(item),
        }
    }

    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }

    /// Every request served so far, in order.
    pub fn requests(&self) -> Vec<QueryRequest> {
        self.requests.borrow().clone()
    }

    /// Fail every request after the first `served` ones with a transport fault.
    /// `None` turns fault simulation off.
    pub fn set_fail_after(&self, served: Option<usize>) {
        *self.fail_after.borrow_mut() = served;
    }

    fn key_of(&self, item: &WireItem) -> Option<WireItem> {
        let value = item.get(&self.key_attribute)?;
        Some(WireItem::from([(self.key_attribute.clone(), value.clone())]))
    }
}

impl TableClient for MemTable {
    fn query(&self, request: &QueryRequest) -> Result<QueryPage, TransportError> {
        let served = {
            let mut requests = self.requests.borrow_mut();
            requests.push(request.clone());
            requests.len() - 1
        };
        if self.fail_after.borrow().is_some_and(|limit| served >= limit) {
            return Err(TransportError::new("Simulated transport fault"));
        }

        let items = self.items.borrow();
        let candidates: Vec<&WireItem> = items
            .iter()
            .filter(|item| request.key_condition.matches(item))
            .collect();

        let start = match &request.exclusive_start_key {
            None => 0,
            Some(key) => {
                candidates
                    .iter()
                    .position(|item| self.key_of(item).as_ref() == Some(key))
                    .ok_or_else(|| TransportError::new("Unknown exclusive start key"))?
                    + 1
            }
        };
        let end = match request.limit {
            Some(limit) => (start + limit).min(candidates.len()),
            None => candidates.len(),
        };

        // Limit bounds the items evaluated; the filter then drops from that window.
        let evaluated = &candidates[start..end];
        let page_items = evaluated
            .iter()
            .filter(|item| request.filter.as_ref().map_or(true, |f| f.evaluate(item)))
            .map(|item| (*item).clone())
            .collect();

        let last_evaluated_key = if end < candidates.len() {
            evaluated.last().and_then(|item| self.key_of(item))
        } else {
            None
        };

        Ok(QueryPage {
            items: page_items,
            last_evaluated_key,
        })
    }
}

// --- Test Fixtures ---

#[cfg(any(test, feature = "test_utils"))]
pub mod fixtures {
    use super::*;
    use crate::model::WireValue;

    /// A transaction item as the table stores it.
    pub fn transaction(
        id: &str,
        status: &str,
        filename: &str,
        site: &str,
        timestamp: i64,
    ) -> WireItem {
        WireItem::from([
            ("_id".to_string(), WireValue::string(id)),
            ("status".to_string(), WireValue::string(status)),
            ("name".to_string(), WireValue::string(item_name(status))),
            (
                "transaction_filename_id".to_string(),
                WireValue::string(filename),
            ),
            (
                "st_request".to_string(),
                WireValue::string(format!(r#"{{"sitereference":"{}"}}"#, site)),
            ),
            ("timestamp".to_string(), WireValue::number(timestamp)),
            ("version".to_string(), WireValue::N("1".to_string())),
        ])
    }

    fn item_name(status: &str) -> String {
        match status {
            "FAILED" => "Failed Item".to_string(),
            "SUCCESS" => "Success Item".to_string(),
            other => format!("{} Item", other),
        }
    }

    /// Five FAILED transactions and one SUCCESS, across two files.
    pub fn transaction_table() -> MemTable {
        let table = MemTable::new();
        for item in [
            transaction("failed1", "FAILED", "file1", "site1", 1633849200),
            transaction("failed2", "FAILED", "file1", "site1", 1633879800),
            transaction("failed3", "FAILED", "file1", "site2", 1634598734),
            transaction("failed4", "FAILED", "file2", "site3", 1634389597),
            transaction("failed5", "FAILED", "file2", "site3", 1634998745),
            transaction("success1", "SUCCESS", "file1", "test_anothersite12345", 1634540400),
        ] {
            table.put_item(item);
        }
        table
    }
}
