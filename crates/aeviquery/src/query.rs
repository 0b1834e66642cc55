//! # Paginated Queries
//!
//! [`PagedQuery`] walks one key query page by page, normalizing every item on the way out.
//! It is a plain [`Iterator`]: each call to `next` either hands back a buffered record or
//! fetches the next page, so nothing is requested before the consumer asks for it.
//!
//! ## Page Markers
//!
//! When the query carries a server-side filter, every page that produced at least one record
//! is followed by [`Yielded::PageBoundary`]. Filtered pages are also capped (one item per
//! request by default), which makes each marker a natural place for an interactive caller to
//! stop. Dropping the iterator abandons the remaining pages; nothing else needs cancelling.
//!
//! ```text
//! unfiltered:  rec rec rec rec ...
//! filtered:    rec | rec | rec |        (| = PageBoundary, empty pages emit nothing)
//! ```
//!
//! ## Per-Page State
//!
//! ```text
//! Fetching ──page──▶ Draining ──buffer empty──▶ PageEmitted ──more pages──▶ Fetching
//!     │                                              └──────no more pages──▶ Done
//!     └──transport fault──▶ Done
//! ```
//!
//! ## Failures
//!
//! A transport fault is yielded once as an error and ends the stream. Records already
//! yielded stay yielded: the stream is observed item by item, not committed as a batch.

use std::collections::VecDeque;

use crate::error::Result;
use crate::filter::Condition;
use crate::model::{Status, WireItem, WireValue, Yielded};
use crate::normalize::normalize;
use crate::store::{KeyCondition, QueryRequest, TableClient};

/// Attribute the status index is keyed on.
pub const STATUS_ATTRIBUTE: &str = "status";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PageState {
    Fetching,
    Draining,
    PageEmitted,
    Done,
}

/// A lazily paginated key query.
pub struct PagedQuery<'t, T: TableClient + ?Sized> {
    table: &'t T,
    request: QueryRequest,
    mark_pages: bool,
    state: PageState,
    page: VecDeque<WireItem>,
    page_had_items: bool,
}

impl<'t, T: TableClient + ?Sized> PagedQuery<'t, T> {
    /// Page markers are emitted exactly when the request carries a filter.
    pub fn new(table: &'t T, request: QueryRequest) -> Self {
        Self {
            table,
            mark_pages: request.filter.is_some(),
            request,
            state: PageState::Fetching,
            page: VecDeque::new(),
            page_had_items: false,
        }
    }

    fn fetch(&mut self) -> Result<()> {
        let page = self.table.query(&self.request)?;
        tracing::trace!(
            index = self.request.index_name.as_deref().unwrap_or("<primary>"),
            items = page.items.len(),
            more = page.last_evaluated_key.is_some(),
            "fetched page"
        );
        self.page_had_items = !page.items.is_empty();
        self.page = page.items.into();
        self.request.exclusive_start_key = page.last_evaluated_key;
        Ok(())
    }
}

impl<T: TableClient + ?Sized> Iterator for PagedQuery<'_, T> {
    type Item = Result<Yielded>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.state {
                PageState::Fetching => match self.fetch() {
                    Ok(()) => self.state = PageState::Draining,
                    Err(err) => {
                        self.state = PageState::Done;
                        return Some(Err(err));
                    }
                },
                PageState::Draining => {
                    if let Some(item) = self.page.pop_front() {
                        let record = normalize(item);
                        if record.is_err() {
                            self.state = PageState::Done;
                        }
                        return Some(record.map(Yielded::Record));
                    }
                    self.state = PageState::PageEmitted;
                    if self.mark_pages && self.page_had_items {
                        return Some(Ok(Yielded::PageBoundary));
                    }
                }
                PageState::PageEmitted => {
                    self.state = if self.request.exclusive_start_key.is_some() {
                        PageState::Fetching
                    } else {
                        PageState::Done
                    };
                }
                PageState::Done => return None,
            }
        }
    }
}

/// Builds the request for one status on the status index.
pub fn status_request(
    index_name: &str,
    status: Status,
    filter: Option<Condition>,
    filtered_page_size: usize,
) -> QueryRequest {
    let limit = filter.as_ref().map(|_| filtered_page_size);
    QueryRequest::new(
        Some(index_name.to_string()),
        KeyCondition::eq(STATUS_ATTRIBUTE, WireValue::string(status.as_str())),
    )
    .with_filter(filter)
    .with_limit(limit)
}

/// Queries several statuses one after another, concatenating their streams.
pub struct StatusQueryStream<'t, T: TableClient + ?Sized> {
    table: &'t T,
    index_name: String,
    filter: Option<Condition>,
    filtered_page_size: usize,
    pending: std::vec::IntoIter<Status>,
    current: Option<PagedQuery<'t, T>>,
}

impl<'t, T: TableClient + ?Sized> StatusQueryStream<'t, T> {
    pub fn new(
        table: &'t T,
        index_name: impl Into<String>,
        statuses: Vec<Status>,
        filter: Option<Condition>,
        filtered_page_size: usize,
    ) -> Self {
        Self {
            table,
            index_name: index_name.into(),
            filter,
            filtered_page_size,
            pending: statuses.into_iter(),
            current: None,
        }
    }

    pub fn is_filtered(&self) -> bool {
        self.filter.is_some()
    }

    fn abort(&mut self) {
        self.current = None;
        self.pending = Vec::new().into_iter();
    }
}

impl<T: TableClient + ?Sized> Iterator for StatusQueryStream<'_, T> {
    type Item = Result<Yielded>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(current) = self.current.as_mut() {
                match current.next() {
                    Some(Ok(yielded)) => return Some(Ok(yielded)),
                    Some(Err(err)) => {
                        self.abort();
                        return Some(Err(err));
                    }
                    None => self.current = None,
                }
            }

            let status = self.pending.next()?;
            tracing::debug!(%status, filtered = self.is_filtered(), "querying status");
            let request = status_request(
                &self.index_name,
                status,
                self.filter.clone(),
                self.filtered_page_size,
            );
            self.current = Some(PagedQuery::new(self.table, request));
        }
    }
}
