//! # API Facade
//!
//! The API layer is a **thin facade** over the query, cache and snapshot modules. It is the
//! single entry point for every operation, whichever front end drives it.
//!
//! ## Role and Responsibilities
//!
//! The facade:
//! - **Validates inputs** (status labels, filter text) before anything is fetched
//! - **Owns the table client and the result cache**, so there is no global state
//! - **Returns structured types** (`Result<Vec<Record>>`, streams of [`Yielded`])
//!
//! ## What the API Does NOT Do
//!
//! - **Printing**: no stdout, stderr, or formatting. Interactive callers stop a filtered stream
//!   by dropping it at a [`Yielded::PageBoundary`].
//! - **Transport concerns**: credentials, retries and timeouts belong to the [`TableClient`].
//!
//! ## Operations
//!
//! | Method | Fetches | Caches |
//! |--------|---------|--------|
//! | `run_status_query` | every page of every status | yes, flat, when non-empty |
//! | `run_grouped_status_query` | every page of every status | yes, grouped, when non-empty |
//! | `run_filtered_status_query` | lazily, as the stream is pulled | no |
//! | `run_id_query` / `run_filename_query` | every page | no |
//! | `filter_cache` | nothing | no |
//! | `load_snapshot` | nothing | replaces the cache |
//!
//! ## Generic Over TableClient
//!
//! `TransactionRepo<T: TableClient>` is generic over the table:
//! - Production: a client for the hosted table
//! - Testing: [`crate::store::mem_table::MemTable`]

use indexmap::IndexMap;
use std::path::{Path, PathBuf};

use crate::cache::{CacheFilter, ResultCache};
use crate::config::QueryConfig;
use crate::error::Result;
use crate::filter::compile_server_predicate;
use crate::model::{Record, ResultSet, Status, WireValue, Yielded};
use crate::query::{PagedQuery, StatusQueryStream};
use crate::store::{snapshot, KeyCondition, QueryRequest, TableClient};

/// The main API facade for transaction queries.
pub struct TransactionRepo<T: TableClient> {
    table: T,
    config: QueryConfig,
    cache: ResultCache,
}

impl<T: TableClient> TransactionRepo<T> {
    pub fn new(table: T, config: QueryConfig) -> Self {
        tracing::debug!(table = %config.table_label(), "transaction repo ready");
        Self {
            table,
            config,
            cache: ResultCache::new(),
        }
    }

    pub fn table(&self) -> &T {
        &self.table
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    /// Every record with one of the given statuses, in status order.
    ///
    /// A non-empty result replaces the cache.
    pub fn run_status_query<S: AsRef<str>>(&mut self, statuses: &[S]) -> Result<Vec<Record>> {
        let records = self.fetch_statuses(statuses)?;
        if !records.is_empty() {
            self.cache.set(ResultSet::Flat(records.clone()));
        }
        Ok(records)
    }

    /// Like [`TransactionRepo::run_status_query`], grouped by status label.
    ///
    /// Every requested status gets a group, empty or not.
    pub fn run_grouped_status_query<S: AsRef<str>>(&mut self, statuses: &[S]) -> Result<ResultSet> {
        let statuses = Status::parse_all(statuses)?;
        let mut groups: IndexMap<String, Vec<Record>> = IndexMap::new();
        for status in statuses {
            let records = self.fetch_statuses(&[status.as_str()])?;
            groups
                .entry(status.as_str().to_string())
                .or_default()
                .extend(records);
        }

        let results = ResultSet::ByStatus(groups);
        if !results.is_empty() {
            self.cache.set(results.clone());
        }
        Ok(results)
    }

    /// A lazy stream over the given statuses, filtered by the table.
    ///
    /// Statuses and filter text are checked up front; nothing is fetched until the stream is
    /// pulled. With a non-empty filter, each page that produced records is followed by a
    /// [`Yielded::PageBoundary`].
    pub fn run_filtered_status_query<S: AsRef<str>>(
        &self,
        statuses: &[S],
        filter_text: &str,
    ) -> Result<StatusQueryStream<'_, T>> {
        let statuses = Status::parse_all(statuses)?;
        let filter = compile_server_predicate(filter_text)?;
        Ok(StatusQueryStream::new(
            &self.table,
            self.config.status_index.as_str(),
            statuses,
            filter,
            self.config.filtered_page_size,
        ))
    }

    pub fn set_cache(&mut self, results: impl Into<ResultSet>) {
        self.cache.set(results.into());
    }

    pub fn get_cache(&self) -> &ResultSet {
        self.cache.get()
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    /// Filters the cached results. See [`crate::cache`] for the accepted forms.
    pub fn filter_cache(&self, filter: impl Into<CacheFilter>) -> Result<Vec<Record>> {
        self.cache.filter(&filter.into())
    }

    /// Records whose primary key equals `id`.
    pub fn run_id_query(&self, id: &str) -> Result<Vec<Record>> {
        let request = QueryRequest::new(
            None,
            KeyCondition::eq(self.config.id_attribute.as_str(), WireValue::string(id.trim())),
        );
        collect_records(PagedQuery::new(&self.table, request))
    }

    /// Records that came from the given transaction file.
    pub fn run_filename_query(&self, filename: &str) -> Result<Vec<Record>> {
        let index = self.config.filename_index.as_str();
        let request = QueryRequest::new(
            Some(index.to_string()),
            KeyCondition::eq(index, WireValue::string(filename.trim())),
        );
        collect_records(PagedQuery::new(&self.table, request))
    }

    /// Replaces the cache with a snapshot file. Defaults to the configured results path.
    pub fn load_snapshot(&mut self, path: Option<&Path>) -> Result<&ResultSet> {
        let path = self.snapshot_path(path);
        let results = snapshot::load(&path)?;
        self.cache.set(results);
        Ok(self.cache.get())
    }

    /// Writes the cache to a snapshot file and returns where it went.
    pub fn save_snapshot(&self, path: Option<&Path>) -> Result<PathBuf> {
        let path = self.snapshot_path(path);
        snapshot::save(self.cache.get(), &path)?;
        Ok(path)
    }

    fn snapshot_path(&self, path: Option<&Path>) -> PathBuf {
        path.map(Path::to_path_buf)
            .unwrap_or_else(|| self.config.results_path.clone())
    }

    fn fetch_statuses<S: AsRef<str>>(&self, statuses: &[S]) -> Result<Vec<Record>> {
        let statuses = Status::parse_all(statuses)?;
        let stream = StatusQueryStream::new(
            &self.table,
            self.config.status_index.as_str(),
            statuses,
            None,
            self.config.filtered_page_size,
        );
        collect_records(stream)
    }
}

fn collect_records(stream: impl Iterator<Item = Result<Yielded>>) -> Result<Vec<Record>> {
    let mut records = Vec::new();
    for yielded in stream {
        if let Some(record) = yielded?.into_record() {
            records.push(record);
        }
    }
    Ok(records)
}
