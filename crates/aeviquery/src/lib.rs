//! # Aeviquery Architecture
//!
//! Aeviquery is a **query library for the payment transaction table**. It fetches transactions
//! by status, id or file, normalizes them into plain records, keeps the last result set in a
//! cache, and filters that cache with a small clause language. It never prints anything;
//! front ends (a REPL, a batch script) sit on top of [`api::TransactionRepo`].
//!
//! ## Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  API Layer (api.rs)                                         │
//! │  - Thin facade: validates, dispatches, owns the cache       │
//! │  - Returns structured Result types                          │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Query Layer (query.rs, filter/, normalize.rs, cache.rs)    │
//! │  - Lazy pagination with page markers                        │
//! │  - One filter language, two targets (table and cache)       │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Storage Layer (store/)                                     │
//! │  - Abstract TableClient trait                               │
//! │  - MemTable (testing), snapshot files                       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Data Flow
//!
//! ```text
//! TableClient ──WireItem──▶ normalize ──Record──▶ caller
//!                                          └────▶ ResultCache ──filter──▶ Vec<Record>
//! ```
//!
//! Numbers arrive from the table as decimal text and leave as `i64`. The `st_request` attribute
//! holds a JSON sub-document; cache filters look inside it, and
//! [`normalize::unpack_sub_request`] flattens it into `st_<key>` attributes.
//!
//! ## Key Principle: No I/O Assumptions in Core
//!
//! - Takes regular Rust arguments, returns `Result<T, QueryError>`
//! - **Never** writes to stdout/stderr; diagnostics go through `tracing`
//! - Cancellation of a filtered query is dropping its iterator
//!
//! ## Module Overview
//!
//! - [`api`]: `TransactionRepo`, the entry point
//! - [`filter`]: clause parsing, server conditions, cache matching
//! - [`query`]: paginated status, id and filename queries
//! - [`normalize`]: wire items to records
//! - [`cache`]: the in-memory result cache
//! - [`store`]: the table interface, the in-memory table, snapshot files
//! - [`model`]: records, values, statuses, result sets
//! - [`config`]: settings loaded from `aeviquery.toml`
//! - [`error`]: error types

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod filter;
pub mod model;
pub mod normalize;
pub mod query;
pub mod store;

pub use api::TransactionRepo;
pub use cache::{CacheFilter, ResultCache};
pub use config::QueryConfig;
pub use error::{QueryError, Result, TransportError};
pub use model::{Record, ResultSet, Status, Value, WireItem, WireValue, Yielded};
pub use store::{QueryPage, QueryRequest, TableClient};
