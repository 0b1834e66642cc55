//! # Filter Expressions
//!
//! Filters are written as short clauses, one or more per filter string:
//!
//! | Clause | Meaning |
//! |--------|---------|
//! | `<attr> is <value>` | attribute equals value (`timestamp`, `version`, `created_at` compare as integers) |
//! | `<attr> contains <text>` | attribute contains text, case-sensitive |
//! | `between <start> and <end>` | `timestamp` within `[start, end]`; dates as `YYYY-MM-DD HH:MM:SS` (UTC) or `now` |
//!
//! Clauses are joined with `;` and all of them must hold. The server syntax also accepts
//! `<attr> = <value>` and `,` between clauses.
//!
//! ## One Parser, Two Targets
//!
//! [`parse`] turns text into a list of [`FilterDescriptor`]s. That list is then rendered
//! one of two ways:
//!
//! - [`condition`]: a [`Condition`] pushed to the table with a paginated query. It only sees
//!   top-level attributes, as the table stores them.
//! - [`matcher`]: an in-process check against cached [`crate::model::Record`]s. It also looks
//!   inside the `st_request` sub-document, so `sitereference contains siteA` works on records
//!   whose `st_request` has not been unpacked.
//!
//! ```ignore
//! let descriptors = filter::compile("errormessage contains Invalid; between 2021-10-10 00:00:00 and now")?;
//! let hits: Vec<_> = records.iter().filter(|r| filter::matches_all(&descriptors, r)).collect();
//!
//! let predicate = filter::compile_server_predicate("name = Failed Item, version is 2")?;
//! ```

pub mod condition;
pub mod matcher;
pub mod parse;

pub use condition::{Condition, FilterExpression};
pub use matcher::matches_all;
pub use parse::{compile, compile_at, compile_server_predicate, compile_server_predicate_at};

/// The comparison value of an equality clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterValue {
    Int(i64),
    Text(String),
}

/// A compiled filter clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterDescriptor {
    /// Attribute equals the value.
    Equals { attribute: String, value: FilterValue },
    /// Attribute, as text, contains the substring.
    Contains { attribute: String, substring: String },
    /// Attribute is an integer within `[start, end]`.
    Between {
        attribute: String,
        start: i64,
        end: i64,
    },
}

impl FilterDescriptor {
    pub fn equals(attribute: impl Into<String>, value: FilterValue) -> Self {
        FilterDescriptor::Equals {
            attribute: attribute.into(),
            value,
        }
    }

    pub fn contains(attribute: impl Into<String>, substring: impl Into<String>) -> Self {
        FilterDescriptor::Contains {
            attribute: attribute.into(),
            substring: substring.into(),
        }
    }

    pub fn between(attribute: impl Into<String>, start: i64, end: i64) -> Self {
        FilterDescriptor::Between {
            attribute: attribute.into(),
            start,
            end,
        }
    }

    pub fn attribute(&self) -> &str {
        match self {
            FilterDescriptor::Equals { attribute, .. }
            | FilterDescriptor::Contains { attribute, .. }
            | FilterDescriptor::Between { attribute, .. } => attribute,
        }
    }
}
