use std::path::PathBuf;
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A fault raised by the remote table while serving a page.
///
/// Transports wrap whatever their client library reports (auth, network, throttling)
/// into this type. The core passes it through untouched.
#[derive(Error, Debug)]
#[error("{message}")]
pub struct TransportError {
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Cannot parse filter clause '{clause}': {reason}")]
    Parse { clause: String, reason: String },

    #[error("Invalid status: {0}")]
    InvalidStatus(String),

    #[error("There are no cached results to filter")]
    EmptyCache,

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Invalid filter argument: expected a filter string or an attribute mapping, got {0}")]
    InvalidFilterArgument(String),

    #[error("Attribute '{attribute}' holds a non-integer number: {value}")]
    MalformedNumber { attribute: String, value: String },

    #[error("Failed to load results from {}: {source}", path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: BoxError,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),
}

impl QueryError {
    pub(crate) fn parse(clause: impl Into<String>, reason: impl Into<String>) -> Self {
        QueryError::Parse {
            clause: clause.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, QueryError>;
