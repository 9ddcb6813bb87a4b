//! Error taxonomy for a reconciliation run.
//!
//! Only [`Error::Config`] aborts a run. Everything else is isolated to the
//! source, candidate or query it happened in and recorded in the run report.

use thiserror::Error;

use crate::ical::ParseError;

#[derive(Debug, Error)]
pub enum Error {
    /// Required configuration is missing or malformed
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A feed could not be retrieved
    #[error("Failed to fetch feed for {source_name}: {message}")]
    Fetch {
        source_name: String,
        status: Option<u16>,
        message: String,
    },

    /// A feed payload was not valid iCalendar
    #[error("Failed to parse feed for {source_name}: {error}")]
    Parse {
        source_name: String,
        #[source]
        error: ParseError,
    },

    /// The task store rejected a task creation
    #[error("Failed to create task {key}: {message}")]
    Create { key: String, message: String },

    /// Listing existing tasks failed
    #[error("Failed to query task store: {0}")]
    StoreQuery(String),

    /// Deleting a task failed
    #[error("Failed to delete task {id}: {message}")]
    Delete { id: String, message: String },
}

impl Error {
    /// Short machine-readable name, used in API payloads
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Config(_) => "config",
            Error::Fetch { .. } => "fetch",
            Error::Parse { .. } => "parse",
            Error::Create { .. } => "create",
            Error::StoreQuery(_) => "store_query",
            Error::Delete { .. } => "delete",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variables: {}", .0.join(", "))]
    Missing(Vec<String>),

    #[error("{name} is invalid: {message}")]
    Invalid { name: String, message: String },
}

pub type Result<T> = std::result::Result<T, Error>;
