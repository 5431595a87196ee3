//! Shared error types for the services crate.

use thiserror::Error;

use fitrack_core::ingest::IngestError;
use fitrack_core::model::ProgramId;
use fitrack_core::tracker::SelectionError;
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by the tracker workflow.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TrackerError {
    #[error("program {0} not found")]
    ProgramNotFound(ProgramId),
    #[error(transparent)]
    Selection(#[from] SelectionError),
    /// The backend rejected a write; local state was rolled back.
    #[error("could not sync {operation}: {source}")]
    Sync {
        operation: &'static str,
        #[source]
        source: StorageError,
    },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl TrackerError {
    pub(crate) fn sync(operation: &'static str, source: StorageError) -> Self {
        Self::Sync { operation, source }
    }
}

/// Errors emitted by `CatalogService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CatalogError {
    #[error(transparent)]
    Ingest(#[from] IngestError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by the REST backend.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RestError {
    #[error("FITRACK_API_BASE_URL is not set")]
    MissingBaseUrl,
    #[error("invalid FITRACK_API_RETRIES value: {0}")]
    InvalidRetries(String),
    #[error("request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Ingest(#[from] IngestError),
}

impl RestError {
    /// Whether a write may be attempted again.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::HttpStatus(status) => {
                status.is_server_error() || *status == reqwest::StatusCode::TOO_MANY_REQUESTS
            }
            Self::Http(err) => err.is_timeout() || err.is_connect() || err.is_request(),
            _ => false,
        }
    }
}

impl From<RestError> for StorageError {
    fn from(err: RestError) -> Self {
        match err {
            RestError::HttpStatus(reqwest::StatusCode::NOT_FOUND) => Self::NotFound,
            RestError::HttpStatus(reqwest::StatusCode::CONFLICT) => Self::Conflict,
            RestError::Ingest(e) => Self::Serialization(e.to_string()),
            RestError::Http(e) if e.is_decode() => Self::Serialization(e.to_string()),
            other => Self::Connection(other.to_string()),
        }
    }
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Rest(#[from] RestError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
