//! Error types for the application.

use thiserror::Error;

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {message}")]
    IoError { path: String, message: String },

    #[error("Failed to parse config: {message}")]
    ParseError { message: String },

    #[error("Config validation failed: {message}")]
    ValidationError { message: String },
}

/// Errors from the external availability API.
///
/// Every variant is recoverable: the affected fetch or probe is skipped
/// and retried on the next natural cycle.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Unexpected HTTP status {status}")]
    Status { status: u16 },

    #[error("Malformed response: {message}")]
    MalformedResponse { message: String },
}

impl FetchError {
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedResponse {
            message: message.into(),
        }
    }
}

/// Errors from permit registry operations.
///
/// The display strings are sent back to the issuing chat verbatim.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Permit {permit_id} is already being monitored")]
    AlreadyMonitored { permit_id: String },

    #[error("Division {division_id} of permit {permit_id} is already being monitored")]
    DivisionAlreadyMonitored {
        permit_id: String,
        division_id: String,
    },

    #[error("Permit {permit_id} is not being monitored")]
    NotMonitored { permit_id: String },

    #[error("Permit {permit_id} is not registered")]
    UnknownPermit { permit_id: String },

    #[error("Division {division_id} is not monitored for permit {permit_id}")]
    UnknownDivision {
        permit_id: String,
        division_id: String,
    },

    #[error("Failed to save permit registry: {0}")]
    Persistence(#[from] PersistError),

    /// Clearing the availability records of a permit or division failed;
    /// the registry was left unchanged.
    #[error(transparent)]
    State(#[from] StoreError),
}

/// Errors from the availability store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to save availability state: {0}")]
    Persistence(#[from] PersistError),
}

/// Failure writing a JSON document to disk.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("IO error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Messaging channel errors.
#[derive(Debug, Error)]
pub enum MessagingError {
    #[error("Telegram request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Telegram API error: {description}")]
    Api { description: String },
}

/// Result type alias for availability API operations.
pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// Result type alias for registry operations.
pub type RegistryResult<T> = std::result::Result<T, RegistryError>;
