//! Error types for calbridge.

use std::path::PathBuf;

use thiserror::Error;

use crate::credential::Backing;

/// A tool call that was rejected before any credential or backend access.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },
}

/// Failures while producing a usable access token.
#[derive(Error, Debug)]
pub enum CredentialError {
    /// The token is expired and there is nothing to refresh it with.
    /// An operator has to supply a fresh consent grant.
    #[error("Credential cannot be refreshed: {0}")]
    Unrecoverable(String),

    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    #[error("Failed to persist refreshed credential: {0}")]
    Persist(#[from] StoreError),
}

/// Failures reading or writing a credential backing.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse credential from {backing}: {source}")]
    Parse {
        backing: Backing,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize credential: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("Credential from {backing} is missing required scope {required}")]
    MissingScope {
        backing: Backing,
        required: &'static str,
    },

    #[error("Credential save did not complete: {0}")]
    Interrupted(String),

    #[error("Credential origin {record} does not match store backing {store}")]
    WrongBacking { record: Backing, store: Backing },
}

/// The calendar backend rejected an operation, or could not be reached.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Event not found: {0}")]
    NotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Calendar API returned {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("Calendar API request failed: {0}")]
    Transport(String),
}

/// Startup configuration problems. These stop the process before it serves.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(
        "No credential source found. Set GOOGLE_TOKEN_JSON, provide a token file \
         (GOOGLE_TOKEN_PATH, default token.json), or configure a service-account key \
         via GOOGLE_CREDS_JSON / GOOGLE_CLIENT_SECRETS"
    )]
    NoCredentialSource,

    #[error("Credential is a service-account grant but no service-account key is configured")]
    MissingServiceAccountKey,

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },

    #[error("Invalid key material in {source_name}: {reason}")]
    InvalidKeyMaterial { source_name: String, reason: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Everything a tool call can fail with.
#[derive(Error, Debug)]
pub enum CalBridgeError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Result type alias for calbridge operations.
pub type CalBridgeResult<T> = Result<T, CalBridgeError>;
