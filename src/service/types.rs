//! Error taxonomy and input types for request-level operations.

use crate::identity::IdentityError;
use crate::query::{QueryError, Record};
use crate::storage::StorageError;
use crate::store::StoreError;
use thiserror::Error;

/// Errors surfaced to the HTTP layer; each variant maps to exactly one status code there.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Missing or malformed request fields, bad pagination parameters.
    #[error("{0}")]
    InvalidArgument(String),
    /// Missing, invalid, or expired identity token or credentials.
    #[error("{0}")]
    Unauthenticated(String),
    /// Referenced record or collection does not exist.
    #[error("{0}")]
    NotFound(String),
    /// A unique field value is already taken.
    #[error("{0}")]
    Conflict(String),
    /// Object storage rejected or failed an upload.
    #[error("Upload failed: {0}")]
    UploadFailed(String),
    /// The document store or identity provider failed.
    #[error("Upstream service failed: {0}")]
    Upstream(String),
}

impl From<QueryError> for ServiceError {
    fn from(error: QueryError) -> Self {
        match error {
            QueryError::InvalidArgument(message) => Self::InvalidArgument(message),
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound(what) => Self::NotFound(format!("Record not found: {what}")),
            StoreError::AlreadyExists(what) => Self::Conflict(format!("Record already exists: {what}")),
            other => Self::Upstream(other.to_string()),
        }
    }
}

impl From<IdentityError> for ServiceError {
    fn from(error: IdentityError) -> Self {
        match error {
            IdentityError::InvalidToken | IdentityError::InvalidCredentials => {
                Self::Unauthenticated(error.to_string())
            }
            IdentityError::EmailExists => Self::Conflict(error.to_string()),
            IdentityError::Rejected(code) => Self::InvalidArgument(format!("Rejected: {code}")),
            other => Self::Upstream(other.to_string()),
        }
    }
}

impl From<StorageError> for ServiceError {
    fn from(error: StorageError) -> Self {
        Self::UploadFailed(error.to_string())
    }
}

/// File part received from a client, not yet uploaded.
#[derive(Debug, Clone, Default)]
pub struct FileUpload {
    /// Form field name the file arrived under.
    pub field: String,
    /// Client-side file name, if supplied.
    pub file_name: Option<String>,
    /// Declared MIME type, if supplied.
    pub content_type: Option<String>,
    /// File contents.
    pub bytes: Vec<u8>,
}

/// Payload of a create request: plain fields plus any files to store first.
#[derive(Debug, Clone, Default)]
pub struct NewRecord {
    /// Field values supplied by the client.
    pub fields: Record,
    /// Files whose public URLs are stored under their form field names.
    pub files: Vec<FileUpload>,
}

/// Input for account registration.
#[derive(Debug, Clone, Default)]
pub struct Registration {
    /// Account email; normalized to lower case.
    pub email: String,
    /// Plain-text password forwarded to the identity provider.
    pub password: String,
    /// Optional display name stored on the user record.
    pub name: Option<String>,
}

/// Tunables for the request layer.
#[derive(Debug, Clone, Copy)]
pub struct ServiceSettings {
    /// Page size applied when a listing omits `page_size`.
    pub default_page_size: usize,
    /// Upper bound accepted for `page_size`.
    pub max_page_size: usize,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            default_page_size: 10,
            max_page_size: 100,
        }
    }
}

impl From<&crate::config::Config> for ServiceSettings {
    fn from(config: &crate::config::Config) -> Self {
        Self {
            default_page_size: config.default_page_size,
            max_page_size: config.max_page_size,
        }
    }
}
