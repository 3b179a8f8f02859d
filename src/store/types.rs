//! Shared types used by the Firestore client and helpers.

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors returned while interacting with the document store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Base URL failed to parse or normalize.
    #[error("Invalid Firestore URL: {0}")]
    InvalidUrl(String),
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Document id is already taken in the target collection.
    #[error("Document already exists: {0}")]
    AlreadyExists(String),
    /// Referenced document does not exist.
    #[error("Document not found: {0}")]
    NotFound(String),
    /// Firestore responded with an unexpected status code.
    #[error("Unexpected Firestore response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned from Firestore.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
}

#[derive(Debug, Deserialize)]
pub(crate) struct Document {
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) fields: Map<String, Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ListDocumentsResponse {
    #[serde(default)]
    pub(crate) documents: Vec<Document>,
    #[serde(default)]
    pub(crate) next_page_token: Option<String>,
}

#[derive(Deserialize)]
pub(crate) struct RunQueryEntry {
    #[serde(default)]
    pub(crate) document: Option<Document>,
}

#[derive(Deserialize)]
pub(crate) struct ErrorEnvelope {
    pub(crate) error: ErrorBody,
}

#[derive(Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub(crate) status: String,
}

/// Extract the gRPC-style status (`ALREADY_EXISTS`, `NOT_FOUND`, ...) from an error body.
pub(crate) fn error_status(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .map(|envelope| envelope.error.status)
        .filter(|status| !status.is_empty())
}
