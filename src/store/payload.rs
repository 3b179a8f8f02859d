//! Helpers for stamping records before they are written.

use crate::query::Record;
use serde_json::Value;
use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use uuid::Uuid;

/// Field carrying the document identifier inside every stored record.
pub const ID_FIELD: &str = "id";
/// Field carrying the server-side creation time inside every stored record.
pub const CREATED_AT_FIELD: &str = "created_at";

/// Assign `id` and `created_at`, overwriting whatever the caller supplied.
pub fn prepare_record(mut record: Record, id: Option<String>) -> Record {
    let id = id.unwrap_or_else(generate_document_id);
    record.insert(ID_FIELD.into(), Value::String(id));
    record.insert(
        CREATED_AT_FIELD.into(),
        Value::String(current_timestamp_rfc3339()),
    );
    record
}

/// Current timestamp formatted for storage.
pub fn current_timestamp_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

/// Random identifier for new documents.
pub fn generate_document_id() -> String {
    Uuid::new_v4().to_string()
}

/// Deterministic identifier derived from a normalized email address.
pub fn email_document_id(email: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(email.trim().to_lowercase().as_bytes());
    hex::encode(hasher.finalize())
}
