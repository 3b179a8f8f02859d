//! Document store abstraction and its Firestore implementation.

pub mod client;
pub mod codec;
pub mod payload;
/// Streaming helpers for Firestore list pagination.
pub mod scroller;
pub mod types;

use crate::query::Record;
use async_trait::async_trait;
use serde_json::Value;

pub use client::FirestoreStore;
pub use payload::{email_document_id, prepare_record};
pub use types::StoreError;

/// Operations the request layer needs from a document database.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch every document in `collection`.
    async fn list(&self, collection: &str) -> Result<Vec<Record>, StoreError>;

    /// Fetch one document, `None` when it does not exist.
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Record>, StoreError>;

    /// Fetch documents whose `field` equals `value`.
    async fn find_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Record>, StoreError>;

    /// Insert `record`, assigning `id` (random when `None`) and `created_at`.
    ///
    /// Fails with [`StoreError::AlreadyExists`] when the id is taken.
    async fn create(
        &self,
        collection: &str,
        id: Option<String>,
        record: Record,
    ) -> Result<Record, StoreError>;

    /// Remove a document; deleting a missing document succeeds.
    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError>;

    /// Atomically append `values` to the list stored at `field`, skipping values already present.
    async fn append_to_list(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        values: Vec<Value>,
    ) -> Result<(), StoreError>;
}
