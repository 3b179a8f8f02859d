//! Streaming helper for walking Firestore's paged `documents.list` endpoint.

use async_stream::try_stream;
use futures_core::Stream;
use reqwest::Method;

use super::client::FirestoreStore;
use super::codec::decode_document;
use super::types::{ListDocumentsResponse, StoreError};
use crate::query::Record;

const DEFAULT_PAGE_SIZE: usize = 300;

/// Stream every document of `collection`, following `nextPageToken` until exhausted.
pub fn stream_documents<'a>(
    store: &'a FirestoreStore,
    collection: &'a str,
) -> impl Stream<Item = Result<Record, StoreError>> + 'a {
    try_stream! {
        let mut page_token: Option<String> = None;

        loop {
            let mut request = store
                .request(Method::GET, &[collection])?
                .query(&[("pageSize", DEFAULT_PAGE_SIZE)]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token)]);
            }

            let response = request.send().await?;
            let status = response.status();
            if status.is_success() {
                let ListDocumentsResponse { documents, next_page_token } = response.json().await?;
                for document in &documents {
                    yield decode_document(document);
                }

                match next_page_token.filter(|token| !token.is_empty()) {
                    Some(next) => page_token = Some(next),
                    None => break,
                }
            } else {
                let body = response.text().await.unwrap_or_default();
                tracing::error!(collection = collection, status = %status, "Failed to list documents");
                Err(StoreError::UnexpectedStatus { status, body })?;
            }
        }
    }
}
