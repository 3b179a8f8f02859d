//! HTTP client wrapper for the Firestore REST API.

use crate::config::Config;
use crate::query::Record;
use crate::store::{
    DocumentStore,
    codec::{decode_document, encode_fields, encode_timestamp, encode_value, field_path},
    payload::{CREATED_AT_FIELD, ID_FIELD, prepare_record},
    scroller::stream_documents,
    types::{Document, RunQueryEntry, StoreError, error_status},
};
use async_trait::async_trait;
use futures_util::TryStreamExt;
use reqwest::{Client, Method, StatusCode, Url};
use serde_json::{Value, json};

/// Firestore-backed [`DocumentStore`].
pub struct FirestoreStore {
    client: Client,
    documents_url: Url,
    database_path: String,
    access_token: Option<String>,
}

impl FirestoreStore {
    /// Construct a client for the project and database named in `config`.
    pub fn new(config: &Config) -> Result<Self, StoreError> {
        let client = Client::builder().user_agent("firegate/0.1").build()?;
        let base_url = normalize_base_url(&config.firestore_url).map_err(StoreError::InvalidUrl)?;
        let database_path = format!(
            "projects/{}/databases/{}/documents",
            config.project_id, config.firestore_database
        );
        let documents_url = Url::parse(&format_endpoint(&base_url, &database_path))
            .map_err(|err| StoreError::InvalidUrl(err.to_string()))?;
        if documents_url.cannot_be_a_base() {
            return Err(StoreError::InvalidUrl(documents_url.to_string()));
        }
        tracing::debug!(
            url = %documents_url,
            has_access_token = config.access_token.is_some(),
            "Initialized Firestore HTTP client"
        );

        Ok(Self {
            client,
            documents_url,
            database_path,
            access_token: config.access_token.clone(),
        })
    }

    /// Start a request below the database's `documents` root.
    ///
    /// Each segment is percent-encoded on its own, so ids containing `?`, `#`, or `%` stay
    /// inside the path.
    pub(crate) fn request(
        &self,
        method: Method,
        segments: &[&str],
    ) -> Result<reqwest::RequestBuilder, StoreError> {
        let mut url = self.documents_url.clone();
        url.path_segments_mut()
            .map_err(|()| StoreError::InvalidUrl(self.documents_url.to_string()))?
            .extend(segments);
        Ok(self.authorize(self.client.request(method, url)))
    }

    /// Start a request against a `documents:<verb>` RPC endpoint.
    fn rpc(&self, verb: &str) -> reqwest::RequestBuilder {
        self.authorize(
            self.client
                .request(Method::POST, format!("{}:{verb}", self.documents_url)),
        )
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.access_token {
            Some(token) if !token.is_empty() => request.bearer_auth(token),
            _ => request,
        }
    }

    fn document_name(&self, collection: &str, id: &str) -> String {
        format!("{}/{collection}/{id}", self.database_path)
    }

    async fn unexpected(response: reqwest::Response, operation: &str) -> StoreError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let error = StoreError::UnexpectedStatus { status, body };
        tracing::error!(operation, error = %error, "Firestore request failed");
        error
    }
}

#[async_trait]
impl DocumentStore for FirestoreStore {
    async fn list(&self, collection: &str) -> Result<Vec<Record>, StoreError> {
        let records: Vec<Record> = stream_documents(self, collection).try_collect().await?;
        tracing::debug!(collection, count = records.len(), "Listed documents");
        Ok(records)
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Record>, StoreError> {
        let response = self
            .request(Method::GET, &[collection, id])?
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let document: Document = response.json().await?;
                Ok(Some(decode_document(&document)))
            }
            _ => Err(Self::unexpected(response, "get").await),
        }
    }

    async fn find_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Record>, StoreError> {
        let body = json!({
            "structuredQuery": {
                "from": [{ "collectionId": collection }],
                "where": {
                    "fieldFilter": {
                        "field": { "fieldPath": field_path(field) },
                        "op": "EQUAL",
                        "value": encode_value(value),
                    }
                }
            }
        });

        let response = self.rpc("runQuery").json(&body).send().await?;
        if !response.status().is_success() {
            return Err(Self::unexpected(response, "runQuery").await);
        }

        let entries: Vec<RunQueryEntry> = response.json().await?;
        Ok(entries
            .iter()
            .filter_map(|entry| entry.document.as_ref())
            .map(decode_document)
            .collect())
    }

    async fn create(
        &self,
        collection: &str,
        id: Option<String>,
        record: Record,
    ) -> Result<Record, StoreError> {
        let record = prepare_record(record, id);
        let id = record
            .get(ID_FIELD)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let mut fields = encode_fields(&record);
        if let Some(Value::String(created_at)) = record.get(CREATED_AT_FIELD) {
            fields.insert(CREATED_AT_FIELD.into(), encode_timestamp(created_at));
        }

        let response = self
            .request(Method::POST, &[collection])?
            .query(&[("documentId", id.as_str())])
            .json(&json!({ "fields": fields }))
            .send()
            .await?;

        match response.status() {
            StatusCode::CONFLICT => Err(StoreError::AlreadyExists(format!("{collection}/{id}"))),
            status if status.is_success() => {
                tracing::debug!(collection, id = %id, "Document created");
                Ok(record)
            }
            _ => Err(Self::unexpected(response, "create").await),
        }
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        let response = self
            .request(Method::DELETE, &[collection, id])?
            .send()
            .await?;

        if response.status().is_success() || response.status() == StatusCode::NOT_FOUND {
            tracing::debug!(collection, id, "Document deleted");
            Ok(())
        } else {
            Err(Self::unexpected(response, "delete").await)
        }
    }

    async fn append_to_list(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        values: Vec<Value>,
    ) -> Result<(), StoreError> {
        let body = json!({
            "writes": [{
                "transform": {
                    "document": self.document_name(collection, id),
                    "fieldTransforms": [{
                        "fieldPath": field_path(field),
                        "appendMissingElements": {
                            "values": values.iter().map(encode_value).collect::<Vec<_>>()
                        }
                    }]
                },
                "currentDocument": { "exists": true }
            }]
        });

        let response = self.rpc("commit").json(&body).send().await?;
        let status = response.status();
        if status.is_success() {
            tracing::debug!(collection, id, field, "Appended list values");
            return Ok(());
        }

        let text = response.text().await.unwrap_or_default();
        let missing = status == StatusCode::NOT_FOUND
            || matches!(
                error_status(&text).as_deref(),
                Some("NOT_FOUND" | "FAILED_PRECONDITION")
            );
        if missing {
            return Err(StoreError::NotFound(format!("{collection}/{id}")));
        }

        let error = StoreError::UnexpectedStatus { status, body: text };
        tracing::error!(operation = "commit", error = %error, "Firestore request failed");
        Err(error)
    }
}

fn normalize_base_url(url: &str) -> Result<String, String> {
    let mut parsed = Url::parse(url).map_err(|err| err.to_string())?;
    let path = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(&path);
    Ok(parsed.to_string())
}

pub(crate) fn format_endpoint(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}
