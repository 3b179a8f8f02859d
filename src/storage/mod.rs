//! Object storage abstraction and the Firebase Storage upload client.

use crate::config::Config;
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

/// Errors raised while uploading objects.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Base URL or bucket could not be turned into a valid endpoint.
    #[error("Invalid storage URL: {0}")]
    InvalidUrl(String),
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Storage responded with an unexpected status code.
    #[error("Unexpected storage response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned by the storage service.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
}

/// Interface implemented by object storage backends.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store `bytes` under `object_name` and return a publicly resolvable URL.
    async fn upload(
        &self,
        object_name: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<String, StorageError>;
}

/// [`ObjectStorage`] backed by the Firebase Storage REST API.
pub struct FirebaseStorageClient {
    client: Client,
    base_url: Url,
    bucket: String,
    access_token: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadResponse {
    name: String,
    #[serde(default)]
    download_tokens: Option<String>,
}

impl FirebaseStorageClient {
    /// Construct a client for the bucket named in `config`.
    pub fn new(config: &Config) -> Result<Self, StorageError> {
        let client = Client::builder().user_agent("firegate/0.1").build()?;
        let base_url = Url::parse(config.storage_url.trim_end_matches('/'))
            .map_err(|err| StorageError::InvalidUrl(err.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(StorageError::InvalidUrl(config.storage_url.clone()));
        }
        tracing::debug!(url = %base_url, bucket = %config.storage_bucket, "Initialized storage client");
        Ok(Self {
            client,
            base_url,
            bucket: config.storage_bucket.clone(),
            access_token: config.access_token.clone(),
        })
    }

    /// `<base>/b/<bucket>/o[/<object>]`, with the object name encoded as one path segment.
    fn object_url(&self, object_name: Option<&str>) -> Result<Url, StorageError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|()| StorageError::InvalidUrl(self.base_url.to_string()))?;
            segments.pop_if_empty().extend(["b", self.bucket.as_str(), "o"]);
            if let Some(name) = object_name {
                segments.push(name);
            }
        }
        Ok(url)
    }
}

#[async_trait]
impl ObjectStorage for FirebaseStorageClient {
    async fn upload(
        &self,
        object_name: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<String, StorageError> {
        let size = bytes.len();
        let mut request = self
            .client
            .post(self.object_url(None)?)
            .query(&[("uploadType", "media"), ("name", object_name)])
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes);
        if let Some(token) = self.access_token.as_deref().filter(|t| !t.is_empty()) {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let error = StorageError::UnexpectedStatus { status, body };
            tracing::error!(object = object_name, error = %error, "Upload failed");
            return Err(error);
        }

        let uploaded: UploadResponse = response.json().await?;
        let mut url = self.object_url(Some(&uploaded.name))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("alt", "media");
            if let Some(token) = uploaded
                .download_tokens
                .as_deref()
                .and_then(|tokens| tokens.split(',').next())
                .filter(|token| !token.is_empty())
            {
                query.append_pair("token", token);
            }
        }
        tracing::info!(object = %uploaded.name, size, "Object uploaded");
        Ok(url.to_string())
    }
}

/// Build a collision-free object name that keeps a readable suffix of the client file name.
pub fn object_name_for(file_name: Option<&str>) -> String {
    let sanitized: String = file_name
        .and_then(|name| name.rsplit(['/', '\\']).next())
        .unwrap_or_default()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let sanitized = sanitized.trim_matches('.');
    if sanitized.is_empty() {
        format!("uploads/{}", Uuid::new_v4())
    } else {
        format!("uploads/{}-{sanitized}", Uuid::new_v4())
    }
}
