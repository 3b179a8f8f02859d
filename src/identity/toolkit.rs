use super::{Identity, IdentityError, IdentityProvider, Session};
use crate::config::Config;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;

/// [`IdentityProvider`] backed by the Identity Toolkit REST API.
pub struct IdentityToolkitClient {
    client: Client,
    base_url: String,
    api_key: String,
}

#[derive(Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<LookupUser>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupUser {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    disabled: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
    id_token: String,
    #[serde(default)]
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

impl IdentityToolkitClient {
    /// Construct a client using the API key and endpoint from `config`.
    pub fn new(config: &Config) -> Result<Self, IdentityError> {
        let client = Client::builder().user_agent("firegate/0.1").build()?;
        tracing::debug!(url = %config.identity_toolkit_url, "Initialized Identity Toolkit client");
        Ok(Self {
            client,
            base_url: config.identity_toolkit_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: serde_json::Value,
    ) -> Result<T, IdentityError> {
        let response = self
            .client
            .post(format!("{}/accounts:{method}", self.base_url))
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        let body = response.text().await.unwrap_or_default();
        let code = error_code(&body);
        match classify(status, code.as_deref()) {
            Some(error) => {
                tracing::debug!(method, code = ?code, "Identity provider rejected request");
                Err(error)
            }
            None => {
                let error = IdentityError::UnexpectedStatus { status, body };
                tracing::error!(method, error = %error, "Identity provider request failed");
                Err(error)
            }
        }
    }
}

#[async_trait]
impl IdentityProvider for IdentityToolkitClient {
    async fn verify_token(&self, token: &str) -> Result<Identity, IdentityError> {
        let response: LookupResponse = self.call("lookup", json!({ "idToken": token })).await?;
        let user = response
            .users
            .into_iter()
            .next()
            .filter(|user| !user.disabled)
            .ok_or(IdentityError::InvalidToken)?;
        Ok(Identity {
            uid: user.local_id,
            email: user.email,
        })
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<Session, IdentityError> {
        let response: TokenResponse = self
            .call(
                "signUp",
                json!({ "email": email, "password": password, "returnSecureToken": true }),
            )
            .await?;
        Ok(into_session(response, email))
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, IdentityError> {
        let response: TokenResponse = self
            .call(
                "signInWithPassword",
                json!({ "email": email, "password": password, "returnSecureToken": true }),
            )
            .await?;
        Ok(into_session(response, email))
    }
}

fn into_session(response: TokenResponse, email: &str) -> Session {
    Session {
        uid: response.local_id,
        email: response.email.unwrap_or_else(|| email.to_string()),
        id_token: response.id_token,
        refresh_token: response.refresh_token,
        expires_in: response
            .expires_in
            .and_then(|value| value.parse().ok())
            .unwrap_or(3600),
    }
}

/// Error codes arrive as `"WEAK_PASSWORD : Password should be at least 6 characters"`.
fn error_code(body: &str) -> Option<String> {
    let envelope: ErrorEnvelope = serde_json::from_str(body).ok()?;
    let code = envelope.error.message.split(" : ").next()?.trim().to_string();
    (!code.is_empty()).then_some(code)
}

fn classify(status: StatusCode, code: Option<&str>) -> Option<IdentityError> {
    if status != StatusCode::BAD_REQUEST {
        return None;
    }
    match code? {
        "INVALID_ID_TOKEN" | "TOKEN_EXPIRED" | "USER_NOT_FOUND" | "CREDENTIAL_TOO_OLD_LOGIN_AGAIN" => {
            Some(IdentityError::InvalidToken)
        }
        "EMAIL_NOT_FOUND" | "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" | "USER_DISABLED" => {
            Some(IdentityError::InvalidCredentials)
        }
        "EMAIL_EXISTS" => Some(IdentityError::EmailExists),
        other @ ("INVALID_EMAIL" | "WEAK_PASSWORD" | "MISSING_PASSWORD" | "MISSING_EMAIL") => {
            Some(IdentityError::Rejected(other.to_string()))
        }
        _ => None,
    }
}
