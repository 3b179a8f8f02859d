//! Identity provider abstraction: token verification and email/password accounts.

mod toolkit;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use thiserror::Error;

pub use toolkit::IdentityToolkitClient;

/// Errors raised by identity providers.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// Token was malformed, expired, revoked, or belongs to a disabled account.
    #[error("Invalid or expired identity token")]
    InvalidToken,
    /// Email/password pair did not match an active account.
    #[error("Invalid email or password")]
    InvalidCredentials,
    /// An account with this email already exists.
    #[error("Email already registered")]
    EmailExists,
    /// Provider rejected the input (weak password, malformed email, ...).
    #[error("Identity provider rejected the request: {0}")]
    Rejected(String),
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Provider responded with an unexpected status code.
    #[error("Unexpected identity provider response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned by the provider.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
}

/// Subject resolved from a verified token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Stable user identifier assigned by the provider.
    pub uid: String,
    /// Email on record, when the account has one.
    pub email: Option<String>,
}

/// Tokens returned after a successful sign-in or sign-up.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    /// Stable user identifier assigned by the provider.
    pub uid: String,
    /// Email used to authenticate.
    pub email: String,
    /// Bearer token to send in `Authorization` headers.
    pub id_token: String,
    /// Token used to mint new id tokens.
    pub refresh_token: String,
    /// Lifetime of `id_token` in seconds.
    pub expires_in: u64,
}

/// Interface implemented by identity backends.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolve an opaque bearer token to its subject.
    async fn verify_token(&self, token: &str) -> Result<Identity, IdentityError>;

    /// Create an email/password account; password hashing happens provider-side.
    async fn sign_up(&self, email: &str, password: &str) -> Result<Session, IdentityError>;

    /// Exchange an email/password pair for a session.
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, IdentityError>;
}
