use serde::Deserialize;
use std::env;
use std::sync::OnceLock;
use thiserror::Error;

const DEFAULT_FIRESTORE_URL: &str = "https://firestore.googleapis.com/v1";
const DEFAULT_IDENTITY_TOOLKIT_URL: &str = "https://identitytoolkit.googleapis.com/v1";
const DEFAULT_STORAGE_URL: &str = "https://firebasestorage.googleapis.com/v0";
const DEFAULT_ALLOWED_ORIGIN: &str = "http://localhost:5173";

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the Firegate server.
#[derive(Debug, Clone)]
pub struct Config {
    /// Firebase project that owns the Firestore database and storage bucket.
    pub project_id: String,
    /// Firestore database identifier, usually `(default)`.
    pub firestore_database: String,
    /// Base URL of the Firestore REST API (override for the emulator).
    pub firestore_url: String,
    /// Web API key passed to Identity Toolkit.
    pub api_key: String,
    /// Base URL of the Identity Toolkit REST API.
    pub identity_toolkit_url: String,
    /// Bucket receiving proxied uploads.
    pub storage_bucket: String,
    /// Base URL of the Firebase Storage REST API.
    pub storage_url: String,
    /// Optional OAuth bearer token forwarded to Firestore and Storage.
    pub access_token: Option<String>,
    /// HTTP server port.
    pub port: u16,
    /// Origins allowed to call the API from a browser.
    pub allowed_origins: Vec<String>,
    /// Page size applied when a listing omits `page_size`.
    pub default_page_size: usize,
    /// Upper bound accepted for `page_size`.
    pub max_page_size: usize,
    /// Maximum request body size accepted on upload routes.
    pub max_upload_bytes: usize,
}

/// Subset of a Google service-account key file that Firegate cares about.
#[derive(Debug, Deserialize)]
struct ServiceAccount {
    project_id: String,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            project_id: load_project_id()?,
            firestore_database: load_env_optional("FIRESTORE_DATABASE")
                .unwrap_or_else(|| "(default)".to_string()),
            firestore_url: load_env_optional("FIRESTORE_URL")
                .unwrap_or_else(|| DEFAULT_FIRESTORE_URL.to_string()),
            api_key: load_env("FIREBASE_API_KEY")?,
            identity_toolkit_url: load_env_optional("IDENTITY_TOOLKIT_URL")
                .unwrap_or_else(|| DEFAULT_IDENTITY_TOOLKIT_URL.to_string()),
            storage_bucket: load_env("FIREBASE_STORAGE_BUCKET")?,
            storage_url: load_env_optional("STORAGE_URL")
                .unwrap_or_else(|| DEFAULT_STORAGE_URL.to_string()),
            access_token: load_env_optional("FIREBASE_ACCESS_TOKEN"),
            port: load_parsed("PORT", 5000)?,
            allowed_origins: load_env_optional("CORS_ALLOWED_ORIGINS")
                .map(|value| parse_origins(&value))
                .unwrap_or_else(|| vec![DEFAULT_ALLOWED_ORIGIN.to_string()]),
            default_page_size: load_positive("DEFAULT_PAGE_SIZE", 10)?,
            max_page_size: load_positive("MAX_PAGE_SIZE", 100)?,
            max_upload_bytes: load_positive("MAX_UPLOAD_BYTES", 10 * 1024 * 1024)?,
        })
    }
}

fn load_env(key: &str) -> Result<String, ConfigError> {
    load_env_optional(key).ok_or_else(|| ConfigError::MissingVariable(key.to_string()))
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn load_parsed<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    load_env_optional(key)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key.to_string()))
        })
        .transpose()
        .map(|value| value.unwrap_or(default))
}

fn load_positive(key: &str, default: usize) -> Result<usize, ConfigError> {
    match load_parsed(key, default)? {
        0 => Err(ConfigError::InvalidValue(key.to_string())),
        value => Ok(value),
    }
}

/// The project id comes from the service-account JSON when present, otherwise from
/// `FIREBASE_PROJECT_ID`.
fn load_project_id() -> Result<String, ConfigError> {
    if let Some(raw) = load_env_optional("FIREBASE_SERVICE_ACCOUNT") {
        let account: ServiceAccount = serde_json::from_str(&raw)
            .map_err(|_| ConfigError::InvalidValue("FIREBASE_SERVICE_ACCOUNT".to_string()))?;
        return Ok(account.project_id);
    }
    load_env("FIREBASE_PROJECT_ID")
}

/// Split a comma separated origin list, dropping blanks.
pub fn parse_origins(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|origin| origin.trim().trim_end_matches('/').to_string())
        .filter(|origin| !origin.is_empty())
        .collect()
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
///
/// `env_file` points at a specific dotenv file; otherwise `.env` is picked up when present.
pub fn init_config(env_file: Option<&std::path::Path>) {
    match env_file {
        Some(path) => {
            dotenvy::from_path(path).ok();
        }
        None => {
            dotenvy::dotenv().ok();
        }
    }
    let config = Config::from_env().expect("Failed to load config from environment");
    tracing::debug!(
        project_id = %config.project_id,
        firestore_url = %config.firestore_url,
        storage_bucket = %config.storage_bucket,
        port = config.port,
        origins = ?config.allowed_origins,
        "Loaded configuration"
    );
    CONFIG.set(config).expect("Failed to set config");
}
