#![allow(dead_code)]

use firegate::config::Config;

pub const PROJECT: &str = "demo";
pub const DATABASE: &str = "testdb";
pub const DOCUMENTS_PATH: &str = "/projects/demo/databases/testdb/documents";

/// Configuration with every remote endpoint pointed at `base_url`.
pub fn config_for(base_url: &str) -> Config {
    Config {
        project_id: PROJECT.to_string(),
        firestore_database: DATABASE.to_string(),
        firestore_url: base_url.to_string(),
        api_key: "test-key".to_string(),
        identity_toolkit_url: base_url.to_string(),
        storage_bucket: "demo.appspot.com".to_string(),
        storage_url: base_url.to_string(),
        access_token: Some("access-token".to_string()),
        port: 0,
        allowed_origins: vec!["http://localhost:5173".to_string()],
        default_page_size: 10,
        max_page_size: 100,
        max_upload_bytes: 1024 * 1024,
    }
}
