//! In-memory collaborators used by unit tests.

use crate::{
    catalog::Catalog,
    identity::{Identity, IdentityError, IdentityProvider, Session},
    query::Record,
    service::{BackendService, ServiceSettings},
    storage::{ObjectStorage, StorageError},
    store::{DocumentStore, StoreError, prepare_record},
};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Document store keeping collections as insertion-ordered vectors.
#[derive(Default)]
pub(crate) struct MemoryStore {
    collections: Mutex<HashMap<String, Vec<Record>>>,
    pub(crate) fail: bool,
}

impl MemoryStore {
    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub(crate) async fn seed(&self, collection: &str, records: Vec<Record>) {
        let mut guard = self.collections.lock().await;
        let entries = guard.entry(collection.to_string()).or_default();
        for record in records {
            let id = record
                .get("id")
                .and_then(Value::as_str)
                .map(str::to_string);
            entries.push(prepare_record(record, id));
        }
    }

    pub(crate) async fn records(&self, collection: &str) -> Vec<Record> {
        self.collections
            .lock()
            .await
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.fail {
            Err(StoreError::UnexpectedStatus {
                status: StatusCode::SERVICE_UNAVAILABLE,
                body: "store offline".into(),
            })
        } else {
            Ok(())
        }
    }
}

fn id_of(record: &Record) -> Option<&str> {
    record.get("id").and_then(Value::as_str)
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn list(&self, collection: &str) -> Result<Vec<Record>, StoreError> {
        self.check()?;
        Ok(self.records(collection).await)
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Record>, StoreError> {
        self.check()?;
        Ok(self
            .records(collection)
            .await
            .into_iter()
            .find(|record| id_of(record) == Some(id)))
    }

    async fn find_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Record>, StoreError> {
        self.check()?;
        Ok(self
            .records(collection)
            .await
            .into_iter()
            .filter(|record| record.get(field) == Some(value))
            .collect())
    }

    async fn create(
        &self,
        collection: &str,
        id: Option<String>,
        record: Record,
    ) -> Result<Record, StoreError> {
        self.check()?;
        let record = prepare_record(record, id);
        let mut guard = self.collections.lock().await;
        let entries = guard.entry(collection.to_string()).or_default();
        if entries.iter().any(|existing| id_of(existing) == id_of(&record)) {
            return Err(StoreError::AlreadyExists(format!(
                "{collection}/{}",
                id_of(&record).unwrap_or_default()
            )));
        }
        entries.push(record.clone());
        Ok(record)
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        self.check()?;
        if let Some(entries) = self.collections.lock().await.get_mut(collection) {
            entries.retain(|record| id_of(record) != Some(id));
        }
        Ok(())
    }

    async fn append_to_list(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        values: Vec<Value>,
    ) -> Result<(), StoreError> {
        self.check()?;
        let mut guard = self.collections.lock().await;
        let record = guard
            .get_mut(collection)
            .and_then(|entries| entries.iter_mut().find(|record| id_of(record) == Some(id)))
            .ok_or_else(|| StoreError::NotFound(format!("{collection}/{id}")))?;
        let slot = record
            .entry(field.to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        if !slot.is_array() {
            *slot = Value::Array(Vec::new());
        }
        if let Value::Array(items) = slot {
            for value in values {
                if !items.contains(&value) {
                    items.push(value);
                }
            }
        }
        Ok(())
    }
}

/// Identity provider with accounts held in memory; tokens are `token-<uid>`.
#[derive(Default)]
pub(crate) struct StubIdentity {
    accounts: Mutex<HashMap<String, (String, String)>>,
}

impl StubIdentity {
    pub(crate) async fn with_account(self, uid: &str, email: &str, password: &str) -> Self {
        self.accounts
            .lock()
            .await
            .insert(email.to_string(), (uid.to_string(), password.to_string()));
        self
    }

    fn session(uid: &str, email: &str) -> Session {
        Session {
            uid: uid.to_string(),
            email: email.to_string(),
            id_token: format!("token-{uid}"),
            refresh_token: format!("refresh-{uid}"),
            expires_in: 3600,
        }
    }
}

#[async_trait]
impl IdentityProvider for StubIdentity {
    async fn verify_token(&self, token: &str) -> Result<Identity, IdentityError> {
        let uid = token
            .strip_prefix("token-")
            .ok_or(IdentityError::InvalidToken)?;
        let accounts = self.accounts.lock().await;
        accounts
            .iter()
            .find(|(_, (account_uid, _))| account_uid == uid)
            .map(|(email, (uid, _))| Identity {
                uid: uid.clone(),
                email: Some(email.clone()),
            })
            .ok_or(IdentityError::InvalidToken)
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<Session, IdentityError> {
        if password.len() < 6 {
            return Err(IdentityError::Rejected("WEAK_PASSWORD".into()));
        }
        let mut accounts = self.accounts.lock().await;
        if accounts.contains_key(email) {
            return Err(IdentityError::EmailExists);
        }
        let uid = format!("uid-{}", accounts.len() + 1);
        accounts.insert(email.to_string(), (uid.clone(), password.to_string()));
        Ok(Self::session(&uid, email))
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, IdentityError> {
        let accounts = self.accounts.lock().await;
        match accounts.get(email) {
            Some((uid, stored)) if stored == password => Ok(Self::session(uid, email)),
            _ => Err(IdentityError::InvalidCredentials),
        }
    }
}

/// Object storage recording uploads and returning predictable URLs.
#[derive(Default)]
pub(crate) struct StubStorage {
    pub(crate) uploads: Mutex<Vec<(String, String, usize)>>,
    pub(crate) fail: bool,
}

#[async_trait]
impl ObjectStorage for StubStorage {
    async fn upload(
        &self,
        object_name: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<String, StorageError> {
        if self.fail {
            return Err(StorageError::UnexpectedStatus {
                status: StatusCode::FORBIDDEN,
                body: "bucket denied".into(),
            });
        }
        self.uploads.lock().await.push((
            object_name.to_string(),
            content_type.to_string(),
            bytes.len(),
        ));
        Ok(format!("https://storage.test/{object_name}"))
    }
}

impl StubStorage {
    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }
}

/// Fakes plus the service wired over them.
pub(crate) struct Harness {
    pub(crate) store: Arc<MemoryStore>,
    pub(crate) storage: Arc<StubStorage>,
    pub(crate) service: Arc<BackendService>,
}

impl Harness {
    /// One registered account: uid `u1`, token `token-u1`.
    pub(crate) async fn new() -> Self {
        Self::build(MemoryStore::default(), StubStorage::default()).await
    }

    pub(crate) async fn build(store: MemoryStore, storage: StubStorage) -> Self {
        let identity = StubIdentity::default()
            .with_account("u1", "owner@x.com", "secret1")
            .await;
        let store = Arc::new(store);
        let storage = Arc::new(storage);
        let service = Arc::new(BackendService::new(
            store.clone(),
            Arc::new(identity),
            storage.clone(),
            Catalog::default(),
            ServiceSettings::default(),
        ));
        Self {
            store,
            storage,
            service,
        }
    }
}

/// Build a record from a JSON object literal.
pub(crate) fn record(value: Value) -> Record {
    value.as_object().cloned().expect("object literal")
}
