//! Request-level operations over the injected store, identity provider, and object storage.

use crate::{
    catalog::{self, Catalog, CollectionSpec},
    identity::{Identity, IdentityProvider, Session},
    query::{PageParams, PageResult, Record, get_string, paginate},
    service::types::{FileUpload, NewRecord, Registration, ServiceError, ServiceSettings},
    storage::{ObjectStorage, object_name_for},
    store::{
        DocumentStore, StoreError, email_document_id,
        payload::{CREATED_AT_FIELD, ID_FIELD},
    },
};
use serde_json::Value;
use std::sync::Arc;

/// Field recording which identity created a record.
pub const CREATED_BY_FIELD: &str = "created_by";

const RESERVED_FIELDS: &[&str] = &[ID_FIELD, CREATED_AT_FIELD, CREATED_BY_FIELD];
const EMAIL_FIELDS: &[&str] = &["email", "assigned_email"];

/// Coordinates every HTTP-facing operation.
///
/// All collaborators are passed in at construction so tests can substitute fakes; nothing is
/// read from process-wide state. Share one instance through an `Arc`.
pub struct BackendService {
    store: Arc<dyn DocumentStore>,
    identity: Arc<dyn IdentityProvider>,
    storage: Arc<dyn ObjectStorage>,
    catalog: Catalog,
    settings: ServiceSettings,
}

impl BackendService {
    /// Assemble the service from its collaborators.
    pub fn new(
        store: Arc<dyn DocumentStore>,
        identity: Arc<dyn IdentityProvider>,
        storage: Arc<dyn ObjectStorage>,
        catalog: Catalog,
        settings: ServiceSettings,
    ) -> Self {
        tracing::debug!(collections = ?catalog.names(), ?settings, "Backend service assembled");
        Self {
            store,
            identity,
            storage,
            catalog,
            settings,
        }
    }

    /// Liveness message.
    pub fn health(&self) -> &'static str {
        "Server running"
    }

    /// Collections exposed by this server.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Resolve a bearer token to an identity.
    pub async fn authenticate(&self, token: Option<&str>) -> Result<Identity, ServiceError> {
        let token = token
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| ServiceError::Unauthenticated("Missing identity token".into()))?;
        self.identity.verify_token(token).await.map_err(|error| {
            tracing::debug!(error = %error, "Token verification failed");
            ServiceError::from(error)
        })
    }

    /// Parse raw pagination values using the configured defaults.
    pub fn page_params(
        &self,
        search_term: Option<String>,
        page: Option<&str>,
        page_size: Option<&str>,
    ) -> Result<PageParams, ServiceError> {
        Ok(PageParams::parse(
            search_term,
            page,
            page_size,
            self.settings.default_page_size,
            self.settings.max_page_size,
        )?)
    }

    /// Fetch a collection, filter it by `search_term`, and return the requested page.
    pub async fn list_page(
        &self,
        collection: &str,
        params: &PageParams,
        token: Option<&str>,
    ) -> Result<PageResult, ServiceError> {
        let spec = self.collection(collection)?;
        if spec.protected_reads {
            self.authenticate(token).await?;
        }

        let records = self.store.list(spec.name).await?;
        let page = paginate(
            records,
            params.search_term.as_deref(),
            &spec.selectors(),
            params.page,
            params.page_size,
        )?;
        tracing::debug!(
            collection = spec.name,
            search_term = ?params.search_term,
            page = params.page,
            page_size = params.page_size,
            total_results = page.total_results,
            "Listed page"
        );
        Ok(page)
    }

    /// Fetch a single record.
    pub async fn get_record(
        &self,
        collection: &str,
        id: &str,
        token: Option<&str>,
    ) -> Result<Record, ServiceError> {
        let spec = self.collection(collection)?;
        validate_document_id(id)?;
        if spec.protected_reads {
            self.authenticate(token).await?;
        }

        self.store
            .get(spec.name, id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Record not found: {}/{id}", spec.name)))
    }

    /// Validate and insert a record, uploading attached files first.
    ///
    /// Requests naming an `assigned_email` get a placeholder user when none exists yet.
    pub async fn create_record(
        &self,
        collection: &str,
        input: NewRecord,
        token: Option<&str>,
    ) -> Result<Record, ServiceError> {
        let spec = self.collection(collection)?;
        let identity = self.authenticate(token).await?;
        let NewRecord { mut fields, files } = input;

        for reserved in RESERVED_FIELDS {
            fields.remove(*reserved);
        }
        normalize_emails(&mut fields);

        let uploaded_fields: Vec<&str> = files.iter().map(|file| file.field.as_str()).collect();
        let missing: Vec<&str> = spec
            .required_fields
            .iter()
            .copied()
            .filter(|field| {
                get_string(&fields, field, "").trim().is_empty() && !uploaded_fields.contains(field)
            })
            .collect();
        if !missing.is_empty() {
            return Err(ServiceError::InvalidArgument(format!(
                "Missing required fields: {}",
                missing.join(", ")
            )));
        }

        self.ensure_unique(spec, &fields).await?;

        for file in files {
            let field = file.field.clone();
            let url = self.upload(file).await?;
            fields.insert(field, Value::String(url));
        }

        if spec.name == catalog::REQUESTS {
            let assigned = get_string(&fields, "assigned_email", "");
            if !assigned.is_empty() {
                self.ensure_placeholder_user(&assigned).await?;
            }
        }

        fields.insert(CREATED_BY_FIELD.into(), Value::String(identity.uid.clone()));
        let record = self.store.create(spec.name, None, fields).await?;
        tracing::info!(
            collection = spec.name,
            id = %get_string(&record, ID_FIELD, ""),
            created_by = %identity.uid,
            "Record created"
        );
        Ok(record)
    }

    /// Append values to a list field without read-modify-write.
    pub async fn append_to_record(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        values: Vec<Value>,
        token: Option<&str>,
    ) -> Result<(), ServiceError> {
        let spec = self.collection(collection)?;
        self.authenticate(token).await?;
        validate_document_id(id)?;

        let field = field.trim();
        if field.is_empty() || RESERVED_FIELDS.contains(&field) {
            return Err(ServiceError::InvalidArgument(format!(
                "Field cannot be appended to: {field:?}"
            )));
        }
        if values.is_empty() {
            return Err(ServiceError::InvalidArgument(
                "values must contain at least one element".into(),
            ));
        }

        self.store
            .append_to_list(spec.name, id, field, values)
            .await?;
        tracing::info!(collection = spec.name, id, field, "Values appended");
        Ok(())
    }

    /// Create an account with the identity provider and its user record.
    pub async fn register(&self, registration: Registration) -> Result<Record, ServiceError> {
        let email = normalize_email(&registration.email);
        if email.is_empty() || !email.contains('@') {
            return Err(ServiceError::InvalidArgument(
                "A valid email is required".into(),
            ));
        }
        if registration.password.is_empty() {
            return Err(ServiceError::InvalidArgument("password is required".into()));
        }

        let existing = self
            .store
            .find_by_field(catalog::USERS, "email", &Value::String(email.clone()))
            .await?;
        if existing.iter().any(|user| !is_placeholder(user)) {
            return Err(ServiceError::Conflict(format!(
                "Email already registered: {email}"
            )));
        }

        let session = self
            .identity
            .sign_up(&email, &registration.password)
            .await?;

        let mut fields = Record::new();
        fields.insert("email".into(), Value::String(email.clone()));
        fields.insert(
            "name".into(),
            Value::String(registration.name.unwrap_or_default().trim().to_string()),
        );
        let record = self
            .store
            .create(catalog::USERS, Some(session.uid.clone()), fields)
            .await
            .inspect_err(|error| {
                tracing::error!(uid = %session.uid, error = %error, "Account created without user record");
            })?;

        for placeholder in existing.iter().filter(|user| is_placeholder(user)) {
            let id = get_string(placeholder, ID_FIELD, "");
            if let Err(error) = self.store.delete(catalog::USERS, &id).await {
                tracing::warn!(id = %id, error = %error, "Failed to remove placeholder user");
            }
        }

        tracing::info!(uid = %session.uid, "User registered");
        Ok(record)
    }

    /// Exchange credentials for a session.
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, ServiceError> {
        let email = normalize_email(email);
        if email.is_empty() || password.is_empty() {
            return Err(ServiceError::InvalidArgument(
                "email and password are required".into(),
            ));
        }
        let session = self.identity.sign_in(&email, password).await?;
        tracing::info!(uid = %session.uid, "User signed in");
        Ok(session)
    }

    /// The caller's own user record.
    pub async fn profile(&self, token: Option<&str>) -> Result<Record, ServiceError> {
        let identity = self.authenticate(token).await?;
        self.store
            .get(catalog::USERS, &identity.uid)
            .await?
            .ok_or_else(|| ServiceError::NotFound("User profile not found".into()))
    }

    /// Store a file and return its public URL.
    pub async fn upload(&self, file: FileUpload) -> Result<String, ServiceError> {
        if file.bytes.is_empty() {
            return Err(ServiceError::UploadFailed("file is empty".into()));
        }
        let object_name = object_name_for(file.file_name.as_deref());
        let content_type = file
            .content_type
            .as_deref()
            .filter(|value| !value.is_empty())
            .unwrap_or("application/octet-stream");
        Ok(self
            .storage
            .upload(&object_name, content_type, file.bytes)
            .await?)
    }

    fn collection(&self, name: &str) -> Result<&CollectionSpec, ServiceError> {
        self.catalog
            .get(name)
            .ok_or_else(|| ServiceError::NotFound(format!("Unknown collection: {name}")))
    }

    async fn ensure_unique(&self, spec: &CollectionSpec, fields: &Record) -> Result<(), ServiceError> {
        for field in spec.unique_fields {
            let Some(value) = fields.get(*field).filter(|value| !value.is_null()) else {
                continue;
            };
            let clashes = self.store.find_by_field(spec.name, field, value).await?;
            if !clashes.is_empty() {
                return Err(ServiceError::Conflict(format!(
                    "{field} already exists in {}",
                    spec.name
                )));
            }
        }
        Ok(())
    }

    /// Create a placeholder user for `email` unless one already exists.
    ///
    /// The deterministic document id makes concurrent callers collide on `AlreadyExists`
    /// instead of producing duplicates.
    async fn ensure_placeholder_user(&self, email: &str) -> Result<(), ServiceError> {
        let email = normalize_email(email);
        let existing = self
            .store
            .find_by_field(catalog::USERS, "email", &Value::String(email.clone()))
            .await?;
        if !existing.is_empty() {
            return Ok(());
        }

        let mut fields = Record::new();
        fields.insert("email".into(), Value::String(email.clone()));
        fields.insert("name".into(), Value::String(String::new()));
        fields.insert("placeholder".into(), Value::Bool(true));

        match self
            .store
            .create(catalog::USERS, Some(email_document_id(&email)), fields)
            .await
        {
            Ok(_) => {
                tracing::info!(email = %email, "Placeholder user created");
                Ok(())
            }
            Err(StoreError::AlreadyExists(_)) => Ok(()),
            Err(error) => Err(error.into()),
        }
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn normalize_emails(fields: &mut Record) {
    for key in EMAIL_FIELDS {
        if let Some(Value::String(email)) = fields.get_mut(*key) {
            *email = normalize_email(email);
        }
    }
}

fn is_placeholder(record: &Record) -> bool {
    matches!(record.get("placeholder"), Some(Value::Bool(true)))
}

/// Firestore document ids cannot contain `/`, be `.` or `..`, or look like `__name__`.
fn validate_document_id(id: &str) -> Result<(), ServiceError> {
    let reserved = id.len() > 4 && id.starts_with("__") && id.ends_with("__");
    if id.is_empty() || id.contains('/') || id == "." || id == ".." || reserved || id.len() > 1500 {
        return Err(ServiceError::InvalidArgument(format!("Invalid record id: {id:?}")));
    }
    Ok(())
}
