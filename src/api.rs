//! HTTP surface for Firegate.
//!
//! - `GET /`, `GET /health` – liveness message.
//! - `POST /auth/register`, `POST /auth/login` – email/password accounts.
//! - `GET /me` – the caller's user record.
//! - `POST /upload` – multipart `file` proxied to object storage.
//! - `GET /{collection}` – search and paginate (`search_term`, `page`, `page_size`).
//! - `POST /{collection}` – create from a JSON object or a multipart form.
//! - `GET /{collection}/{id}` – single record.
//! - `POST /{collection}/{id}/{field}` – append `values` to a list field.
//!
//! Every failure is rendered as `{"error": message}`; [`ApiError`] alone decides the status.

use crate::config::Config;
use crate::service::{BackendService, FileUpload, NewRecord, Registration, ServiceError};
use axum::{
    Json, Router,
    extract::{
        DefaultBodyLimit, FromRequest, Multipart, Path, Query, Request, State,
        multipart::{Field, MultipartError, MultipartRejection},
        rejection::JsonRejection,
    },
    http::{HeaderMap, HeaderValue, Method, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::{sync::Arc, time::Duration};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

/// Transport-level settings for the router.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    /// Origins allowed by CORS.
    pub allowed_origins: Vec<String>,
    /// Largest accepted request body, in bytes.
    pub max_upload_bytes: usize,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["http://localhost:5173".to_string()],
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}

impl From<&Config> for HttpSettings {
    fn from(config: &Config) -> Self {
        Self {
            allowed_origins: config.allowed_origins.clone(),
            max_upload_bytes: config.max_upload_bytes,
        }
    }
}

/// Build the HTTP router.
pub fn create_router(service: Arc<BackendService>, settings: &HttpSettings) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/me", get(profile))
        .route("/upload", post(upload_file))
        .route(
            "/:collection",
            get(list_collection).post(create_record),
        )
        .route("/:collection/:id", get(get_record))
        .route("/:collection/:id/:field", post(append_values))
        .layer(DefaultBodyLimit::max(settings.max_upload_bytes))
        .layer(cors_layer(&settings.allowed_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60))
}

/// Token from `Authorization: Bearer <token>`; a bare token is accepted as well.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?.trim();
    let token = match value.split_once(' ') {
        Some((scheme, rest)) if scheme.eq_ignore_ascii_case("bearer") => rest.trim(),
        _ => value,
    };
    (!token.is_empty()).then_some(token)
}

async fn health(State(service): State<Arc<BackendService>>) -> Json<Value> {
    Json(json!({ "message": service.health() }))
}

/// Query string accepted by `GET /{collection}`.
#[derive(Deserialize)]
struct ListQuery {
    #[serde(default)]
    search_term: Option<String>,
    #[serde(default)]
    page: Option<String>,
    #[serde(default)]
    page_size: Option<String>,
}

async fn list_collection(
    State(service): State<Arc<BackendService>>,
    Path(collection): Path<String>,
    Query(query): Query<ListQuery>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let params = service.page_params(
        query.search_term,
        query.page.as_deref(),
        query.page_size.as_deref(),
    )?;
    let page = service
        .list_page(&collection, &params, bearer_token(&headers))
        .await?;
    Ok(Json(json!({ "response": page })))
}

async fn get_record(
    State(service): State<Arc<BackendService>>,
    Path((collection, id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let record = service
        .get_record(&collection, &id, bearer_token(&headers))
        .await?;
    Ok(Json(json!({ "data": record })))
}

/// Create a record from either a JSON object or a multipart form.
///
/// Text parts become string fields; file parts are uploaded and replaced by their URLs.
async fn create_record(
    State(service): State<Arc<BackendService>>,
    Path(collection): Path<String>,
    headers: HeaderMap,
    request: Request,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let input = if is_multipart(&headers) {
        let multipart = Multipart::from_request(request, &()).await?;
        read_form(multipart).await?
    } else {
        let Json(body) = Json::<Value>::from_request(request, &()).await?;
        match body {
            Value::Object(fields) => NewRecord {
                fields,
                files: Vec::new(),
            },
            _ => {
                return Err(ServiceError::InvalidArgument(
                    "Request body must be a JSON object".into(),
                )
                .into());
            }
        }
    };

    let record = service
        .create_record(&collection, input, bearer_token(&headers))
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Record created", "data": record })),
    ))
}

#[derive(Deserialize)]
struct AppendRequest {
    values: Vec<Value>,
}

async fn append_values(
    State(service): State<Arc<BackendService>>,
    Path((collection, id, field)): Path<(String, String, String)>,
    headers: HeaderMap,
    body: Result<Json<AppendRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(AppendRequest { values }) = body?;
    service
        .append_to_record(&collection, &id, &field, values, bearer_token(&headers))
        .await?;
    Ok(Json(json!({ "message": "Values appended" })))
}

#[derive(Deserialize)]
struct RegisterRequest {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
    #[serde(default)]
    name: Option<String>,
}

async fn register(
    State(service): State<Arc<BackendService>>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let Json(RegisterRequest {
        email,
        password,
        name,
    }) = body?;
    let user = service
        .register(Registration {
            email,
            password,
            name,
        })
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "User registered", "data": user })),
    ))
}

#[derive(Deserialize)]
struct LoginRequest {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

async fn login(
    State(service): State<Arc<BackendService>>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(LoginRequest { email, password }) = body?;
    let session = service.login(&email, &password).await?;
    Ok(Json(json!({ "message": "Login successful", "data": session })))
}

async fn profile(
    State(service): State<Arc<BackendService>>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let user = service.profile(bearer_token(&headers)).await?;
    Ok(Json(json!({ "data": user })))
}

async fn upload_file(
    State(service): State<Arc<BackendService>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Value>, ApiError> {
    let NewRecord { mut files, .. } = read_form(multipart?).await?;
    let position = files
        .iter()
        .position(|file| file.field == "file")
        .ok_or_else(|| ServiceError::InvalidArgument("Missing multipart field: file".into()))?;
    let url = service.upload(files.swap_remove(position)).await?;
    Ok(Json(json!({ "message": "File uploaded", "url": url })))
}

fn is_multipart(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.trim_start().starts_with("multipart/form-data"))
}

/// Split a multipart form into text fields and file parts.
async fn read_form(mut multipart: Multipart) -> Result<NewRecord, ApiError> {
    let mut fields = Map::new();
    let mut files = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        if field.file_name().is_some() {
            files.push(read_file(name, field).await?);
        } else {
            let text = field.text().await?;
            fields.insert(name, Value::String(text));
        }
    }

    Ok(NewRecord { fields, files })
}

async fn read_file(name: String, field: Field<'_>) -> Result<FileUpload, ApiError> {
    let file_name = field.file_name().map(str::to_string);
    let content_type = field.content_type().map(str::to_string);
    let bytes = field.bytes().await?.to_vec();
    Ok(FileUpload {
        field: name,
        file_name,
        content_type,
        bytes,
    })
}

/// Error rendered at the HTTP boundary.
pub struct ApiError(ServiceError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ServiceError::InvalidArgument(_) | ServiceError::UploadFailed(_) => {
                StatusCode::BAD_REQUEST
            }
            ServiceError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Conflict(_) => StatusCode::CONFLICT,
            ServiceError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %self.0, "Request failed");
        } else {
            tracing::debug!(status = %status, error = %self.0, "Request rejected");
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

impl From<ServiceError> for ApiError {
    fn from(inner: ServiceError) -> Self {
        Self(inner)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(ServiceError::InvalidArgument(rejection.body_text()))
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        Self(ServiceError::InvalidArgument(rejection.body_text()))
    }
}

impl From<MultipartError> for ApiError {
    fn from(error: MultipartError) -> Self {
        Self(ServiceError::InvalidArgument(error.body_text()))
    }
}
