//! HTTP surface of the gateway.
//!
//! # Design
//! Thin axum handlers over `accessgate_core`. Each create-resident outcome
//! maps to its own response shape so a client can always tell "not
//! attempted" from "saved locally only" from "fully synced" from an
//! infrastructure failure.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tokio::net::TcpListener;
use uuid::Uuid;

use accessgate_core::console::{self, ConsoleError, RawCall};
use accessgate_core::{
    CreateResident, CreateResidentOutcome, NewVisitor, QrCodeError, Resident, ResidentReconciler,
    SqliteStore, StoreError, VendorApi, VendorError, Visitor,
};

pub type SharedVendor = Arc<dyn VendorApi>;

#[derive(Clone)]
pub struct AppState {
    residents: Arc<ResidentReconciler<SqliteStore, SharedVendor>>,
    store: SqliteStore,
    vendor: SharedVendor,
}

impl AppState {
    pub fn new(store: SqliteStore, vendor: SharedVendor, org_index_code: &str) -> Self {
        let residents = ResidentReconciler::new(store.clone(), Arc::clone(&vendor), org_index_code);
        Self {
            residents: Arc::new(residents),
            store,
            vendor,
        }
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/residents", get(list_residents))
        .route("/api/residents/create", post(create_resident))
        .route("/api/residents/delete", post(delete_resident))
        .route("/api/residents/qr", post(resident_qr))
        .route("/api/residents/{owner_id}", get(get_resident))
        .route("/api/visitors", get(list_visitors))
        .route("/api/visitors/create", post(create_visitor))
        .route("/api/test/auth", post(test_auth))
        .route("/api/test/raw", post(test_raw))
        .route("/api/execute", post(execute))
        .with_state(state)
}

pub async fn run(listener: TcpListener, state: AppState) -> Result<(), std::io::Error> {
    axum::serve(listener, app(state)).await
}

/// Install the global `tracing` subscriber, honouring `RUST_LOG`.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Handler failures, rendered as `{"error": ...}` bodies.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Failed to communicate with vendor platform")]
    Vendor {
        request_id: Option<Uuid>,
        source: VendorError,
    },
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, json!({ "error": msg })),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, json!({ "error": msg })),
            ApiError::Store(err) => {
                tracing::error!(error = %err, "storage failure");
                (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": err.to_string() }))
            }
            ApiError::Vendor { request_id, source } => (
                StatusCode::BAD_GATEWAY,
                json!({
                    "requestId": request_id,
                    "error": self.to_string(),
                    "details": source.to_string(),
                }),
            ),
        };
        (status, Json(body)).into_response()
    }
}

impl From<VendorError> for ApiError {
    fn from(source: VendorError) -> Self {
        match source {
            VendorError::InvalidRequest(msg) => ApiError::BadRequest(msg),
            source => ApiError::Vendor {
                request_id: None,
                source,
            },
        }
    }
}

impl From<ConsoleError> for ApiError {
    fn from(err: ConsoleError) -> Self {
        match err {
            ConsoleError::MissingEndpoint
            | ConsoleError::RelativeEndpoint(_)
            | ConsoleError::UnknownMethod(_) => ApiError::BadRequest(err.to_string()),
            ConsoleError::Vendor {
                request_id,
                duration_ms,
                source,
            } => {
                tracing::warn!(%request_id, duration_ms, error = %source, "raw call failed");
                match source {
                    VendorError::InvalidRequest(msg) => ApiError::BadRequest(msg),
                    source => ApiError::Vendor {
                        request_id: Some(request_id),
                        source,
                    },
                }
            }
        }
    }
}

impl From<QrCodeError> for ApiError {
    fn from(err: QrCodeError) -> Self {
        match err {
            QrCodeError::NotFound(_) | QrCodeError::NotSynced(_) => ApiError::BadRequest(err.to_string()),
            QrCodeError::Store(err) => ApiError::Store(err),
            QrCodeError::Vendor(err) => err.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OwnerRef {
    owner_id: Option<String>,
}

impl OwnerRef {
    fn require(self) -> Result<String, ApiError> {
        self.owner_id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| ApiError::BadRequest("ownerId is required".to_string()))
    }
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn create_resident(
    State(state): State<AppState>,
    Json(input): Json<CreateResident>,
) -> Result<Json<Value>, ApiError> {
    match state.residents.create_resident(input).await {
        CreateResidentOutcome::FullSuccess {
            resident,
            vendor_person_id,
            vendor_person_code,
        } => Ok(Json(json!({
            "success": true,
            "sync": "synced",
            "hikPersonId": vendor_person_id,
            "hikPersonCode": vendor_person_code,
            "resident": resident,
        }))),
        CreateResidentOutcome::PartialSuccess {
            resident,
            diagnostic,
        } => Ok(Json(json!({
            "success": false,
            "sync": "pending",
            "message": "Saved locally but vendor sync failed",
            "resident": resident,
            "hikResponse": diagnostic.to_json(),
        }))),
        CreateResidentOutcome::ValidationError(msg) => Err(ApiError::BadRequest(msg)),
        CreateResidentOutcome::Conflict { owner_id } => Err(ApiError::Conflict(format!(
            "Resident {owner_id} already exists locally"
        ))),
        CreateResidentOutcome::Fatal(err) => Err(ApiError::Store(err)),
    }
}

async fn list_residents(State(state): State<AppState>) -> Result<Json<Vec<Resident>>, ApiError> {
    Ok(Json(state.residents.list_residents().await?))
}

async fn get_resident(
    State(state): State<AppState>,
    Path(owner_id): Path<String>,
) -> Result<Json<Resident>, ApiError> {
    match state.residents.get_resident(&owner_id).await? {
        Some(resident) => Ok(Json(resident)),
        None => Err(ApiError::NotFound("Resident not found".to_string())),
    }
}

async fn delete_resident(
    State(state): State<AppState>,
    Json(owner): Json<OwnerRef>,
) -> Result<Json<Value>, ApiError> {
    let owner_id = owner.require()?;
    let deleted = state.residents.delete_resident(&owner_id).await?;
    Ok(Json(json!({
        "success": true,
        "deleted": deleted,
        "message": "Deleted locally",
    })))
}

async fn resident_qr(
    State(state): State<AppState>,
    Json(owner): Json<OwnerRef>,
) -> Result<Json<Value>, ApiError> {
    let owner_id = owner.require()?;
    let response = state.residents.dynamic_qr(&owner_id).await?;
    Ok(Json(response.body))
}

async fn create_visitor(
    State(state): State<AppState>,
    Json(visitor): Json<NewVisitor>,
) -> Result<Json<Value>, ApiError> {
    let visitor = state.store.insert_visitor(visitor).await?;
    Ok(Json(json!({ "success": true, "visitor": visitor })))
}

async fn list_visitors(State(state): State<AppState>) -> Result<Json<Vec<Visitor>>, ApiError> {
    Ok(Json(state.store.list_visitors().await?))
}

async fn test_auth(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let response = console::probe_auth(state.vendor.as_ref()).await?;
    Ok(Json(response.body))
}

async fn execute(
    State(state): State<AppState>,
    Json(call): Json<RawCall>,
) -> Result<Json<Value>, ApiError> {
    let report = console::execute_raw(state.vendor.as_ref(), call).await?;
    tracing::info!(
        request_id = %report.request_id,
        duration_ms = report.duration_ms,
        status = report.response.status,
        "raw call completed"
    );
    Ok(Json(json!({
        "requestId": report.request_id,
        "duration": report.duration_ms,
        "hikStatus": report.response.status,
        "hikStatusText": report.response.status_text,
        "data": report.response.body,
    })))
}

/// Raw call that answers with the vendor body alone.
async fn test_raw(
    State(state): State<AppState>,
    Json(call): Json<RawCall>,
) -> Result<Json<Value>, ApiError> {
    let report = console::execute_raw(state.vendor.as_ref(), call).await?;
    Ok(Json(report.response.body))
}
