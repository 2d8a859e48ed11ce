use axum::{
    extract::{Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use supplier_core::{MutationCommand, SupplierFields, SUPPLIERS_CACHE_KEY};
use supplier_shared::SupplierEvent;
use tracing::{debug, warn};

use crate::error::AppError;
use crate::state::AppState;

/// Body of create and update requests. Missing or null fields become empty strings.
#[derive(Debug, Deserialize)]
pub struct SupplierRequest {
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub contact_person: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

impl SupplierRequest {
    pub fn into_fields(self) -> SupplierFields {
        SupplierFields {
            company_name: self.company_name.unwrap_or_default(),
            contact_person: self.contact_person.unwrap_or_default(),
            phone: self.phone.unwrap_or_default(),
        }
    }
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/suppliers", get(get_suppliers).post(create_supplier))
        .route("/suppliers/{id}", put(update_supplier).delete(delete_supplier))
}

/// Publish, then invalidate, then let the caller respond.
///
/// Nothing is invalidated when the publish fails. When the invalidation fails the command
/// is already queued and will still be applied, but the caller gets an error instead of 202.
async fn accept(state: &AppState, command: MutationCommand) -> Result<(), AppError> {
    let payload = command.encode()?;
    state.publisher.publish(command.lane(), payload).await?;

    state.cache.invalidate(SUPPLIERS_CACHE_KEY).await.map_err(|e| {
        warn!("Cache invalidation failed after {} publish", command.lane());
        AppError::from(e)
    })
}

fn accepted(message: String) -> (StatusCode, Json<Value>) {
    (StatusCode::ACCEPTED, Json(json!({ "message": message })))
}

/// POST /suppliers
pub async fn create_supplier(
    State(state): State<AppState>,
    Json(req): Json<SupplierRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let fields = req.into_fields();
    let event = SupplierEvent::create_requested(&fields.company_name);

    accept(&state, MutationCommand::create(fields)).await?;
    state.telemetry.emit(event);

    Ok(accepted("Supplier creation request accepted for processing".to_string()))
}

/// PUT /suppliers/{id}
pub async fn update_supplier(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<SupplierRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let fields = req.into_fields();
    let event = SupplierEvent::update_requested(id, &fields.company_name);

    accept(&state, MutationCommand::update(id, fields)).await?;
    state.telemetry.emit(event);

    Ok(accepted(format!("Supplier {} update request accepted for processing", id)))
}

/// DELETE /suppliers/{id}
pub async fn delete_supplier(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    accept(&state, MutationCommand::delete(id)).await?;
    state.telemetry.emit(SupplierEvent::delete_requested(id));

    Ok(accepted(format!("Supplier {} delete request accepted for processing", id)))
}

/// GET /suppliers
///
/// Serves the cached snapshot verbatim on a hit. On a miss (or when the cache is
/// unreachable) asks the query service, caches the fresh snapshot, and returns it.
pub async fn get_suppliers(State(state): State<AppState>) -> Result<Response, AppError> {
    match state.cache.get(SUPPLIERS_CACHE_KEY).await {
        Ok(Some(snapshot)) => {
            state.telemetry.emit(SupplierEvent::listed(true, None));
            return Ok(snapshot_response(&snapshot, "hit"));
        }
        Ok(None) => debug!("Suppliers cache miss"),
        Err(e) => warn!("Cache read failed, treating as miss: {}", e),
    }

    let suppliers = state.query.get_suppliers().await?;
    let snapshot = serde_json::to_string(&suppliers)?;

    if let Err(e) = state
        .cache
        .set_with_expiry(SUPPLIERS_CACHE_KEY, &snapshot, state.cache_ttl)
        .await
    {
        warn!("Failed to cache suppliers snapshot: {}", e);
    }
    state.telemetry.emit(SupplierEvent::listed(false, Some(suppliers.len())));

    Ok(snapshot_response(&snapshot, "miss"))
}

/// Wraps an already-serialized array as `{"data": ...}` without re-parsing it.
///
/// The `suppliers` key is only ever written by `get_suppliers` above, always with a
/// serialized JSON array.
fn snapshot_response(snapshot: &str, cache_status: &'static str) -> Response {
    let body = format!("{{\"data\":{}}}", snapshot);
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("application/json")),
            (header::HeaderName::from_static("x-cache"), HeaderValue::from_static(cache_status)),
        ],
        body,
    )
        .into_response()
}
