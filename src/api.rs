//! HTTP API: the validation endpoint plus token-guarded admin endpoints.

use crate::error::ApiError;
use crate::evaluator::{evaluate, Decision};
use crate::model::{parse_expires_at, License, LicenseView};
use crate::store::StoreError;
use crate::AppState;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};

/// Build the HTTP API router with the given shared state.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/validate", post(validate))
        .route("/admin/create", post(admin_create))
        .route("/admin/list", get(admin_list))
        .route("/admin/deactivate", post(admin_deactivate))
        .with_state(state)
}

async fn healthz() -> Json<Value> {
    Json(json!({ "ok": true, "service": "keygate" }))
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ValidateRequest {
    license_key: String,
    device_id: String,
}

async fn validate(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ValidateRequest>,
) -> Result<Json<Value>, ApiError> {
    let key = req.license_key.trim();
    let device = req.device_id.trim();
    if key.is_empty() {
        return Err(ApiError::MissingField("license_key"));
    }
    if device.is_empty() {
        return Err(ApiError::MissingField("device_id"));
    }

    match evaluate(state.store.as_ref(), key, device, Utc::now())? {
        Decision::NotFound => Err(ApiError::NotFound),
        Decision::Inactive => Err(ApiError::Inactive),
        Decision::Expired => Err(ApiError::Expired),
        Decision::BoundElsewhere(bound_device_id) => {
            debug!(key, device, bound = %bound_device_id, "device mismatch");
            Err(ApiError::DeviceMismatch { bound_device_id })
        }
        Decision::Granted(license) => {
            debug!(key, device, "license valid");
            Ok(Json(json!({
                "ok": true,
                "message": "License valid",
                "data": license.to_view(),
            })))
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct CreateRequest {
    license_key: String,
    expires_at: Option<String>,
    is_active: Option<bool>,
}

async fn admin_create(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreateRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    check_admin(&state, &headers)?;

    let key = req.license_key.trim();
    if key.is_empty() {
        return Err(ApiError::MissingField("license_key"));
    }

    let expires_at = match req.expires_at.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(parse_expires_at(raw).ok_or(ApiError::InvalidExpiry)?),
    };

    let license = License {
        license_key: key.to_string(),
        device_id: None,
        is_active: req.is_active.unwrap_or(true),
        expires_at,
        created_at: Utc::now(),
    };

    match state.store.insert(&license) {
        Ok(()) => {}
        Err(StoreError::DuplicateKey(_)) => return Err(ApiError::Duplicate),
        Err(e) => return Err(e.into()),
    }

    info!(key, "license created");
    Ok((
        StatusCode::CREATED,
        Json(json!({ "ok": true, "license": license.to_view() })),
    ))
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ListParams {
    limit: Option<u32>,
    offset: Option<u32>,
}

async fn admin_list(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<ListParams>,
) -> Result<Json<Value>, ApiError> {
    check_admin(&state, &headers)?;

    let limit = params.limit.unwrap_or(100);
    let offset = params.offset.unwrap_or(0);
    let rows = state.store.list_recent(limit, offset)?;
    let views: Vec<LicenseView> = rows.iter().map(License::to_view).collect();
    Ok(Json(json!({ "ok": true, "count": views.len(), "data": views })))
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct DeactivateRequest {
    license_key: String,
}

async fn admin_deactivate(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<DeactivateRequest>,
) -> Result<Json<Value>, ApiError> {
    check_admin(&state, &headers)?;

    let key = req.license_key.trim();
    if key.is_empty() {
        return Err(ApiError::MissingField("license_key"));
    }

    match state.store.set_active(key, false) {
        Ok(()) => {}
        Err(StoreError::NotFound(_)) => return Err(ApiError::NotFound),
        Err(e) => return Err(e.into()),
    }

    let license = state
        .store
        .find_by_key(key)?
        .ok_or(ApiError::NotFound)?;

    info!(key, "license deactivated");
    Ok(Json(json!({ "ok": true, "license": license.to_view() })))
}

/// Fail-closed admin gate: with no token configured every request is 401,
/// indistinguishable from a wrong token.
fn check_admin(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let Some(expected) = state.admin_token.as_deref() else {
        return Err(ApiError::Unauthorized);
    };
    let presented = headers
        .get("x-admin-token")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if presented == expected {
        Ok(())
    } else {
        Err(ApiError::Unauthorized)
    }
}
