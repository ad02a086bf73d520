//! HTTP error taxonomy for the API surface.

use crate::store::StoreError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Errors returned by API handlers.
///
/// Each variant maps to exactly one status code; no branch is folded into
/// another. Store failures stay distinct from `NotFound` so a flaky
/// database never reads as a missing license.
#[derive(Debug, Error)]
pub enum ApiError {
    /// A required request field is missing or empty.
    #[error("{0} missing")]
    MissingField(&'static str),

    /// `expires_at` could not be parsed as a timestamp.
    #[error("expires_at must be an ISO timestamp")]
    InvalidExpiry,

    /// Admin token missing, wrong, or administration not configured.
    #[error("Unauthorized")]
    Unauthorized,

    /// License key not found.
    #[error("License key not found")]
    NotFound,

    /// License administratively deactivated.
    #[error("License is inactive")]
    Inactive,

    /// License past its expiry.
    #[error("License expired")]
    Expired,

    /// License bound to a different device.
    #[error("Device mismatch. License already bound to another device.")]
    DeviceMismatch {
        /// The device the license is actually bound to. Disclosed on
        /// purpose so a support request can name the holder.
        bound_device_id: String,
    },

    /// Create hit an existing key.
    #[error("License already exists")]
    Duplicate,

    /// Persistence failure.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

impl ApiError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingField(_) | Self::InvalidExpiry => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Inactive | Self::Expired | Self::DeviceMismatch { .. } => {
                StatusCode::FORBIDDEN
            }
            Self::Duplicate => StatusCode::CONFLICT,
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self {
            Self::DeviceMismatch { bound_device_id } => json!({
                "ok": false,
                "message": self.to_string(),
                "bound_device_id": bound_device_id,
            }),
            // Internal detail stays in the log, not the response.
            Self::Store(e) => {
                tracing::error!("store failure: {e}");
                json!({ "ok": false, "message": "storage unavailable" })
            }
            _ => json!({ "ok": false, "message": self.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}
