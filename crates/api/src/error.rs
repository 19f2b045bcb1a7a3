use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use annotator_core::detection::{DetectError, FailureReason};
use annotator_core::error::CoreError;
use annotator_core::store::StoreError;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] and [`DetectError`] for domain failures and adds
/// HTTP-specific variants. Implements [`IntoResponse`] to produce consistent
/// JSON error responses of the form `{ "error": ..., "code": ... }`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `annotator_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A detection pipeline failure.
    #[error(transparent)]
    Detect(#[from] DetectError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The remote prediction service failed or was unreachable.
    #[error("Upstream error: {0}")]
    Upstream(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Core(core) => classify_core_error(core),
            AppError::Detect(err) => classify_detect_error(err),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::Upstream(msg) => {
                tracing::error!(error = %msg, "Prediction upstream error");
                (
                    StatusCode::BAD_GATEWAY,
                    "UPSTREAM_ERROR",
                    "The prediction service is unavailable".to_string(),
                )
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

/// Classify a core error into an HTTP status, error code, and message.
fn classify_core_error(err: &CoreError) -> (StatusCode, &'static str, String) {
    match err {
        CoreError::NotFound { key, .. } => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("No annotations found for image '{key}'"),
        ),
        CoreError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
        CoreError::Store(store) => {
            tracing::error!(error = %store, "Annotation store error");
            match store {
                StoreError::CorruptExisting { identity, .. } => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "STORE_CORRUPT",
                    format!("Stored annotations for image '{identity}' are unreadable"),
                ),
                StoreError::Io { .. } | StoreError::Encode(_) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "STORE_ERROR",
                    "Annotation storage is unavailable".to_string(),
                ),
            }
        }
    }
}

/// Classify a detection error.
///
/// Captured detector output is logged for operators but never returned.
fn classify_detect_error(err: &DetectError) -> (StatusCode, &'static str, String) {
    if let Some(output) = err.captured_output() {
        tracing::error!(error = %err, detector_output = %output, "Detection failed");
    } else {
        tracing::error!(error = %err, "Detection failed");
    }

    match err {
        DetectError::InvalidRequest(msg) => {
            (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
        }
        DetectError::Stage { .. } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "STAGE_ERROR",
            "Failed to stage image for detection".to_string(),
        ),
        DetectError::Launch { .. } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "DETECTOR_UNAVAILABLE",
            "The detector could not be started".to_string(),
        ),
        DetectError::DetectorFailed { reason, .. } => match reason {
            FailureReason::TimedOut(after) => (
                StatusCode::GATEWAY_TIMEOUT,
                "DETECTOR_TIMEOUT",
                format!("Detection timed out after {}s", after.as_secs()),
            ),
            FailureReason::Cancelled => (
                StatusCode::SERVICE_UNAVAILABLE,
                "DETECTOR_CANCELLED",
                "Detection was cancelled".to_string(),
            ),
            FailureReason::Exited(_) | FailureReason::Signalled => (
                StatusCode::BAD_GATEWAY,
                "DETECTOR_FAILED",
                format!("Detector {reason}"),
            ),
        },
        DetectError::ParseFailed { failure, .. } => (
            StatusCode::BAD_GATEWAY,
            "DETECTOR_OUTPUT_INVALID",
            format!("Detector output could not be parsed ({})", failure.reason()),
        ),
    }
}
