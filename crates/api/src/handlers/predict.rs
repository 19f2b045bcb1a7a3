//! Pass-through proxy to the remote prediction service.
//!
//! The uploaded image is forwarded unchanged as a multipart `image` field
//! and the upstream body is relayed verbatim.

use axum::extract::{Multipart, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::error::{AppError, AppResult};
use crate::handlers::detection::{read_image_upload, IMAGE_FIELD};
use crate::state::AppState;

/// POST /predict
pub async fn predict(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<Response> {
    let (image, _) = read_image_upload(&mut multipart).await?;
    let image = image.ok_or_else(|| AppError::BadRequest("No image uploaded".to_string()))?;

    let part = reqwest::multipart::Part::bytes(image.bytes)
        .file_name(image.filename.unwrap_or_else(|| IMAGE_FIELD.to_string()));
    let form = reqwest::multipart::Form::new().part(IMAGE_FIELD, part);

    let upstream = state
        .http
        .post(&state.config.predict_url)
        .multipart(form)
        .send()
        .await
        .map_err(|e| AppError::Upstream(format!("{}: {e}", state.config.predict_url)))?;

    let status = StatusCode::from_u16(upstream.status().as_u16())
        .map_err(|e| AppError::Upstream(e.to_string()))?;
    let body = upstream
        .bytes()
        .await
        .map_err(|e| AppError::Upstream(e.to_string()))?;

    tracing::debug!(status = %status, bytes = body.len(), "Relayed prediction response");

    Ok((status, [(CONTENT_TYPE, "application/json")], body).into_response())
}
