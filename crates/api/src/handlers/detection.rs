//! Handler for running the external detector on an uploaded image.

use axum::extract::{Multipart, State};
use axum::Json;
use serde::Serialize;

use annotator_core::detection::{DetectionRegion, DetectionRequest};

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Multipart field carrying the image file.
pub const IMAGE_FIELD: &str = "image";

/// Optional multipart field overriding the image identity.
pub const IMAGE_NAME_FIELD: &str = "image_name";

/// Typed response for the detect endpoint.
#[derive(Debug, Serialize)]
pub struct DetectResponse {
    pub image_name: String,
    pub regions: Vec<DetectionRegion>,
}

/// An uploaded image extracted from a multipart body.
pub struct UploadedImage {
    pub bytes: Vec<u8>,
    pub filename: Option<String>,
}

/// Read the `image` file field and optional `image_name` text field.
pub async fn read_image_upload(
    multipart: &mut Multipart,
) -> AppResult<(Option<UploadedImage>, Option<String>)> {
    let mut image = None;
    let mut image_name = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some(IMAGE_FIELD) => {
                let filename = field.file_name().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                image = Some(UploadedImage {
                    bytes: bytes.to_vec(),
                    filename,
                });
            }
            Some(IMAGE_NAME_FIELD) => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                image_name = Some(text);
            }
            _ => {}
        }
    }

    Ok((image, image_name))
}

/// POST /detect
///
/// Run the detector on the uploaded `image`. The identity is the
/// `image_name` field when present, else the upload's filename.
pub async fn detect(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<Json<DataResponse<DetectResponse>>> {
    let (image, image_name) = read_image_upload(&mut multipart).await?;
    let image = image.ok_or_else(|| AppError::BadRequest("No image uploaded".to_string()))?;

    let image_name = image_name
        .filter(|n| !n.trim().is_empty())
        .or_else(|| image.filename.clone())
        .ok_or_else(|| AppError::BadRequest("image_name is required".to_string()))?;

    let cancel = state.shutdown.child_token();
    let regions = state
        .detector
        .detect(
            DetectionRequest {
                image_name: image_name.clone(),
                image: image.bytes,
                filename_hint: image.filename,
            },
            &cancel,
        )
        .await?;

    Ok(Json(DataResponse {
        data: DetectResponse {
            image_name,
            regions,
        },
    }))
}
