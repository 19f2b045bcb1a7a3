//! Handlers for saving and loading image annotations.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use annotator_core::annotation::{Annotation, AnnotationRecord};

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// Query parameters for loading annotations.
#[derive(Debug, Deserialize)]
pub struct LoadParams {
    /// Image identity whose collection to return.
    #[serde(default)]
    pub image: String,
}

/// POST /annotations
///
/// Validate one annotation record and append it to its image's collection.
pub async fn save_annotation(
    State(state): State<AppState>,
    Json(record): Json<AnnotationRecord>,
) -> AppResult<impl IntoResponse> {
    let annotation = state.annotations.save(record).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: annotation })))
}

/// GET /annotations?image={identity}
///
/// Return every annotation saved for the image, in save order.
pub async fn load_annotations(
    State(state): State<AppState>,
    Query(params): Query<LoadParams>,
) -> AppResult<Json<DataResponse<Vec<Annotation>>>> {
    let annotations = state.annotations.load(&params.image).await?;
    Ok(Json(DataResponse { data: annotations }))
}
