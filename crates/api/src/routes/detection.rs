//! Route definitions for detection and the prediction proxy.

use axum::routing::post;
use axum::Router;

use crate::handlers::{detection, predict};
use crate::state::AppState;

/// Detection routes, mounted under `/api/v1`.
///
/// ```text
/// POST   /detect                                detect (multipart: image, image_name?)
/// POST   /predict                               predict (multipart: image)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/detect", post(detection::detect))
        .route("/predict", post(predict::predict))
}
