//! Route definitions for annotation persistence.

use axum::routing::get;
use axum::Router;

use crate::handlers::annotation;
use crate::state::AppState;

/// Annotation routes, mounted under `/api/v1`.
///
/// ```text
/// GET    /annotations?image={identity}          load_annotations
/// POST   /annotations                           save_annotation
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route(
        "/annotations",
        get(annotation::load_annotations).post(annotation::save_annotation),
    )
}
