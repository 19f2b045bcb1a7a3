pub mod annotation;
pub mod detection;
pub mod health;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /annotations                                     save (POST), load (GET ?image=)
///
/// /detect                                          run detector on upload (POST)
/// /predict                                         proxy to prediction service (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(annotation::router())
        .merge(detection::router())
}
