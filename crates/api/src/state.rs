use std::sync::Arc;

use annotator_core::detection::DetectorInvoker;
use annotator_core::service::AnnotationService;
use tokio_util::sync::CancellationToken;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Annotation save/load service.
    pub annotations: AnnotationService,
    /// External detector invoker.
    pub detector: Arc<DetectorInvoker>,
    /// HTTP client for the prediction proxy.
    pub http: reqwest::Client,
    /// Cancelled on shutdown; in-flight detections derive child tokens.
    pub shutdown: CancellationToken,
}
