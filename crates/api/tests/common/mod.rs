//! Shared helpers for API integration tests.
//!
//! Each test app gets its own temp directory holding the annotation store,
//! the staging directory, and a bash script standing in for the detector.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use annotator_api::config::ServerConfig;
use annotator_api::router::{build_app_router, build_app_state};

/// Multipart boundary used by [`post_multipart`].
pub const BOUNDARY: &str = "annotator-test-boundary";

/// A router plus the temp directory backing it.
pub struct TestApp {
    pub router: Router,
    pub dir: tempfile::TempDir,
    pub shutdown: CancellationToken,
}

impl TestApp {
    pub fn app(&self) -> Router {
        self.router.clone()
    }

    pub fn data_dir(&self) -> std::path::PathBuf {
        self.dir.path().join("data")
    }

    pub fn staging_dir(&self) -> std::path::PathBuf {
        self.dir.path().join("staging")
    }
}

/// Build a test `ServerConfig` rooted in `root`, running `detector_script`
/// with bash.
pub fn test_config(root: &std::path::Path, detector_script: &std::path::Path) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        data_dir: root.join("data"),
        detector_command: format!("bash {}", detector_script.display()),
        detector_working_dir: None,
        staging_dir: root.join("staging"),
        detector_timeout_secs: 5,
        max_upload_bytes: 1024 * 1024,
        // Nothing listens on port 9 (discard) in the test environment.
        predict_url: "http://127.0.0.1:9/predict".to_string(),
    }
}

/// Build the full application router with `detector_body` as the detector
/// script (a `#!/bin/bash` line is prepended).
pub async fn build_test_app(detector_body: &str) -> TestApp {
    build_test_app_with(detector_body, |_| {}).await
}

/// Like [`build_test_app`], letting the caller adjust the config first.
pub async fn build_test_app_with(
    detector_body: &str,
    configure: impl FnOnce(&mut ServerConfig),
) -> TestApp {
    let dir = tempfile::tempdir().expect("create temp dir");
    let script = dir.path().join("detector.sh");
    std::fs::write(&script, format!("#!/bin/bash\n{detector_body}")).expect("write detector");

    let mut config = test_config(dir.path(), &script);
    configure(&mut config);

    let shutdown = CancellationToken::new();
    let state = build_app_state(config, shutdown.clone())
        .await
        .expect("build app state");

    TestApp {
        router: build_app_router(state),
        dir,
        shutdown,
    }
}

/// Send a GET request.
pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// Send a POST request with a JSON body.
pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// A multipart part: `(field name, optional filename, bytes)`.
pub type Part<'a> = (&'a str, Option<&'a str>, &'a [u8]);

/// Encode `parts` as a `multipart/form-data` body using [`BOUNDARY`].
pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, filename, bytes) in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match filename {
            Some(filename) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n"
                    )
                    .as_bytes(),
                );
            }
            None => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                );
            }
        }
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

/// Send a POST request with a multipart body.
pub async fn post_multipart(app: Router, uri: &str, parts: &[Part<'_>]) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(parts)))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
