use std::path::PathBuf;
use std::time::Duration;

use annotator_core::detection::DetectorConfig;

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8080`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `300`). Must exceed the
    /// detector timeout or slow detections surface as 408s.
    pub request_timeout_secs: u64,
    /// Directory holding one JSON file per annotated image.
    pub data_dir: PathBuf,
    /// Detector command line; the staged image path is appended.
    pub detector_command: String,
    /// Working directory for the detector process.
    pub detector_working_dir: Option<PathBuf>,
    /// Directory where detector inputs are staged.
    pub staging_dir: PathBuf,
    /// Detector timeout in seconds (default: `120`).
    pub detector_timeout_secs: u64,
    /// Maximum request body size in bytes (default: 20 MiB).
    pub max_upload_bytes: usize,
    /// Remote prediction endpoint for the `/predict` proxy.
    pub predict_url: String,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default                             |
    /// |-------------------------|-------------------------------------|
    /// | `HOST`                  | `0.0.0.0`                           |
    /// | `PORT`                  | `8080`                              |
    /// | `CORS_ORIGINS`          | `http://localhost:5173`             |
    /// | `REQUEST_TIMEOUT_SECS`  | `300`                               |
    /// | `ANNOTATION_DATA_DIR`   | `./data`                            |
    /// | `DETECTOR_COMMAND`      | `python3 python/autolabel.py`       |
    /// | `DETECTOR_WORKING_DIR`  | unset                               |
    /// | `DETECTOR_STAGING_DIR`  | `<temp dir>/annotator-staging`      |
    /// | `DETECTOR_TIMEOUT_SECS` | `120`                               |
    /// | `MAX_UPLOAD_BYTES`      | `20971520`                          |
    /// | `PREDICT_URL`           | `http://localhost:5000/predict`     |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "8080".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "300".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let data_dir = std::env::var("ANNOTATION_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data"));

        let detector_command = std::env::var("DETECTOR_COMMAND")
            .unwrap_or_else(|_| "python3 python/autolabel.py".into());

        let detector_working_dir = std::env::var("DETECTOR_WORKING_DIR")
            .ok()
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);

        let staging_dir = std::env::var("DETECTOR_STAGING_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| std::env::temp_dir().join("annotator-staging"));

        let detector_timeout_secs: u64 = std::env::var("DETECTOR_TIMEOUT_SECS")
            .unwrap_or_else(|_| "120".into())
            .parse()
            .expect("DETECTOR_TIMEOUT_SECS must be a valid u64");

        let max_upload_bytes: usize = std::env::var("MAX_UPLOAD_BYTES")
            .unwrap_or_else(|_| (20 * 1024 * 1024).to_string())
            .parse()
            .expect("MAX_UPLOAD_BYTES must be a valid usize");

        let predict_url = std::env::var("PREDICT_URL")
            .unwrap_or_else(|_| "http://localhost:5000/predict".into());

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            data_dir,
            detector_command,
            detector_working_dir,
            staging_dir,
            detector_timeout_secs,
            max_upload_bytes,
            predict_url,
        }
    }

    /// Detector settings derived from this configuration.
    ///
    /// Panics if `DETECTOR_COMMAND` is blank; this runs once at startup.
    pub fn detector_config(&self) -> DetectorConfig {
        let mut config = DetectorConfig::from_command_line(
            &self.detector_command,
            self.staging_dir.clone(),
            Duration::from_secs(self.detector_timeout_secs),
        )
        .unwrap_or_else(|e| panic!("Invalid DETECTOR_COMMAND: {e}"));
        config.working_directory = self.detector_working_dir.clone();
        config
    }
}
