//! Detector invoker: one staged, time-bounded detector run per request.
//!
//! Lifecycle of a run:
//! 1. Stage the image under a unique name in the staging directory.
//! 2. Launch the detector with the staged path as its last argument.
//! 3. Wait for exit, timeout, or cancellation, capturing combined output.
//! 4. Extract the region list from the output.
//! 5. Remove the staged file, whatever the outcome.

use std::path::PathBuf;
use std::time::Duration;

use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::contract::{extract_regions, DetectionRegion};
use super::error::{DetectError, FailureReason};
use super::process::{run_combined, CapturedRun, RunOutcome};
use super::staging::{staging_extension, StagedImage};
use crate::identity::validate_identity;

/// How to launch the detector.
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Executable to run (e.g. `python3`).
    pub program: String,
    /// Arguments placed before the staged image path.
    pub args: Vec<String>,
    /// Working directory for the child process (inherits if `None`).
    pub working_directory: Option<PathBuf>,
    /// Directory where input images are staged.
    pub staging_dir: PathBuf,
    /// Maximum wall-clock time before the detector is killed.
    pub timeout: Duration,
}

impl DetectorConfig {
    /// Build a config from a whitespace-separated command line such as
    /// `python3 python/autolabel.py`.
    pub fn from_command_line(
        command: &str,
        staging_dir: PathBuf,
        timeout: Duration,
    ) -> Result<Self, DetectError> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts.next().ok_or_else(|| {
            DetectError::InvalidRequest("detector command must not be empty".to_string())
        })?;
        Ok(Self {
            program,
            args: parts.collect(),
            working_directory: None,
            staging_dir,
            timeout,
        })
    }
}

/// Input to one detection run. Lives only for the duration of the run.
#[derive(Debug, Clone)]
pub struct DetectionRequest {
    /// Identity of the image being detected.
    pub image_name: String,
    /// Raw image bytes.
    pub image: Vec<u8>,
    /// Original upload filename, used to pick the staged extension.
    pub filename_hint: Option<String>,
}

/// Runs the external detector.
pub struct DetectorInvoker {
    config: DetectorConfig,
}

impl DetectorInvoker {
    /// Create an invoker, creating the staging directory if needed.
    ///
    /// The staging directory is canonicalized so the staged path stays
    /// valid when the detector runs in a different working directory.
    pub async fn new(mut config: DetectorConfig) -> Result<Self, DetectError> {
        tokio::fs::create_dir_all(&config.staging_dir)
            .await
            .map_err(|source| DetectError::Stage {
                path: config.staging_dir.clone(),
                source,
            })?;
        config.staging_dir = tokio::fs::canonicalize(&config.staging_dir)
            .await
            .map_err(|source| DetectError::Stage {
                path: config.staging_dir.clone(),
                source,
            })?;
        Ok(Self { config })
    }

    /// Run the detector on `request`'s image and return the regions it found.
    pub async fn detect(
        &self,
        request: DetectionRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<DetectionRegion>, DetectError> {
        validate_identity(&request.image_name)
            .map_err(|e| DetectError::InvalidRequest(e.to_string()))?;
        if request.image.is_empty() {
            return Err(DetectError::InvalidRequest(
                "image payload is empty".to_string(),
            ));
        }

        let invocation_id = Uuid::now_v7();
        let extension = staging_extension(request.filename_hint.as_deref());
        let staged = StagedImage::write(
            &self.config.staging_dir,
            invocation_id,
            extension,
            &request.image,
        )
        .await?;

        let result = self.run(&staged, invocation_id, cancel).await;
        staged.release().await;

        match &result {
            Ok(regions) => tracing::info!(
                %invocation_id,
                image_name = %request.image_name,
                regions = regions.len(),
                "Detection completed"
            ),
            Err(e) => tracing::warn!(
                %invocation_id,
                image_name = %request.image_name,
                error = %e,
                "Detection failed"
            ),
        }
        result
    }

    async fn run(
        &self,
        staged: &StagedImage,
        invocation_id: Uuid,
        cancel: &CancellationToken,
    ) -> Result<Vec<DetectionRegion>, DetectError> {
        let mut cmd = Command::new(&self.config.program);
        cmd.args(&self.config.args).arg(staged.path());
        if let Some(dir) = &self.config.working_directory {
            cmd.current_dir(dir);
        }

        tracing::debug!(
            %invocation_id,
            program = %self.config.program,
            staged = %staged.path().display(),
            "Launching detector"
        );

        let run = run_combined(&mut cmd, self.config.timeout, cancel)
            .await
            .map_err(|source| DetectError::Launch {
                program: self.config.program.clone(),
                source,
            })?;

        tracing::debug!(
            %invocation_id,
            outcome = ?run.outcome,
            duration_ms = run.duration.as_millis() as u64,
            output_bytes = run.output.len(),
            "Detector finished"
        );
        if run.truncated {
            tracing::warn!(
                %invocation_id,
                kept_bytes = run.output.len(),
                "Detector output exceeded the capture limit; earlier lines were discarded"
            );
        }

        self.interpret(run)
    }

    fn interpret(&self, run: CapturedRun) -> Result<Vec<DetectionRegion>, DetectError> {
        let output = run.output_lossy();
        let reason = match run.outcome {
            RunOutcome::Exited(status) if status.success() => {
                return extract_regions(&output)
                    .map_err(|failure| DetectError::ParseFailed { failure, output });
            }
            RunOutcome::Exited(status) => match status.code() {
                Some(code) => FailureReason::Exited(code),
                None => FailureReason::Signalled,
            },
            RunOutcome::TimedOut => FailureReason::TimedOut(self.config.timeout),
            RunOutcome::Cancelled => FailureReason::Cancelled,
        };
        Err(DetectError::DetectorFailed { reason, output })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
