use std::path::PathBuf;
use std::time::Duration;

use super::contract::ParseFailure;

/// How a detector run ended without producing usable output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// Exited with a non-zero status code.
    Exited(i32),
    /// Terminated by a signal (no exit code).
    Signalled,
    /// Killed after exceeding the configured timeout.
    TimedOut(Duration),
    /// Killed because the caller cancelled the run.
    Cancelled,
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exited(code) => write!(f, "exited with code {code}"),
            Self::Signalled => write!(f, "terminated by signal"),
            Self::TimedOut(after) => write!(f, "timed out after {}ms", after.as_millis()),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Errors from a detection run.
///
/// Failures after launch carry the full captured output for operators.
/// It is deliberately left out of the `Display` text.
#[derive(Debug, thiserror::Error)]
pub enum DetectError {
    #[error("Invalid detection request: {0}")]
    InvalidRequest(String),

    #[error("Failed to stage image at {}: {source}", path.display())]
    Stage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to launch detector '{program}': {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Detector {reason}")]
    DetectorFailed { reason: FailureReason, output: String },

    #[error("Detector output unusable: {failure}")]
    ParseFailed { failure: ParseFailure, output: String },
}

impl DetectError {
    /// Captured detector output, when the detector got far enough to run.
    pub fn captured_output(&self) -> Option<&str> {
        match self {
            Self::DetectorFailed { output, .. } | Self::ParseFailed { output, .. } => Some(output),
            _ => None,
        }
    }
}
