//! Parsing of the detector's human-formatted output.
//!
//! The detector may log anything it likes on stdout/stderr. Its result is
//! the last line whose trimmed text looks like a JSON array; that line is
//! decoded as a list of string-keyed objects. The objects have no fixed
//! schema here because the detector owns it.

use serde_json::{Map, Value};

/// One detected region: arbitrary string-keyed fields as emitted.
pub type DetectionRegion = Map<String, Value>;

/// Why detector output could not be turned into regions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseFailure {
    /// No output line looks like a JSON array.
    #[error("detector output contains no JSON array line")]
    NoCandidate,

    /// The candidate line is not a JSON array of objects.
    #[error("detector result line is not a JSON array of objects: {message}")]
    MalformedJson {
        candidate_line: String,
        message: String,
    },
}

impl ParseFailure {
    /// Stable short name for logs and error codes.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::NoCandidate => "no_candidate",
            Self::MalformedJson { .. } => "malformed_json",
        }
    }
}

/// Select the line holding the detector's result.
///
/// Scans from the last line to the first and returns the first trimmed line
/// that starts with `[` and ends with `]`. When no line has both brackets,
/// the last line starting with `[` is returned so a truncated payload is
/// reported as malformed rather than missing.
pub fn find_candidate_line(output: &str) -> Option<&str> {
    let mut truncated = None;
    for line in output.lines().rev().map(str::trim) {
        if !line.starts_with('[') {
            continue;
        }
        if line.ends_with(']') {
            return Some(line);
        }
        truncated.get_or_insert(line);
    }
    truncated
}

/// Extract detection regions from captured detector output.
pub fn extract_regions(output: &str) -> Result<Vec<DetectionRegion>, ParseFailure> {
    let line = find_candidate_line(output).ok_or(ParseFailure::NoCandidate)?;
    serde_json::from_str::<Vec<DetectionRegion>>(line).map_err(|e| ParseFailure::MalformedJson {
        candidate_line: line.to_string(),
        message: e.to_string(),
    })
}
