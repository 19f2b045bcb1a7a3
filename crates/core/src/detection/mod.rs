//! External detector invocation.
//!
//! A detection run stages the uploaded image under a per-invocation name,
//! launches the configured detector with that path as its last argument,
//! captures combined stdout/stderr, and extracts the region list from the
//! last bracket-shaped line of output. All subprocess handling is pure (no
//! HTTP) and lives here for isolation and testability.

pub mod contract;
pub mod error;
pub mod invoker;
pub mod process;
pub mod staging;

pub use contract::{extract_regions, DetectionRegion, ParseFailure};
pub use error::{DetectError, FailureReason};
pub use invoker::{DetectionRequest, DetectorConfig, DetectorInvoker};
