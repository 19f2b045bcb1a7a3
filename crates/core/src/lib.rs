//! Domain logic for the annotation service.
//!
//! Holds the annotation data model, the file-backed annotation store, the
//! validating service in front of it, and the external detector invoker.
//! Nothing in this crate knows about HTTP.

pub mod annotation;
pub mod detection;
pub mod error;
pub mod identity;
pub mod service;
pub mod store;
