pub mod annotation;
pub mod detection;
pub mod predict;
