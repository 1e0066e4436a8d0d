// crates/noesis-engine/src/config/mod.rs
// Configuration and shared constants

pub mod env;

pub use env::{ConfigValidation, EnvConfig, DEFAULT_WORKFLOW_WORKERS};
