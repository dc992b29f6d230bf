//! Orchestrator error types.

use super::validate::ValidationErrors;
use crate::cycles::CycleError;
use crate::plc::{PlcStatus, TransportError};
use thiserror::Error;

/// Failures that end a run before any path is tested.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RunError {
    #[error("model is not testable: {0}")]
    Validation(ValidationErrors),

    #[error("cannot generate test paths: {0}")]
    CycleGeneration(#[from] CycleError),

    #[error("connection failed: {0}")]
    Connection(#[from] TransportError),

    #[error("PLC is not in RUN mode (status {0})")]
    NotInRunMode(PlcStatus),
}

/// Errors loading a [`TestConfig`](super::TestConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Json(#[from] serde_json::Error),
}
