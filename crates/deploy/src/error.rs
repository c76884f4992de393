//! Deployment error taxonomy.

use thiserror::Error;

/// Errors that can occur while building or applying in-cluster resources.
///
/// Consistency failures are caught at construction time, before anything is
/// sent to the API server; a taint/toleration or label/selector mismatch
/// must never surface later as a silent scheduling failure.
#[derive(Error, Debug)]
pub enum DeployError {
    /// Input rejected before any API server interaction.
    #[error("validation error: {0}")]
    Validation(String),

    /// Cross-component contract violated (taint/toleration, label/selector,
    /// limits below requests).
    #[error("consistency error: {0}")]
    Consistency(String),

    /// API server rejected the request.
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
