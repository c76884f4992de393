//! Provisioning error taxonomy.

use thiserror::Error;

use trainstack_common::InvalidBounds;

/// Errors that can occur while provisioning cloud resources.
///
/// Validation failures are raised before any provider call is made; provider
/// rejections are propagated unchanged, never retried or masked.
#[derive(Error, Debug)]
pub enum ProvisionError {
    /// Input rejected before any provider interaction.
    #[error("validation error: {0}")]
    Validation(String),

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Resource not found.
    #[error("resource not found: {0}")]
    NotFound(String),

    /// Operation timed out.
    #[error("operation timed out after {0} seconds")]
    Timeout(u64),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<InvalidBounds> for ProvisionError {
    fn from(err: InvalidBounds) -> Self {
        Self::Validation(err.to_string())
    }
}
