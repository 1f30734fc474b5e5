//! CLI error types.

use cvs_api::ApiError;
use cvs_auth::AuthError;
use cvs_capacity::CapacityError;
use thiserror::Error;

/// Errors that end an invocation.
#[derive(Debug, Error)]
pub enum CliError {
    /// Missing or invalid settings.
    #[error("configuration error: {reason}")]
    Config {
        /// What is wrong.
        reason: String,
    },

    /// The alert payload could not be used.
    #[error("alert error: {reason}")]
    Alert {
        /// What is wrong.
        reason: String,
    },

    /// One or more volumes could not be resized.
    #[error("{failed} of {total} volume(s) failed")]
    PartialFailure {
        /// Volumes with a failed resize or sizing error.
        failed: usize,
        /// Volumes evaluated.
        total: usize,
    },

    /// Output formatting error.
    #[error("format error: {reason}")]
    Format {
        /// What failed.
        reason: String,
    },

    /// Credential or token failure.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Project resolution or client construction failure.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Planning or volume API failure.
    #[error(transparent)]
    Capacity(#[from] CapacityError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Creates a [`CliError::Config`] error.
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    /// Creates a [`CliError::Alert`] error.
    pub fn alert(reason: impl Into<String>) -> Self {
        Self::Alert {
            reason: reason.into(),
        }
    }
}
