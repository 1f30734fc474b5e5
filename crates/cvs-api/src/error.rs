//! Error types for the API clients.

use cvs_auth::AuthError;
use thiserror::Error;

/// Result type for API client operations.
pub type Result<T> = std::result::Result<T, ApiError>;

/// Errors raised outside the [`cvs_capacity::VolumeClient`] calls.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The project could not be mapped to its numeric ID.
    #[error("cannot resolve project {project} to a project number: {reason}")]
    ProjectResolution {
        /// The requested project.
        project: String,
        /// Why resolution failed.
        reason: String,
    },

    /// The HTTP client could not be constructed.
    #[error("HTTP client error: {reason}")]
    Client {
        /// Description of the failure.
        reason: String,
    },

    /// A credential or token error.
    #[error(transparent)]
    Auth(#[from] AuthError),
}

impl ApiError {
    /// Creates an [`ApiError::ProjectResolution`] error.
    pub fn project_resolution(project: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ProjectResolution {
            project: project.into(),
            reason: reason.into(),
        }
    }

    /// Creates an [`ApiError::Client`] error.
    pub fn client(reason: impl Into<String>) -> Self {
        Self::Client {
            reason: reason.into(),
        }
    }
}
