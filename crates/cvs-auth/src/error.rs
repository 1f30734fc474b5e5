//! Error types for credential resolution and token handling.

use thiserror::Error;

/// Result type alias for auth operations.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Errors that can occur while resolving credentials or minting tokens.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The credential identifier is not a key file, base64 key, or principal,
    /// or the key material it points at is unusable.
    #[error("invalid credential: {reason}")]
    CredentialFormat {
        /// Why the credential was rejected.
        reason: String,
    },

    /// Signing or refreshing a token failed.
    #[error("token refresh failed: {reason}")]
    TokenRefresh {
        /// Why the refresh failed.
        reason: String,
    },

    /// The platform metadata server could not be queried.
    #[error("metadata server unavailable: {reason}")]
    MetadataUnavailable {
        /// Why the metadata query failed.
        reason: String,
    },
}

impl AuthError {
    /// Creates a [`AuthError::CredentialFormat`] error.
    pub fn credential_format(reason: impl Into<String>) -> Self {
        Self::CredentialFormat {
            reason: reason.into(),
        }
    }

    /// Creates a [`AuthError::TokenRefresh`] error.
    pub fn token_refresh(reason: impl Into<String>) -> Self {
        Self::TokenRefresh {
            reason: reason.into(),
        }
    }

    /// Creates a [`AuthError::MetadataUnavailable`] error.
    pub fn metadata_unavailable(reason: impl Into<String>) -> Self {
        Self::MetadataUnavailable {
            reason: reason.into(),
        }
    }

    /// Returns true if the error must abort the invocation.
    ///
    /// Metadata unavailability is expected off-platform and callers fall back.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !matches!(self, Self::MetadataUnavailable { .. })
    }
}
