//! Error types for capacity planning and volume access.

use thiserror::Error;

/// Result type for capacity operations.
pub type Result<T> = std::result::Result<T, CapacityError>;

/// Errors that can occur while planning or applying a resize.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CapacityError {
    /// Policy parameters are out of range.
    #[error("invalid policy: {reason}")]
    InvalidPolicy {
        /// Description of why the policy is invalid.
        reason: String,
    },

    /// The sizing formula produced no usable size.
    #[error("capacity model error: {reason}")]
    CapacityModel {
        /// Description of the degenerate input.
        reason: String,
    },

    /// A volume list/get/patch call failed.
    #[error("upstream API error during {operation}: {reason}")]
    UpstreamApi {
        /// The operation that failed.
        operation: String,
        /// HTTP status, if a response was received.
        status: Option<u16>,
        /// Description of the failure.
        reason: String,
    },

    /// The volume does not exist in the given region.
    #[error("volume {volume_id} not found in region {region}")]
    VolumeNotFound {
        /// Region searched.
        region: String,
        /// Volume identifier.
        volume_id: String,
    },
}

impl CapacityError {
    /// Creates an [`CapacityError::InvalidPolicy`] error.
    pub fn invalid_policy(reason: impl Into<String>) -> Self {
        Self::InvalidPolicy {
            reason: reason.into(),
        }
    }

    /// Creates a [`CapacityError::CapacityModel`] error.
    pub fn capacity_model(reason: impl Into<String>) -> Self {
        Self::CapacityModel {
            reason: reason.into(),
        }
    }

    /// Creates an [`CapacityError::UpstreamApi`] error.
    pub fn upstream(operation: impl Into<String>, status: Option<u16>, reason: impl Into<String>) -> Self {
        Self::UpstreamApi {
            operation: operation.into(),
            status,
            reason: reason.into(),
        }
    }
}
