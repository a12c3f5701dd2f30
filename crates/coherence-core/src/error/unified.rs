//! Top-level error type for the coherence engine.

use thiserror::Error;

use super::sub_errors::{AuthError, RecoveryError, StoreError};

/// Top-level error type for coherence-core.
///
/// Sub-errors convert via `From`, so collaborators can return their own
/// error type and callers still propagate with `?`.
///
/// # Recoverability
///
/// Nothing in this subsystem is fatal. Errors are classified as:
/// - Recoverable: a later trigger or a caller decision can resolve it
///   (transient store failures, identity collisions)
/// - User-actionable: the user has to supply something different
///   (bad recovery code)
#[derive(Debug, Error)]
pub enum CoreError {
    /// Remote or local store failure.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Authentication failure, including identity collisions.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Recovery-code failure.
    #[error("Recovery error: {0}")]
    Recovery(#[from] RecoveryError),

    /// Privileged operation attempted without the admin role.
    #[error("Permission denied: {operation} requires admin role")]
    PermissionDenied {
        /// Name of the rejected operation
        operation: String,
    },

    /// Operation requires an established session.
    #[error("Session not established")]
    NotEstablished,

    /// Configuration is invalid or missing.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A field value failed validation constraints.
    #[error("Validation error: {field} - {message}")]
    ValidationError {
        /// Offending field
        field: String,
        /// What was wrong with it
        message: String,
    },

    /// Serialization error.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Internal error indicating a bug.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Check if a later attempt (another trigger, another caller choice)
    /// might succeed.
    #[inline]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Store(StoreError::Unavailable(_))
                | Self::Store(StoreError::WriteFailed(_))
                | Self::Store(StoreError::ReadFailed(_))
                | Self::Auth(AuthError::Collision { .. })
                | Self::Auth(AuthError::Unavailable(_))
                | Self::Recovery(RecoveryError::Unavailable(_))
        )
    }

    /// Check if the error should be shown to the user as something they
    /// can fix themselves.
    #[inline]
    pub fn is_user_actionable(&self) -> bool {
        matches!(
            self,
            Self::Recovery(RecoveryError::Malformed(_))
                | Self::Recovery(RecoveryError::Unknown)
                | Self::Recovery(RecoveryError::Expired)
                | Self::Auth(AuthError::Rejected(_))
        )
    }

    /// Check if this is an identity collision.
    #[inline]
    pub fn is_collision(&self) -> bool {
        matches!(self, Self::Auth(AuthError::Collision { .. }))
    }

    /// Shorthand for a validation error.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValidationError {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Result type alias for core operations.
pub type CoreResult<T> = std::result::Result<T, CoreError>;
