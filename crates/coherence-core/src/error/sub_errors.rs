//! Sub-error types for coherence-core.
//!
//! Each error type covers a specific collaborator's failures.

use thiserror::Error;

use crate::types::CredentialKind;

// ============================================================================
// STORE ERROR
// ============================================================================

/// Remote progress store and local identity store failures.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Network or backend unavailable. Transient by nature.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Write rejected or lost in transit.
    #[error("Write failed: {0}")]
    WriteFailed(String),

    /// Read failed.
    #[error("Read failed: {0}")]
    ReadFailed(String),

    /// Partial update targeted a record that does not exist.
    #[error("Record not found: {collection}/{id}")]
    NotFound {
        /// Collection name
        collection: String,
        /// Document id
        id: String,
    },

    /// Stored blob could not be decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

// ============================================================================
// AUTH ERROR
// ============================================================================

/// Authentication gateway failures.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The durable credential is already bound to another principal.
    ///
    /// # Recovery
    ///
    /// Sign in to the existing principal, or rely on the captured
    /// migration payload.
    #[error("Credential {kind:?} already bound to principal {existing_uid}")]
    Collision {
        /// Credential kind that collided
        kind: CredentialKind,
        /// The principal already holding the credential
        existing_uid: String,
    },

    /// The provider rejected the credential payload.
    #[error("Credential rejected: {0}")]
    Rejected(String),

    /// No principal is signed in.
    #[error("No active principal")]
    NoPrincipal,

    /// Provider unreachable.
    #[error("Auth provider unavailable: {0}")]
    Unavailable(String),
}

// ============================================================================
// RECOVERY ERROR
// ============================================================================

/// Recovery-code exchange failures. All variants are user-actionable.
#[derive(Debug, Error)]
pub enum RecoveryError {
    /// Code does not match the expected shape.
    #[error("Recovery code malformed: {0}")]
    Malformed(String),

    /// Code is well formed but unknown to the recovery channel.
    #[error("Recovery code not recognised")]
    Unknown,

    /// Code was issued but has expired.
    #[error("Recovery code expired")]
    Expired,

    /// Recovery service unreachable.
    #[error("Recovery service unavailable: {0}")]
    Unavailable(String),
}
