//! Migration and recovery channels, plus the local identity blob store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::CoreResult;
use crate::types::{MigrationPayload, RecoveryGrant};

/// Holds progress captured before a risky identity operation and hands it
/// to an external migration step.
#[async_trait]
pub trait MigrationChannel: Send + Sync {
    /// Store the payload, replacing any earlier capture.
    async fn capture(&self, payload: MigrationPayload) -> CoreResult<()>;

    /// Currently captured payload.
    async fn pending(&self) -> CoreResult<Option<MigrationPayload>>;

    /// Hand the pending payload to the migration step targeting `target_uid`.
    ///
    /// # Returns
    /// The payload that was handed off, `None` if nothing was captured.
    async fn hand_off(&self, target_uid: &str) -> CoreResult<Option<MigrationPayload>>;

    /// Drop the pending payload without migrating it.
    async fn discard(&self) -> CoreResult<()>;
}

/// Exchanges short human-readable codes for a short-lived credential plus
/// the visitor it belongs to.
#[async_trait]
pub trait RecoveryChannel: Send + Sync {
    /// Register a freshly issued code.
    async fn register(
        &self,
        code: &str,
        uid: &str,
        visitor_id: &str,
        expires_at: DateTime<Utc>,
    ) -> CoreResult<()>;

    /// Redeem a code.
    ///
    /// # Errors
    /// - `RecoveryError::Unknown` / `RecoveryError::Expired`
    async fn redeem(&self, code: &str) -> CoreResult<RecoveryGrant>;
}

/// Durable local key-value storage for the identity blob.
pub trait LocalIdentityStore: Send + Sync {
    /// Raw blob under `key`, `None` if absent.
    fn read(&self, key: &str) -> CoreResult<Option<String>>;

    /// Replace the blob under `key`.
    fn write(&self, key: &str, blob: &str) -> CoreResult<()>;
}
