//! In-memory migration channel, recovery channel and local identity store.
//!
//! # TEST ONLY

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::error::{CoreResult, RecoveryError, StoreError};
use crate::traits::{LocalIdentityStore, MigrationChannel, RecoveryChannel};
use crate::types::{MigrationPayload, RecoveryGrant};

// ============================================================================
// LOCAL IDENTITY STORE
// ============================================================================

/// Key-value blob store held in memory.
#[derive(Debug, Default)]
pub struct InMemoryIdentityStore {
    blobs: DashMap<String, String>,
    unavailable: AtomicBool,
}

impl InMemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

impl LocalIdentityStore for InMemoryIdentityStore {
    fn read(&self, key: &str) -> CoreResult<Option<String>> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::ReadFailed("local storage unavailable".into()).into());
        }
        Ok(self.blobs.get(key).map(|b| b.value().clone()))
    }

    fn write(&self, key: &str, blob: &str) -> CoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::WriteFailed("local storage unavailable".into()).into());
        }
        self.blobs.insert(key.to_string(), blob.to_string());
        Ok(())
    }
}

// ============================================================================
// MIGRATION CHANNEL
// ============================================================================

/// Single-slot migration channel that records every hand-off.
#[derive(Debug, Default)]
pub struct InMemoryMigrationChannel {
    pending: Mutex<Option<MigrationPayload>>,
    handed_off: Mutex<Vec<(String, MigrationPayload)>>,
}

impl InMemoryMigrationChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `(target_uid, payload)` handed off so far.
    pub fn handed_off(&self) -> Vec<(String, MigrationPayload)> {
        self.handed_off.lock().clone()
    }
}

#[async_trait]
impl MigrationChannel for InMemoryMigrationChannel {
    async fn capture(&self, payload: MigrationPayload) -> CoreResult<()> {
        debug!(day = payload.day, score = payload.score, "migration payload captured");
        *self.pending.lock() = Some(payload);
        Ok(())
    }

    async fn pending(&self) -> CoreResult<Option<MigrationPayload>> {
        Ok(self.pending.lock().clone())
    }

    async fn hand_off(&self, target_uid: &str) -> CoreResult<Option<MigrationPayload>> {
        let taken = self.pending.lock().take();
        if let Some(payload) = &taken {
            self.handed_off
                .lock()
                .push((target_uid.to_string(), payload.clone()));
        }
        Ok(taken)
    }

    async fn discard(&self) -> CoreResult<()> {
        *self.pending.lock() = None;
        Ok(())
    }
}

// ============================================================================
// RECOVERY CHANNEL
// ============================================================================

#[derive(Debug, Clone)]
struct IssuedCode {
    uid: String,
    visitor_id: String,
    expires_at: DateTime<Utc>,
}

/// Recovery channel minting `{uid}.{nonce}` custom tokens.
#[derive(Debug)]
pub struct InMemoryRecoveryChannel {
    codes: DashMap<String, IssuedCode>,
    clock: Arc<dyn Clock>,
}

impl InMemoryRecoveryChannel {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        info!("Creating InMemoryRecoveryChannel (TEST ONLY)");
        Self {
            codes: DashMap::new(),
            clock,
        }
    }

    pub fn is_registered(&self, code: &str) -> bool {
        self.codes.contains_key(code)
    }
}

impl Default for InMemoryRecoveryChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecoveryChannel for InMemoryRecoveryChannel {
    async fn register(
        &self,
        code: &str,
        uid: &str,
        visitor_id: &str,
        expires_at: DateTime<Utc>,
    ) -> CoreResult<()> {
        self.codes.insert(
            code.to_string(),
            IssuedCode {
                uid: uid.to_string(),
                visitor_id: visitor_id.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn redeem(&self, code: &str) -> CoreResult<RecoveryGrant> {
        let issued = self
            .codes
            .get(code)
            .map(|c| c.value().clone())
            .ok_or(RecoveryError::Unknown)?;
        if self.clock.now() >= issued.expires_at {
            return Err(RecoveryError::Expired.into());
        }
        Ok(RecoveryGrant {
            credential_token: format!("{}.{}", issued.uid, Uuid::new_v4().simple()),
            visitor_id: issued.visitor_id,
            expires_at: issued.expires_at,
        })
    }
}
