//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::broadcast;

use coherence_core::config::constants::identity::STORAGE_KEY;
use coherence_core::stubs::{
    InMemoryIdentityStore, InMemoryMigrationChannel, InMemoryProgressStore,
    InMemoryRecoveryChannel, StubAuthGateway,
};
use coherence_core::traits::LocalIdentityStore;
use coherence_core::types::VisitorIdentity;
use coherence_core::{Clock, CoherenceSession, Config, EngineEvent, SessionDeps, TokioClock};

/// One simulated device talking to a (possibly shared) backend.
pub struct Harness {
    pub clock: Arc<dyn Clock>,
    pub store: Arc<InMemoryProgressStore>,
    pub auth: Arc<StubAuthGateway>,
    pub local: Arc<InMemoryIdentityStore>,
    pub migration: Arc<InMemoryMigrationChannel>,
    pub recovery: Arc<InMemoryRecoveryChannel>,
    pub session: Arc<CoherenceSession>,
}

pub fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
}

/// Default wall-clock start: mid-morning, far from any day boundary.
pub fn morning() -> DateTime<Utc> {
    at(2026, 3, 10, 9, 0, 0)
}

impl Harness {
    pub fn new(base: DateTime<Utc>) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(TokioClock::new(base));
        let store = Arc::new(InMemoryProgressStore::with_clock(clock.clone()));
        let recovery = Arc::new(InMemoryRecoveryChannel::with_clock(clock.clone()));
        Self::with_backend(clock, store, Arc::new(StubAuthGateway::new()), recovery)
    }

    /// Another device sharing the remote store and recovery channel.
    pub fn with_backend(
        clock: Arc<dyn Clock>,
        store: Arc<InMemoryProgressStore>,
        auth: Arc<StubAuthGateway>,
        recovery: Arc<InMemoryRecoveryChannel>,
    ) -> Self {
        let local = Arc::new(InMemoryIdentityStore::new());
        let migration = Arc::new(InMemoryMigrationChannel::new());
        let deps = SessionDeps {
            store: store.clone(),
            auth: auth.clone(),
            local: local.clone(),
            migration: migration.clone(),
            recovery: recovery.clone(),
            clock: clock.clone(),
        };
        let session = CoherenceSession::new(Config::default_config(), deps).unwrap();
        Self {
            clock,
            store,
            auth,
            local,
            migration,
            recovery,
            session,
        }
    }

    /// Pre-seed the local identity blob.
    pub fn seed_visitor(&self, visitor_id: &str) -> VisitorIdentity {
        let identity = VisitorIdentity {
            visitor_id: visitor_id.to_string(),
            visitor_token: "t".repeat(64),
        };
        self.local
            .write(STORAGE_KEY, &serde_json::to_string(&identity).unwrap())
            .unwrap();
        identity
    }
}

/// Let woken timer tasks run to completion.
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

/// Advance paused time one second at a time so every tick is observed.
pub async fn advance_secs(secs: u64) {
    for _ in 0..secs {
        tokio::time::advance(Duration::from_secs(1)).await;
        settle().await;
    }
}

pub fn drain(rx: &mut broadcast::Receiver<EngineEvent>) -> Vec<EngineEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
