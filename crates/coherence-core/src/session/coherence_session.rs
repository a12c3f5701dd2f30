//! CoherenceSession: one explicit orchestrator per client session.

use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::single_flight::SingleFlight;
use super::timers::{TimerPurpose, TimerSet};
use crate::clock::Clock;
use crate::coherence::{CoherenceEngine, EngineEvent, LoadOutcome};
use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use crate::identity::{recovery_code, IdentityAnchor, IdentitySession};
use crate::rollover::RolloverScheduler;
use crate::sync::{SyncCoordinator, SyncTrigger};
use crate::traits::{
    AuthGateway, LocalIdentityStore, MigrationChannel, RecoveryChannel, RemoteProgressStore,
};
use crate::types::{
    CoherenceState, CredentialKind, MigrationPayload, Principal, ProgressPatch, ProgressRecord,
    RecordKey, SyncCursor, VisitorIdentity,
};

const EVENT_CAPACITY: usize = 64;

/// External collaborators of a session.
#[derive(Clone)]
pub struct SessionDeps {
    pub store: Arc<dyn RemoteProgressStore>,
    pub auth: Arc<dyn AuthGateway>,
    pub local: Arc<dyn LocalIdentityStore>,
    pub migration: Arc<dyn MigrationChannel>,
    pub recovery: Arc<dyn RecoveryChannel>,
    pub clock: Arc<dyn Clock>,
}

/// Result of establishing a session.
#[derive(Debug, Clone, PartialEq)]
pub struct Established {
    pub principal: Principal,
    pub identity: VisitorIdentity,
    pub key: RecordKey,
    /// No record existed and a fresh one was written.
    pub created: bool,
    pub load: LoadOutcome,
}

/// Owns the engine, the coordinator, the timers and the event channel for
/// one client session.
///
/// Construct with [`CoherenceSession::new`], share by `Arc`, call
/// [`CoherenceSession::establish`] to resolve identity and start timers, and
/// [`CoherenceSession::shutdown`] to stop them with a final flush.
pub struct CoherenceSession {
    config: Config,
    deps: SessionDeps,
    identity: IdentitySession,
    anchor: IdentityAnchor,
    engine: Mutex<CoherenceEngine>,
    coordinator: SyncCoordinator,
    timers: TimerSet,
    gate: SingleFlight<Established>,
    active: RwLock<Option<Established>>,
    events: broadcast::Sender<EngineEvent>,
}

impl std::fmt::Debug for CoherenceSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoherenceSession")
            .field("engine", &*self.engine.lock())
            .field("active", &*self.active.read())
            .field("timers", &self.timers)
            .finish_non_exhaustive()
    }
}

impl CoherenceSession {
    /// Build a session. Nothing runs until [`CoherenceSession::establish`].
    ///
    /// # Errors
    /// `ConfigError` if `config` fails validation.
    pub fn new(config: Config, deps: SessionDeps) -> CoreResult<Arc<Self>> {
        config.validate()?;
        let now = deps.clock.now();
        let identity = IdentitySession::new(deps.local.clone(), config.identity.storage_key.clone());
        let anchor = IdentityAnchor::new(deps.store.clone(), deps.clock.clone());
        let engine = CoherenceEngine::new(config.engine.clone(), config.rollover.clone(), now);
        let coordinator = SyncCoordinator::new(deps.store.clone(), config.sync.clone());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Ok(Arc::new(Self {
            config,
            deps,
            identity,
            anchor,
            engine: Mutex::new(engine),
            coordinator,
            timers: TimerSet::new(),
            gate: SingleFlight::new(),
            active: RwLock::new(None),
            events,
        }))
    }

    // ========================================================================
    // LIFECYCLE
    // ========================================================================

    /// Resolve the principal and visitor, load (or create) the record and
    /// arm every timer.
    ///
    /// Single-flight: concurrent callers share one run, and later callers
    /// get the cached result until the session is torn down.
    pub async fn establish(self: &Arc<Self>) -> CoreResult<Established> {
        let this = Arc::clone(self);
        self.gate.run(move || async move { this.establish_inner().await }).await
    }

    async fn establish_inner(self: Arc<Self>) -> CoreResult<Established> {
        let principal = match self.deps.auth.current().await {
            Some(p) => p,
            None => self.deps.auth.sign_in_anonymous().await?,
        };

        let reconciliation = self.anchor.reconcile(&principal, &self.identity).await?;
        if let Some(previous) = &reconciliation.replaced {
            self.emit(EngineEvent::IdentityReplaced {
                previous_visitor_id: previous.clone(),
                visitor_id: reconciliation.identity.visitor_id.clone(),
            });
        }

        let key = RecordKey::resolve(&principal, &reconciliation.identity);
        let now = self.now();
        let (record, created) = match self.deps.store.get(key.collection, &key.id).await? {
            Some(record) => (record, false),
            None => {
                let fresh = ProgressRecord::new(now, self.config.engine.initial_score);
                self.deps
                    .store
                    .set(key.collection, &key.id, fresh.clone())
                    .await?;
                info!(key = %key, "Created progress record");
                (fresh, true)
            }
        };

        let load = self.engine.lock().load(record, principal.clone(), now);

        if let Some(patch) = &load.anchor_patch {
            match self.deps.store.update(key.collection, &key.id, patch.clone()).await {
                Ok(()) => {
                    let is_anchored = patch.is_anchored.unwrap_or(false);
                    info!(key = %key, is_anchored, "Healed stored anchoring");
                    self.emit(EngineEvent::AnchorHealed { is_anchored });
                }
                Err(e) => warn!(key = %key, error = %e, "Anchoring heal not persisted"),
            }
        }
        if let Some(transition) = &load.transition {
            self.emit(EngineEvent::StateChanged(transition.clone()));
        }

        let snapshot = self.engine.lock().snapshot();
        self.coordinator.reset(&snapshot, now);

        let established = Established {
            principal,
            identity: reconciliation.identity,
            key,
            created,
            load,
        };
        *self.active.write() = Some(established.clone());
        self.arm_timers();

        info!(
            key = %established.key,
            uid = %established.principal.uid,
            score = established.load.score,
            state = %established.load.state,
            day = established.load.day,
            created,
            "Session established"
        );
        Ok(established)
    }

    /// Stop every timer, flush once more and forget the active identity.
    ///
    /// # Returns
    /// Whether the teardown flush reached the store. `false` when nothing
    /// was established.
    pub async fn shutdown(&self) -> bool {
        self.timers.abort_all();
        let flushed = if self.is_established() {
            self.flush(SyncTrigger::Teardown).await
        } else {
            false
        };
        *self.active.write() = None;
        self.coordinator.clear();
        self.gate.invalidate().await;
        debug!(flushed, "Session torn down");
        flushed
    }

    /// Tear down and sign out. The local visitor identity survives.
    pub async fn sign_out(&self) -> CoreResult<()> {
        self.shutdown().await;
        self.deps.auth.sign_out().await?;
        info!("Signed out");
        Ok(())
    }

    async fn restart(self: &Arc<Self>) -> CoreResult<Established> {
        self.shutdown().await;
        self.establish().await
    }

    // ========================================================================
    // SYNC TRIGGERS
    // ========================================================================

    /// Visibility changed. Losing visibility flushes immediately.
    pub async fn on_visibility_change(&self, visible: bool) -> bool {
        if visible {
            return false;
        }
        self.flush(SyncTrigger::VisibilityLoss).await
    }

    /// Client is unloading. Fire-and-forget: the flush may not complete
    /// before the process goes away.
    pub fn on_unload(self: &Arc<Self>) -> JoinHandle<bool> {
        let this = Arc::clone(self);
        tokio::spawn(async move { this.flush(SyncTrigger::Unload).await })
    }

    /// Evaluate a trigger against the sync cursor and flush if it passes.
    pub async fn poll(&self, trigger: SyncTrigger) -> bool {
        if !self.is_established() {
            return false;
        }
        let snapshot = self.engine.lock().snapshot();
        let decision = self.coordinator.evaluate(trigger, &snapshot, self.now());
        if decision.should_flush() {
            self.flush(trigger).await
        } else {
            false
        }
    }

    /// Write the current snapshot. Failures are reported as an event and
    /// otherwise dropped.
    pub async fn flush(&self, trigger: SyncTrigger) -> bool {
        let Some(key) = self.active_key() else {
            debug!(trigger = %trigger, "No established session; flush skipped");
            return false;
        };
        let snapshot = self.engine.lock().snapshot();
        let (score, state, day) = (
            snapshot.coherence_score,
            snapshot.coherence_state,
            snapshot.day_progress,
        );

        match self.coordinator.flush(&key, snapshot, trigger, self.now()).await {
            Ok(()) => {
                self.emit(EngineEvent::Flushed {
                    trigger,
                    score,
                    state,
                    day,
                });
                true
            }
            Err(e) => {
                self.emit(EngineEvent::FlushFailed {
                    trigger,
                    error: e.to_string(),
                });
                false
            }
        }
    }

    // ========================================================================
    // ENGINE OPERATIONS
    // ========================================================================

    /// Admin override of the score, persisted immediately.
    ///
    /// # Errors
    /// `PermissionDenied` for non-admin principals.
    pub async fn set_score(&self, score: f64) -> CoreResult<()> {
        self.require_admin("set_score")?;
        let transition = self.engine.lock().set_score(score, self.now());
        if let Some(t) = transition {
            self.emit(EngineEvent::StateChanged(t));
        }
        self.flush(SyncTrigger::Override).await;
        Ok(())
    }

    /// Admin override of the day, persisted immediately.
    ///
    /// # Errors
    /// `PermissionDenied` for non-admin principals, `ValidationError` for 0.
    pub async fn set_current_day(&self, day: u32) -> CoreResult<()> {
        self.require_admin("set_current_day")?;
        self.engine.lock().set_current_day(day, self.now())?;
        self.flush(SyncTrigger::Override).await;
        Ok(())
    }

    /// Record a fragment as seen. Persisted with the next flush.
    pub fn mark_fragment_seen(&self, fragment_id: &str) -> CoreResult<bool> {
        self.require_active()?;
        Ok(self.engine.lock().mark_fragment_seen(fragment_id))
    }

    fn on_recovery_tick(&self) {
        let transition = self.engine.lock().recovery_tick(self.now());
        if let Some(t) = transition {
            self.emit(EngineEvent::StateChanged(t));
        }
    }

    fn on_rollover(&self) {
        let outcome = self.engine.lock().apply_rollover(self.now());
        if let Some(t) = outcome.transition {
            self.emit(EngineEvent::StateChanged(t));
        }
        self.emit(EngineEvent::DayAdvanced {
            day: outcome.day,
            bonus_applied: outcome.bonus_applied,
        });
    }

    // ========================================================================
    // IDENTITY OPERATIONS
    // ========================================================================

    /// Link a durable credential to the current anonymous principal.
    ///
    /// Progress is captured first. On success the capture is discarded and
    /// the session re-establishes as the upgraded principal.
    ///
    /// # Errors
    /// `AuthError::Collision` (recoverable) when the credential belongs to
    /// another principal; see [`CoherenceSession::resolve_collision_by_sign_in`].
    pub async fn upgrade_anonymous(
        self: &Arc<Self>,
        kind: CredentialKind,
        payload: &str,
    ) -> CoreResult<Established> {
        let active = self.require_active()?;
        if !active.principal.is_anonymous {
            return Err(CoreError::validation(
                "principal",
                "only an anonymous principal can be upgraded",
            ));
        }
        let (day, score) = {
            let engine = self.engine.lock();
            (engine.day(), engine.score())
        };
        self.anchor
            .upgrade(
                self.deps.auth.as_ref(),
                self.deps.migration.as_ref(),
                &active.principal,
                &active.identity.visitor_id,
                day,
                score,
                kind,
                payload,
            )
            .await?;
        self.restart().await
    }

    /// Resolve a collision by signing in to the principal that already owns
    /// the credential. The captured progress goes to the migration step.
    ///
    /// A failed sign-in leaves the current session running.
    pub async fn resolve_collision_by_sign_in(
        self: &Arc<Self>,
        kind: CredentialKind,
        payload: &str,
    ) -> CoreResult<(Established, Option<MigrationPayload>)> {
        let resolution = self
            .anchor
            .resolve_collision(
                self.deps.auth.as_ref(),
                self.deps.migration.as_ref(),
                kind,
                payload,
            )
            .await?;
        let established = self.restart().await?;
        Ok((established, resolution.migrated))
    }

    /// Issue a recovery code for the anchored principal and store it in
    /// the record.
    ///
    /// # Errors
    /// `ValidationError` when the principal is not anchored.
    pub async fn issue_access_code(&self) -> CoreResult<String> {
        let active = self.require_active()?;
        if !active.principal.is_anchored() {
            return Err(CoreError::validation(
                "principal",
                "access codes require an anchored identity",
            ));
        }

        let code = recovery_code::generate(self.config.identity.recovery_code_length);
        let expires_at =
            self.now() + ChronoDuration::seconds(self.config.identity.recovery_code_ttl_secs);
        self.deps
            .recovery
            .register(
                &code,
                &active.principal.uid,
                &active.identity.visitor_id,
                expires_at,
            )
            .await?;

        self.engine.lock().set_access_code(Some(code.clone()));
        let patch = ProgressPatch {
            access_code: Some(Some(code.clone())),
            ..ProgressPatch::default()
        };
        self.deps
            .store
            .update(active.key.collection, &active.key.id, patch)
            .await?;
        info!(uid = %active.principal.uid, %expires_at, "Access code issued");
        Ok(code)
    }

    /// Redeem a recovery code: sign in with the granted token, adopt the
    /// granted visitor identity and re-establish.
    ///
    /// # Errors
    /// `RecoveryError::Malformed` / `Unknown` / `Expired`, all
    /// user-actionable. A failed sign-in leaves the current session running.
    pub async fn recover_with_code(self: &Arc<Self>, input: &str) -> CoreResult<Established> {
        let code = recovery_code::normalize(input, self.config.identity.recovery_code_length)?;
        let grant = self.deps.recovery.redeem(&code).await?;

        let principal = self
            .deps
            .auth
            .sign_in_with_credential(CredentialKind::CustomToken, &grant.credential_token)
            .await?;
        self.shutdown().await;
        if let Some(previous) = self.anchor.adopt(&self.identity, &grant.visitor_id)? {
            self.emit(EngineEvent::IdentityReplaced {
                previous_visitor_id: previous,
                visitor_id: grant.visitor_id.clone(),
            });
        }
        info!(uid = %principal.uid, visitor_id = %grant.visitor_id, "Recovered identity");
        self.establish().await
    }

    // ========================================================================
    // OBSERVATION
    // ========================================================================

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    pub fn snapshot(&self) -> ProgressRecord {
        self.engine.lock().snapshot()
    }

    pub fn score(&self) -> f64 {
        self.engine.lock().score()
    }

    pub fn state(&self) -> CoherenceState {
        self.engine.lock().state()
    }

    pub fn day(&self) -> u32 {
        self.engine.lock().day()
    }

    pub fn is_transitioning(&self) -> bool {
        let now = self.now();
        self.engine.lock().is_transitioning(now)
    }

    pub fn established(&self) -> Option<Established> {
        self.active.read().clone()
    }

    pub fn is_established(&self) -> bool {
        self.active.read().is_some()
    }

    pub fn visitor_identity(&self) -> Option<VisitorIdentity> {
        self.identity.current()
    }

    pub fn last_synced(&self) -> Option<SyncCursor> {
        self.coordinator.cursor()
    }

    pub fn is_timer_armed(&self, purpose: TimerPurpose) -> bool {
        self.timers.is_armed(purpose)
    }

    pub fn armed_timer_count(&self) -> usize {
        self.timers.armed_count()
    }

    /// How many times establishment actually ran.
    pub fn establish_runs(&self) -> usize {
        self.gate.runs()
    }

    // ========================================================================
    // INTERNALS
    // ========================================================================

    fn now(&self) -> DateTime<Utc> {
        self.deps.clock.now()
    }

    fn emit(&self, event: EngineEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn active_key(&self) -> Option<RecordKey> {
        self.active.read().as_ref().map(|a| a.key.clone())
    }

    fn require_active(&self) -> CoreResult<Established> {
        self.active.read().clone().ok_or(CoreError::NotEstablished)
    }

    fn require_admin(&self, operation: &str) -> CoreResult<()> {
        let active = self.require_active()?;
        if !active.principal.is_admin() {
            warn!(operation, uid = %active.principal.uid, "Privileged operation rejected");
            return Err(CoreError::PermissionDenied {
                operation: operation.to_string(),
            });
        }
        Ok(())
    }

    fn arm_timers(self: &Arc<Self>) {
        let engine = &self.config.engine;
        let sync = self.coordinator.config();

        self.timers.arm(
            TimerPurpose::Recovery,
            self.spawn_periodic(TimerPurpose::Recovery, engine.recovery_interval()),
        );
        self.timers.arm(
            TimerPurpose::TransitionPoll,
            self.spawn_periodic(TimerPurpose::TransitionPoll, sync.transition_poll()),
        );
        self.timers.arm(
            TimerPurpose::BackupPoll,
            self.spawn_periodic(TimerPurpose::BackupPoll, sync.backup_poll()),
        );
        self.timers.arm(TimerPurpose::Rollover, self.spawn_rollover());
        self.timers.arm(
            TimerPurpose::InitialSync,
            self.spawn_once(TimerPurpose::InitialSync, sync.initial_sync_delay()),
        );
    }

    async fn on_timer(&self, purpose: TimerPurpose) {
        match purpose {
            TimerPurpose::Recovery => self.on_recovery_tick(),
            TimerPurpose::Rollover => self.on_rollover(),
            TimerPurpose::TransitionPoll => {
                self.poll(SyncTrigger::StateTransition).await;
            }
            TimerPurpose::BackupPoll => {
                self.poll(SyncTrigger::Backup).await;
            }
            TimerPurpose::InitialSync => {
                self.flush(SyncTrigger::Initial).await;
            }
        }
    }

    /// Fixed-rate task. Missed ticks are skipped, never caught up.
    fn spawn_periodic(self: &Arc<Self>, purpose: TimerPurpose, period: Duration) -> JoinHandle<()> {
        let weak: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let Some(session) = weak.upgrade() else { break };
                session.on_timer(purpose).await;
            }
        })
    }

    fn spawn_once(self: &Arc<Self>, purpose: TimerPurpose, delay: Duration) -> JoinHandle<()> {
        let weak: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(session) = weak.upgrade() {
                session.on_timer(purpose).await;
            }
        })
    }

    /// One-shot timer to the next boundary, re-armed from the unchanged
    /// origin after every firing.
    fn spawn_rollover(self: &Arc<Self>) -> JoinHandle<()> {
        let weak: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut last_boundary: Option<DateTime<Utc>> = None;
            loop {
                let (boundary, delay) = {
                    let Some(session) = weak.upgrade() else { break };
                    let now = session.now();
                    let scheduler = RolloverScheduler::from_origin(session.engine.lock().start_date());
                    scheduler.schedule(last_boundary.unwrap_or(now), now)
                };
                debug!(%boundary, ?delay, "rollover scheduled");
                tokio::time::sleep(delay).await;

                let Some(session) = weak.upgrade() else { break };
                session.on_timer(TimerPurpose::Rollover).await;
                last_boundary = Some(boundary);
            }
        })
    }
}
