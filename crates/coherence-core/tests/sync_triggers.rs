//! Timer-driven behaviour under paused tokio time: initial sync, recovery
//! ticks, polled flushes, rollover and failure handling.

mod common;

use coherence_core::sync::SyncTrigger;
use coherence_core::types::{Collection, CoherenceState, ProgressRecord};
use coherence_core::EngineEvent;

use common::{advance_secs, at, drain, morning, settle, Harness};

fn seeded(h: &Harness, score: f64) -> String {
    let identity = h.seed_visitor("v-sync");
    let mut record = ProgressRecord::fresh(morning());
    record.coherence_score = score;
    record.coherence_state = CoherenceState::from_score(score);
    h.store.seed(Collection::Observers, &identity.visitor_id, record);
    identity.visitor_id
}

fn flushes(events: &[EngineEvent], wanted: SyncTrigger) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, EngineEvent::Flushed { trigger, .. } if *trigger == wanted))
        .count()
}

#[tokio::test(start_paused = true)]
async fn test_initial_sync_after_short_delay() {
    let h = Harness::new(morning());
    seeded(&h, 70.0);
    let mut events = h.session.subscribe();
    h.session.establish().await.unwrap();
    assert_eq!(h.store.set_count(), 0);

    advance_secs(1).await;
    assert_eq!(h.store.set_count(), 0);

    advance_secs(2).await;
    assert_eq!(h.store.set_count(), 1);
    assert_eq!(flushes(&drain(&mut events), SyncTrigger::Initial), 1);

    // One-shot.
    advance_secs(4).await;
    assert_eq!(flushes(&drain(&mut events), SyncTrigger::Initial), 0);
}

#[tokio::test(start_paused = true)]
async fn test_recovery_ticks_without_catch_up() {
    let h = Harness::new(morning());
    seeded(&h, 50.0);
    h.session.establish().await.unwrap();

    advance_secs(4).await;
    assert_eq!(h.session.score(), 50.0);
    advance_secs(2).await;
    assert_eq!(h.session.score(), 50.5);
    advance_secs(10).await;
    assert_eq!(h.session.score(), 51.5);

    // A long jump yields a single tick, not one per missed interval.
    tokio::time::advance(std::time::Duration::from_secs(60)).await;
    settle().await;
    assert_eq!(h.session.score(), 52.0);
}

#[tokio::test(start_paused = true)]
async fn test_label_change_is_flushed_by_transition_poll() {
    let h = Harness::new(morning());
    let id = seeded(&h, 89.0);
    let mut events = h.session.subscribe();
    h.session.establish().await.unwrap();

    advance_secs(25).await;

    let events = drain(&mut events);
    assert!(events.iter().any(|e| matches!(
        e,
        EngineEvent::StateChanged(t) if t.from == CoherenceState::Recovering && t.to == CoherenceState::Stable
    )));
    assert_eq!(flushes(&events, SyncTrigger::StateTransition), 1);
    let stored = h.store.record(Collection::Observers, &id).unwrap();
    assert_eq!(stored.coherence_state, CoherenceState::Stable);
    assert_eq!(h.session.last_synced().unwrap().state, CoherenceState::Stable);
}

#[tokio::test(start_paused = true)]
async fn test_backup_waits_for_interval_and_drift() {
    let h = Harness::new(morning());
    seeded(&h, 50.0);
    let mut events = h.session.subscribe();
    h.session.establish().await.unwrap();

    // Initial sync at 2 s baselines the cursor; backups need > 120 s since.
    advance_secs(140).await;
    assert_eq!(flushes(&drain(&mut events), SyncTrigger::Backup), 0);

    advance_secs(15).await;
    let events = drain(&mut events);
    assert_eq!(flushes(&events, SyncTrigger::Backup), 1);
    let cursor = h.session.last_synced().unwrap();
    assert!(cursor.score >= 64.5, "cursor score {}", cursor.score);
}

#[tokio::test(start_paused = true)]
async fn test_backup_skips_without_drift() {
    let h = Harness::new(morning());
    seeded(&h, 100.0);
    let mut events = h.session.subscribe();
    h.session.establish().await.unwrap();

    advance_secs(300).await;
    let events = drain(&mut events);
    assert_eq!(flushes(&events, SyncTrigger::Initial), 1);
    assert_eq!(flushes(&events, SyncTrigger::Backup), 0);
    assert_eq!(flushes(&events, SyncTrigger::StateTransition), 0);
}

#[tokio::test(start_paused = true)]
async fn test_visibility_loss_and_unload_flush_immediately() {
    let h = Harness::new(morning());
    seeded(&h, 60.0);
    h.session.establish().await.unwrap();

    assert!(!h.session.on_visibility_change(true).await);
    assert!(h.session.on_visibility_change(false).await);
    assert_eq!(h.store.set_count(), 1);

    let unload = h.session.on_unload();
    assert!(unload.await.unwrap());
    assert_eq!(h.store.set_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_failed_flush_is_reported_and_not_retried() {
    let h = Harness::new(morning());
    let id = seeded(&h, 60.0);
    let mut events = h.session.subscribe();
    h.session.establish().await.unwrap();
    advance_secs(3).await;
    drain(&mut events);
    let writes = h.store.set_count();

    h.store.set_unavailable(true);
    assert!(!h.session.on_visibility_change(false).await);
    let failed = drain(&mut events);
    assert!(matches!(
        failed.as_slice(),
        [EngineEvent::FlushFailed { trigger: SyncTrigger::VisibilityLoss, .. }]
    ));

    h.store.set_unavailable(false);
    advance_secs(5).await;
    assert_eq!(h.store.set_count(), writes);

    // The next trigger carries the data.
    assert!(h.session.on_visibility_change(false).await);
    let stored = h.store.record(Collection::Observers, &id).unwrap();
    assert_eq!(stored.coherence_score, h.session.score());
}

#[tokio::test(start_paused = true)]
async fn test_rollover_at_origin_time_of_day() {
    // Ten seconds before midnight; the record's origin is midnight.
    let base = at(2026, 3, 10, 23, 59, 50);
    let h = Harness::new(base);
    let identity = h.seed_visitor("v-roll");
    let mut record = ProgressRecord::fresh(base);
    record.coherence_score = 60.0;
    record.coherence_state = CoherenceState::from_score(60.0);
    h.store.seed(Collection::Observers, &identity.visitor_id, record);
    let mut events = h.session.subscribe();

    h.session.establish().await.unwrap();
    assert_eq!(h.session.day(), 1);

    advance_secs(10).await;

    assert_eq!(h.session.day(), 2);
    // Two recovery ticks plus the bonus.
    assert_eq!(h.session.score(), 71.0);
    assert!(h.session.is_transitioning());
    assert!(drain(&mut events).contains(&EngineEvent::DayAdvanced {
        day: 2,
        bonus_applied: 10.0
    }));

    advance_secs(4).await;
    assert!(!h.session.is_transitioning());

    // Re-armed for the following midnight, not sooner.
    advance_secs(60).await;
    assert_eq!(h.session.day(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_rollover_and_reload_agree_on_day() {
    let base = at(2026, 3, 10, 23, 59, 58);
    let h = Harness::new(base);
    let est = h.session.establish().await.unwrap();
    assert_eq!(est.load.day, 1);

    advance_secs(2).await;
    assert_eq!(h.session.day(), 2);

    // A fresh load from the persisted snapshot derives the same day.
    h.session.shutdown().await;
    let est = h.session.establish().await.unwrap();
    assert_eq!(est.load.day, 2);
    assert!(!est.load.origin_shifted);
    assert_eq!(
        h.session.snapshot().start_date,
        base.date_naive().and_hms_opt(0, 0, 0).unwrap().and_utc()
    );
}
