//! Credential upgrades, collisions, access codes and admin overrides.

mod common;

use std::sync::Arc;

use coherence_core::config::constants::identity::{RECOVERY_CODE_LENGTH, RECOVERY_CODE_TTL_SECS};
use coherence_core::identity::recovery_code;
use coherence_core::session::TimerPurpose;
use coherence_core::stubs::StubAuthGateway;
use coherence_core::traits::MigrationChannel;
use coherence_core::types::{
    Collection, CoherenceState, CredentialKind, IdentityLink, Principal, ProgressRecord,
};
use coherence_core::CoreError;

use common::{morning, Harness};

#[tokio::test(start_paused = true)]
async fn test_admin_overrides_persist_immediately() {
    let h = Harness::new(morning());
    h.auth.set_current(Some(Principal::admin("root")));
    let est = h.session.establish().await.unwrap();
    assert_eq!(est.key.collection, Collection::Admins);
    assert_eq!(est.key.id, "root");

    h.session.set_score(42.0).await.unwrap();
    let stored = h.store.record(Collection::Admins, "root").unwrap();
    assert_eq!(stored.coherence_score, 42.0);
    assert_eq!(stored.coherence_state, CoherenceState::from_score(42.0));

    h.session.set_current_day(5).await.unwrap();
    assert_eq!(h.session.day(), 5);
    assert_eq!(h.store.record(Collection::Admins, "root").unwrap().day_progress, 5);

    let err = h.session.set_current_day(0).await.unwrap_err();
    assert!(matches!(err, CoreError::ValidationError { .. }));
    assert_eq!(h.session.day(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_overrides_rejected_for_observers() {
    let h = Harness::new(morning());
    h.session.establish().await.unwrap();
    let writes = h.store.set_count();

    let err = h.session.set_score(10.0).await.unwrap_err();
    assert!(matches!(err, CoreError::PermissionDenied { ref operation } if operation == "set_score"));
    assert!(matches!(
        h.session.set_current_day(9).await,
        Err(CoreError::PermissionDenied { .. })
    ));

    assert_eq!(h.session.score(), 100.0);
    assert_eq!(h.session.day(), 1);
    assert_eq!(h.store.set_count(), writes);
}

#[tokio::test(start_paused = true)]
async fn test_upgrade_keeps_uid_and_anchors_record() {
    let h = Harness::new(morning());
    let before = h.session.establish().await.unwrap();
    assert!(!before.principal.is_anchored());

    let after = h
        .session
        .upgrade_anonymous(CredentialKind::Google, "g:fresh")
        .await
        .unwrap();

    assert_eq!(after.principal.uid, before.principal.uid);
    assert!(after.principal.is_anchored());
    assert_eq!(after.identity.visitor_id, before.identity.visitor_id);
    assert!(h.migration.pending().await.unwrap().is_none());

    let stored = h.store.record(Collection::Observers, &after.key.id).unwrap();
    assert!(stored.is_anchored);
    assert_eq!(stored.anchored_principal_uid.as_deref(), Some(before.principal.uid.as_str()));
}

#[tokio::test(start_paused = true)]
async fn test_collision_then_sign_in_migrates_progress() {
    let h = Harness::new(morning());
    h.auth
        .register(Principal::observer("owner", [CredentialKind::Google]), "g:taken");
    h.store.seed_link(IdentityLink {
        uid: "owner".into(),
        visitor_id: "v-owner".into(),
        linked_at: morning(),
    });
    h.store
        .seed(Collection::Observers, "v-owner", ProgressRecord::fresh(morning()));

    let anon = h.session.establish().await.unwrap();

    let err = h
        .session
        .upgrade_anonymous(CredentialKind::Google, "g:taken")
        .await
        .unwrap_err();
    assert!(err.is_collision());
    assert!(err.is_recoverable());
    // Still usable as the anonymous principal; progress captured.
    assert!(h.session.is_established());
    let pending = h.migration.pending().await.unwrap().expect("captured");
    assert_eq!(pending.from_visitor_id, anon.identity.visitor_id);

    let (est, migrated) = h
        .session
        .resolve_collision_by_sign_in(CredentialKind::Google, "g:taken")
        .await
        .unwrap();

    assert_eq!(est.principal.uid, "owner");
    assert_eq!(est.identity.visitor_id, "v-owner");
    assert_eq!(h.session.visitor_identity().unwrap().visitor_id, "v-owner");

    let migrated = migrated.expect("payload handed off");
    assert_eq!(migrated.from_visitor_id, anon.identity.visitor_id);
    assert_eq!(migrated.from_uid.as_deref(), Some(anon.principal.uid.as_str()));
    let handed = h.migration.handed_off();
    assert_eq!(handed.len(), 1);
    assert_eq!(handed[0].0, "owner");
    assert!(h.migration.pending().await.unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_upgrade_requires_anonymous_principal() {
    let h = Harness::new(morning());
    h.auth
        .set_current(Some(Principal::observer("u-anchored", [CredentialKind::Apple])));
    h.session.establish().await.unwrap();

    let err = h
        .session
        .upgrade_anonymous(CredentialKind::Google, "g:extra")
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::ValidationError { .. }));
    assert!(h.migration.pending().await.unwrap().is_none());
    assert!(h.auth.owner_of(CredentialKind::Google, "g:extra").is_none());
    assert!(h.session.is_established());
}

#[tokio::test(start_paused = true)]
async fn test_failed_collision_sign_in_keeps_session_running() {
    let h = Harness::new(morning());
    h.auth
        .register(Principal::observer("owner", [CredentialKind::Google]), "g:taken");
    let anon = h.session.establish().await.unwrap();
    h.session
        .upgrade_anonymous(CredentialKind::Google, "g:taken")
        .await
        .unwrap_err();

    h.auth.set_unavailable(true);
    let err = h
        .session
        .resolve_collision_by_sign_in(CredentialKind::Google, "g:taken")
        .await
        .unwrap_err();
    assert!(err.is_recoverable());

    let still = h.session.established().expect("session kept");
    assert_eq!(still.principal.uid, anon.principal.uid);
    assert!(h.session.is_timer_armed(TimerPurpose::Recovery));
    assert!(h.session.last_synced().is_some());
    // Capture stays pending for a later attempt.
    assert!(h.migration.pending().await.unwrap().is_some());
}

fn anchored_device() -> Harness {
    let h = Harness::new(morning());
    let alice = Principal::observer("u-alice", [CredentialKind::Google]);
    h.auth.register(alice.clone(), "g:alice");
    h.auth.set_current(Some(alice));
    h.seed_visitor("v-alice");
    h
}

fn second_device(first: &Harness) -> Harness {
    let auth = Arc::new(StubAuthGateway::new());
    auth.register(Principal::observer("u-alice", [CredentialKind::Google]), "g:alice");
    Harness::with_backend(
        first.clock.clone(),
        first.store.clone(),
        auth,
        first.recovery.clone(),
    )
}

#[tokio::test(start_paused = true)]
async fn test_access_code_recovers_identity_on_another_device() {
    let a = anchored_device();
    let est_a = a.session.establish().await.unwrap();

    let code = a.session.issue_access_code().await.unwrap();
    assert_eq!(code.len(), RECOVERY_CODE_LENGTH);
    assert!(a.recovery.is_registered(&code));
    let stored = a.store.record(Collection::Observers, "v-alice").unwrap();
    assert_eq!(stored.access_code.as_deref(), Some(code.as_str()));

    let b = second_device(&a);
    // Typed loosely: lowercase with a separator.
    let lower = code.to_lowercase();
    let typed = format!("{}-{}", &lower[..4], &lower[4..]);

    let est_b = b.session.recover_with_code(&typed).await.unwrap();

    assert_eq!(est_b.principal.uid, "u-alice");
    assert!(est_b.principal.is_anchored());
    assert_eq!(est_b.identity.visitor_id, "v-alice");
    assert_eq!(b.session.visitor_identity().unwrap().visitor_id, "v-alice");
    assert_eq!(est_b.load.day, est_a.load.day);
    assert_eq!(b.session.score(), a.session.score());
}

#[tokio::test(start_paused = true)]
async fn test_bad_codes_are_user_actionable() {
    let a = anchored_device();
    a.session.establish().await.unwrap();

    let err = a.session.recover_with_code("ab").await.unwrap_err();
    assert!(err.is_user_actionable());

    let never_issued = recovery_code::generate(RECOVERY_CODE_LENGTH);
    let err = a.session.recover_with_code(&never_issued).await.unwrap_err();
    assert!(err.is_user_actionable());

    // Rejected codes leave the session alone.
    assert!(a.session.is_established());
}

#[tokio::test(start_paused = true)]
async fn test_expired_code_is_rejected() {
    let a = anchored_device();
    a.session.establish().await.unwrap();
    let code = a.session.issue_access_code().await.unwrap();
    a.session.shutdown().await;

    tokio::time::advance(std::time::Duration::from_secs(RECOVERY_CODE_TTL_SECS as u64 + 1)).await;

    let b = second_device(&a);
    let err = b.session.recover_with_code(&code).await.unwrap_err();
    assert!(err.is_user_actionable());
    assert!(!b.session.is_established());
}

#[tokio::test(start_paused = true)]
async fn test_access_code_requires_anchored_principal() {
    let h = Harness::new(morning());
    h.session.establish().await.unwrap();

    let err = h.session.issue_access_code().await.unwrap_err();
    assert!(matches!(err, CoreError::ValidationError { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_failed_recovery_sign_in_keeps_session_running() {
    let a = anchored_device();
    a.session.establish().await.unwrap();
    let code = a.session.issue_access_code().await.unwrap();

    let b = second_device(&a);
    let before = b.session.establish().await.unwrap();
    b.auth.set_unavailable(true);

    let err = b.session.recover_with_code(&code).await.unwrap_err();
    assert!(err.is_recoverable());

    let still = b.session.established().expect("session kept");
    assert_eq!(still.principal.uid, before.principal.uid);
    assert_eq!(still.identity.visitor_id, before.identity.visitor_id);
    assert_eq!(b.session.visitor_identity().unwrap().visitor_id, before.identity.visitor_id);
    assert!(b.session.is_timer_armed(TimerPurpose::Recovery));
    assert!(b.session.last_synced().is_some());
}
