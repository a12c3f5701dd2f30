//! IdentityAnchor: reconciles principals with the local visitor identity.
//!
//! # Reconciliation
//!
//! The remote `uid -> visitor_id` mapping is authoritative. A new observer
//! principal either adopts the mapped visitor (replacing the local one) or
//! gets a mapping to the local visitor. Admins are keyed by uid and skip
//! this entirely.
//!
//! # Collisions
//!
//! Upgrading an anonymous principal can collide with a credential that
//! already belongs to another principal. Progress is captured into the
//! migration channel *before* the attempt so nothing is lost either way:
//! success discards the capture, a collision leaves it pending until the
//! caller signs in to the existing principal and it is handed off.

use std::sync::Arc;

use tracing::{info, warn};

use super::session::IdentitySession;
use crate::clock::Clock;
use crate::error::CoreResult;
use crate::traits::{AuthGateway, MigrationChannel, RemoteProgressStore};
use crate::types::{CredentialKind, IdentityLink, MigrationPayload, Principal, VisitorIdentity};

/// Result of reconciling a principal.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    /// Local identity after reconciliation.
    pub identity: VisitorIdentity,
    /// Previous visitor id when the mapping replaced it.
    pub replaced: Option<String>,
    /// A new mapping was written.
    pub link_created: bool,
}

/// Principal signed in to resolve a collision, plus the handed-off payload.
#[derive(Debug, Clone, PartialEq)]
pub struct CollisionResolution {
    pub principal: Principal,
    pub migrated: Option<MigrationPayload>,
}

/// Reconciles `Principal.uid` with `VisitorIdentity.visitor_id`.
pub struct IdentityAnchor {
    store: Arc<dyn RemoteProgressStore>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for IdentityAnchor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityAnchor").finish_non_exhaustive()
    }
}

impl IdentityAnchor {
    pub fn new(store: Arc<dyn RemoteProgressStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Reconcile `principal` against the local identity.
    pub async fn reconcile(
        &self,
        principal: &Principal,
        session: &IdentitySession,
    ) -> CoreResult<Reconciliation> {
        let local = session.get_or_create()?;
        if principal.is_admin() {
            return Ok(Reconciliation {
                identity: local,
                replaced: None,
                link_created: false,
            });
        }

        match self.store.get_link(&principal.uid).await? {
            Some(link) if link.visitor_id != local.visitor_id => {
                let adopted = VisitorIdentity::adopting(link.visitor_id.clone());
                session.replace(adopted.clone())?;
                info!(
                    uid = %principal.uid,
                    previous = %local.visitor_id,
                    visitor_id = %adopted.visitor_id,
                    "Remote mapping replaced local visitor identity"
                );
                Ok(Reconciliation {
                    identity: adopted,
                    replaced: Some(local.visitor_id),
                    link_created: false,
                })
            }
            Some(_) => Ok(Reconciliation {
                identity: local,
                replaced: None,
                link_created: false,
            }),
            None => {
                self.store
                    .set_link(IdentityLink {
                        uid: principal.uid.clone(),
                        visitor_id: local.visitor_id.clone(),
                        linked_at: self.clock.now(),
                    })
                    .await?;
                info!(uid = %principal.uid, visitor_id = %local.visitor_id, "Linked principal to visitor");
                Ok(Reconciliation {
                    identity: local,
                    replaced: None,
                    link_created: true,
                })
            }
        }
    }

    /// Adopt `visitor_id` locally, e.g. after redeeming a recovery code.
    ///
    /// # Returns
    /// The previous visitor id if it changed.
    pub fn adopt(&self, session: &IdentitySession, visitor_id: &str) -> CoreResult<Option<String>> {
        let local = session.get_or_create()?;
        if local.visitor_id == visitor_id {
            return Ok(None);
        }
        session.replace(VisitorIdentity::adopting(visitor_id))?;
        info!(previous = %local.visitor_id, visitor_id, "Adopted recovered visitor identity");
        Ok(Some(local.visitor_id))
    }

    /// Upgrade an anonymous principal to a durable credential with a
    /// compensating capture.
    ///
    /// # Errors
    /// `AuthError::Collision` when the credential belongs to another
    /// principal. The captured payload stays pending.
    #[allow(clippy::too_many_arguments)]
    pub async fn upgrade(
        &self,
        auth: &dyn AuthGateway,
        migration: &dyn MigrationChannel,
        principal: &Principal,
        visitor_id: &str,
        day: u32,
        score: f64,
        kind: CredentialKind,
        payload: &str,
    ) -> CoreResult<Principal> {
        migration
            .capture(MigrationPayload {
                day,
                score,
                from_visitor_id: visitor_id.to_string(),
                from_uid: Some(principal.uid.clone()),
                captured_at: self.clock.now(),
            })
            .await?;

        match auth.link_credential(principal, kind, payload).await {
            Ok(upgraded) => {
                migration.discard().await?;
                info!(uid = %upgraded.uid, ?kind, "Principal upgraded");
                Ok(upgraded)
            }
            Err(e) => {
                if e.is_collision() {
                    warn!(uid = %principal.uid, ?kind, error = %e, "Upgrade collided; progress captured for migration");
                }
                Err(e)
            }
        }
    }

    /// Sign in to the principal that owns the credential and hand the
    /// pending capture to the migration step.
    pub async fn resolve_collision(
        &self,
        auth: &dyn AuthGateway,
        migration: &dyn MigrationChannel,
        kind: CredentialKind,
        payload: &str,
    ) -> CoreResult<CollisionResolution> {
        let principal = auth.sign_in_with_credential(kind, payload).await?;
        let migrated = migration.hand_off(&principal.uid).await?;
        if let Some(m) = &migrated {
            info!(target_uid = %principal.uid, day = m.day, score = m.score, "Migration payload handed off");
        }
        Ok(CollisionResolution {
            principal,
            migrated,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::config::constants::identity::STORAGE_KEY;
    use crate::stubs::{InMemoryIdentityStore, InMemoryMigrationChannel, InMemoryProgressStore, StubAuthGateway};
    use chrono::Utc;

    struct Fixture {
        store: Arc<InMemoryProgressStore>,
        session: IdentitySession,
        anchor: IdentityAnchor,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryProgressStore::new());
        let session = IdentitySession::new(Arc::new(InMemoryIdentityStore::new()), STORAGE_KEY);
        let anchor = IdentityAnchor::new(store.clone(), Arc::new(SystemClock));
        Fixture { store, session, anchor }
    }

    #[tokio::test]
    async fn test_mapping_overrides_local_identity() {
        let f = fixture();
        let local = f.session.get_or_create().unwrap();
        f.store.seed_link(IdentityLink {
            uid: "u-1".into(),
            visitor_id: "B".into(),
            linked_at: Utc::now(),
        });

        let result = f.anchor.reconcile(&Principal::anonymous("u-1"), &f.session).await.unwrap();
        assert_eq!(result.identity.visitor_id, "B");
        assert_eq!(result.replaced, Some(local.visitor_id));
        assert_eq!(f.session.current().unwrap().visitor_id, "B");
    }

    #[tokio::test]
    async fn test_missing_mapping_is_created() {
        let f = fixture();
        let local = f.session.get_or_create().unwrap();
        let result = f.anchor.reconcile(&Principal::anonymous("u-2"), &f.session).await.unwrap();

        assert!(result.link_created);
        assert!(result.replaced.is_none());
        assert_eq!(f.store.link("u-2").unwrap().visitor_id, local.visitor_id);
    }

    #[tokio::test]
    async fn test_matching_mapping_is_noop() {
        let f = fixture();
        let local = f.session.get_or_create().unwrap();
        f.store.seed_link(IdentityLink {
            uid: "u-3".into(),
            visitor_id: local.visitor_id.clone(),
            linked_at: Utc::now(),
        });
        let result = f.anchor.reconcile(&Principal::anonymous("u-3"), &f.session).await.unwrap();
        assert!(!result.link_created);
        assert_eq!(result.identity, local);
    }

    #[tokio::test]
    async fn test_admin_skips_reconciliation() {
        let f = fixture();
        let result = f.anchor.reconcile(&Principal::admin("a-1"), &f.session).await.unwrap();
        assert!(!result.link_created);
        assert!(f.store.link("a-1").is_none());
    }

    #[tokio::test]
    async fn test_adopt_reports_previous() {
        let f = fixture();
        let local = f.session.get_or_create().unwrap();
        assert_eq!(f.anchor.adopt(&f.session, &local.visitor_id).unwrap(), None);
        assert_eq!(
            f.anchor.adopt(&f.session, "v-recovered").unwrap(),
            Some(local.visitor_id)
        );
        assert_eq!(f.session.current().unwrap().visitor_id, "v-recovered");
    }

    #[tokio::test]
    async fn test_successful_upgrade_discards_capture() {
        let f = fixture();
        let auth = StubAuthGateway::new();
        let migration = InMemoryMigrationChannel::new();
        let anon = auth.sign_in_anonymous().await.unwrap();

        let upgraded = f
            .anchor
            .upgrade(&auth, &migration, &anon, "v-1", 4, 71.0, CredentialKind::Google, "g:dana")
            .await
            .unwrap();
        assert!(upgraded.is_anchored());
        assert!(migration.pending().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_collision_keeps_capture_until_resolved() {
        let f = fixture();
        let auth = StubAuthGateway::new();
        auth.register(Principal::observer("owner", [CredentialKind::Google]), "g:erin");
        let migration = InMemoryMigrationChannel::new();
        let anon = auth.sign_in_anonymous().await.unwrap();

        let err = f
            .anchor
            .upgrade(&auth, &migration, &anon, "v-1", 6, 58.0, CredentialKind::Google, "g:erin")
            .await
            .unwrap_err();
        assert!(err.is_collision());
        assert!(err.is_recoverable());
        let pending = migration.pending().await.unwrap().unwrap();
        assert_eq!((pending.day, pending.score), (6, 58.0));
        assert_eq!(pending.from_uid.as_deref(), Some(anon.uid.as_str()));

        let resolution = f
            .anchor
            .resolve_collision(&auth, &migration, CredentialKind::Google, "g:erin")
            .await
            .unwrap();
        assert_eq!(resolution.principal.uid, "owner");
        assert_eq!(resolution.migrated.unwrap().day, 6);
        assert_eq!(migration.handed_off()[0].0, "owner");
    }
}
