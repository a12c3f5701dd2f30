//! Stub AuthGateway.
//!
//! # TEST ONLY
//!
//! Tracks which principal owns each `(kind, payload)` credential so that
//! linking an already-bound credential produces a real collision.
//!
//! Custom tokens are expected in the `{uid}.{nonce}` shape minted by
//! [`super::InMemoryRecoveryChannel`]; signing in with one resolves to `uid`.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{AuthError, CoreResult};
use crate::traits::AuthGateway;
use crate::types::{CredentialKind, Principal};

/// In-memory auth provider.
#[derive(Debug, Default)]
pub struct StubAuthGateway {
    current: RwLock<Option<Principal>>,
    principals: DashMap<String, Principal>,
    owners: DashMap<(CredentialKind, String), String>,
    unavailable: AtomicBool,
}

impl StubAuthGateway {
    pub fn new() -> Self {
        info!("Creating StubAuthGateway (TEST ONLY)");
        Self::default()
    }

    /// Register a principal and bind `payload` to it for every kind it holds.
    ///
    /// Used to set up an "existing account" that a later link collides with.
    pub fn register(&self, principal: Principal, payload: &str) {
        for kind in &principal.linked_credential_kinds {
            self.owners
                .insert((*kind, payload.to_string()), principal.uid.clone());
        }
        self.principals.insert(principal.uid.clone(), principal);
    }

    /// Force the current principal without going through a sign-in.
    pub fn set_current(&self, principal: Option<Principal>) {
        if let Some(p) = &principal {
            self.principals.insert(p.uid.clone(), p.clone());
        }
        *self.current.write() = principal;
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Owner of a credential, if bound.
    pub fn owner_of(&self, kind: CredentialKind, payload: &str) -> Option<String> {
        self.owners
            .get(&(kind, payload.to_string()))
            .map(|o| o.value().clone())
    }

    fn check_available(&self) -> CoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AuthError::Unavailable("stub gateway marked unavailable".into()).into());
        }
        Ok(())
    }

    fn switch_to(&self, principal: Principal) -> Principal {
        self.principals.insert(principal.uid.clone(), principal.clone());
        *self.current.write() = Some(principal.clone());
        principal
    }
}

#[async_trait]
impl AuthGateway for StubAuthGateway {
    async fn current(&self) -> Option<Principal> {
        self.current.read().clone()
    }

    async fn sign_in_anonymous(&self) -> CoreResult<Principal> {
        self.check_available()?;
        let principal = Principal::anonymous(Uuid::new_v4().to_string());
        debug!(uid = %principal.uid, "anonymous sign-in");
        Ok(self.switch_to(principal))
    }

    async fn sign_in_with_credential(
        &self,
        kind: CredentialKind,
        payload: &str,
    ) -> CoreResult<Principal> {
        self.check_available()?;
        if payload.trim().is_empty() {
            return Err(AuthError::Rejected("empty credential payload".into()).into());
        }

        if kind == CredentialKind::CustomToken {
            let uid = payload
                .split_once('.')
                .map(|(uid, _)| uid)
                .filter(|uid| !uid.is_empty())
                .ok_or_else(|| AuthError::Rejected("malformed custom token".into()))?;
            let principal = self
                .principals
                .get(uid)
                .map(|p| p.value().clone())
                .unwrap_or_else(|| Principal::observer(uid, [CredentialKind::CustomToken]));
            debug!(uid = %principal.uid, "custom token sign-in");
            return Ok(self.switch_to(principal));
        }

        let principal = match self.owner_of(kind, payload) {
            Some(uid) => self
                .principals
                .get(&uid)
                .map(|p| p.value().clone())
                .unwrap_or_else(|| Principal::observer(uid, [kind])),
            None => {
                let principal = Principal::observer(Uuid::new_v4().to_string(), [kind]);
                self.owners
                    .insert((kind, payload.to_string()), principal.uid.clone());
                principal
            }
        };
        debug!(uid = %principal.uid, ?kind, "credential sign-in");
        Ok(self.switch_to(principal))
    }

    async fn link_credential(
        &self,
        principal: &Principal,
        kind: CredentialKind,
        payload: &str,
    ) -> CoreResult<Principal> {
        self.check_available()?;
        if let Some(existing_uid) = self.owner_of(kind, payload) {
            if existing_uid != principal.uid {
                return Err(AuthError::Collision { kind, existing_uid }.into());
            }
        }

        self.owners
            .insert((kind, payload.to_string()), principal.uid.clone());
        let mut upgraded = principal.clone();
        upgraded.linked_credential_kinds.insert(kind);
        upgraded.is_anonymous = false;
        debug!(uid = %upgraded.uid, ?kind, "credential linked");
        Ok(self.switch_to(upgraded))
    }

    async fn sign_out(&self) -> CoreResult<()> {
        *self.current.write() = None;
        Ok(())
    }
}
