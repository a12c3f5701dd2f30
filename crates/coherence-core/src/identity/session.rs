//! IdentitySession: the durable local pseudonymous identity.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{info, warn};

use crate::error::CoreResult;
use crate::traits::LocalIdentityStore;
use crate::types::VisitorIdentity;

/// Local `{visitor_id, visitor_token}` persisted as one JSON blob.
///
/// Created on first access; only [`super::IdentityAnchor`] replaces it. The
/// engine never deletes it, not even on sign-out.
pub struct IdentitySession {
    store: Arc<dyn LocalIdentityStore>,
    key: String,
    cached: RwLock<Option<VisitorIdentity>>,
}

impl std::fmt::Debug for IdentitySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentitySession")
            .field("key", &self.key)
            .field("cached", &*self.cached.read())
            .finish_non_exhaustive()
    }
}

impl IdentitySession {
    pub fn new(store: Arc<dyn LocalIdentityStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
            cached: RwLock::new(None),
        }
    }

    /// Identity already in memory, without touching storage.
    pub fn current(&self) -> Option<VisitorIdentity> {
        self.cached.read().clone()
    }

    /// Load the stored identity, creating and persisting one if absent.
    ///
    /// An undecodable blob is treated as absent and overwritten.
    pub fn get_or_create(&self) -> CoreResult<VisitorIdentity> {
        if let Some(identity) = self.current() {
            return Ok(identity);
        }

        let stored = match self.store.read(&self.key)? {
            Some(blob) => match serde_json::from_str::<VisitorIdentity>(&blob) {
                Ok(identity) => Some(identity),
                Err(e) => {
                    warn!(key = %self.key, error = %e, "Corrupt identity blob; regenerating");
                    None
                }
            },
            None => None,
        };

        let identity = match stored {
            Some(identity) => identity,
            None => {
                let identity = VisitorIdentity::generate();
                self.persist(&identity)?;
                info!(visitor_id = %identity.visitor_id, "Created visitor identity");
                identity
            }
        };

        *self.cached.write() = Some(identity.clone());
        Ok(identity)
    }

    /// Overwrite the local identity. Reserved for identity reconciliation.
    pub(crate) fn replace(&self, identity: VisitorIdentity) -> CoreResult<()> {
        self.persist(&identity)?;
        *self.cached.write() = Some(identity);
        Ok(())
    }

    fn persist(&self, identity: &VisitorIdentity) -> CoreResult<()> {
        let blob = serde_json::to_string(identity)?;
        self.store.write(&self.key, &blob)
    }
}
