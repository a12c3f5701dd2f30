//! Identity types: the local pseudonymous visitor and the auth principal.

use std::collections::BTreeSet;

use rand::RngCore;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Durable local pseudonymous identity.
///
/// Created once, persisted locally, and only ever overwritten by identity
/// reconciliation (the remote mapping wins over the local copy).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitorIdentity {
    pub visitor_id: String,
    pub visitor_token: String,
}

impl VisitorIdentity {
    /// Generate a fresh identity: UUIDv4 id plus a 32-byte hex token.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        let visitor_token = bytes.iter().map(|b| format!("{:02x}", b)).collect();
        Self {
            visitor_id: Uuid::new_v4().to_string(),
            visitor_token,
        }
    }

    /// Identity that adopts a remote visitor id. A new token is minted since
    /// the token is never shared across devices.
    pub fn adopting(visitor_id: impl Into<String>) -> Self {
        Self {
            visitor_id: visitor_id.into(),
            ..Self::generate()
        }
    }
}

/// Role carried by a principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Observer,
}

/// Kind of credential linked to a principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialKind {
    Google,
    Apple,
    Email,
    Phone,
    /// Short-lived token minted by the recovery channel.
    CustomToken,
}

impl CredentialKind {
    /// Durable kinds survive device changes and anchor progress.
    pub fn is_durable(&self) -> bool {
        !matches!(self, Self::CustomToken)
    }
}

/// Auth session identity issued by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub uid: String,
    pub role: Role,
    pub linked_credential_kinds: BTreeSet<CredentialKind>,
    pub is_anonymous: bool,
}

impl Principal {
    /// Anonymous observer with no linked credentials.
    pub fn anonymous(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            role: Role::Observer,
            linked_credential_kinds: BTreeSet::new(),
            is_anonymous: true,
        }
    }

    /// Observer holding the given credentials.
    pub fn observer(uid: impl Into<String>, kinds: impl IntoIterator<Item = CredentialKind>) -> Self {
        let linked_credential_kinds: BTreeSet<_> = kinds.into_iter().collect();
        Self {
            uid: uid.into(),
            role: Role::Observer,
            is_anonymous: linked_credential_kinds.is_empty(),
            linked_credential_kinds,
        }
    }

    /// Admin principal.
    pub fn admin(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            role: Role::Admin,
            linked_credential_kinds: BTreeSet::from([CredentialKind::Email]),
            is_anonymous: false,
        }
    }

    #[inline]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Anchoring is a pure derivation from the capability set: any durable
    /// credential anchors the principal.
    #[inline]
    pub fn is_anchored(&self) -> bool {
        self.linked_credential_kinds.iter().any(|k| k.is_durable())
    }
}
