//! AuthGateway trait: the opaque authentication provider.

use async_trait::async_trait;

use crate::error::CoreResult;
use crate::types::{CredentialKind, Principal};

/// Issues and upgrades principals.
///
/// Popup/redirect mechanics live behind this trait. A credential that is
/// already bound to another principal yields `AuthError::Collision`.
#[async_trait]
pub trait AuthGateway: Send + Sync {
    /// Currently signed-in principal, if any.
    async fn current(&self) -> Option<Principal>;

    /// Create an anonymous observer principal.
    async fn sign_in_anonymous(&self) -> CoreResult<Principal>;

    /// Sign in with a credential, switching to whichever principal owns it.
    async fn sign_in_with_credential(
        &self,
        kind: CredentialKind,
        payload: &str,
    ) -> CoreResult<Principal>;

    /// Attach a credential to `principal`, keeping its uid.
    ///
    /// # Errors
    /// - `AuthError::Collision` if the credential belongs to another principal
    async fn link_credential(
        &self,
        principal: &Principal,
        kind: CredentialKind,
        payload: &str,
    ) -> CoreResult<Principal>;

    /// End the auth session.
    async fn sign_out(&self) -> CoreResult<()>;
}
