//! RemoteProgressStore trait: persistent per-identity progress.

use async_trait::async_trait;

use crate::error::CoreResult;
use crate::types::{Collection, IdentityLink, ProgressPatch, ProgressRecord};

/// Remote document store holding progress records and identity links.
///
/// # Implementation Notes
///
/// - Writes are last-writer-wins. There is no optimistic concurrency check.
/// - Implementations stamp `last_seen_at` with their own (server) time on
///   `set` so client clock skew never leaks into the record.
/// - Transport failures surface as `StoreError::Unavailable`; callers treat
///   them as transient and never retry directly.
#[async_trait]
pub trait RemoteProgressStore: Send + Sync {
    /// Fetch a record.
    ///
    /// # Returns
    /// `None` if no record exists for this identity yet.
    async fn get(&self, collection: Collection, id: &str) -> CoreResult<Option<ProgressRecord>>;

    /// Full-snapshot upsert.
    async fn set(&self, collection: Collection, id: &str, record: ProgressRecord) -> CoreResult<()>;

    /// Partial update of an existing record.
    ///
    /// # Errors
    /// - `StoreError::NotFound` if the record does not exist
    async fn update(&self, collection: Collection, id: &str, patch: ProgressPatch) -> CoreResult<()>;

    /// Look up the visitor mapped to a principal uid.
    async fn get_link(&self, uid: &str) -> CoreResult<Option<IdentityLink>>;

    /// Create or replace the mapping for `link.uid`.
    async fn set_link(&self, link: IdentityLink) -> CoreResult<()>;
}
