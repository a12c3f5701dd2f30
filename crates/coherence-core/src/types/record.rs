//! Persistent progress record and related documents.
//!
//! The record is written as a full snapshot (last-writer-wins). Partial
//! updates via [`ProgressPatch`] are only used for anchoring heals and
//! access-code issuance.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::identity::{Principal, Role, VisitorIdentity};
use super::state::CoherenceState;
use crate::config::constants::engine;

/// Remote collection a record lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    /// Keyed by visitor id.
    Observers,
    /// Keyed by principal uid.
    Admins,
}

impl Collection {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Observers => "observers",
            Self::Admins => "admins",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Address of a progress record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordKey {
    pub collection: Collection,
    pub id: String,
}

impl RecordKey {
    /// Admins are keyed by uid, everyone else by visitor id.
    pub fn resolve(principal: &Principal, identity: &VisitorIdentity) -> Self {
        match principal.role {
            Role::Admin => Self {
                collection: Collection::Admins,
                id: principal.uid.clone(),
            },
            Role::Observer => Self {
                collection: Collection::Observers,
                id: identity.visitor_id.clone(),
            },
        }
    }
}

impl std::fmt::Display for RecordKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

/// Persistent per-identity progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
    /// Score in [0, 100].
    pub coherence_score: f64,
    /// Label derived from the score. Stored for readers, never trusted.
    pub coherence_state: CoherenceState,
    /// Day counter, >= 1.
    pub day_progress: u32,
    /// Temporal origin for day progress and rollover.
    pub start_date: DateTime<Utc>,
    /// Server-assigned time of the last write.
    pub last_seen_at: DateTime<Utc>,
    #[serde(default)]
    pub is_anchored: bool,
    #[serde(default)]
    pub anchored_principal_uid: Option<String>,
    #[serde(default)]
    pub access_code: Option<String>,
    #[serde(default)]
    pub seen_fragments: BTreeSet<String>,
}

impl ProgressRecord {
    /// Fresh record at day 1. The origin is aligned to UTC midnight of
    /// `now` so rollover boundaries and the day derivation coincide.
    pub fn new(now: DateTime<Utc>, initial_score: f64) -> Self {
        let score = clamp_score(initial_score);
        let start_date = now
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .map(|midnight| midnight.and_utc())
            .unwrap_or(now);
        Self {
            coherence_score: score,
            coherence_state: CoherenceState::from_score(score),
            day_progress: 1,
            start_date,
            last_seen_at: now,
            is_anchored: false,
            anchored_principal_uid: None,
            access_code: None,
            seen_fragments: BTreeSet::new(),
        }
    }

    /// Fresh record with the default initial score.
    pub fn fresh(now: DateTime<Utc>) -> Self {
        Self::new(now, engine::INITIAL_SCORE)
    }

    /// Apply a partial update in place.
    pub fn apply_patch(&mut self, patch: &ProgressPatch) {
        if let Some(anchored) = patch.is_anchored {
            self.is_anchored = anchored;
        }
        if let Some(uid) = &patch.anchored_principal_uid {
            self.anchored_principal_uid = uid.clone();
        }
        if let Some(code) = &patch.access_code {
            self.access_code = code.clone();
        }
    }
}

/// Partial update. `None` leaves a field untouched; `Some(None)` clears an
/// optional field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_anchored: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anchored_principal_uid: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_code: Option<Option<String>>,
}

impl ProgressPatch {
    /// Patch healing the anchoring fields.
    pub fn anchoring(is_anchored: bool, uid: Option<String>) -> Self {
        Self {
            is_anchored: Some(is_anchored),
            anchored_principal_uid: Some(uid),
            ..Self::default()
        }
    }
}

/// Remote mapping from a principal to the visitor it owns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityLink {
    pub uid: String,
    pub visitor_id: String,
    pub linked_at: DateTime<Utc>,
}

/// Last flushed values. Bounds write amplification.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncCursor {
    pub score: f64,
    pub state: CoherenceState,
    pub day: u32,
    pub at: DateTime<Utc>,
}

impl SyncCursor {
    pub fn from_record(record: &ProgressRecord, at: DateTime<Utc>) -> Self {
        Self {
            score: record.coherence_score,
            state: record.coherence_state,
            day: record.day_progress,
            at,
        }
    }
}

/// Progress captured before a risky identity operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationPayload {
    pub day: u32,
    pub score: f64,
    pub from_visitor_id: String,
    pub from_uid: Option<String>,
    pub captured_at: DateTime<Utc>,
}

/// Result of redeeming a recovery code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryGrant {
    /// Short-lived credential for `CredentialKind::CustomToken` sign-in.
    pub credential_token: String,
    pub visitor_id: String,
    pub expires_at: DateTime<Utc>,
}

/// Clamp a score into [0, 100]; NaN becomes 0.
#[inline]
pub fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(engine::MIN_SCORE, engine::MAX_SCORE)
    }
}
