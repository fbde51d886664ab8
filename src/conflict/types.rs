//! Sync conflict records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::CalSyncResult;
use crate::event::{ExternalEvent, LocalEvent};

/// The nature of a detected divergence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictType {
    /// Start/end differ beyond tolerance; no deletion involved.
    TimeMismatch,
    /// Title, description, or location differ while timing matches.
    ContentMismatch,
    /// A mapped event was deleted on one side and modified on the other.
    DeletionConflict,
    /// Plausibly the same new event was created independently on both sides.
    CreationConflict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictStatus {
    Pending,
    Resolved,
}

/// Manual resolution strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// Push the local version to the provider, overwriting the external copy.
    KeepLocal,
    /// Overwrite the local copy with the external version.
    KeepExternal,
    /// Apply caller-supplied merged fields and push the result to both sides.
    Merge,
    /// Mark resolved with no data change on either side.
    Ignore,
}

/// Caller-supplied field values for a [`Resolution::Merge`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MergedEventData {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub location: Option<String>,
}

/// A detected, recorded divergence between a local event and its external
/// counterpart.
///
/// Created by the detector, mutated only through resolution, never deleted:
/// resolved rows remain as an audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConflict {
    pub id: Uuid,
    pub user_id: Uuid,
    pub integration_id: Uuid,
    pub conflict_type: ConflictType,
    /// Snapshot of the local event at detection time, when one existed.
    pub local_event_data: Option<Value>,
    /// Snapshot of the external event at detection time, when one existed.
    pub external_event_data: Option<Value>,
    pub description: String,
    pub status: ConflictStatus,
    pub resolution: Option<Resolution>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl SyncConflict {
    pub fn new(
        user_id: Uuid,
        integration_id: Uuid,
        conflict_type: ConflictType,
        local: Option<&LocalEvent>,
        external: Option<&ExternalEvent>,
        description: impl Into<String>,
    ) -> CalSyncResult<Self> {
        Ok(SyncConflict {
            id: Uuid::new_v4(),
            user_id,
            integration_id,
            conflict_type,
            local_event_data: local.map(serde_json::to_value).transpose()?,
            external_event_data: external.map(serde_json::to_value).transpose()?,
            description: description.into(),
            status: ConflictStatus::Pending,
            resolution: None,
            created_at: Utc::now(),
            resolved_at: None,
        })
    }

    pub fn is_resolved(&self) -> bool {
        self.status == ConflictStatus::Resolved
    }

    pub fn local_event(&self) -> CalSyncResult<Option<LocalEvent>> {
        Ok(self
            .local_event_data
            .clone()
            .map(serde_json::from_value)
            .transpose()?)
    }

    pub fn external_event(&self) -> CalSyncResult<Option<ExternalEvent>> {
        Ok(self
            .external_event_data
            .clone()
            .map(serde_json::from_value)
            .transpose()?)
    }
}

/// Per-user conflict counts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConflictStatistics {
    pub pending: usize,
    pub resolved: usize,
    pub time_mismatches: usize,
    pub content_mismatches: usize,
    pub deletion_conflicts: usize,
    pub creation_conflicts: usize,
}

impl ConflictStatistics {
    pub fn tally(conflicts: &[SyncConflict]) -> Self {
        let mut stats = ConflictStatistics::default();
        for conflict in conflicts {
            match conflict.status {
                ConflictStatus::Pending => stats.pending += 1,
                ConflictStatus::Resolved => stats.resolved += 1,
            }
            match conflict.conflict_type {
                ConflictType::TimeMismatch => stats.time_mismatches += 1,
                ConflictType::ContentMismatch => stats.content_mismatches += 1,
                ConflictType::DeletionConflict => stats.deletion_conflicts += 1,
                ConflictType::CreationConflict => stats.creation_conflicts += 1,
            }
        }
        stats
    }
}
