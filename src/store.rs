//! Persistence seams the engine consumes.
//!
//! The engine owns no storage. Local events, event mappings, and conflict
//! records live behind these traits, injected at construction. `EventMapping`
//! is the sync state proper: the last point where both sides of a pair were
//! known to agree, captured as a content fingerprint plus the external
//! snapshot at that moment. Change detection pivots entirely on it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::conflict::SyncConflict;
use crate::date_range::DateRange;
use crate::error::CalSyncResult;
use crate::event::{ExternalEvent, LocalEvent};

/// Last-synced linkage between a local event and its external counterpart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMapping {
    pub local_event_id: Uuid,
    pub external_event_id: String,
    pub integration_id: Uuid,
    /// Fingerprint both sides converged on at the last sync.
    pub fingerprint: String,
    /// External state at the last sync, attached to conflict records.
    pub snapshot: ExternalEvent,
    pub synced_at: DateTime<Utc>,
}

/// Store of user-owned events and their sync mappings.
#[async_trait]
pub trait LocalEventStore: Send + Sync {
    async fn events_in_range(
        &self,
        user_id: Uuid,
        range: &DateRange,
    ) -> CalSyncResult<Vec<LocalEvent>>;

    async fn get_event(&self, id: Uuid) -> CalSyncResult<Option<LocalEvent>>;

    async fn create_event(&self, event: &LocalEvent) -> CalSyncResult<()>;

    async fn update_event(&self, event: &LocalEvent) -> CalSyncResult<()>;

    async fn delete_event(&self, id: Uuid) -> CalSyncResult<()>;

    async fn mappings_for_integration(
        &self,
        integration_id: Uuid,
    ) -> CalSyncResult<Vec<EventMapping>>;

    async fn upsert_mapping(&self, mapping: &EventMapping) -> CalSyncResult<()>;

    async fn delete_mapping(
        &self,
        integration_id: Uuid,
        local_event_id: Uuid,
    ) -> CalSyncResult<()>;
}

/// Append-mostly store of conflict records.
///
/// Conflicts are never deleted; resolution mutates status in place and the
/// rows remain as an audit trail.
#[async_trait]
pub trait ConflictStore: Send + Sync {
    async fn insert(&self, conflict: &SyncConflict) -> CalSyncResult<()>;

    async fn get(&self, id: Uuid) -> CalSyncResult<Option<SyncConflict>>;

    async fn list_for_user(&self, user_id: Uuid) -> CalSyncResult<Vec<SyncConflict>>;

    async fn update(&self, conflict: &SyncConflict) -> CalSyncResult<()>;
}
