//! Manual conflict resolution.
//!
//! The service owns the conflict lifecycle: recording during a sync pass,
//! listing for the UI layer, and applying one of the four manual strategies.
//! Resolution is user-directed and idempotent, so there are no silent
//! retries; failures surface directly in the returned outcome.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::conflict::types::{
    ConflictStatistics, ConflictStatus, MergedEventData, Resolution, SyncConflict,
};
use crate::error::{CalSyncResult, SyncError};
use crate::event::{ExternalEvent, LocalEvent};
use crate::integration::{CalendarIntegration, IntegrationRegistry};
use crate::mapper::{apply_patch, fingerprint_external, to_external, to_local};
use crate::provider::{Provider, ProviderClient};
use crate::store::{ConflictStore, EventMapping, LocalEventStore};

/// Result of a resolution request, surfaced to the caller as data rather
/// than raised.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionOutcome {
    pub success: bool,
    pub error: Option<String>,
}

impl ResolutionOutcome {
    fn ok() -> Self {
        ResolutionOutcome {
            success: true,
            error: None,
        }
    }

    fn failed(err: SyncError) -> Self {
        ResolutionOutcome {
            success: false,
            error: Some(err.to_string()),
        }
    }
}

pub struct ConflictResolutionService {
    conflicts: Arc<dyn ConflictStore>,
    events: Arc<dyn LocalEventStore>,
    registry: Arc<dyn IntegrationRegistry>,
    clients: HashMap<Provider, Arc<dyn ProviderClient>>,
    /// Serializes resolutions so two simultaneous requests for the same
    /// conflict cannot both apply. Coarse, but resolution is a rare,
    /// user-paced operation.
    resolve_lock: Mutex<()>,
}

impl ConflictResolutionService {
    pub fn new(
        conflicts: Arc<dyn ConflictStore>,
        events: Arc<dyn LocalEventStore>,
        registry: Arc<dyn IntegrationRegistry>,
        clients: HashMap<Provider, Arc<dyn ProviderClient>>,
    ) -> Self {
        ConflictResolutionService {
            conflicts,
            events,
            registry,
            clients,
            resolve_lock: Mutex::new(()),
        }
    }

    /// Persist a freshly detected conflict.
    pub async fn record(&self, conflict: &SyncConflict) -> CalSyncResult<()> {
        info!(
            conflict_id = %conflict.id,
            conflict_type = ?conflict.conflict_type,
            "recording sync conflict"
        );
        self.conflicts.insert(conflict).await
    }

    /// Pending conflicts for a user, oldest first.
    pub async fn pending_conflicts(&self, user_id: Uuid) -> CalSyncResult<Vec<SyncConflict>> {
        let mut pending: Vec<SyncConflict> = self
            .conflicts
            .list_for_user(user_id)
            .await?
            .into_iter()
            .filter(|c| !c.is_resolved())
            .collect();
        pending.sort_by_key(|c| c.created_at);
        Ok(pending)
    }

    pub async fn conflict_statistics(&self, user_id: Uuid) -> CalSyncResult<ConflictStatistics> {
        let conflicts = self.conflicts.list_for_user(user_id).await?;
        Ok(ConflictStatistics::tally(&conflicts))
    }

    /// Apply a manual resolution strategy.
    ///
    /// Resolving an already-resolved conflict is a no-op success so callers
    /// may retry safely.
    pub async fn resolve_manually(
        &self,
        conflict_id: Uuid,
        user_id: Uuid,
        resolution: Resolution,
        merged_data: Option<MergedEventData>,
    ) -> ResolutionOutcome {
        let _guard = self.resolve_lock.lock().await;
        match self
            .resolve_inner(conflict_id, user_id, resolution, merged_data)
            .await
        {
            Ok(()) => ResolutionOutcome::ok(),
            Err(err) => {
                warn!(%conflict_id, error = %err, "conflict resolution failed");
                ResolutionOutcome::failed(err)
            }
        }
    }

    async fn resolve_inner(
        &self,
        conflict_id: Uuid,
        user_id: Uuid,
        resolution: Resolution,
        merged_data: Option<MergedEventData>,
    ) -> CalSyncResult<()> {
        let mut conflict = self
            .conflicts
            .get(conflict_id)
            .await?
            .ok_or(SyncError::ConflictNotFound(conflict_id))?;

        if conflict.user_id != user_id {
            return Err(SyncError::Forbidden(
                "conflict belongs to a different user".to_string(),
            ));
        }

        if conflict.is_resolved() {
            return Ok(());
        }

        let integration = self
            .registry
            .get(conflict.integration_id)
            .await?
            .ok_or(SyncError::IntegrationNotFound(conflict.integration_id))?;

        match resolution {
            Resolution::KeepLocal => self.apply_keep_local(&conflict, &integration).await?,
            Resolution::KeepExternal => self.apply_keep_external(&conflict, &integration).await?,
            Resolution::Merge => {
                let merged = merged_data.ok_or_else(|| {
                    SyncError::Validation("merge resolution requires merged event data".to_string())
                })?;
                self.apply_merge(&conflict, &integration, merged).await?;
            }
            Resolution::Ignore => {}
        }

        conflict.status = ConflictStatus::Resolved;
        conflict.resolution = Some(resolution);
        conflict.resolved_at = Some(Utc::now());
        self.conflicts.update(&conflict).await?;
        info!(%conflict_id, ?resolution, "conflict resolved");
        Ok(())
    }

    fn client_for(&self, provider: Provider) -> CalSyncResult<&Arc<dyn ProviderClient>> {
        self.clients
            .get(&provider)
            .ok_or_else(|| SyncError::ProviderNotRegistered(provider.name().to_string()))
    }

    /// The live local event named by the conflict snapshot.
    async fn live_local(&self, conflict: &SyncConflict) -> CalSyncResult<Option<LocalEvent>> {
        match conflict.local_event()? {
            Some(snapshot) => self.events.get_event(snapshot.id).await,
            None => Ok(None),
        }
    }

    /// Push the local version out, overwriting (or recreating) the external
    /// copy.
    async fn apply_keep_local(
        &self,
        conflict: &SyncConflict,
        integration: &CalendarIntegration,
    ) -> CalSyncResult<()> {
        let local = self.live_local(conflict).await?.ok_or_else(|| {
            SyncError::Validation("local event no longer exists; resolve as keep_external".into())
        })?;

        let client = self.client_for(integration.provider)?;
        let mut outgoing = to_external(&local, integration.provider);

        let written = match conflict.external_event()? {
            Some(external) => {
                outgoing.external_id = external.external_id;
                client
                    .update_event(&integration.calendar_id, &outgoing)
                    .await?
            }
            // External copy is gone (deletion conflict): recreate it.
            None => {
                client
                    .create_event(&integration.calendar_id, &outgoing)
                    .await?
            }
        };

        self.save_converged(integration, &local, &written).await
    }

    /// Overwrite (or restore, or delete) the local copy so it matches the
    /// external side.
    async fn apply_keep_external(
        &self,
        conflict: &SyncConflict,
        integration: &CalendarIntegration,
    ) -> CalSyncResult<()> {
        let external = match conflict.external_event()? {
            Some(external) => external,
            // External side was the deletion: keeping it means deleting
            // locally too.
            None => {
                if let Some(local) = self.live_local(conflict).await? {
                    self.events.delete_event(local.id).await?;
                    self.events
                        .delete_mapping(integration.id, local.id)
                        .await?;
                }
                return Ok(());
            }
        };

        let patch = to_local(&external, integration.provider);
        let local = match self.live_local(conflict).await? {
            Some(mut local) => {
                apply_patch(&mut local, &patch);
                local.updated_at = Utc::now();
                self.events.update_event(&local).await?;
                local
            }
            // Local copy was deleted: restore it from the external version.
            None => {
                let mut local = LocalEvent {
                    id: Uuid::new_v4(),
                    user_id: conflict.user_id,
                    title: external.title.clone(),
                    description: None,
                    start: external.start,
                    end: external.end,
                    location: None,
                    parent_event_id: None,
                    is_exception: false,
                    updated_at: Utc::now(),
                };
                apply_patch(&mut local, &patch);
                self.events.create_event(&local).await?;
                local
            }
        };

        self.save_converged(integration, &local, &external).await
    }

    /// Apply caller-supplied merged fields, then push the result to both
    /// sides so they converge.
    async fn apply_merge(
        &self,
        conflict: &SyncConflict,
        integration: &CalendarIntegration,
        merged: MergedEventData,
    ) -> CalSyncResult<()> {
        let mut local = match self.live_local(conflict).await? {
            Some(local) => local,
            None => {
                let external = conflict.external_event()?.ok_or_else(|| {
                    SyncError::Validation(
                        "cannot merge: both sides of the conflict are gone".into(),
                    )
                })?;
                LocalEvent {
                    id: Uuid::new_v4(),
                    user_id: conflict.user_id,
                    title: external.title.clone(),
                    description: external.description.clone(),
                    start: external.start,
                    end: external.end,
                    location: external.location.clone(),
                    parent_event_id: None,
                    is_exception: false,
                    updated_at: Utc::now(),
                }
            }
        };

        if let Some(title) = merged.title {
            local.title = title;
        }
        if let Some(description) = merged.description {
            local.description = Some(description);
        }
        if let Some(start) = merged.start {
            local.start = start;
        }
        if let Some(end) = merged.end {
            local.end = end;
        }
        if let Some(location) = merged.location {
            local.location = Some(location);
        }
        local.updated_at = Utc::now();

        if self.events.get_event(local.id).await?.is_some() {
            self.events.update_event(&local).await?;
        } else {
            self.events.create_event(&local).await?;
        }

        let client = self.client_for(integration.provider)?;
        let mut outgoing = to_external(&local, integration.provider);
        let written = match conflict.external_event()? {
            Some(external) if !external.external_id.is_empty() => {
                outgoing.external_id = external.external_id;
                client
                    .update_event(&integration.calendar_id, &outgoing)
                    .await?
            }
            _ => {
                client
                    .create_event(&integration.calendar_id, &outgoing)
                    .await?
            }
        };

        self.save_converged(integration, &local, &written).await
    }

    /// Record the post-resolution agreement point for the pair.
    async fn save_converged(
        &self,
        integration: &CalendarIntegration,
        local: &LocalEvent,
        external: &ExternalEvent,
    ) -> CalSyncResult<()> {
        self.events
            .upsert_mapping(&EventMapping {
                local_event_id: local.id,
                external_event_id: external.external_id.clone(),
                integration_id: integration.id,
                fingerprint: fingerprint_external(external),
                snapshot: external.clone(),
                synced_at: Utc::now(),
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conflict::types::ConflictType;
    use crate::integration::SyncDirection;
    use crate::testutil::{
        FakeProviderClient, InMemoryConflictStore, InMemoryEventStore, InMemoryRegistry,
    };
    use chrono::Duration;

    struct Harness {
        service: ConflictResolutionService,
        events: Arc<InMemoryEventStore>,
        conflicts: Arc<InMemoryConflictStore>,
        provider: Arc<FakeProviderClient>,
        integration: CalendarIntegration,
    }

    fn harness() -> Harness {
        let events = Arc::new(InMemoryEventStore::default());
        let conflicts = Arc::new(InMemoryConflictStore::default());
        let registry = Arc::new(InMemoryRegistry::default());
        let provider = Arc::new(FakeProviderClient::new(Provider::Google));

        let integration = CalendarIntegration::new(
            Uuid::new_v4(),
            Provider::Google,
            "primary",
            SyncDirection::Bidirectional,
        );
        registry.seed(integration.clone());

        let mut clients: HashMap<Provider, Arc<dyn ProviderClient>> = HashMap::new();
        clients.insert(Provider::Google, provider.clone());

        let service = ConflictResolutionService::new(
            conflicts.clone(),
            events.clone(),
            registry,
            clients,
        );
        Harness {
            service,
            events,
            conflicts,
            provider,
            integration,
        }
    }

    fn conflicting_pair(h: &Harness) -> (LocalEvent, ExternalEvent) {
        let start = Utc::now() + Duration::days(2);
        let local = LocalEvent {
            id: Uuid::new_v4(),
            user_id: h.integration.user_id,
            title: "Team meeting".to_string(),
            description: Some("local agenda".to_string()),
            start,
            end: start + Duration::hours(1),
            location: Some("Room A".to_string()),
            parent_event_id: None,
            is_exception: false,
            updated_at: Utc::now(),
        };
        let external = ExternalEvent {
            external_id: "ext-1".to_string(),
            title: "Team meeting".to_string(),
            description: Some("remote agenda".to_string()),
            start: start + Duration::minutes(30),
            end: start + Duration::minutes(90),
            location: Some("Room A".to_string()),
            updated: None,
        };
        (local, external)
    }

    /// Seeds both sides plus a recorded conflict, returning its id.
    async fn seed_conflict(h: &Harness, local: &LocalEvent, external: &ExternalEvent) -> Uuid {
        h.events.seed_event(local.clone());
        h.provider.seed_event(external.clone());
        let conflict = SyncConflict::new(
            h.integration.user_id,
            h.integration.id,
            ConflictType::TimeMismatch,
            Some(local),
            Some(external),
            "event times diverged",
        )
        .unwrap();
        let id = conflict.id;
        h.service.record(&conflict).await.unwrap();
        id
    }

    #[tokio::test]
    async fn test_keep_local_overwrites_external_copy() {
        let h = harness();
        let (local, external) = conflicting_pair(&h);
        let id = seed_conflict(&h, &local, &external).await;

        let outcome = h
            .service
            .resolve_manually(id, h.integration.user_id, Resolution::KeepLocal, None)
            .await;
        assert!(outcome.success, "{:?}", outcome.error);

        let remote = h.provider.event("ext-1").unwrap();
        assert_eq!(remote.start, local.start);
        assert_eq!(remote.description, Some("local agenda".to_string()));

        // The pair converged: mapping fingerprint matches the written copy.
        let mapping = h.events.all_mappings().pop().unwrap();
        assert_eq!(mapping.fingerprint, fingerprint_external(&remote));
        assert_eq!(h.conflicts.all()[0].status, ConflictStatus::Resolved);
    }

    #[tokio::test]
    async fn test_keep_external_overwrites_local_copy() {
        let h = harness();
        let (local, external) = conflicting_pair(&h);
        let id = seed_conflict(&h, &local, &external).await;

        let outcome = h
            .service
            .resolve_manually(id, h.integration.user_id, Resolution::KeepExternal, None)
            .await;
        assert!(outcome.success);

        let live = h.events.get_event(local.id).await.unwrap().unwrap();
        assert_eq!(live.start, external.start);
        assert_eq!(live.description, Some("remote agenda".to_string()));
        assert_eq!(h.provider.write_count(), 0);
    }

    #[tokio::test]
    async fn test_keep_external_deletion_removes_local_event() {
        let h = harness();
        let (local, _) = conflicting_pair(&h);
        h.events.seed_event(local.clone());
        let conflict = SyncConflict::new(
            h.integration.user_id,
            h.integration.id,
            ConflictType::DeletionConflict,
            Some(&local),
            None,
            "external copy was deleted",
        )
        .unwrap();
        let id = conflict.id;
        h.service.record(&conflict).await.unwrap();

        let outcome = h
            .service
            .resolve_manually(id, h.integration.user_id, Resolution::KeepExternal, None)
            .await;
        assert!(outcome.success);
        assert!(h.events.get_event(local.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_merge_converges_both_sides() {
        let h = harness();
        let (local, external) = conflicting_pair(&h);
        let id = seed_conflict(&h, &local, &external).await;

        // Pick a start between the two versions.
        let merged_start = local.start + Duration::minutes(15);
        let merged = MergedEventData {
            title: None,
            description: Some("combined agenda".to_string()),
            start: Some(merged_start),
            end: Some(merged_start + Duration::hours(1)),
            location: None,
        };

        let outcome = h
            .service
            .resolve_manually(id, h.integration.user_id, Resolution::Merge, Some(merged))
            .await;
        assert!(outcome.success, "{:?}", outcome.error);

        let live = h.events.get_event(local.id).await.unwrap().unwrap();
        let remote = h.provider.event("ext-1").unwrap();
        assert_eq!(live.start, merged_start);
        assert_eq!(remote.start, merged_start);
        assert_eq!(live.description, Some("combined agenda".to_string()));
        assert_eq!(remote.description, Some("combined agenda".to_string()));
    }

    #[tokio::test]
    async fn test_merge_without_merged_data_fails() {
        let h = harness();
        let (local, external) = conflicting_pair(&h);
        let id = seed_conflict(&h, &local, &external).await;

        let outcome = h
            .service
            .resolve_manually(id, h.integration.user_id, Resolution::Merge, None)
            .await;
        assert!(!outcome.success);
        assert_eq!(h.conflicts.all()[0].status, ConflictStatus::Pending);
    }

    #[tokio::test]
    async fn test_ignore_touches_neither_side() {
        let h = harness();
        let (local, external) = conflicting_pair(&h);
        let id = seed_conflict(&h, &local, &external).await;

        let outcome = h
            .service
            .resolve_manually(id, h.integration.user_id, Resolution::Ignore, None)
            .await;
        assert!(outcome.success);

        let live = h.events.get_event(local.id).await.unwrap().unwrap();
        assert_eq!(live.start, local.start);
        assert_eq!(h.provider.event("ext-1").unwrap().start, external.start);
        assert_eq!(h.provider.write_count(), 0);
        assert_eq!(h.conflicts.all()[0].status, ConflictStatus::Resolved);
    }

    #[tokio::test]
    async fn test_resolving_twice_is_noop_success() {
        let h = harness();
        let (local, external) = conflicting_pair(&h);
        let id = seed_conflict(&h, &local, &external).await;

        let first = h
            .service
            .resolve_manually(id, h.integration.user_id, Resolution::KeepLocal, None)
            .await;
        assert!(first.success);
        let writes = h.provider.write_count();

        let second = h
            .service
            .resolve_manually(id, h.integration.user_id, Resolution::KeepExternal, None)
            .await;
        assert!(second.success);
        // Second resolution applied nothing.
        assert_eq!(h.provider.write_count(), writes);
    }

    #[tokio::test]
    async fn test_wrong_user_is_forbidden() {
        let h = harness();
        let (local, external) = conflicting_pair(&h);
        let id = seed_conflict(&h, &local, &external).await;

        let outcome = h
            .service
            .resolve_manually(id, Uuid::new_v4(), Resolution::KeepLocal, None)
            .await;
        assert!(!outcome.success);
        assert_eq!(h.conflicts.all()[0].status, ConflictStatus::Pending);
    }

    #[tokio::test]
    async fn test_unknown_conflict_id_fails() {
        let h = harness();
        let outcome = h
            .service
            .resolve_manually(
                Uuid::new_v4(),
                h.integration.user_id,
                Resolution::KeepLocal,
                None,
            )
            .await;
        assert!(!outcome.success);
    }

    #[tokio::test]
    async fn test_pending_conflicts_sorted_oldest_first() {
        let h = harness();
        let (local, external) = conflicting_pair(&h);
        let first = seed_conflict(&h, &local, &external).await;

        let (local2, mut external2) = conflicting_pair(&h);
        external2.external_id = "ext-2".to_string();
        let second = seed_conflict(&h, &local2, &external2).await;

        h.service
            .resolve_manually(first, h.integration.user_id, Resolution::Ignore, None)
            .await;

        let pending = h
            .service
            .pending_conflicts(h.integration.user_id)
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, second);

        let stats = h
            .service
            .conflict_statistics(h.integration.user_id)
            .await
            .unwrap();
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.resolved, 1);
        assert_eq!(stats.time_mismatches, 2);
    }
}
