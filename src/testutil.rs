//! In-memory fakes for the engine's collaborator seams.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::conflict::SyncConflict;
use crate::date_range::DateRange;
use crate::error::{CalSyncResult, SyncError};
use crate::event::{ExternalEvent, LocalEvent};
use crate::integration::{CalendarIntegration, IntegrationRegistry};
use crate::provider::{ExternalCalendar, Provider, ProviderClient};
use crate::store::{ConflictStore, EventMapping, LocalEventStore};

#[derive(Default)]
pub struct InMemoryEventStore {
    events: Mutex<HashMap<Uuid, LocalEvent>>,
    mappings: Mutex<HashMap<(Uuid, Uuid), EventMapping>>,
}

impl InMemoryEventStore {
    pub fn seed_event(&self, event: LocalEvent) {
        self.events.lock().unwrap().insert(event.id, event);
    }

    pub fn seed_mapping(&self, mapping: EventMapping) {
        self.mappings.lock().unwrap().insert(
            (mapping.integration_id, mapping.local_event_id),
            mapping,
        );
    }

    pub fn all_events(&self) -> Vec<LocalEvent> {
        self.events.lock().unwrap().values().cloned().collect()
    }

    pub fn all_mappings(&self) -> Vec<EventMapping> {
        self.mappings.lock().unwrap().values().cloned().collect()
    }
}

#[async_trait]
impl LocalEventStore for InMemoryEventStore {
    async fn events_in_range(
        &self,
        user_id: Uuid,
        range: &DateRange,
    ) -> CalSyncResult<Vec<LocalEvent>> {
        Ok(self
            .events
            .lock()
            .unwrap()
            .values()
            .filter(|e| e.user_id == user_id && range.contains(e.start))
            .cloned()
            .collect())
    }

    async fn get_event(&self, id: Uuid) -> CalSyncResult<Option<LocalEvent>> {
        Ok(self.events.lock().unwrap().get(&id).cloned())
    }

    async fn create_event(&self, event: &LocalEvent) -> CalSyncResult<()> {
        self.events.lock().unwrap().insert(event.id, event.clone());
        Ok(())
    }

    async fn update_event(&self, event: &LocalEvent) -> CalSyncResult<()> {
        self.events.lock().unwrap().insert(event.id, event.clone());
        Ok(())
    }

    async fn delete_event(&self, id: Uuid) -> CalSyncResult<()> {
        self.events.lock().unwrap().remove(&id);
        Ok(())
    }

    async fn mappings_for_integration(
        &self,
        integration_id: Uuid,
    ) -> CalSyncResult<Vec<EventMapping>> {
        Ok(self
            .mappings
            .lock()
            .unwrap()
            .values()
            .filter(|m| m.integration_id == integration_id)
            .cloned()
            .collect())
    }

    async fn upsert_mapping(&self, mapping: &EventMapping) -> CalSyncResult<()> {
        self.mappings.lock().unwrap().insert(
            (mapping.integration_id, mapping.local_event_id),
            mapping.clone(),
        );
        Ok(())
    }

    async fn delete_mapping(
        &self,
        integration_id: Uuid,
        local_event_id: Uuid,
    ) -> CalSyncResult<()> {
        self.mappings
            .lock()
            .unwrap()
            .remove(&(integration_id, local_event_id));
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryRegistry {
    integrations: Mutex<HashMap<Uuid, CalendarIntegration>>,
}

impl InMemoryRegistry {
    pub fn seed(&self, integration: CalendarIntegration) {
        self.integrations
            .lock()
            .unwrap()
            .insert(integration.id, integration);
    }
}

#[async_trait]
impl IntegrationRegistry for InMemoryRegistry {
    async fn get(&self, id: Uuid) -> CalSyncResult<Option<CalendarIntegration>> {
        Ok(self.integrations.lock().unwrap().get(&id).cloned())
    }

    async fn list_for_user(&self, user_id: Uuid) -> CalSyncResult<Vec<CalendarIntegration>> {
        Ok(self
            .integrations
            .lock()
            .unwrap()
            .values()
            .filter(|i| i.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn update(&self, integration: &CalendarIntegration) -> CalSyncResult<()> {
        self.integrations
            .lock()
            .unwrap()
            .insert(integration.id, integration.clone());
        Ok(())
    }

    async fn remove(&self, id: Uuid) -> CalSyncResult<()> {
        self.integrations.lock().unwrap().remove(&id);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryConflictStore {
    conflicts: Mutex<Vec<SyncConflict>>,
}

impl InMemoryConflictStore {
    pub fn all(&self) -> Vec<SyncConflict> {
        self.conflicts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ConflictStore for InMemoryConflictStore {
    async fn insert(&self, conflict: &SyncConflict) -> CalSyncResult<()> {
        self.conflicts.lock().unwrap().push(conflict.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> CalSyncResult<Option<SyncConflict>> {
        Ok(self
            .conflicts
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.id == id)
            .cloned())
    }

    async fn list_for_user(&self, user_id: Uuid) -> CalSyncResult<Vec<SyncConflict>> {
        Ok(self
            .conflicts
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn update(&self, conflict: &SyncConflict) -> CalSyncResult<()> {
        let mut conflicts = self.conflicts.lock().unwrap();
        if let Some(existing) = conflicts.iter_mut().find(|c| c.id == conflict.id) {
            *existing = conflict.clone();
        }
        Ok(())
    }
}

/// Fake provider backend: an in-memory event table plus counters and
/// injectable failures.
pub struct FakeProviderClient {
    provider: Provider,
    events: Mutex<HashMap<String, ExternalEvent>>,
    /// Errors returned by the next `list_events` calls, in order.
    list_failures: Mutex<Vec<SyncError>>,
    write_count: AtomicUsize,
    next_id: AtomicUsize,
}

impl FakeProviderClient {
    pub fn new(provider: Provider) -> Self {
        FakeProviderClient {
            provider,
            events: Mutex::new(HashMap::new()),
            list_failures: Mutex::new(Vec::new()),
            write_count: AtomicUsize::new(0),
            next_id: AtomicUsize::new(1),
        }
    }

    pub fn seed_event(&self, event: ExternalEvent) {
        self.events
            .lock()
            .unwrap()
            .insert(event.external_id.clone(), event);
    }

    pub fn fail_next_list(&self, err: SyncError) {
        self.list_failures.lock().unwrap().push(err);
    }

    pub fn all_events(&self) -> Vec<ExternalEvent> {
        self.events.lock().unwrap().values().cloned().collect()
    }

    pub fn event(&self, external_id: &str) -> Option<ExternalEvent> {
        self.events.lock().unwrap().get(external_id).cloned()
    }

    /// Number of create/update/delete calls received.
    pub fn write_count(&self) -> usize {
        self.write_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProviderClient for FakeProviderClient {
    fn provider(&self) -> Provider {
        self.provider
    }

    async fn list_calendars(&self) -> CalSyncResult<Vec<ExternalCalendar>> {
        Ok(vec![ExternalCalendar {
            id: "primary".to_string(),
            name: "Primary".to_string(),
            primary: true,
        }])
    }

    async fn list_events(
        &self,
        _calendar_id: &str,
        range: &DateRange,
    ) -> CalSyncResult<Vec<ExternalEvent>> {
        if let Some(err) = self.list_failures.lock().unwrap().pop() {
            return Err(err);
        }
        Ok(self
            .events
            .lock()
            .unwrap()
            .values()
            .filter(|e| range.contains(e.start))
            .cloned()
            .collect())
    }

    async fn create_event(
        &self,
        _calendar_id: &str,
        event: &ExternalEvent,
    ) -> CalSyncResult<ExternalEvent> {
        self.write_count.fetch_add(1, Ordering::SeqCst);
        let mut created = event.clone();
        if created.external_id.is_empty() {
            let n = self.next_id.fetch_add(1, Ordering::SeqCst);
            created.external_id = format!("{}-{}", self.provider.name(), n);
        }
        created.updated = Some(Utc::now());
        self.events
            .lock()
            .unwrap()
            .insert(created.external_id.clone(), created.clone());
        Ok(created)
    }

    async fn update_event(
        &self,
        _calendar_id: &str,
        event: &ExternalEvent,
    ) -> CalSyncResult<ExternalEvent> {
        self.write_count.fetch_add(1, Ordering::SeqCst);
        let mut updated = event.clone();
        updated.updated = Some(Utc::now());
        self.events
            .lock()
            .unwrap()
            .insert(updated.external_id.clone(), updated.clone());
        Ok(updated)
    }

    async fn delete_event(&self, _calendar_id: &str, event_id: &str) -> CalSyncResult<()> {
        self.write_count.fetch_add(1, Ordering::SeqCst);
        self.events.lock().unwrap().remove(event_id);
        Ok(())
    }
}
