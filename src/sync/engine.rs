//! Sync pass orchestration.
//!
//! One `perform_full_sync` call is one pass for one integration. The
//! integration row is the serialization point: the engine claims the
//! integration id for the duration of the pass, so two passes for the same
//! integration can never overlap, while passes for different integrations
//! run fully in parallel.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::SyncConfig;
use crate::conflict::ConflictResolutionService;
use crate::date_range::DateRange;
use crate::error::{CalSyncResult, SyncError};
use crate::event::LocalEvent;
use crate::integration::{CalendarIntegration, IntegrationRegistry, SyncStatus};
use crate::mapper::{apply_patch, fingerprint_external, to_external, to_local};
use crate::provider::{Provider, ProviderClient};
use crate::store::{EventMapping, LocalEventStore};
use crate::sync::delta::{DeltaCounts, DeltaDirection, DeltaKind, SyncDelta};
use crate::sync::plan::build_plan;
use crate::sync::retry::with_retry;

/// Outcome of one sync pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncResult {
    pub success: bool,
    pub events_processed: usize,
    pub conflicts_detected: usize,
    pub errors: Vec<String>,
    pub pulled: DeltaCounts,
    pub pushed: DeltaCounts,
}

impl SyncResult {
    /// Successful pass that had nothing to do.
    pub fn noop() -> Self {
        SyncResult {
            success: true,
            ..SyncResult::default()
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        SyncResult {
            success: false,
            errors: vec![message.into()],
            ..SyncResult::default()
        }
    }
}

/// Aggregate over a "sync all" fan-out.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncSummary {
    pub integrations_synced: usize,
    pub integrations_failed: usize,
    pub events_processed: usize,
    pub conflicts_detected: usize,
}

impl SyncSummary {
    pub fn from_results(results: &[(Uuid, SyncResult)]) -> Self {
        let mut summary = SyncSummary::default();
        for (_, result) in results {
            if result.success {
                summary.integrations_synced += 1;
            } else {
                summary.integrations_failed += 1;
            }
            summary.events_processed += result.events_processed;
            summary.conflicts_detected += result.conflicts_detected;
        }
        summary
    }
}

pub struct SyncEngine {
    config: SyncConfig,
    registry: Arc<dyn IntegrationRegistry>,
    events: Arc<dyn LocalEventStore>,
    resolutions: Arc<ConflictResolutionService>,
    clients: HashMap<Provider, Arc<dyn ProviderClient>>,
    in_flight: Mutex<HashSet<Uuid>>,
    cancel: CancellationToken,
}

/// RAII claim on an integration id; released when the pass ends, however it
/// ends.
struct InFlightClaim<'a> {
    set: &'a Mutex<HashSet<Uuid>>,
    id: Uuid,
}

impl Drop for InFlightClaim<'_> {
    fn drop(&mut self) {
        self.set
            .lock()
            .expect("in-flight set poisoned")
            .remove(&self.id);
    }
}

impl SyncEngine {
    pub fn new(
        config: SyncConfig,
        registry: Arc<dyn IntegrationRegistry>,
        events: Arc<dyn LocalEventStore>,
        resolutions: Arc<ConflictResolutionService>,
        clients: HashMap<Provider, Arc<dyn ProviderClient>>,
    ) -> Self {
        SyncEngine {
            config,
            registry,
            events,
            resolutions,
            clients,
            in_flight: Mutex::new(HashSet::new()),
            cancel: CancellationToken::new(),
        }
    }

    /// Signal every in-flight and future pass to stop at its next I/O
    /// boundary.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    fn claim(&self, integration_id: Uuid) -> CalSyncResult<InFlightClaim<'_>> {
        let mut in_flight = self.in_flight.lock().expect("in-flight set poisoned");
        if !in_flight.insert(integration_id) {
            return Err(SyncError::SyncInProgress(integration_id));
        }
        Ok(InFlightClaim {
            set: &self.in_flight,
            id: integration_id,
        })
    }

    fn client_for(&self, provider: Provider) -> CalSyncResult<&Arc<dyn ProviderClient>> {
        self.clients
            .get(&provider)
            .ok_or_else(|| SyncError::ProviderNotRegistered(provider.name().to_string()))
    }

    fn ensure_active(&self) -> CalSyncResult<()> {
        if self.cancel.is_cancelled() {
            Err(SyncError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Run one full synchronization pass for one integration.
    ///
    /// Returns `Err` only for caller mistakes (unknown integration, wrong
    /// user, a pass already in flight). Pass-level failures come back as a
    /// `SyncResult` with `success = false` and the integration moved to
    /// `error` status.
    pub async fn perform_full_sync(
        &self,
        user_id: Uuid,
        integration_id: Uuid,
    ) -> CalSyncResult<SyncResult> {
        let mut integration = self
            .registry
            .get(integration_id)
            .await?
            .ok_or(SyncError::IntegrationNotFound(integration_id))?;

        if integration.user_id != user_id {
            return Err(SyncError::Forbidden(
                "integration belongs to a different user".to_string(),
            ));
        }

        // Disabled is a no-op, not an error.
        if !integration.sync_enabled {
            debug!(%integration_id, "sync disabled, skipping");
            return Ok(SyncResult::noop());
        }

        let _claim = self.claim(integration_id)?;
        let client = Arc::clone(self.client_for(integration.provider)?);

        integration.sync_status = SyncStatus::Syncing;
        integration.last_sync_at = Some(Utc::now());
        self.registry.update(&integration).await?;

        info!(%integration_id, provider = %integration.provider, "sync pass started");
        let outcome = self.run_pass(&integration, client.as_ref()).await;

        // Finalize the status row on every exit path; a pass must never
        // leave the integration stuck in `syncing`.
        integration.last_sync_at = Some(Utc::now());
        let result = match outcome {
            Ok(result) if result.success => {
                integration.sync_status = SyncStatus::Success;
                integration.last_successful_sync_at = integration.last_sync_at;
                integration.sync_error_message = None;
                result
            }
            Ok(result) => {
                integration.sync_status = SyncStatus::Error;
                integration.sync_error_message = Some(result.errors.join("; "));
                result
            }
            Err(err) => {
                integration.sync_status = SyncStatus::Error;
                integration.sync_error_message = Some(err.to_string());
                SyncResult::failed(err.to_string())
            }
        };
        self.registry.update(&integration).await?;

        info!(
            %integration_id,
            success = result.success,
            events = result.events_processed,
            conflicts = result.conflicts_detected,
            "sync pass finished"
        );
        Ok(result)
    }

    async fn run_pass(
        &self,
        integration: &CalendarIntegration,
        client: &dyn ProviderClient,
    ) -> CalSyncResult<SyncResult> {
        self.ensure_active()?;

        let window_days = integration
            .preferences
            .window_days
            .unwrap_or(self.config.window_days);
        let range = DateRange::around_now(window_days);

        // A fetch failure on either side aborts the whole pass: applying
        // deltas planned against half the picture would desynchronize.
        let externals = with_retry(&self.config, "list_events", || {
            client.list_events(&integration.calendar_id, &range)
        })
        .await?;
        self.ensure_active()?;
        let mut locals = self
            .events
            .events_in_range(integration.user_id, &range)
            .await?;
        let mappings = self.events.mappings_for_integration(integration.id).await?;

        // A mapped local event missing from the window query may simply have
        // been rescheduled outside the window. Fetch it by id so the planner
        // only sees a true deletion as absent.
        let fetched: HashSet<Uuid> = locals.iter().map(|e| e.id).collect();
        for mapping in &mappings {
            if !range.contains(mapping.snapshot.start) || fetched.contains(&mapping.local_event_id)
            {
                continue;
            }
            if let Some(event) = self.events.get_event(mapping.local_event_id).await? {
                locals.push(event);
            }
        }

        let plan = build_plan(
            integration,
            &locals,
            &externals,
            &mappings,
            &range,
            &self.config,
        )?;
        debug!(
            deltas = plan.deltas.len(),
            conflicts = plan.conflicts.len(),
            "pass planned"
        );

        let mut result = SyncResult {
            success: true,
            ..SyncResult::default()
        };

        for conflict in &plan.conflicts {
            self.resolutions.record(conflict).await?;
            result.conflicts_detected += 1;
        }

        // Applied deltas are not rolled back on later failure; re-running
        // the pass is safe because an applied delta classifies as unchanged
        // next time.
        for delta in &plan.deltas {
            self.ensure_active()?;
            match self.apply_delta(integration, client, delta).await {
                Ok(()) => {
                    result.events_processed += 1;
                    match delta.direction {
                        DeltaDirection::Pull => result.pulled.record(delta.kind),
                        DeltaDirection::Push => result.pushed.record(delta.kind),
                    }
                }
                Err(err) => {
                    warn!(delta = %delta, error = %err, "failed to apply delta");
                    result.errors.push(format!("{delta}: {err}"));
                }
            }
        }

        for mapping in &plan.stale_mappings {
            self.events
                .delete_mapping(mapping.integration_id, mapping.local_event_id)
                .await?;
        }

        result.success = result.errors.is_empty();
        Ok(result)
    }

    async fn apply_delta(
        &self,
        integration: &CalendarIntegration,
        client: &dyn ProviderClient,
        delta: &SyncDelta,
    ) -> CalSyncResult<()> {
        match (delta.direction, delta.kind) {
            (DeltaDirection::Pull, DeltaKind::Create) => {
                let external = delta
                    .external
                    .as_ref()
                    .expect("pull create must have an external event");
                let patch = to_local(external, integration.provider);
                let mut local = LocalEvent {
                    id: Uuid::new_v4(),
                    user_id: integration.user_id,
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
                self.save_mapping(integration, &local, external).await
            }
            (DeltaDirection::Pull, DeltaKind::Update) => {
                let external = delta
                    .external
                    .as_ref()
                    .expect("pull update must have an external event");
                let mut local = delta
                    .local
                    .as_ref()
                    .expect("pull update must have a local event")
                    .clone();
                apply_patch(&mut local, &to_local(external, integration.provider));
                local.updated_at = Utc::now();
                self.events.update_event(&local).await?;
                self.save_mapping(integration, &local, external).await
            }
            (DeltaDirection::Pull, DeltaKind::Delete) => {
                let mapping = delta
                    .mapping
                    .as_ref()
                    .expect("pull delete must have a mapping");
                self.events.delete_event(mapping.local_event_id).await?;
                self.events
                    .delete_mapping(mapping.integration_id, mapping.local_event_id)
                    .await
            }
            (DeltaDirection::Push, DeltaKind::Create) => {
                let local = delta
                    .local
                    .as_ref()
                    .expect("push create must have a local event");
                let outgoing = to_external(local, integration.provider);
                let created = with_retry(&self.config, "create_event", || {
                    client.create_event(&integration.calendar_id, &outgoing)
                })
                .await?;
                self.save_mapping(integration, local, &created).await
            }
            (DeltaDirection::Push, DeltaKind::Update) => {
                let local = delta
                    .local
                    .as_ref()
                    .expect("push update must have a local event");
                let mapping = delta
                    .mapping
                    .as_ref()
                    .expect("push update must have a mapping");
                let mut outgoing = to_external(local, integration.provider);
                outgoing.external_id = mapping.external_event_id.clone();
                let updated = with_retry(&self.config, "update_event", || {
                    client.update_event(&integration.calendar_id, &outgoing)
                })
                .await?;
                self.save_mapping(integration, local, &updated).await
            }
            (DeltaDirection::Push, DeltaKind::Delete) => {
                let mapping = delta
                    .mapping
                    .as_ref()
                    .expect("push delete must have a mapping");
                with_retry(&self.config, "delete_event", || {
                    client.delete_event(&integration.calendar_id, &mapping.external_event_id)
                })
                .await?;
                self.events
                    .delete_mapping(mapping.integration_id, mapping.local_event_id)
                    .await
            }
        }
    }

    /// Record the new agreement point after a successful apply.
    async fn save_mapping(
        &self,
        integration: &CalendarIntegration,
        local: &LocalEvent,
        external: &crate::event::ExternalEvent,
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

    /// Sync every enabled integration of a user, one independent task per
    /// integration. One integration's failure never cancels the others.
    pub async fn sync_all_for_user(
        self: &Arc<Self>,
        user_id: Uuid,
    ) -> CalSyncResult<Vec<(Uuid, SyncResult)>> {
        let integrations = self.registry.list_for_user(user_id).await?;

        let mut tasks = JoinSet::new();
        for integration in integrations.into_iter().filter(|i| i.sync_enabled) {
            let engine = Arc::clone(self);
            let integration_id = integration.id;
            tasks.spawn(async move {
                let result = engine.perform_full_sync(user_id, integration_id).await;
                (integration_id, result)
            });
        }

        let mut results = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((id, Ok(result))) => results.push((id, result)),
                Ok((id, Err(err))) => results.push((id, SyncResult::failed(err.to_string()))),
                Err(join_err) => warn!(error = %join_err, "sync task failed to join"),
            }
        }
        results.sort_by_key(|(id, _)| *id);
        Ok(results)
    }
}
