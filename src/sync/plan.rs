//! Sync pass planning.
//!
//! Planning is pure: it pairs the fetched local and external events through
//! the stored mappings, classifies every pair, and emits the deltas a pass
//! should apply plus the conflicts it should record. Direction gating
//! happens here, so `import_only` plans simply contain no push deltas.

use std::collections::{HashMap, HashSet};

use crate::config::SyncConfig;
use crate::conflict::detector::{build_conflict, classify_mapped, find_creation_match};
use crate::conflict::types::{ConflictType, SyncConflict};
use crate::conflict::PairOutcome;
use crate::date_range::DateRange;
use crate::error::CalSyncResult;
use crate::event::{ExternalEvent, LocalEvent};
use crate::integration::CalendarIntegration;
use crate::store::EventMapping;
use crate::sync::delta::{DeltaDirection, DeltaKind, SyncDelta};

/// Everything a sync pass decided to do.
#[derive(Debug, Default)]
pub struct SyncPlan {
    pub deltas: Vec<SyncDelta>,
    pub conflicts: Vec<SyncConflict>,
    /// Mappings whose events are gone on both sides.
    pub stale_mappings: Vec<EventMapping>,
}

/// Pair, classify, and gate one sync pass.
///
/// `range` is the window both event lists were fetched with. A mapping whose
/// last-synced snapshot lies outside that window is left untouched: absence
/// from a bounded fetch says nothing about whether the event still exists.
pub fn build_plan(
    integration: &CalendarIntegration,
    locals: &[LocalEvent],
    externals: &[ExternalEvent],
    mappings: &[EventMapping],
    range: &DateRange,
    config: &SyncConfig,
) -> CalSyncResult<SyncPlan> {
    let direction = integration.sync_direction;

    let local_by_id: HashMap<_, _> = locals.iter().map(|e| (e.id, e)).collect();
    let external_by_id: HashMap<_, _> =
        externals.iter().map(|e| (e.external_id.as_str(), e)).collect();
    let mapped_local_ids: HashSet<_> = mappings.iter().map(|m| m.local_event_id).collect();
    let mapped_external_ids: HashSet<_> =
        mappings.iter().map(|m| m.external_event_id.as_str()).collect();

    let mut plan = SyncPlan::default();

    // Events both sides already know about.
    for mapping in mappings {
        if !range.contains(mapping.snapshot.start) {
            continue;
        }
        let local = local_by_id.get(&mapping.local_event_id).copied();
        let external = external_by_id
            .get(mapping.external_event_id.as_str())
            .copied();

        match classify_mapped(local, external, mapping, config) {
            PairOutcome::Unchanged => {}
            PairOutcome::UpdateExternal => {
                if direction.allows_export() {
                    plan.deltas.push(SyncDelta {
                        kind: DeltaKind::Update,
                        direction: DeltaDirection::Push,
                        local: local.cloned(),
                        external: external.cloned(),
                        mapping: Some(mapping.clone()),
                    });
                }
            }
            PairOutcome::UpdateLocal => {
                if direction.allows_import() {
                    plan.deltas.push(SyncDelta {
                        kind: DeltaKind::Update,
                        direction: DeltaDirection::Pull,
                        local: local.cloned(),
                        external: external.cloned(),
                        mapping: Some(mapping.clone()),
                    });
                }
            }
            PairOutcome::DeleteExternal => {
                if direction.allows_export() {
                    plan.deltas.push(SyncDelta {
                        kind: DeltaKind::Delete,
                        direction: DeltaDirection::Push,
                        local: None,
                        external: external.cloned(),
                        mapping: Some(mapping.clone()),
                    });
                }
            }
            PairOutcome::DeleteLocal => {
                if direction.allows_import() {
                    plan.deltas.push(SyncDelta {
                        kind: DeltaKind::Delete,
                        direction: DeltaDirection::Pull,
                        local: local.cloned(),
                        external: None,
                        mapping: Some(mapping.clone()),
                    });
                }
            }
            PairOutcome::DropMapping => plan.stale_mappings.push(mapping.clone()),
            PairOutcome::Conflict(conflict_type) => {
                plan.conflicts
                    .push(build_conflict(integration, conflict_type, local, external)?);
            }
        }
    }

    // Never-synced events on each side. A plausible cross-side match means
    // both sides independently created the same event.
    let unmapped_locals: Vec<&LocalEvent> = locals
        .iter()
        .filter(|e| !mapped_local_ids.contains(&e.id))
        .collect();
    let unmapped_externals: Vec<&ExternalEvent> = externals
        .iter()
        .filter(|e| !mapped_external_ids.contains(e.external_id.as_str()))
        .collect();
    let mut consumed = vec![false; unmapped_externals.len()];

    for local in unmapped_locals {
        let available: Vec<(usize, &ExternalEvent)> = unmapped_externals
            .iter()
            .enumerate()
            .filter(|(idx, _)| !consumed[*idx])
            .map(|(idx, e)| (idx, *e))
            .collect();
        let candidates: Vec<&ExternalEvent> = available.iter().map(|(_, e)| *e).collect();

        if let Some(found) = find_creation_match(local, &candidates, config) {
            let (original_idx, matched) = available[found];
            consumed[original_idx] = true;
            plan.conflicts.push(build_conflict(
                integration,
                ConflictType::CreationConflict,
                Some(local),
                Some(matched),
            )?);
        } else if direction.allows_export() {
            plan.deltas.push(SyncDelta {
                kind: DeltaKind::Create,
                direction: DeltaDirection::Push,
                local: Some(local.clone()),
                external: None,
                mapping: None,
            });
        }
    }

    for (idx, external) in unmapped_externals.iter().enumerate() {
        if consumed[idx] {
            continue;
        }
        if direction.allows_import() {
            plan.deltas.push(SyncDelta {
                kind: DeltaKind::Create,
                direction: DeltaDirection::Pull,
                local: None,
                external: Some((*external).clone()),
                mapping: None,
            });
        }
    }

    // Apply in chronological order.
    plan.deltas.sort_by_key(|d| {
        d.local
            .as_ref()
            .map(|e| e.start)
            .or(d.external.as_ref().map(|e| e.start))
    });

    Ok(plan)
}
