//! Divergence classification.
//!
//! The detector is pure: given a mapped pair (local, last-synced mapping,
//! current external) or an unmapped event, it decides whether the pair is
//! unchanged, a directional update, a deletion to propagate, or a conflict.
//! All tolerance knobs come from [`SyncConfig`].

use chrono::Duration;

use crate::config::SyncConfig;
use crate::conflict::types::{ConflictType, SyncConflict};
use crate::error::CalSyncResult;
use crate::event::{ExternalEvent, LocalEvent};
use crate::integration::CalendarIntegration;
use crate::mapper::{fingerprint_external, fingerprint_local};
use crate::store::EventMapping;

/// What a mapped pair needs, before direction gating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairOutcome {
    /// Neither side moved since the last sync.
    Unchanged,
    /// Only the local side changed: update the external copy.
    UpdateExternal,
    /// Only the external side changed: update the local copy.
    UpdateLocal,
    /// Deleted locally, untouched externally: propagate the deletion.
    DeleteExternal,
    /// Deleted externally, untouched locally: propagate the deletion.
    DeleteLocal,
    /// Gone on both sides: only the mapping is left to clean up.
    DropMapping,
    /// Both sides moved: record a conflict, apply nothing.
    Conflict(ConflictType),
}

/// Classify a mapped pair against its last-synced fingerprint.
pub fn classify_mapped(
    local: Option<&LocalEvent>,
    external: Option<&ExternalEvent>,
    mapping: &EventMapping,
    config: &SyncConfig,
) -> PairOutcome {
    let local_changed = local.map(|e| fingerprint_local(e) != mapping.fingerprint);
    let external_changed = external.map(|e| fingerprint_external(e) != mapping.fingerprint);

    match (local_changed, external_changed) {
        (None, None) => PairOutcome::DropMapping,
        (None, Some(true)) => PairOutcome::Conflict(ConflictType::DeletionConflict),
        (None, Some(false)) => PairOutcome::DeleteExternal,
        (Some(true), None) => PairOutcome::Conflict(ConflictType::DeletionConflict),
        (Some(false), None) => PairOutcome::DeleteLocal,
        (Some(false), Some(false)) => PairOutcome::Unchanged,
        (Some(true), Some(false)) => PairOutcome::UpdateExternal,
        (Some(false), Some(true)) => PairOutcome::UpdateLocal,
        (Some(true), Some(true)) => {
            let local = local.expect("local side present when it changed");
            let external = external.expect("external side present when it changed");
            if times_match(local, external, config) {
                PairOutcome::Conflict(ConflictType::ContentMismatch)
            } else {
                PairOutcome::Conflict(ConflictType::TimeMismatch)
            }
        }
    }
}

/// Whether both start and end agree within the configured tolerance.
pub fn times_match(local: &LocalEvent, external: &ExternalEvent, config: &SyncConfig) -> bool {
    let tolerance = Duration::seconds(config.time_tolerance_secs);
    (local.start - external.start).abs() <= tolerance
        && (local.end - external.end).abs() <= tolerance
}

/// Find the unmapped external event that plausibly is the same new event as
/// `local`: starts within the creation-match window and title similarity at
/// or above the threshold. Returns the index of the best match.
///
/// Below the threshold, the two are independent new events, not a conflict.
pub fn find_creation_match(
    local: &LocalEvent,
    candidates: &[&ExternalEvent],
    config: &SyncConfig,
) -> Option<usize> {
    let window = Duration::minutes(config.creation_match_window_mins);
    let mut best: Option<(usize, f64)> = None;

    for (idx, candidate) in candidates.iter().enumerate() {
        if (local.start - candidate.start).abs() > window {
            continue;
        }
        let similarity = title_similarity(&local.title, &candidate.title);
        if similarity < config.title_similarity_threshold {
            continue;
        }
        if best.map_or(true, |(_, s)| similarity > s) {
            best = Some((idx, similarity));
        }
    }

    best.map(|(idx, _)| idx)
}

/// Normalized Levenshtein similarity over case-folded, trimmed titles:
/// 1.0 for identical, 0.0 for completely different.
pub fn title_similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.trim().to_lowercase().chars().collect();
    let b: Vec<char> = b.trim().to_lowercase().chars().collect();
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let distance = levenshtein(&a, &b);
    1.0 - distance as f64 / a.len().max(b.len()) as f64
}

fn levenshtein(a: &[char], b: &[char]) -> usize {
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(ca != cb);
            current[j + 1] = substitution.min(prev[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut prev, &mut current);
    }

    prev[b.len()]
}

/// Build the conflict record for a classified pair.
pub fn build_conflict(
    integration: &CalendarIntegration,
    conflict_type: ConflictType,
    local: Option<&LocalEvent>,
    external: Option<&ExternalEvent>,
) -> CalSyncResult<SyncConflict> {
    let title = local
        .map(|e| e.title.as_str())
        .or(external.map(|e| e.title.as_str()))
        .unwrap_or("(unknown event)");

    let description = match conflict_type {
        ConflictType::TimeMismatch => {
            format!("'{title}' was moved to different times locally and on {}", integration.provider)
        }
        ConflictType::ContentMismatch => {
            format!("'{title}' was edited both locally and on {}", integration.provider)
        }
        ConflictType::DeletionConflict => match local {
            Some(_) => format!(
                "'{title}' was deleted on {} but modified locally",
                integration.provider
            ),
            None => format!(
                "'{title}' was deleted locally but modified on {}",
                integration.provider
            ),
        },
        ConflictType::CreationConflict => format!(
            "'{title}' appears to have been created both locally and on {}",
            integration.provider
        ),
    };

    SyncConflict::new(
        integration.user_id,
        integration.id,
        conflict_type,
        local,
        external,
        description,
    )
}
