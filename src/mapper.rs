//! Translation between local and provider-neutral event shapes.
//!
//! Mapping is lossy-aware: fields a provider cannot represent are dropped on
//! export and left untouched on import, never nulled. The fingerprint covers
//! exactly the fields that matter for change detection; volatile provider
//! metadata (etags, sequence numbers) never feeds into it.

use chrono::{DateTime, SecondsFormat, Utc};
use sha2::{Digest, Sha256};

use crate::event::{ExternalEvent, LocalEvent};
use crate::provider::{FieldSupport, Provider};

/// Export a local event to the provider-neutral shape.
///
/// `external_id` is left empty for events the provider has not seen yet;
/// the client fills it in on create.
pub fn to_external(local: &LocalEvent, provider: Provider) -> ExternalEvent {
    to_external_with_support(local, &provider.field_support())
}

pub fn to_external_with_support(local: &LocalEvent, support: &FieldSupport) -> ExternalEvent {
    ExternalEvent {
        external_id: String::new(),
        title: local.title.clone(),
        description: if support.description {
            local.description.clone()
        } else {
            None
        },
        start: local.start,
        end: local.end,
        location: if support.location {
            local.location.clone()
        } else {
            None
        },
        updated: Some(local.updated_at),
    }
}

/// Partial local-event shape produced on import.
///
/// An outer `None` means the provider does not carry the field and the local
/// value must stay untouched; `Some(None)` means the provider carries it and
/// it is empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocalEventPatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub location: Option<Option<String>>,
}

/// Import an external event as a patch over a local event.
pub fn to_local(external: &ExternalEvent, provider: Provider) -> LocalEventPatch {
    to_local_with_support(external, &provider.field_support())
}

pub fn to_local_with_support(external: &ExternalEvent, support: &FieldSupport) -> LocalEventPatch {
    LocalEventPatch {
        title: Some(external.title.clone()),
        description: support.description.then(|| external.description.clone()),
        start: Some(external.start),
        end: Some(external.end),
        location: support.location.then(|| external.location.clone()),
    }
}

/// Apply an import patch, leaving unsupported fields untouched.
pub fn apply_patch(local: &mut LocalEvent, patch: &LocalEventPatch) {
    if let Some(title) = &patch.title {
        local.title = title.clone();
    }
    if let Some(description) = &patch.description {
        local.description = description.clone();
    }
    if let Some(start) = patch.start {
        local.start = start;
    }
    if let Some(end) = patch.end {
        local.end = end;
    }
    if let Some(location) = &patch.location {
        local.location = location.clone();
    }
}

/// Content fingerprint over the fields that matter for change detection.
pub fn fingerprint(
    title: &str,
    description: Option<&str>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    location: Option<&str>,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(title.trim().as_bytes());
    hasher.update([0x1f]);
    hasher.update(description.unwrap_or("").trim().as_bytes());
    hasher.update([0x1f]);
    hasher.update(start.to_rfc3339_opts(SecondsFormat::Secs, true).as_bytes());
    hasher.update([0x1f]);
    hasher.update(end.to_rfc3339_opts(SecondsFormat::Secs, true).as_bytes());
    hasher.update([0x1f]);
    hasher.update(location.unwrap_or("").trim().as_bytes());
    hex::encode(hasher.finalize())
}

pub fn fingerprint_local(event: &LocalEvent) -> String {
    fingerprint(
        &event.title,
        event.description.as_deref(),
        event.start,
        event.end,
        event.location.as_deref(),
    )
}

pub fn fingerprint_external(event: &ExternalEvent) -> String {
    fingerprint(
        &event.title,
        event.description.as_deref(),
        event.start,
        event.end,
        event.location.as_deref(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use uuid::Uuid;

    fn local_event() -> LocalEvent {
        LocalEvent {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            title: "Lecture".to_string(),
            description: Some("Linear algebra".to_string()),
            start: Utc.with_ymd_and_hms(2026, 3, 10, 10, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2026, 3, 10, 11, 0, 0).unwrap(),
            location: Some("Room 204".to_string()),
            parent_event_id: None,
            is_exception: false,
            updated_at: Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_roundtrip_preserves_shared_fields() {
        let local = local_event();
        let external = to_external(&local, Provider::Google);
        let patch = to_local(&external, Provider::Google);

        let mut roundtripped = local.clone();
        apply_patch(&mut roundtripped, &patch);

        assert_eq!(roundtripped.title, local.title);
        assert_eq!(roundtripped.description, local.description);
        assert_eq!(roundtripped.start, local.start);
        assert_eq!(roundtripped.end, local.end);
        assert_eq!(roundtripped.location, local.location);
    }

    #[test]
    fn test_unsupported_field_dropped_on_export() {
        let local = local_event();
        let support = FieldSupport {
            description: true,
            location: false,
        };
        let external = to_external_with_support(&local, &support);
        assert_eq!(external.location, None);
        assert_eq!(external.description, local.description);
    }

    #[test]
    fn test_unsupported_field_left_untouched_on_import() {
        let mut local = local_event();
        let support = FieldSupport {
            description: false,
            location: true,
        };
        let external = ExternalEvent {
            external_id: "ext-1".to_string(),
            title: "Lecture (moved)".to_string(),
            description: None,
            start: local.start,
            end: local.end,
            location: None,
            updated: None,
        };

        let patch = to_local_with_support(&external, &support);
        apply_patch(&mut local, &patch);

        assert_eq!(local.title, "Lecture (moved)");
        // Provider cannot carry a description: the local one survives.
        assert_eq!(local.description, Some("Linear algebra".to_string()));
        // Provider does carry location, and it is empty: local follows.
        assert_eq!(local.location, None);
    }

    #[test]
    fn test_fingerprint_ignores_volatile_metadata() {
        let local = local_event();
        let mut external = to_external(&local, Provider::Google);
        let before = fingerprint_external(&external);
        external.external_id = "server-assigned".to_string();
        external.updated = Some(Utc::now());
        assert_eq!(fingerprint_external(&external), before);
    }

    #[test]
    fn test_fingerprint_changes_with_content() {
        let local = local_event();
        let base = fingerprint_local(&local);

        let mut moved = local.clone();
        moved.start = moved.start + chrono::Duration::minutes(30);
        assert_ne!(fingerprint_local(&moved), base);

        let mut retitled = local.clone();
        retitled.title = "Seminar".to_string();
        assert_ne!(fingerprint_local(&retitled), base);
    }

    #[test]
    fn test_converged_sides_share_fingerprint() {
        let local = local_event();
        let external = to_external(&local, Provider::Outlook);
        assert_eq!(fingerprint_local(&local), fingerprint_external(&external));
    }
}
