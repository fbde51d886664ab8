//! Event types on both sides of a sync pair.
//!
//! `LocalEvent` is the user-owned record; `ExternalEvent` is the
//! provider-neutral shape that provider clients produce and consume. The
//! engine works exclusively with these two types; provider wire formats
//! never cross into it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A locally owned schedule event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalEvent {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub location: Option<String>,

    /// Master event this occurrence belongs to, for recurrence exceptions.
    pub parent_event_id: Option<Uuid>,
    /// Whether this event overrides one occurrence of a recurring series.
    pub is_exception: bool,

    pub updated_at: DateTime<Utc>,
}

/// A provider-neutral external event.
///
/// Volatile provider metadata (etags, change keys) deliberately has no place
/// here: it must not influence change detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalEvent {
    /// Provider-assigned identifier, opaque to the engine.
    pub external_id: String,
    pub title: String,
    pub description: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub location: Option<String>,
    /// Last modification timestamp, when the provider reports one.
    pub updated: Option<DateTime<Utc>>,
}
