//! Planned sync changes.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::event::{ExternalEvent, LocalEvent};
use crate::store::EventMapping;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeltaKind {
    Create,
    Update,
    Delete,
}

impl fmt::Display for DeltaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeltaKind::Create => write!(f, "+"),
            DeltaKind::Update => write!(f, "~"),
            DeltaKind::Delete => write!(f, "-"),
        }
    }
}

/// Which way a delta flows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeltaDirection {
    /// Provider → local store.
    Pull,
    /// Local store → provider.
    Push,
}

/// One non-conflicting change to apply during a sync pass.
#[derive(Debug, Clone)]
pub struct SyncDelta {
    pub kind: DeltaKind,
    pub direction: DeltaDirection,
    /// Local side of the pair, when one exists.
    pub local: Option<LocalEvent>,
    /// External side of the pair, when one exists.
    pub external: Option<ExternalEvent>,
    /// Existing mapping for updates and deletes.
    pub mapping: Option<EventMapping>,
}

impl fmt::Display for SyncDelta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let title = self
            .local
            .as_ref()
            .map(|e| e.title.as_str())
            .or(self.external.as_ref().map(|e| e.title.as_str()))
            .unwrap_or("(unknown)");
        let direction = match self.direction {
            DeltaDirection::Pull => "pull",
            DeltaDirection::Push => "push",
        };
        write!(f, "{} {} {}", self.kind, direction, title)
    }
}

/// Create/update/delete tallies for one direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeltaCounts {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
}

impl DeltaCounts {
    pub fn record(&mut self, kind: DeltaKind) {
        match kind {
            DeltaKind::Create => self.created += 1,
            DeltaKind::Update => self.updated += 1,
            DeltaKind::Delete => self.deleted += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.created + self.updated + self.deleted
    }
}
