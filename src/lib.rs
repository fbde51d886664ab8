//! Calendar synchronization engine.
//!
//! Keeps a user's local events and their external provider calendars
//! (Google, Outlook) converged:
//! - `sync` runs full passes that diff both sides and apply the deltas
//! - `conflict` detects concurrent edits and applies user resolutions
//! - `recurrence` expands repeating-event patterns into dated instances
//! - `mapper` translates between local and provider representations
//!
//! Storage and provider transports live behind the [`store::LocalEventStore`],
//! [`integration::IntegrationRegistry`], [`store::ConflictStore`] and
//! [`provider::ProviderClient`] traits; this crate holds the sync logic only.

pub mod config;
pub mod conflict;
pub mod date_range;
pub mod error;
pub mod event;
pub mod integration;
pub mod mapper;
pub mod provider;
pub mod recurrence;
pub mod store;
pub mod sync;

#[cfg(test)]
mod testutil;

pub use config::{SyncConfig, SyncPreferences};
pub use conflict::{ConflictResolutionService, Resolution, SyncConflict};
pub use date_range::DateRange;
pub use error::{CalSyncResult, SyncError};
pub use event::{ExternalEvent, LocalEvent};
pub use integration::{CalendarIntegration, SyncDirection, SyncStatus};
pub use provider::{Provider, ProviderClient};
pub use store::EventMapping;
pub use sync::{SyncEngine, SyncResult, SyncSummary};
