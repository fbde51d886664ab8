//! Calendar integration records and their registry.
//!
//! A `CalendarIntegration` is one user's connection to one external calendar
//! account. It is the serialization point of a sync pass: the engine takes an
//! exclusive in-flight claim on the integration id for the duration of the
//! pass, and only the engine (plus explicit preference changes) mutates the
//! record.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::SyncPreferences;
use crate::error::CalSyncResult;
use crate::provider::Provider;

/// Which way event changes are allowed to flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncDirection {
    /// Provider changes flow in; nothing is ever written to the provider.
    ImportOnly,
    /// Local changes flow out; nothing is ever written locally.
    ExportOnly,
    Bidirectional,
}

impl SyncDirection {
    pub fn allows_import(&self) -> bool {
        matches!(self, SyncDirection::ImportOnly | SyncDirection::Bidirectional)
    }

    pub fn allows_export(&self) -> bool {
        matches!(self, SyncDirection::ExportOnly | SyncDirection::Bidirectional)
    }
}

/// Sync pass state machine: idle → syncing → success | error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Idle,
    Syncing,
    Success,
    Error,
}

/// One user's connection to one external calendar account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarIntegration {
    pub id: Uuid,
    pub user_id: Uuid,
    pub provider: Provider,
    /// Provider-side calendar this integration mirrors.
    pub calendar_id: String,
    pub sync_enabled: bool,
    pub sync_direction: SyncDirection,
    pub sync_status: SyncStatus,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub last_successful_sync_at: Option<DateTime<Utc>>,
    pub sync_error_message: Option<String>,
    #[serde(default)]
    pub preferences: SyncPreferences,
    pub created_at: DateTime<Utc>,
}

impl CalendarIntegration {
    pub fn new(
        user_id: Uuid,
        provider: Provider,
        calendar_id: impl Into<String>,
        sync_direction: SyncDirection,
    ) -> Self {
        CalendarIntegration {
            id: Uuid::new_v4(),
            user_id,
            provider,
            calendar_id: calendar_id.into(),
            sync_enabled: true,
            sync_direction,
            sync_status: SyncStatus::Idle,
            last_sync_at: None,
            last_successful_sync_at: None,
            sync_error_message: None,
            preferences: SyncPreferences::default(),
            created_at: Utc::now(),
        }
    }
}

/// Store of integration records.
#[async_trait]
pub trait IntegrationRegistry: Send + Sync {
    async fn get(&self, id: Uuid) -> CalSyncResult<Option<CalendarIntegration>>;

    async fn list_for_user(&self, user_id: Uuid) -> CalSyncResult<Vec<CalendarIntegration>>;

    async fn update(&self, integration: &CalendarIntegration) -> CalSyncResult<()>;

    /// Disconnect: deletes the record and revokes engine access.
    async fn remove(&self, id: Uuid) -> CalSyncResult<()>;
}
