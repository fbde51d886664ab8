//! Provider identity and the client capability the engine consumes.
//!
//! The engine never talks to a provider API directly. Each provider is
//! represented by one [`ProviderClient`] implementation, constructor-injected
//! and selected by [`Provider`] tag, so the sync engine is provider-agnostic
//! and testable with fakes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::date_range::DateRange;
use crate::error::CalSyncResult;
use crate::event::ExternalEvent;

/// Supported external calendar providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    Google,
    Outlook,
}

impl Provider {
    pub fn name(&self) -> &'static str {
        match self {
            Provider::Google => "google",
            Provider::Outlook => "outlook",
        }
    }

    /// Which optional event fields the provider can represent.
    ///
    /// Both built-in providers carry every optional field; the table exists
    /// so a provider that lacks one maps lossily instead of nulling data.
    pub fn field_support(&self) -> FieldSupport {
        match self {
            Provider::Google | Provider::Outlook => FieldSupport::full(),
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Optional-field support table for a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSupport {
    pub description: bool,
    pub location: bool,
}

impl FieldSupport {
    pub fn full() -> Self {
        FieldSupport {
            description: true,
            location: true,
        }
    }
}

/// A calendar listed by a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalCalendar {
    pub id: String,
    pub name: String,
    pub primary: bool,
}

/// Capability interface to one external calendar account.
///
/// Implementations own credentials, token refresh, and the wire format;
/// they accept and return the provider-neutral [`ExternalEvent`] shape.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    fn provider(&self) -> Provider;

    async fn list_calendars(&self) -> CalSyncResult<Vec<ExternalCalendar>>;

    async fn list_events(
        &self,
        calendar_id: &str,
        range: &DateRange,
    ) -> CalSyncResult<Vec<ExternalEvent>>;

    /// Create an event; the returned copy carries the provider-assigned id.
    async fn create_event(
        &self,
        calendar_id: &str,
        event: &ExternalEvent,
    ) -> CalSyncResult<ExternalEvent>;

    async fn update_event(
        &self,
        calendar_id: &str,
        event: &ExternalEvent,
    ) -> CalSyncResult<ExternalEvent>;

    async fn delete_event(&self, calendar_id: &str, event_id: &str) -> CalSyncResult<()>;
}
