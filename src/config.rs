//! Engine configuration.
//!
//! All tuning knobs live in one typed struct with serde defaulting, so a
//! partial config document deserializes into a fully usable value. Detector
//! tolerances and recurrence caps are configuration, not constants, because
//! deployments disagree on how sloppy provider timestamps are.

use serde::{Deserialize, Serialize};
use std::time::Duration;

fn default_window_days() -> i64 {
    90
}

fn default_provider_timeout_secs() -> u64 {
    10
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    500
}

fn default_time_tolerance_secs() -> i64 {
    5
}

fn default_creation_match_window_mins() -> i64 {
    15
}

fn default_title_similarity_threshold() -> f64 {
    0.8
}

fn default_max_occurrences() -> usize {
    730
}

fn default_preview_count() -> usize {
    5
}

/// Engine-wide configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Sync window reaches this many days into the past and future.
    #[serde(default = "default_window_days")]
    pub window_days: i64,

    /// Timeout for a single provider API call.
    #[serde(default = "default_provider_timeout_secs")]
    pub provider_timeout_secs: u64,

    /// Retry attempts for transient provider failures, beyond the first try.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay for exponential backoff between retries.
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    /// Start/end deltas at or below this are treated as equal timestamps.
    #[serde(default = "default_time_tolerance_secs")]
    pub time_tolerance_secs: i64,

    /// Unmapped events starting within this window are creation-match
    /// candidates.
    #[serde(default = "default_creation_match_window_mins")]
    pub creation_match_window_mins: i64,

    /// Minimum normalized title similarity for a creation match (0.0..=1.0).
    #[serde(default = "default_title_similarity_threshold")]
    pub title_similarity_threshold: f64,

    /// Hard ceiling on generated recurrence instances, regardless of pattern.
    #[serde(default = "default_max_occurrences")]
    pub max_occurrences: usize,

    /// Number of upcoming dates included in a series preview.
    #[serde(default = "default_preview_count")]
    pub preview_count: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            window_days: default_window_days(),
            provider_timeout_secs: default_provider_timeout_secs(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            time_tolerance_secs: default_time_tolerance_secs(),
            creation_match_window_mins: default_creation_match_window_mins(),
            title_similarity_threshold: default_title_similarity_threshold(),
            max_occurrences: default_max_occurrences(),
            preview_count: default_preview_count(),
        }
    }
}

impl SyncConfig {
    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }
}

/// Per-integration preferences. Unset fields fall back to [`SyncConfig`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncPreferences {
    /// Override for the sync window, in days.
    #[serde(default)]
    pub window_days: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_deserializes_to_defaults() {
        let config: SyncConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.window_days, 90);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.preview_count, 5);
        assert!((config.title_similarity_threshold - 0.8).abs() < f64::EPSILON);
    }

    #[test]
    fn test_partial_document_keeps_other_defaults() {
        let config: SyncConfig = serde_json::from_str(r#"{"window_days": 30}"#).unwrap();
        assert_eq!(config.window_days, 30);
        assert_eq!(config.time_tolerance_secs, 5);
    }
}
