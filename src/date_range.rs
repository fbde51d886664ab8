//! Date range for filtering events.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Time window for event queries.
/// None values mean unbounded in that direction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DateRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl DateRange {
    /// Window reaching `days` into the past and future from now.
    pub fn around_now(days: i64) -> Self {
        let now = Utc::now();
        DateRange {
            from: Some(now - Duration::days(days)),
            to: Some(now + Duration::days(days)),
        }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        if let Some(from) = self.from {
            if instant < from {
                return false;
            }
        }
        if let Some(to) = self.to {
            if instant > to {
                return false;
            }
        }
        true
    }
}
