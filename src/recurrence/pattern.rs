//! Recurrence pattern types and validation.

use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::{CalSyncResult, SyncError};

/// How often a series repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

/// How monthly (and yearly) patterns pick their day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonthlyBy {
    /// A fixed calendar day. Days past the end of a month clamp to its last
    /// day (day 31 in February lands on Feb 28/29).
    DayOfMonth { day_of_month: u32 },
    /// The nth weekday of the month; `week_of_month` is 1–4 or -1 for last.
    DayOfWeek { week_of_month: i8, weekday: Weekday },
}

/// A recurrence rule.
///
/// At most one of `end_date` and `occurrences` may be set; neither means the
/// series is unbounded and generation is capped by the caller's
/// `max_occurrences` safety ceiling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurrencePattern {
    pub frequency: Frequency,
    pub interval: u32,
    /// Weekdays the series lands on. Weekly patterns only.
    #[serde(default)]
    pub days_of_week: Vec<Weekday>,
    /// Day selection for monthly and yearly patterns. Unset falls back to
    /// the base event's day of month.
    #[serde(default)]
    pub monthly_by: Option<MonthlyBy>,
    /// Month (1–12) for yearly patterns. Unset falls back to the base
    /// event's month.
    #[serde(default)]
    pub month: Option<u32>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub occurrences: Option<u32>,
    /// Daily patterns skip Saturday and Sunday without consuming an
    /// occurrence slot.
    #[serde(default)]
    pub workdays_only: bool,
}

impl RecurrencePattern {
    /// A minimal valid pattern with the given frequency, repeating forever.
    pub fn every(frequency: Frequency) -> Self {
        RecurrencePattern {
            frequency,
            interval: 1,
            days_of_week: Vec::new(),
            monthly_by: None,
            month: None,
            end_date: None,
            occurrences: None,
            workdays_only: false,
        }
    }

    /// Validate the pattern, collecting every problem rather than stopping
    /// at the first.
    pub fn validate(&self) -> PatternValidation {
        let mut errors = Vec::new();

        if self.interval < 1 {
            errors.push("interval must be at least 1".to_string());
        }

        if self.frequency == Frequency::Weekly && self.days_of_week.is_empty() {
            errors.push("weekly patterns must specify at least one weekday".to_string());
        }

        match self.monthly_by {
            Some(MonthlyBy::DayOfMonth { day_of_month }) => {
                if !(1..=31).contains(&day_of_month) {
                    errors.push(format!(
                        "day_of_month must be between 1 and 31, got {day_of_month}"
                    ));
                }
            }
            Some(MonthlyBy::DayOfWeek { week_of_month, .. }) => {
                if week_of_month != -1 && !(1..=4).contains(&week_of_month) {
                    errors.push(format!(
                        "week_of_month must be 1-4 or -1 (last), got {week_of_month}"
                    ));
                }
            }
            None => {}
        }

        if let Some(month) = self.month {
            if !(1..=12).contains(&month) {
                errors.push(format!("month must be between 1 and 12, got {month}"));
            }
        }

        if self.end_date.is_some() && self.occurrences.is_some() {
            errors.push("at most one of end_date and occurrences may be set".to_string());
        }

        if let Some(occurrences) = self.occurrences {
            if occurrences < 1 {
                errors.push("occurrences must be at least 1".to_string());
            }
        }

        PatternValidation {
            valid: errors.is_empty(),
            errors,
        }
    }

    /// Like [`validate`](Self::validate) but as a hard failure, for callers
    /// about to generate.
    pub fn ensure_valid(&self) -> CalSyncResult<()> {
        let validation = self.validate();
        if validation.valid {
            Ok(())
        } else {
            Err(SyncError::Validation(validation.errors.join("; ")))
        }
    }
}

/// Outcome of pattern validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternValidation {
    pub valid: bool,
    pub errors: Vec<String>,
}
