//! Recurring series with per-occurrence exceptions.
//!
//! A series ties a master event to its pattern and the occurrences
//! materialized from it. Individually edited or deleted occurrences are
//! recorded as exceptions; generation keeps emitting the affected dates but
//! flags them so callers substitute the exception event (or drop the slot).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::recurrence::generate::{generate_instances, BaseEvent, GenerationWindow};
use crate::recurrence::pattern::RecurrencePattern;
use crate::recurrence::RecurringEventInstance;

/// How one occurrence deviates from its pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExceptionKind {
    /// The occurrence was individually edited; an override event exists.
    Modified,
    /// The occurrence was individually deleted.
    Skipped,
}

/// One recorded deviation from the pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesException {
    pub occurrence_date: NaiveDate,
    /// The override event, when the occurrence was edited rather than
    /// deleted.
    pub event_id: Option<Uuid>,
    pub kind: ExceptionKind,
}

/// A recurring series: master event, pattern, materialized instances, and
/// exceptions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurringSeries {
    pub series_id: Uuid,
    pub master_event_id: Uuid,
    pub pattern: RecurrencePattern,
    pub base: BaseEvent,
    /// Occurrences from the last materialization window. Never persisted
    /// beyond that window unless an occurrence carries an exception.
    pub instances: Vec<RecurringEventInstance>,
    pub exceptions: Vec<SeriesException>,
}

impl RecurringSeries {
    pub fn new(master_event_id: Uuid, pattern: RecurrencePattern, base: BaseEvent) -> Self {
        RecurringSeries {
            series_id: Uuid::new_v4(),
            master_event_id,
            pattern,
            base,
            instances: Vec::new(),
            exceptions: Vec::new(),
        }
    }

    /// Record an exception for one occurrence date, replacing any earlier
    /// exception for the same date.
    pub fn add_exception(
        &mut self,
        occurrence_date: NaiveDate,
        event_id: Option<Uuid>,
        kind: ExceptionKind,
    ) {
        self.exceptions
            .retain(|e| e.occurrence_date != occurrence_date);
        self.exceptions.push(SeriesException {
            occurrence_date,
            event_id,
            kind,
        });
        // Keep already-materialized instances in agreement.
        for instance in &mut self.instances {
            if instance.date == occurrence_date {
                instance.is_modified = kind == ExceptionKind::Modified;
                instance.is_skipped = kind == ExceptionKind::Skipped;
            }
        }
    }

    pub fn exception_for(&self, occurrence_date: NaiveDate) -> Option<&SeriesException> {
        self.exceptions
            .iter()
            .find(|e| e.occurrence_date == occurrence_date)
    }

    /// Regenerate `instances` for a window, applying recorded exceptions.
    pub fn materialize(&mut self, window: &GenerationWindow) {
        let mut instances = generate_instances(&self.pattern, &self.base, window);
        for instance in &mut instances {
            if let Some(exception) = self.exception_for(instance.date) {
                instance.is_modified = exception.kind == ExceptionKind::Modified;
                instance.is_skipped = exception.kind == ExceptionKind::Skipped;
            }
        }
        self.instances = instances;
    }

    /// Instances that still follow the pattern or carry an override; skipped
    /// occurrences are filtered out.
    pub fn active_instances(&self) -> impl Iterator<Item = &RecurringEventInstance> {
        self.instances.iter().filter(|i| !i.is_skipped)
    }
}
