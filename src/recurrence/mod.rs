//! Recurrence expansion for recurring events.
//!
//! Pure date arithmetic: no I/O, no shared state. Patterns are validated
//! with [`RecurrencePattern::validate`] before generation; `generate`
//! assumes valid input and never errors on it.

pub mod generate;
pub mod pattern;
pub mod series;

pub use generate::{
    generate_instances, next_occurrence, series_preview, BaseEvent, GenerationWindow,
    Occurrences, RecurringEventInstance, SeriesPreview,
};
pub use pattern::{Frequency, MonthlyBy, PatternValidation, RecurrencePattern};
pub use series::{ExceptionKind, RecurringSeries, SeriesException};
