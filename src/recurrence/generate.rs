//! Recurrence expansion.
//!
//! All expansion is built on [`Occurrences`], a pure date iterator over a
//! pattern anchored at a base date. The iterator owns the end conditions
//! (pattern end date, occurrence count); callers add window bounds and the
//! `max_occurrences` safety ceiling on top.

use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

use crate::recurrence::pattern::{Frequency, MonthlyBy, RecurrencePattern};

/// The series anchor: first occurrence date plus the per-day time slot
/// every generated instance inherits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BaseEvent {
    pub first_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

/// One materialized occurrence of a recurring series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurringEventInstance {
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    /// Whether an exception event overrides this occurrence.
    pub is_modified: bool,
    /// Whether this occurrence was individually deleted.
    pub is_skipped: bool,
}

/// Bounds for one generation run.
#[derive(Debug, Clone, Copy)]
pub struct GenerationWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Hard ceiling on emitted instances, regardless of pattern
    /// configuration. Bounds worst-case unbounded patterns.
    pub max_occurrences: usize,
}

/// Bounded summary of a series, without materializing it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesPreview {
    pub next_occurrences: Vec<NaiveDate>,
    /// Total number of occurrences, when the pattern is bounded. `None`
    /// means the series repeats forever.
    pub total_count: Option<usize>,
    pub end_date: Option<NaiveDate>,
}

/// Generate the instances of `pattern` that fall inside `window`, in order.
///
/// Occurrence counting is anchored to the series start, not the window:
/// occurrences before `window.start` consume their slot but are not emitted,
/// so re-generating a later window never shifts which dates exist.
///
/// Assumes a pattern that passes [`RecurrencePattern::validate`]; ill-formed
/// patterns are a caller error, not a panic.
pub fn generate_instances(
    pattern: &RecurrencePattern,
    base: &BaseEvent,
    window: &GenerationWindow,
) -> Vec<RecurringEventInstance> {
    let mut instances = Vec::new();

    for date in Occurrences::new(pattern, base.first_date) {
        if date > window.end {
            break;
        }
        if date < window.start {
            continue;
        }
        instances.push(RecurringEventInstance {
            date,
            start_time: base.start_time,
            end_time: base.end_time,
            is_modified: false,
            is_skipped: false,
        });
        if instances.len() >= window.max_occurrences {
            break;
        }
    }

    instances
}

/// First occurrence strictly after `from`, or `None` once the series has
/// ended.
pub fn next_occurrence(
    pattern: &RecurrencePattern,
    base: &BaseEvent,
    from: NaiveDate,
) -> Option<NaiveDate> {
    Occurrences::new(pattern, base.first_date).find(|date| *date > from)
}

/// Cheap series summary: the next few dates after `from`, the total count
/// when bounded, and the end date when known.
pub fn series_preview(
    pattern: &RecurrencePattern,
    base: &BaseEvent,
    from: NaiveDate,
    preview_count: usize,
    max_occurrences: usize,
) -> SeriesPreview {
    let next_occurrences: Vec<NaiveDate> = Occurrences::new(pattern, base.first_date)
        .filter(|date| *date >= from)
        .take(preview_count)
        .collect();

    let (total_count, end_date) = if pattern.occurrences.is_some() || pattern.end_date.is_some() {
        // Bounded series: walk it once, capped by the safety ceiling.
        let mut count = 0;
        let mut last = None;
        for date in Occurrences::new(pattern, base.first_date).take(max_occurrences) {
            count += 1;
            last = Some(date);
        }
        (Some(count), pattern.end_date.or(last))
    } else {
        (None, None)
    };

    SeriesPreview {
        next_occurrences,
        total_count,
        end_date,
    }
}

/// Iterator over the occurrence dates of a pattern, anchored at `base`.
///
/// Yields strictly increasing dates starting at the first occurrence on or
/// after `base`, honoring the pattern's own end conditions. Infinite for
/// unbounded patterns; callers bound it by window or count.
pub struct Occurrences<'a> {
    pattern: &'a RecurrencePattern,
    base: NaiveDate,
    state: Cursor,
    yielded: usize,
    exhausted: bool,
}

enum Cursor {
    Daily {
        next: NaiveDate,
    },
    Weekly {
        /// Monday of the week currently being emitted.
        week_start: NaiveDate,
        /// Weekdays to emit, sorted Monday-first.
        days: Vec<Weekday>,
        day_idx: usize,
    },
    Monthly {
        /// Months since year 0: `year * 12 + month0`.
        month_index: i32,
    },
    Yearly {
        year: i32,
    },
}

impl<'a> Occurrences<'a> {
    pub fn new(pattern: &'a RecurrencePattern, base: NaiveDate) -> Self {
        let state = match pattern.frequency {
            Frequency::Daily => Cursor::Daily { next: base },
            Frequency::Weekly => {
                let mut days = if pattern.days_of_week.is_empty() {
                    vec![base.weekday()]
                } else {
                    pattern.days_of_week.clone()
                };
                days.sort_by_key(|w| w.num_days_from_monday());
                days.dedup();
                let week_start =
                    base - Duration::days(base.weekday().num_days_from_monday() as i64);
                Cursor::Weekly {
                    week_start,
                    days,
                    day_idx: 0,
                }
            }
            Frequency::Monthly => Cursor::Monthly {
                month_index: base.year() * 12 + base.month0() as i32,
            },
            Frequency::Yearly => Cursor::Yearly { year: base.year() },
        };

        Occurrences {
            pattern,
            base,
            state,
            yielded: 0,
            exhausted: false,
        }
    }

    /// Compute the candidate at the current cursor and advance the cursor.
    /// Returns `None` when the candidate month has no matching day.
    fn advance(&mut self) -> Option<NaiveDate> {
        let interval = self.pattern.interval.max(1);
        match &mut self.state {
            Cursor::Daily { next } => {
                let candidate = *next;
                *next += Duration::days(interval as i64);
                Some(candidate)
            }
            Cursor::Weekly {
                week_start,
                days,
                day_idx,
            } => {
                let weekday = days[*day_idx];
                let candidate =
                    *week_start + Duration::days(weekday.num_days_from_monday() as i64);
                *day_idx += 1;
                if *day_idx >= days.len() {
                    *day_idx = 0;
                    *week_start += Duration::days(7 * interval as i64);
                }
                Some(candidate)
            }
            Cursor::Monthly { month_index } => {
                let (year, month) = (month_index.div_euclid(12), month_index.rem_euclid(12) as u32 + 1);
                *month_index += interval as i32;
                day_in_month(self.pattern, self.base, year, month)
            }
            Cursor::Yearly { year } => {
                let year_now = *year;
                *year += interval as i32;
                let month = self.pattern.month.unwrap_or(self.base.month());
                day_in_month(self.pattern, self.base, year_now, month)
            }
        }
    }
}

impl Iterator for Occurrences<'_> {
    type Item = NaiveDate;

    fn next(&mut self) -> Option<NaiveDate> {
        if self.exhausted {
            return None;
        }
        if let Some(occurrences) = self.pattern.occurrences {
            if self.yielded >= occurrences as usize {
                self.exhausted = true;
                return None;
            }
        }

        loop {
            let candidate = match self.advance() {
                Some(candidate) => candidate,
                None => continue,
            };

            // The anchor is the first occurrence; never emit before it.
            if candidate < self.base {
                continue;
            }

            if let Some(end_date) = self.pattern.end_date {
                if candidate > end_date {
                    self.exhausted = true;
                    return None;
                }
            }

            // Weekend days are skipped without consuming an occurrence slot.
            if self.pattern.workdays_only
                && self.pattern.frequency == Frequency::Daily
                && is_weekend(candidate)
            {
                continue;
            }

            self.yielded += 1;
            return Some(candidate);
        }
    }
}

fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    // First of the following month always exists; its predecessor is the
    // last day of `month`.
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|d| d.pred_opt())
        .map(|d| d.day())
        .unwrap_or(28)
}

/// The pattern's day within a given month, for monthly and yearly cursors.
fn day_in_month(
    pattern: &RecurrencePattern,
    base: NaiveDate,
    year: i32,
    month: u32,
) -> Option<NaiveDate> {
    match pattern.monthly_by {
        Some(MonthlyBy::DayOfMonth { day_of_month }) => {
            let day = day_of_month.min(days_in_month(year, month));
            NaiveDate::from_ymd_opt(year, month, day)
        }
        Some(MonthlyBy::DayOfWeek {
            week_of_month,
            weekday,
        }) => nth_weekday_of_month(year, month, week_of_month, weekday),
        None => {
            let day = base.day().min(days_in_month(year, month));
            NaiveDate::from_ymd_opt(year, month, day)
        }
    }
}

/// The nth (1–4) or last (-1) `weekday` of a month.
fn nth_weekday_of_month(
    year: i32,
    month: u32,
    week_of_month: i8,
    weekday: Weekday,
) -> Option<NaiveDate> {
    let last_day = days_in_month(year, month);
    if week_of_month == -1 {
        let last = NaiveDate::from_ymd_opt(year, month, last_day)?;
        let back =
            (7 + last.weekday().num_days_from_monday() - weekday.num_days_from_monday()) % 7;
        return Some(last - Duration::days(back as i64));
    }

    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let forward =
        (7 + weekday.num_days_from_monday() - first.weekday().num_days_from_monday()) % 7;
    let week = week_of_month.clamp(1, 4) as u32;
    let day = 1 + forward + (week - 1) * 7;
    if day > last_day {
        return None;
    }
    NaiveDate::from_ymd_opt(year, month, day)
}
