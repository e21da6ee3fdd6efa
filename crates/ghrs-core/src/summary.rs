//! Weekly aggregation of timesheet entries.

use std::collections::BTreeMap;

use chrono::{Datelike, Days, NaiveDate};

use crate::model::{SummaryKey, WeeklySummary, WorkEntry};

/// Monday on or before `date`.
///
/// Dates in the partial first week of chrono's range, whose Monday does not
/// exist, map to [`NaiveDate::MIN`].
pub fn week_start(date: NaiveDate) -> NaiveDate {
    let back = Days::new(u64::from(date.weekday().num_days_from_monday()));
    date.checked_sub_days(back).unwrap_or(NaiveDate::MIN)
}

/// Sum hours per grouping key and Monday-starting week.
///
/// An entry dated anywhere in `[Monday, next Monday)` lands in the bucket
/// labelled with that Monday. Only weeks with at least one entry appear.
/// The result is ordered by key, then by week.
pub fn summarize_by_week<E: WorkEntry>(entries: &[E]) -> Vec<WeeklySummary> {
    let mut buckets: BTreeMap<(SummaryKey, NaiveDate), f64> = BTreeMap::new();
    for entry in entries {
        *buckets
            .entry((entry.summary_key(), week_start(entry.date())))
            .or_insert(0.0) += entry.hours();
    }

    buckets
        .into_iter()
        .map(|((key, week_start), hours)| WeeklySummary {
            key,
            week_start,
            hours,
        })
        .collect()
}

/// Total hours across all entries.
pub fn total_hours<E: WorkEntry>(entries: &[E]) -> f64 {
    entries.iter().map(WorkEntry::hours).sum()
}
