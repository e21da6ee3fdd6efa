//! Convenience date ranges, all anchored on the Monday of the current ISO week.

use chrono::{Datelike, Duration, Months, NaiveDate};

use crate::error::{GhrsError, Result};
use crate::summary::week_start;

/// Weeks on either side of the current week covered by [`recent`].
pub const RECENT_SPAN_WEEKS: i64 = 8;

/// Weeks past the current week added to the end of every look-back window.
pub const LOOKAHEAD_WEEKS: i64 = 4;

/// Inclusive date range of a query, without filter keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(GhrsError::InvalidInput(format!(
                "date range starts after it ends ({start} > {end})"
            )));
        }
        Ok(Self { start, end })
    }
}

/// Eight weeks before and after the current week.
pub fn recent(today: NaiveDate) -> Result<DateRange> {
    let monday = week_start(today);
    Ok(DateRange {
        start: shift_weeks(monday, -RECENT_SPAN_WEEKS)?,
        end: shift_weeks(monday, RECENT_SPAN_WEEKS)?,
    })
}

/// `weeks` weeks back, through four weeks ahead.
pub fn by_weeks(today: NaiveDate, weeks: u32) -> Result<DateRange> {
    let monday = week_start(today);
    Ok(DateRange {
        start: shift_weeks(monday, -i64::from(weeks))?,
        end: lookahead_end(monday)?,
    })
}

/// `months` calendar months back, through four weeks ahead.
///
/// A day that does not exist in the target month clamps to its last day.
pub fn by_months(today: NaiveDate, months: u32) -> Result<DateRange> {
    let monday = week_start(today);
    let start = monday
        .checked_sub_months(Months::new(months))
        .ok_or_else(|| GhrsError::InvalidInput(format!("{months} months is out of range")))?;
    Ok(DateRange {
        start,
        end: lookahead_end(monday)?,
    })
}

/// From this week's Monday moved into `year`, through four weeks ahead.
///
/// The year is absolute, not a count: `by_year(today, 2019)` starts on the
/// same month and day in 2019. February 29 clamps to February 28.
pub fn by_year(today: NaiveDate, year: i32) -> Result<DateRange> {
    let monday = week_start(today);
    let start = monday
        .with_year(year)
        .or_else(|| NaiveDate::from_ymd_opt(year, monday.month(), monday.day() - 1))
        .ok_or_else(|| GhrsError::InvalidInput(format!("year {year} is out of range")))?;
    DateRange::new(start, lookahead_end(monday)?)
}

fn lookahead_end(monday: NaiveDate) -> Result<NaiveDate> {
    shift_weeks(monday, LOOKAHEAD_WEEKS)
}

/// `date` moved by `weeks` (negative goes back), failing outside chrono's range.
fn shift_weeks(date: NaiveDate, weeks: i64) -> Result<NaiveDate> {
    Duration::try_weeks(weeks)
        .and_then(|delta| date.checked_add_signed(delta))
        .ok_or_else(|| {
            GhrsError::InvalidInput(format!("{weeks} weeks from {date} is out of range"))
        })
}
