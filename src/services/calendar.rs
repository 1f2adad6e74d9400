//! Working-day calendar and leave day counting.
//!
//! A [`LeaveCalendar`] combines a tenant's weekly working-day table, its
//! holiday list, and one employee's optional-holiday opt-ins. Counting walks
//! the requested range once and classifies each date in constant time.

use std::collections::{HashMap, HashSet};

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::{HalfDay, HolidayType};

/// Longest range a single request may span.
pub const MAX_RANGE_DAYS: i64 = 366;

/// Weekly working-day table, indexed from Monday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkWeek {
    working: [bool; 7],
}

impl Default for WorkWeek {
    /// Monday to Friday, Saturday and Sunday off.
    fn default() -> Self {
        Self {
            working: [true, true, true, true, true, false, false],
        }
    }
}

impl WorkWeek {
    pub fn new(working: [bool; 7]) -> Self {
        Self { working }
    }

    /// Build from stored `(weekday, is_working)` rows where weekday 0 is Monday.
    ///
    /// An empty table means the tenant never configured one and falls back to
    /// the Saturday/Sunday weekend. Weekdays missing from a non-empty table
    /// keep their fallback value.
    pub fn from_rows(rows: &[(i64, bool)]) -> Self {
        let mut week = Self::default();
        for &(weekday, is_working) in rows {
            if let Some(slot) = usize::try_from(weekday).ok().and_then(|i| week.working.get_mut(i)) {
                *slot = is_working;
            }
        }
        week
    }

    pub fn is_working(&self, weekday: Weekday) -> bool {
        self.working[weekday.num_days_from_monday() as usize]
    }

    /// `(weekday, is_working)` rows suitable for storage.
    pub fn to_rows(&self) -> Vec<(i64, bool)> {
        self.working
            .iter()
            .enumerate()
            .map(|(i, w)| (i as i64, *w))
            .collect()
    }

    pub fn working_day_count(&self) -> usize {
        self.working.iter().filter(|w| **w).count()
    }
}

/// A holiday as far as day counting is concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarHoliday {
    pub id: String,
    pub date: NaiveDate,
    pub holiday_type: HolidayType,
}

/// Calendar for one employee of one tenant.
#[derive(Debug, Clone, Default)]
pub struct LeaveCalendar {
    week: WorkWeek,
    holidays: HashMap<NaiveDate, Vec<(String, HolidayType)>>,
    opted_in: HashSet<String>,
}

impl LeaveCalendar {
    pub fn new(
        week: WorkWeek,
        holidays: impl IntoIterator<Item = CalendarHoliday>,
        opted_in: impl IntoIterator<Item = String>,
    ) -> Self {
        let mut by_date: HashMap<NaiveDate, Vec<(String, HolidayType)>> = HashMap::new();
        for h in holidays {
            by_date.entry(h.date).or_default().push((h.id, h.holiday_type));
        }

        Self {
            week,
            holidays: by_date,
            opted_in: opted_in.into_iter().collect(),
        }
    }

    /// Whether a holiday takes this date off for the employee.
    ///
    /// Public and restricted holidays always do. An optional holiday only
    /// does when the employee opted in.
    fn is_holiday_off(&self, date: NaiveDate) -> bool {
        self.holidays.get(&date).is_some_and(|entries| {
            entries.iter().any(|(id, kind)| match kind {
                HolidayType::Optional => self.opted_in.contains(id),
                HolidayType::Public | HolidayType::Restricted => true,
            })
        })
    }

    /// Whether leave taken on `date` consumes balance.
    pub fn is_working_day(&self, date: NaiveDate) -> bool {
        self.week.is_working(date.weekday()) && !self.is_holiday_off(date)
    }

    /// Dates in `[start, end]` that count towards leave.
    pub fn counted_dates(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<NaiveDate>> {
        validate_range(start, end)?;
        Ok(start
            .iter_days()
            .take_while(|d| *d <= end)
            .filter(|d| self.is_working_day(*d))
            .collect())
    }

    /// Days charged per counted date of a request.
    ///
    /// Half-day requests must cover a single date and charge 0.5 when that
    /// date is a working day.
    pub fn charged_days(&self, start: NaiveDate, end: NaiveDate, half_day: HalfDay) -> Result<Vec<(NaiveDate, f64)>> {
        if half_day.is_half() && start != end {
            return Err(Error::Validation(
                "A half-day request must start and end on the same date".into(),
            ));
        }

        let per_day = if half_day.is_half() { 0.5 } else { 1.0 };
        Ok(self
            .counted_dates(start, end)?
            .into_iter()
            .map(|date| (date, per_day))
            .collect())
    }

    /// Number of leave days for a request.
    pub fn count_days(&self, start: NaiveDate, end: NaiveDate, half_day: HalfDay) -> Result<f64> {
        Ok(self.charged_days(start, end, half_day)?.iter().map(|(_, days)| days).sum())
    }
}

fn validate_range(start: NaiveDate, end: NaiveDate) -> Result<()> {
    if end < start {
        return Err(Error::Validation(format!(
            "End date {} is before start date {}",
            end, start
        )));
    }
    if (end - start).num_days() >= MAX_RANGE_DAYS {
        return Err(Error::Validation(format!(
            "Date range may span at most {} days",
            MAX_RANGE_DAYS
        )));
    }
    Ok(())
}
