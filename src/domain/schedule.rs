//! Calendar offsets and the rebalancing schedule.

use super::error::LotfolioError;
use chrono::{Days, Months, NaiveDate};
use std::fmt;
use std::str::FromStr;

/// A calendar delta. Months are applied first, clamping to month end, then
/// days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CalendarOffset {
    pub months: i32,
    pub days: i64,
}

impl CalendarOffset {
    pub fn months(months: i32) -> Self {
        CalendarOffset { months, days: 0 }
    }

    pub fn days(days: i64) -> Self {
        CalendarOffset { months: 0, days }
    }

    pub fn years(years: i32) -> Self {
        CalendarOffset::months(years * 12)
    }

    pub fn is_zero(&self) -> bool {
        self.months == 0 && self.days == 0
    }

    /// Adds the offset to `date`; `None` if the result is out of range.
    pub fn apply(&self, date: NaiveDate) -> Option<NaiveDate> {
        let shifted = if self.months >= 0 {
            date.checked_add_months(Months::new(self.months.unsigned_abs()))?
        } else {
            date.checked_sub_months(Months::new(self.months.unsigned_abs()))?
        };
        if self.days >= 0 {
            shifted.checked_add_days(Days::new(self.days.unsigned_abs()))
        } else {
            shifted.checked_sub_days(Days::new(self.days.unsigned_abs()))
        }
    }
}

impl FromStr for CalendarOffset {
    type Err = String;

    /// Parses terms like `3m`, `-6d`, `1y6m`, `2w`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let input = s.trim().to_lowercase();
        if input.is_empty() {
            return Err("empty calendar offset".to_string());
        }

        let mut offset = CalendarOffset::default();
        let mut number = String::new();
        for c in input.chars() {
            match c {
                '+' | '-' if number.is_empty() => number.push(c),
                '0'..='9' => number.push(c),
                ' ' => {}
                'y' | 'm' | 'w' | 'd' => {
                    let n: i64 = number
                        .parse()
                        .map_err(|_| format!("missing number before '{c}' in '{s}'"))?;
                    number.clear();
                    let months = |n: i64| i32::try_from(n).map_err(|_| format!("'{s}' is too large"));
                    match c {
                        'y' => offset.months += months(n * 12)?,
                        'm' => offset.months += months(n)?,
                        'w' => offset.days += n * 7,
                        _ => offset.days += n,
                    }
                }
                other => return Err(format!("unexpected '{other}' in '{s}'")),
            }
        }
        if !number.is_empty() {
            return Err(format!("missing unit (y, m, w, d) at end of '{s}'"));
        }
        Ok(offset)
    }
}

impl fmt::Display for CalendarOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.months, self.days) {
            (0, 0) => write!(f, "0d"),
            (m, 0) => write!(f, "{m}m"),
            (0, d) => write!(f, "{d}d"),
            (m, d) => write!(f, "{m}m{d}d"),
        }
    }
}

/// Periodic rebalancing: first at start + period + offset, then every
/// period after the previous scheduled date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RebalanceSchedule {
    pub period: CalendarOffset,
    pub offset: CalendarOffset,
}

impl RebalanceSchedule {
    pub fn new(period: CalendarOffset, offset: Option<CalendarOffset>) -> Result<Self, LotfolioError> {
        if period.months < 0 || period.days < 0 || period.is_zero() {
            return Err(LotfolioError::ConfigInvalid {
                section: "portfolio".to_string(),
                key: "rebalancing".to_string(),
                reason: format!("rebalancing period must move forward in time, got {period}"),
            });
        }
        Ok(RebalanceSchedule {
            period,
            offset: offset.unwrap_or_default(),
        })
    }

    pub fn first(&self, start: NaiveDate) -> Option<NaiveDate> {
        self.period.apply(start).and_then(|d| self.offset.apply(d))
    }

    pub fn following(&self, scheduled: NaiveDate) -> Option<NaiveDate> {
        self.period.apply(scheduled)
    }
}
