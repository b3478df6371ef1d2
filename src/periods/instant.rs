use super::{DateUnit, PeriodError};
use chrono::{Datelike, Days, Months, NaiveDate};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A calendar day. Ordering is chronological.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Instant(NaiveDate);

impl Instant {
    /// Lower bound used by eternal periods.
    pub const START_OF_TIME: Instant = Instant(NaiveDate::MIN);
    /// Upper bound used by eternal periods.
    pub const END_OF_TIME: Instant = Instant(NaiveDate::MAX);

    pub fn new(year: i32, month: u32, day: u32) -> Result<Self, PeriodError> {
        NaiveDate::from_ymd_opt(year, month, day)
            .map(Instant)
            .ok_or(PeriodError::InvalidDate { year, month, day })
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self(date)
    }

    #[inline]
    pub fn date(self) -> NaiveDate {
        self.0
    }

    #[inline]
    pub fn year(self) -> i32 {
        self.0.year()
    }

    #[inline]
    pub fn month(self) -> u32 {
        self.0.month()
    }

    #[inline]
    pub fn day(self) -> u32 {
        self.0.day()
    }

    /// Shifts the instant by `count` units.
    ///
    /// Month and year offsets keep the day of month, clamped to the length
    /// of the target month (`2016-01-31` + 1 month is `2016-02-29`).
    pub fn offset(self, count: i64, unit: DateUnit) -> Result<Self, PeriodError> {
        let shifted = match unit {
            DateUnit::Day | DateUnit::WeekDay => shift_days(self.0, count),
            DateUnit::Week => count.checked_mul(7).and_then(|days| shift_days(self.0, days)),
            DateUnit::Month => shift_months(self.0, count),
            DateUnit::Year => count.checked_mul(12).and_then(|months| shift_months(self.0, months)),
            DateUnit::Eternity => return Err(PeriodError::EternalOffset),
        };
        shifted
            .map(Instant)
            .ok_or(PeriodError::OutOfRange { instant: self, count, unit })
    }

    /// The first day of the `unit` containing this instant. Weeks start on Monday.
    pub fn first_of(self, unit: DateUnit) -> Result<Self, PeriodError> {
        let date = match unit {
            DateUnit::Day | DateUnit::WeekDay => Some(self.0),
            DateUnit::Week => {
                shift_days(self.0, -i64::from(self.0.weekday().num_days_from_monday()))
            }
            DateUnit::Month => self.0.with_day(1),
            DateUnit::Year => NaiveDate::from_ymd_opt(self.year(), 1, 1),
            DateUnit::Eternity => return Err(PeriodError::EternalOffset),
        };
        date.map(Instant)
            .ok_or(PeriodError::OutOfRange { instant: self, count: 0, unit })
    }

    /// The last day of the `unit` containing this instant.
    pub fn last_of(self, unit: DateUnit) -> Result<Self, PeriodError> {
        match unit {
            DateUnit::Day | DateUnit::WeekDay => Ok(self),
            DateUnit::Week => {
                let remaining = 6 - i64::from(self.0.weekday().num_days_from_monday());
                self.offset(remaining, DateUnit::Day)
            }
            DateUnit::Month => self.first_of(DateUnit::Month)?.offset(1, DateUnit::Month)?.offset(-1, DateUnit::Day),
            DateUnit::Year => Instant::new(self.year(), 12, 31),
            DateUnit::Eternity => Err(PeriodError::EternalOffset),
        }
    }

    /// Number of days from `self` to `other`, `other` excluded.
    pub fn days_until(self, other: Instant) -> i64 {
        (other.0 - self.0).num_days()
    }
}

fn shift_days(date: NaiveDate, days: i64) -> Option<NaiveDate> {
    if days >= 0 {
        date.checked_add_days(Days::new(days.unsigned_abs()))
    } else {
        date.checked_sub_days(Days::new(days.unsigned_abs()))
    }
}

fn shift_months(date: NaiveDate, months: i64) -> Option<NaiveDate> {
    let magnitude = u32::try_from(months.unsigned_abs()).ok()?;
    if months >= 0 {
        date.checked_add_months(Months::new(magnitude))
    } else {
        date.checked_sub_months(Months::new(magnitude))
    }
}

impl fmt::Display for Instant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}-{:02}", self.year(), self.month(), self.day())
    }
}

impl FromStr for Instant {
    type Err = PeriodError;

    /// Accepts `YYYY`, `YYYY-MM` and `YYYY-MM-DD`; missing parts default to 1.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse_error = || PeriodError::Parse { input: s.to_string(), expected: "an instant" };
        let mut parts = s.trim().split('-');
        let year = parts
            .next()
            .and_then(|p| p.parse::<i32>().ok())
            .ok_or_else(parse_error)?;
        let month = match parts.next() {
            Some(p) => p.parse::<u32>().map_err(|_| parse_error())?,
            None => 1,
        };
        let day = match parts.next() {
            Some(p) => p.parse::<u32>().map_err(|_| parse_error())?,
            None => 1,
        };
        if parts.next().is_some() {
            return Err(parse_error());
        }
        Instant::new(year, month, day)
    }
}

impl Serialize for Instant {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Instant {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}
