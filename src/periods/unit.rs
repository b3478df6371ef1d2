use super::PeriodError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The date units of a rule system, ordered from the finest to the broadest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateUnit {
    WeekDay,
    Week,
    Day,
    Month,
    Year,
    Eternity,
}

impl DateUnit {
    pub const ALL: [DateUnit; 6] = [
        DateUnit::WeekDay,
        DateUnit::Week,
        DateUnit::Day,
        DateUnit::Month,
        DateUnit::Year,
        DateUnit::Eternity,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DateUnit::WeekDay => "week_day",
            DateUnit::Week => "week",
            DateUnit::Day => "day",
            DateUnit::Month => "month",
            DateUnit::Year => "year",
            DateUnit::Eternity => "eternity",
        }
    }

    /// Units that map onto the civil calendar.
    pub fn is_ethereal(self) -> bool {
        matches!(self, DateUnit::Day | DateUnit::Month | DateUnit::Year)
    }

    pub fn is_eternal(self) -> bool {
        self == DateUnit::Eternity
    }
}

impl fmt::Display for DateUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DateUnit {
    type Err = PeriodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        DateUnit::ALL
            .into_iter()
            .find(|unit| unit.as_str() == lowered)
            .ok_or_else(|| PeriodError::Parse { input: s.to_string(), expected: "a date unit" })
    }
}
