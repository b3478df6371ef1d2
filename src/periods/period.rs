use super::{DateUnit, Instant, PeriodError};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::{Ordering, Reverse};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// A span of `size` consecutive `unit`s starting at `start`.
///
/// Eternal periods ignore `start` and `size`: there is exactly one eternity,
/// and it compares equal to itself whatever way it was built.
#[derive(Debug, Clone, Copy)]
pub struct Period {
    unit: DateUnit,
    start: Instant,
    size: u32,
    // Last day covered, inclusive. Cached at construction.
    stop: Instant,
}

impl Period {
    pub fn new(unit: DateUnit, start: Instant, size: u32) -> Result<Self, PeriodError> {
        if unit.is_eternal() {
            return Ok(Self::eternity());
        }
        if size == 0 {
            return Err(PeriodError::EmptyPeriod { unit });
        }
        let stop = start.offset(i64::from(size), unit)?.offset(-1, DateUnit::Day)?;
        Ok(Self { unit, start, size, stop })
    }

    pub const fn eternity() -> Self {
        Self {
            unit: DateUnit::Eternity,
            start: Instant::START_OF_TIME,
            size: 1,
            stop: Instant::END_OF_TIME,
        }
    }

    pub fn year(year: i32) -> Result<Self, PeriodError> {
        Self::new(DateUnit::Year, Instant::new(year, 1, 1)?, 1)
    }

    pub fn month(year: i32, month: u32) -> Result<Self, PeriodError> {
        Self::new(DateUnit::Month, Instant::new(year, month, 1)?, 1)
    }

    pub fn day(year: i32, month: u32, day: u32) -> Result<Self, PeriodError> {
        Self::new(DateUnit::Day, Instant::new(year, month, day)?, 1)
    }

    #[inline]
    pub fn unit(&self) -> DateUnit {
        self.unit
    }

    #[inline]
    pub fn start(&self) -> Instant {
        self.start
    }

    #[inline]
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Last day of the period, inclusive.
    #[inline]
    pub fn stop(&self) -> Instant {
        self.stop
    }

    #[inline]
    pub fn is_eternal(&self) -> bool {
        self.unit.is_eternal()
    }

    pub fn contains_instant(&self, instant: Instant) -> bool {
        self.start <= instant && instant <= self.stop
    }

    /// Whether `other` lies entirely within `self`.
    pub fn contains(&self, other: &Period) -> bool {
        if self.is_eternal() {
            return true;
        }
        !other.is_eternal() && self.start <= other.start && other.stop <= self.stop
    }

    /// Moves the start by `count` units (the period's own unit by default),
    /// keeping unit and size. Eternity does not move.
    pub fn offset(&self, count: i64, unit: Option<DateUnit>) -> Result<Self, PeriodError> {
        if self.is_eternal() {
            return Ok(*self);
        }
        let start = self.start.offset(count, unit.unwrap_or(self.unit))?;
        Self::new(self.unit, start, self.size)
    }

    /// The sub-period of `self` bounded by `start` and `stop` (both inclusive,
    /// either open when `None`), or `None` when they do not overlap.
    ///
    /// The result is expressed in the broadest unit that fits it exactly:
    /// whole calendar years, then whole months, then days.
    pub fn intersection(
        &self,
        start: Option<Instant>,
        stop: Option<Instant>,
    ) -> Result<Option<Period>, PeriodError> {
        if start.is_none() && stop.is_none() {
            return Ok(Some(*self));
        }
        let lower = start.map_or(self.start, |s| s.max(self.start));
        let upper = stop.map_or(self.stop, |s| s.min(self.stop));
        if lower > upper {
            return Ok(None);
        }
        if lower == self.start && upper == self.stop {
            return Ok(Some(*self));
        }

        if lower.month() == 1 && lower.day() == 1 && upper.month() == 12 && upper.day() == 31 {
            let years = upper.year() - lower.year() + 1;
            return Self::new(DateUnit::Year, lower, to_size(years, DateUnit::Year)?).map(Some);
        }
        if lower.day() == 1 && upper == upper.last_of(DateUnit::Month)? {
            let months = (upper.year() - lower.year()) * 12 + upper.month() as i32 - lower.month() as i32 + 1;
            return Self::new(DateUnit::Month, lower, to_size(months, DateUnit::Month)?).map(Some);
        }
        let days = lower.days_until(upper) + 1;
        let days = i32::try_from(days).map_err(|_| PeriodError::OutOfRange {
            instant: lower,
            count: days,
            unit: DateUnit::Day,
        })?;
        Self::new(DateUnit::Day, lower, to_size(days, DateUnit::Day)?).map(Some)
    }

    fn sort_key(&self) -> (Instant, Reverse<Instant>, DateUnit) {
        (self.start, Reverse(self.stop), self.unit)
    }
}

fn to_size(count: i32, unit: DateUnit) -> Result<u32, PeriodError> {
    u32::try_from(count).map_err(|_| PeriodError::EmptyPeriod { unit })
}

impl PartialEq for Period {
    fn eq(&self, other: &Self) -> bool {
        match (self.is_eternal(), other.is_eternal()) {
            (true, true) => true,
            (false, false) => self.unit == other.unit && self.start == other.start && self.size == other.size,
            _ => false,
        }
    }
}

impl Eq for Period {}

impl Hash for Period {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.unit.hash(state);
        if !self.is_eternal() {
            self.start.hash(state);
            self.size.hash(state);
        }
    }
}

impl Ord for Period {
    /// By start, then broadest first, then unit. Eternity sorts before everything.
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.is_eternal(), other.is_eternal()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => self.sort_key().cmp(&other.sort_key()),
        }
    }
}

impl PartialOrd for Period {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let start = self.start;
        let month_start = start.day() == 1;
        match self.unit {
            DateUnit::Eternity => f.write_str("ETERNITY"),
            DateUnit::Year if month_start && start.month() == 1 => {
                if self.size == 1 {
                    write!(f, "{:04}", start.year())
                } else {
                    write!(f, "year:{:04}:{}", start.year(), self.size)
                }
            }
            DateUnit::Month | DateUnit::Year if month_start => {
                let short = format!("{:04}-{:02}", start.year(), start.month());
                match (self.unit, self.size) {
                    (DateUnit::Month, 1) => f.write_str(&short),
                    (unit, 1) => write!(f, "{unit}:{short}"),
                    (unit, size) => write!(f, "{unit}:{short}:{size}"),
                }
            }
            DateUnit::Day if self.size == 1 => write!(f, "{start}"),
            unit => {
                if self.size == 1 {
                    write!(f, "{unit}:{start}")
                } else {
                    write!(f, "{unit}:{start}:{}", self.size)
                }
            }
        }
    }
}

impl FromStr for Period {
    type Err = PeriodError;

    /// Accepts `2015`, `2015-03`, `2015-03-04`, `ETERNITY` and
    /// `unit:start[:size]` such as `month:2015-03:3`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let parse_error = || PeriodError::Parse { input: s.to_string(), expected: "a period" };
        if s.eq_ignore_ascii_case("eternity") {
            return Ok(Self::eternity());
        }
        match s.split_once(':') {
            Some((unit, rest)) => {
                let unit: DateUnit = unit.parse()?;
                let (start, size) = match rest.split_once(':') {
                    Some((start, size)) => (start, size.parse::<u32>().map_err(|_| parse_error())?),
                    None => (rest, 1),
                };
                Self::new(unit, start.parse()?, size)
            }
            None => {
                let unit = match s.split('-').count() {
                    1 => DateUnit::Year,
                    2 => DateUnit::Month,
                    3 => DateUnit::Day,
                    _ => return Err(parse_error()),
                };
                Self::new(unit, s.parse()?, 1)
            }
        }
    }
}

impl Serialize for Period {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Period {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}
