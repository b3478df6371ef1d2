//! The time model of the engine.
//!
//! An [`Instant`] is a calendar day, a [`Period`] a span of consecutive
//! [`DateUnit`]s starting at an instant. Both are immutable values: every
//! operation returns a new one.
mod instant;
mod period;
mod unit;

pub use instant::Instant;
pub use period::Period;
pub use unit::DateUnit;

pub use self::error::PeriodError;
mod error {
    use super::{DateUnit, Instant};
    use thiserror::Error;

    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum PeriodError {
        #[error("Invalid date {year:04}-{month:02}-{day:02}")]
        InvalidDate { year: i32, month: u32, day: u32 },
        #[error("Cannot parse '{input}' as {expected}")]
        Parse { input: String, expected: &'static str },
        #[error("Offsetting {instant} by {count} {unit} leaves the supported calendar range")]
        OutOfRange { instant: Instant, count: i64, unit: DateUnit },
        #[error("An eternal instant cannot be offset")]
        EternalOffset,
        #[error("A {unit} period must have a size of at least 1")]
        EmptyPeriod { unit: DateUnit },
    }
}
