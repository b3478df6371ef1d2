//! Bracket-based lookup tables read by formulas.
mod single_amount;

pub use single_amount::SingleAmountTaxScale;

pub use self::error::TaxScaleError;
mod error {
    use thiserror::Error;

    #[derive(Error, Debug, Clone, PartialEq)]
    pub enum TaxScaleError {
        #[error("A tax scale needs as many amounts as thresholds, got {thresholds} thresholds and {amounts} amounts")]
        BracketMismatch { thresholds: usize, amounts: usize },
        #[error("Tax scale threshold must be a number, got {threshold}")]
        InvalidThreshold { threshold: f64 },
    }
}
