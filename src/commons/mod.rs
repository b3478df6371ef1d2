//! Vector helpers shared by formula bodies.
mod formulas;

pub use formulas::{apply_thresholds, stringify_array, switch};

pub use self::error::CommonsError;
mod error {
    use thiserror::Error;

    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum CommonsError {
        #[error("apply_thresholds must be called with the same number of thresholds than choices, or one more choice ({thresholds} thresholds, {choices} choices)")]
        ThresholdMismatch { thresholds: usize, choices: usize },
        #[error("switch must be called with at least one value")]
        EmptySwitch,
    }
}
