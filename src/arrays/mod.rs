//! Typed population vectors and the SIMD kernels formulas run on.
pub mod kernel;
mod types;

pub use types::{Array, DType, Value};

pub use self::error::ArrayError;
mod error {
    use thiserror::Error;

    #[derive(Error, Debug, Clone, PartialEq)]
    pub enum ArrayError {
        #[error("Cannot cast {from} to {to}: {reason}")]
        CastNotPossible { from: String, to: String, reason: String },
        #[error("Length mismatch in '{function}': expected {expected}, got {actual}")]
        LengthMismatch { function: &'static str, expected: usize, actual: usize },
        #[error("Expected a {expected} array, got {actual}")]
        WrongDType { expected: &'static str, actual: String },
    }
}
