//! Legislation parameters: dated values organised in a tree, read by
//! formulas at a given instant.
mod at_instant;
mod node;

pub use at_instant::ParameterAtInstant;
pub use node::{Bracket, Parameter, ParameterItem, ParameterNode, ParameterValue, Scale};

use crate::periods::Instant;
use std::fmt::Debug;

/// A source of parameter values. Formulas only ever see its snapshot at
/// one instant.
pub trait ParameterTree: Debug + Send + Sync {
    fn get_at_instant(&self, instant: Instant) -> Result<ParameterAtInstant, ParameterError>;
}

pub use self::error::ParameterError;
mod error {
    use crate::taxscales::TaxScaleError;
    use thiserror::Error;

    #[derive(Error, Debug, Clone, PartialEq)]
    pub enum ParameterError {
        #[error("Parameter '{path}' has no value at this instant")]
        MissingPath { path: String },
        #[error("Parameter '{path}' is not {expected}")]
        WrongKind { path: String, expected: &'static str },
        #[error("Invalid parameter description: {message}")]
        Json { message: String },
        #[error("No parameter tree is loaded")]
        NoParameters,
        #[error(transparent)]
        TaxScale(#[from] TaxScaleError),
    }
}
