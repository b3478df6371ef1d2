//! Records of what a simulation computed, for audit and debugging.
mod graph;
mod trace;

pub use graph::DependencyGraph;
pub use trace::{Trace, TraceStep, TracedInput};

pub use self::error::TraceError;
mod error {
    use thiserror::Error;

    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum TraceError {
        #[error("Traced dependencies form a cycle through '{node}'")]
        Cycle { node: String },
        #[error("Could not serialize trace: {message}")]
        Json { message: String },
    }
}
