//! Running a tax and benefit system over a population: holders, the
//! memoizing formula engine and cross-entity projections.
mod batch;
mod builder;
mod context;
mod engine;
mod holder;
mod options;
mod population;
mod projectors;

pub use batch::run_parallel;
pub use builder::SimulationBuilder;
pub use context::FormulaContext;
pub use engine::Simulation;
pub use holder::Holder;
pub use options::SimulationOptions;
pub use population::{Membership, Population, PopulationError};

pub use self::error::SimulationError;
mod error {
    use super::PopulationError;
    use crate::arrays::ArrayError;
    use crate::commons::CommonsError;
    use crate::entities::EntityError;
    use crate::indexed_enums::EnumError;
    use crate::parameters::ParameterError;
    use crate::periods::{Period, PeriodError};
    use crate::taxscales::TaxScaleError;
    use thiserror::Error;

    #[derive(Error, Debug, Clone, PartialEq)]
    pub enum SimulationError {
        #[error("Infinite loop in formula {variable}<{period}>. Missing values for columns: {chain}")]
        InfiniteLoop { variable: String, period: String, chain: String },
        #[error("Function {formula}@{entity}<{requested}>() --> <{output}>{array} returns an output period that doesn't include start instant of requested period")]
        PeriodCoverage { formula: String, entity: String, requested: Period, output: Period, array: String },
        #[error("Function {formula}@{entity}<{requested}>() --> <{output}>{array} returns an array of size {actual}, but size {expected} is expected for {key}")]
        SizeMismatch {
            formula: String,
            entity: String,
            key: String,
            requested: Period,
            output: Period,
            array: String,
            actual: usize,
            expected: usize,
        },
        #[error("Function {formula}@{entity}<{requested}>() --> <{output}>{array} returns {count} NaN value(s)")]
        NanCreation { formula: String, entity: String, requested: Period, output: Period, array: String, count: usize },
        #[error("Function {formula} returns values that cannot be stored in '{variable}': {source}")]
        WrongType { formula: String, variable: String, source: ArrayError },
        #[error("An error occurred while {action} array for role {entity}[{role}] in function {function}: {source}")]
        Projection { action: &'static str, entity: String, role: String, function: String, source: ArrayError },
        #[error("Role {entity}[{role}] can be held by several members and cannot be filtered in function {function}")]
        SharedRole { entity: String, role: String, function: String },
        #[error("Entity '{entity}' has no population in this simulation")]
        UnknownPopulation { entity: String },
        #[error("Entity '{entity}' is not {expected}")]
        EntityKind { entity: String, expected: &'static str },
        #[error("Formula {formula} failed: {message}")]
        Formula { formula: String, message: String },
        #[error(transparent)]
        Entity(#[from] EntityError),
        #[error(transparent)]
        Population(#[from] PopulationError),
        #[error(transparent)]
        Array(#[from] ArrayError),
        #[error(transparent)]
        Period(#[from] PeriodError),
        #[error(transparent)]
        Parameter(#[from] ParameterError),
        #[error(transparent)]
        Enum(#[from] EnumError),
        #[error(transparent)]
        TaxScale(#[from] TaxScaleError),
        #[error(transparent)]
        Commons(#[from] CommonsError),
    }
}
