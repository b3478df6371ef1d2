//! Variable definitions: typed columns attached to an entity, computed by
//! dated formulas or by projecting another variable across entities.
mod formula;
mod variable;

pub use formula::{Aggregation, Conversion, DatedFormula, Formula, FormulaFn};
pub use variable::{Variable, VariableBuilder};

pub use self::error::DefinitionError;
mod error {
    use crate::arrays::ArrayError;
    use crate::periods::Instant;
    use thiserror::Error;

    #[derive(Error, Debug, Clone, PartialEq)]
    pub enum DefinitionError {
        #[error("Variable '{name}' is already defined")]
        DuplicateVariable { name: String },
        #[error("Dated formulas of '{variable}' overlap: '{first}' stops on {stop} but '{second}' starts on {start}")]
        OverlappingFormulas { variable: String, first: String, second: String, stop: Instant, start: Instant },
        #[error("Dated formulas of '{variable}' leave a gap between {stop} and {start}")]
        FormulaGap { variable: String, stop: Instant, start: Instant },
        #[error("Invalid instant interval for formula '{formula}': {start} - {stop}")]
        InvalidInterval { formula: String, start: Instant, stop: Instant },
        #[error("Variable '{variable}' must be defined for {expected}, not '{entity}'")]
        ConversionTarget { variable: String, expected: &'static str, entity: String },
        #[error("Unexpected aggregation in formula '{variable}': a single role needs none")]
        UnexpectedAggregation { variable: String },
        #[error("Formula '{variable}' aggregates several roles and needs an aggregation ('add' or 'or')")]
        MissingAggregation { variable: String },
        #[error("Entity '{entity}' has no role '{role}' (in definition of '{variable}')")]
        UnknownRole { variable: String, entity: String, role: String },
        #[error("Variable '{variable}' cannot have both formulas and a conversion")]
        ConflictingFormulas { variable: String },
        #[error("Invalid default value for '{variable}': {source}")]
        InvalidDefault { variable: String, source: ArrayError },
        #[error("Entity '{entity}' is not registered in the tax and benefit system")]
        UnknownEntity { entity: String },
        #[error("Variable '{variable}' converts '{input}', which is not registered")]
        MissingSource { variable: String, input: String },
        #[error("Entity '{entity}' is not {expected}")]
        EntityKind { entity: String, expected: &'static str },
    }
}
