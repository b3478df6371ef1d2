use crate::arrays::Array;
use crate::entities::Role;
use crate::periods::{Instant, Period};
use crate::simulation::{FormulaContext, SimulationError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Signature of a formula body. It returns the period its array is valid
/// for together with the array.
pub type FormulaFn =
    dyn Fn(&mut FormulaContext<'_>, Period) -> Result<(Period, Array), SimulationError> + Send + Sync;

/// A named formula body. The name locates the rule in error messages.
#[derive(Clone)]
pub struct Formula {
    name: String,
    function: Arc<FormulaFn>,
}

impl Formula {
    pub fn new<F>(name: impl Into<String>, function: F) -> Self
    where
        F: Fn(&mut FormulaContext<'_>, Period) -> Result<(Period, Array), SimulationError> + Send + Sync + 'static,
    {
        Self { name: name.into(), function: Arc::new(function) }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn call(&self, context: &mut FormulaContext<'_>, period: Period) -> Result<(Period, Array), SimulationError> {
        (self.function)(context, period)
    }
}

impl fmt::Debug for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Formula({})", self.name)
    }
}

/// A formula together with the days it applies to, both ends included.
/// Open ends extend to the start or end of time.
#[derive(Debug, Clone)]
pub struct DatedFormula {
    pub start: Option<Instant>,
    pub stop: Option<Instant>,
    pub formula: Formula,
}

impl DatedFormula {
    pub fn covers(&self, instant: Instant) -> bool {
        self.start.map_or(true, |start| start <= instant) && self.stop.map_or(true, |stop| instant <= stop)
    }
}

/// How person values are combined into one value per group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    /// Sums contributions. Booleans are counted.
    Add,
    /// Logical or of contributions.
    Or,
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Aggregation::Add => "add",
            Aggregation::Or => "or",
        })
    }
}

/// A variable computed by moving another variable between a group entity
/// and its members. `None` roles mean every role.
#[derive(Debug, Clone)]
pub enum Conversion {
    /// Copies the group value to each member holding one of `roles`.
    EntityToPerson { source: String, roles: Option<Vec<Arc<Role>>> },
    /// Copies the value of the member holding the single role, or combines
    /// the values of members holding any of `roles`.
    PersonToEntity { source: String, roles: Option<Vec<Arc<Role>>>, aggregation: Option<Aggregation> },
}

impl Conversion {
    pub fn source(&self) -> &str {
        match self {
            Conversion::EntityToPerson { source, .. } | Conversion::PersonToEntity { source, .. } => source,
        }
    }

    pub fn roles(&self) -> Option<&[Arc<Role>]> {
        match self {
            Conversion::EntityToPerson { roles, .. } | Conversion::PersonToEntity { roles, .. } => roles.as_deref(),
        }
    }
}
