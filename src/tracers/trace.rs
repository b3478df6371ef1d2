use super::TraceError;
use crate::periods::{Instant, Period};
use serde::Serialize;
use std::collections::HashMap;
use std::io::Write;

/// A variable a step read, at the period it asked for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct TracedInput {
    pub variable: String,
    pub period: Period,
}

/// One `(variable, period)` request answered during a simulation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceStep {
    pub variable: String,
    /// Plural of the variable's entity.
    pub entity: String,
    pub requested: Period,
    /// The period the returned array is stored under.
    pub period: Period,
    /// `None` for inputs and defaults.
    pub formula: Option<String>,
    pub inputs: Vec<TracedInput>,
    pub parameters: Vec<Instant>,
    pub is_computed: bool,
    /// Every input returned its variable's default.
    pub default_inputs: bool,
    pub value: String,
}

impl TraceStep {
    pub fn label(&self) -> String {
        format!("{}<{}>", self.variable, self.requested)
    }
}

/// Steps in the order they completed. Dependencies complete before their
/// dependents.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Trace {
    steps: Vec<TraceStep>,
    #[serde(skip)]
    index: HashMap<(String, Period), usize>,
}

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a step. A later record of the same request replaces the
    /// earlier one unless only the earlier one was computed.
    pub fn record(&mut self, step: TraceStep) {
        let key = (step.variable.clone(), step.requested);
        match self.index.get(&key) {
            Some(&slot) => {
                if step.is_computed || !self.steps[slot].is_computed {
                    self.steps[slot] = step;
                }
            }
            None => {
                self.index.insert(key, self.steps.len());
                self.steps.push(step);
            }
        }
    }

    pub fn steps(&self) -> &[TraceStep] {
        &self.steps
    }

    pub fn step(&self, variable: &str, period: Period) -> Option<&TraceStep> {
        self.index
            .get(&(variable.to_string(), period))
            .map(|&slot| &self.steps[slot])
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn clear(&mut self) {
        self.steps.clear();
        self.index.clear();
    }

    pub fn to_json(&self) -> Result<serde_json::Value, TraceError> {
        serde_json::to_value(self).map_err(|e| TraceError::Json { message: e.to_string() })
    }

    pub fn write_json<W: Write>(&self, writer: W) -> Result<(), TraceError> {
        serde_json::to_writer_pretty(writer, self).map_err(|e| TraceError::Json { message: e.to_string() })
    }
}
