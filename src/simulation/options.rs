use serde::{Deserialize, Serialize};

/// Instrumentation switches of a simulation.
///
/// ```
/// use fisca_core::simulation::SimulationOptions;
/// let options = SimulationOptions::from_json(r#"{"trace": true}"#).unwrap();
/// assert!(options.trace && !options.debug);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationOptions {
    /// Checks formula outputs for NaN and logs each computation.
    pub debug: bool,
    /// With `debug`, also logs computations whose inputs are all defaults.
    pub debug_all: bool,
    /// Records every computation step.
    pub trace: bool,
}

impl SimulationOptions {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub(crate) fn records_steps(&self) -> bool {
        self.debug || self.trace
    }
}
