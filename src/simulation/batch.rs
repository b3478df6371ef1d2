use super::{SimulationBuilder, SimulationError};
use crate::arrays::Array;
use crate::periods::Period;
use crate::system::TaxBenefitSystem;
use rayon::prelude::*;
use std::sync::Arc;

/// Computes `variable` for `period` in every scenario, in parallel.
///
/// Each scenario becomes its own simulation with its own holders; the
/// system is shared. Results keep the order of `scenarios`.
pub fn run_parallel(
    system: &Arc<TaxBenefitSystem>,
    scenarios: Vec<SimulationBuilder>,
    variable: &str,
    period: Period,
) -> Vec<Result<Arc<Array>, SimulationError>> {
    tracing::debug!(scenarios = scenarios.len(), variable, period = %period, "running scenarios in parallel");
    scenarios
        .into_par_iter()
        .map(|scenario| {
            let mut simulation = scenario.build(system)?;
            simulation.calculate(variable, period)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arrays::DType;
    use crate::test_support::{household, person};
    use crate::variables::Variable;

    #[test]
    fn test_scenarios_run_independently() {
        let persons = person();
        let households = household();
        let salary = Variable::builder("salary", &persons, DType::Float).build().unwrap();
        let total = Variable::builder("total_salary", &households, DType::Float)
            .formula(|ctx, period| {
                let salaries = ctx.calculate("salary", period)?;
                Ok((period, ctx.sum_by_entity(&salaries, None, None)?))
            })
            .build()
            .unwrap();
        let system = TaxBenefitSystem::builder(persons, vec![households])
            .unwrap()
            .add_variable(salary)
            .unwrap()
            .add_variable(total)
            .unwrap()
            .build()
            .unwrap();

        let period: Period = "2015".parse().unwrap();
        let mut scenarios: Vec<SimulationBuilder> = (1..=8)
            .map(|n| {
                SimulationBuilder::new()
                    .persons(2)
                    .group("household", 1, vec![0, 0], ["parent", "child"])
                    .input("salary", period, vec![f64::from(n) * 100.0, 50.0])
            })
            .collect();
        // Two salaries for one person.
        scenarios.push(SimulationBuilder::new().persons(1).input("salary", period, vec![1.0, 2.0]));

        let results = run_parallel(&system, scenarios, "total_salary", period);
        assert_eq!(results.len(), 9);
        for (n, result) in (1..=8).zip(&results) {
            assert_eq!(**result.as_ref().unwrap(), Array::Float(vec![f64::from(n) * 100.0 + 50.0]));
        }
        assert!(results[8].is_err());
    }
}
