//! The memoizing, period-aware formula engine.
use super::context::FormulaContext;
use super::population::{Membership, Population, PopulationError};
use super::{projectors, Holder, SimulationError, SimulationOptions};
use crate::arrays::{Array, ArrayError};
use crate::commons::stringify_array;
use crate::entities::{Documentable, Entity, EntityError, RoleCode};
use crate::parameters::ParameterAtInstant;
use crate::periods::{Instant, Period};
use crate::system::TaxBenefitSystem;
use crate::tracers::{Trace, TraceStep, TracedInput};
use crate::variables::{Conversion, Variable};
use std::collections::HashMap;
use std::sync::Arc;

/// What one in-progress computation has read so far.
#[derive(Debug, Default)]
struct Frame {
    inputs: Vec<(TracedInput, bool)>,
    parameters: Vec<Instant>,
}

/// State of one top-level request, threaded through the recursive
/// evaluation: the requests currently in progress and, when steps are
/// recorded, what each of them has read.
#[derive(Debug, Default)]
pub(crate) struct RunContext {
    in_flight: Vec<(String, Option<Period>)>,
    frames: Vec<Frame>,
}

impl RunContext {
    pub(crate) fn record_parameters(&mut self, instant: Instant) {
        if let Some(frame) = self.frames.last_mut() {
            if !frame.parameters.contains(&instant) {
                frame.parameters.push(instant);
            }
        }
    }
}

/// A population of entities, the holders caching their variables, and the
/// system the variables come from.
///
/// Each simulation owns its holders; the system is shared and read-only.
#[derive(Debug)]
pub struct Simulation {
    system: Arc<TaxBenefitSystem>,
    populations: HashMap<String, Population>,
    holders: HashMap<String, Holder>,
    options: SimulationOptions,
    parameters_cache: HashMap<Instant, Arc<ParameterAtInstant>>,
    trace: Trace,
}

pub(crate) fn entity_label(entity: &Entity) -> &str {
    entity.plural().unwrap_or_else(|| entity.key())
}

impl Simulation {
    pub(crate) fn new(
        system: Arc<TaxBenefitSystem>,
        populations: Vec<Population>,
        options: SimulationOptions,
    ) -> Self {
        let populations = populations
            .into_iter()
            .map(|population| (population.entity().key().to_string(), population))
            .collect();
        Self {
            system,
            populations,
            holders: HashMap::new(),
            options,
            parameters_cache: HashMap::new(),
            trace: Trace::new(),
        }
    }

    pub fn system(&self) -> &Arc<TaxBenefitSystem> {
        &self.system
    }

    pub fn options(&self) -> SimulationOptions {
        self.options
    }

    pub fn trace(&self) -> &Trace {
        &self.trace
    }

    pub fn population(&self, entity: &str) -> Result<&Population, SimulationError> {
        self.populations
            .get(entity)
            .ok_or_else(|| SimulationError::UnknownPopulation { entity: entity.to_string() })
    }

    pub fn holder(&self, variable: &str) -> Option<&Holder> {
        self.holders.get(variable)
    }

    fn holder_mut(&mut self, variable: &Arc<Variable>) -> &mut Holder {
        self.holders
            .entry(variable.name().to_string())
            .or_insert_with(|| Holder::new(variable.clone()))
    }

    fn variable(&self, name: &str) -> Result<Arc<Variable>, SimulationError> {
        self.system
            .get_variable(name, true)?
            .ok_or_else(|| EntityError::VariableNotFound { variable: name.to_string() }.into())
    }

    /// Stores known values of an input variable.
    pub fn set_input(&mut self, name: &str, period: Period, array: Array) -> Result<(), SimulationError> {
        let variable = self.variable(name)?;
        let count = self.population(variable.entity().key())?.count();
        self.holder_mut(&variable).set_input(period, array, count)
    }

    pub fn delete_arrays(&mut self, name: &str, period: Option<Period>) {
        if let Some(holder) = self.holders.get_mut(name) {
            holder.delete_arrays(period);
        }
    }

    /// The value of `name` for `period`, one cell per member of its entity.
    pub fn calculate(&mut self, name: &str, period: Period) -> Result<Arc<Array>, SimulationError> {
        let mut run = RunContext::default();
        self.calculate_in(name, period, &mut run)
    }

    /// Like [`Simulation::calculate`], after checking that `name` is
    /// defined for `entity` in this simulation's system.
    pub fn calculate_for(&mut self, entity: &str, name: &str, period: Period) -> Result<Arc<Array>, SimulationError> {
        let entity = self
            .system
            .entity(entity)
            .ok_or_else(|| SimulationError::UnknownPopulation { entity: entity.to_string() })?;
        entity.check_variable_defined(&*self.variable(name)?)?;
        self.calculate(name, period)
    }

    /// The parameter tree at `instant`, resolved once per simulation.
    pub fn parameters_at(&mut self, instant: Instant) -> Result<Arc<ParameterAtInstant>, SimulationError> {
        if let Some(parameters) = self.parameters_cache.get(&instant) {
            return Ok(parameters.clone());
        }
        let parameters = Arc::new(self.system.parameters_at(instant)?);
        self.parameters_cache.insert(instant, parameters.clone());
        Ok(parameters)
    }

    pub(crate) fn calculate_in(
        &mut self,
        name: &str,
        period: Period,
        run: &mut RunContext,
    ) -> Result<Arc<Array>, SimulationError> {
        let variable = self.variable(name)?;
        let (_, array) = self.compute(&variable, period, run)?;
        if let Some(frame) = run.frames.last_mut() {
            let is_default = array.all_equal(variable.default_value());
            frame
                .inputs
                .push((TracedInput { variable: name.to_string(), period }, is_default));
        }
        Ok(array)
    }

    fn compute(
        &mut self,
        variable: &Arc<Variable>,
        period: Period,
        run: &mut RunContext,
    ) -> Result<(Period, Arc<Array>), SimulationError> {
        let count = self.population(variable.entity().key())?.count();

        let cached = self
            .holders
            .get(variable.name())
            .and_then(|holder| holder.covering(period))
            .map(|(stored, array)| (stored, array.clone()));
        if let Some((stored, array)) = cached {
            tracing::trace!(variable = variable.name(), period = %period, stored = %stored, "cache hit");
            self.record_lookup(variable, period, stored, &array);
            return Ok((stored, array));
        }

        let past_end = variable.end().map_or(false, |end| period.start() > end);
        let has_rule = variable.conversion().is_some() || variable.formula_at(period.start()).is_some();
        if past_end || !has_rule {
            tracing::trace!(variable = variable.name(), period = %period, "no formula applies, using default");
            let array = Arc::new(variable.default_array(count)?);
            self.record_lookup(variable, period, period, &array);
            return Ok((period, array));
        }

        let key = (variable.name().to_string(), (!variable.is_permanent()).then_some(period));
        if run.in_flight.contains(&key) {
            let mut chain: Vec<String> = run
                .in_flight
                .iter()
                .map(|(name, period)| match period {
                    Some(period) => format!("{name}<{period}>"),
                    None => name.clone(),
                })
                .collect();
            chain.sort();
            chain.dedup();
            return Err(SimulationError::InfiniteLoop {
                variable: variable.name().to_string(),
                period: period.to_string(),
                chain: chain.join(", "),
            });
        }

        run.in_flight.push(key);
        let records_steps = self.options.records_steps();
        if records_steps {
            run.frames.push(Frame::default());
        }
        let outcome = self.evaluate(variable, period, count, run);
        let frame = if records_steps { run.frames.pop() } else { None };
        run.in_flight.pop();

        let (formula, output_period, array) = outcome?;
        self.holder_mut(variable).put(output_period, array.clone());
        if let Some(frame) = frame {
            self.record_computation(variable, period, output_period, formula, frame, &array);
        }
        Ok((output_period, array))
    }

    fn evaluate(
        &mut self,
        variable: &Arc<Variable>,
        period: Period,
        count: usize,
        run: &mut RunContext,
    ) -> Result<(String, Period, Arc<Array>), SimulationError> {
        if let Some(conversion) = variable.conversion() {
            let array = self.convert(variable, conversion, period, run)?;
            let array = self.validate(variable, variable.name(), period, period, array, count)?;
            return Ok((variable.name().to_string(), period, Arc::new(array)));
        }

        let Some(dated) = variable.formula_at(period.start()).cloned() else {
            return Ok((variable.name().to_string(), period, Arc::new(variable.default_array(count)?)));
        };
        let formula_period = period.intersection(dated.start, dated.stop)?.unwrap_or(period);
        let formula = dated.formula;
        tracing::debug!(variable = variable.name(), formula = formula.name(), period = %formula_period, "calling formula");

        let mut context = FormulaContext::new(self, run, variable.clone(), count);
        let (output_period, array) = formula.call(&mut context, formula_period).map_err(|error| {
            tracing::error!(
                variable = variable.name(),
                entity = entity_label(variable.entity()),
                period = %formula_period,
                function = formula.name(),
                %error,
                "formula failed"
            );
            error
        })?;
        let array = self.validate(variable, formula.name(), formula_period, output_period, array, count)?;
        Ok((formula.name().to_string(), output_period, Arc::new(array)))
    }

    fn convert(
        &mut self,
        variable: &Arc<Variable>,
        conversion: &Conversion,
        period: Period,
        run: &mut RunContext,
    ) -> Result<Array, SimulationError> {
        let source = self.calculate_in(conversion.source(), period, run)?;
        let roles: Option<Vec<&str>> = conversion
            .roles()
            .map(|roles| roles.iter().map(|role| role.key()).collect());
        let default = variable.default_value();
        match conversion {
            Conversion::EntityToPerson { source: group_variable, .. } => {
                let group = self.variable(group_variable)?.entity().key().to_string();
                self.project("casting", variable.name(), &group, roles.as_deref(), |membership, codes| {
                    projectors::broadcast(&source, default, membership, codes)
                })
            }
            Conversion::PersonToEntity { aggregation: None, .. } => {
                self.project("filtering", variable.name(), variable.entity().key(), roles.as_deref(), |membership, codes| {
                    projectors::pick(&source, default, membership, codes)
                })
            }
            Conversion::PersonToEntity { aggregation: Some(aggregation), .. } => {
                self.project("summing", variable.name(), variable.entity().key(), roles.as_deref(), |membership, codes| {
                    projectors::reduce(&source, *aggregation, membership, codes)
                })
            }
        }
    }

    /// Resolves the membership of `entity` and the codes of `roles` (all
    /// roles when `None`), then runs a projection over them.
    pub(crate) fn project<F>(
        &self,
        action: &'static str,
        function: &str,
        entity: &str,
        roles: Option<&[&str]>,
        projection: F,
    ) -> Result<Array, SimulationError>
    where
        F: FnOnce(&Membership, &[RoleCode]) -> Result<Array, ArrayError>,
    {
        let population = self.population(entity)?;
        let (Some(group), Some(membership)) = (population.entity().as_group(), population.membership()) else {
            return Err(SimulationError::EntityKind { entity: entity.to_string(), expected: "a group entity" });
        };
        let codes: Vec<RoleCode> = match roles {
            None => group.all_role_codes().to_vec(),
            Some(keys) => {
                let mut codes = Vec::new();
                for key in keys {
                    let role = group.role(key).ok_or_else(|| PopulationError::UnknownRole {
                        entity: entity.to_string(),
                        role: key.to_string(),
                    })?;
                    codes.extend(group.role_codes(role));
                }
                codes
            }
        };
        projection(membership, &codes).map_err(|source| {
            let role = roles.map_or_else(|| "*".to_string(), |keys| keys.join(", "));
            tracing::error!(entity, role = %role, function, action, error = %source, "projection failed");
            SimulationError::Projection { action, entity: entity.to_string(), role, function: function.to_string(), source }
        })
    }

    fn validate(
        &self,
        variable: &Variable,
        formula: &str,
        requested: Period,
        output: Period,
        array: Array,
        count: usize,
    ) -> Result<Array, SimulationError> {
        let entity = entity_label(variable.entity()).to_string();
        if !output.contains_instant(requested.start()) {
            return Err(SimulationError::PeriodCoverage {
                formula: formula.to_string(),
                entity,
                requested,
                output,
                array: stringify_array(Some(&array)),
            });
        }
        if array.len() != count {
            return Err(SimulationError::SizeMismatch {
                formula: formula.to_string(),
                entity,
                key: variable.entity().key().to_string(),
                requested,
                output,
                array: stringify_array(Some(&array)),
                actual: array.len(),
                expected: count,
            });
        }
        if self.options.debug {
            let nan = array.count_nan();
            if nan > 0 {
                return Err(SimulationError::NanCreation {
                    formula: formula.to_string(),
                    entity,
                    requested,
                    output,
                    array: stringify_array(Some(&array)),
                    count: nan,
                });
            }
        }
        if array.dtype() == *variable.value_type() {
            return Ok(array);
        }
        array.cast(variable.value_type()).map_err(|source| SimulationError::WrongType {
            formula: formula.to_string(),
            variable: variable.name().to_string(),
            source,
        })
    }

    fn record_lookup(&mut self, variable: &Variable, requested: Period, period: Period, array: &Array) {
        if !self.options.records_steps() {
            return;
        }
        self.trace.record(TraceStep {
            variable: variable.name().to_string(),
            entity: entity_label(variable.entity()).to_string(),
            requested,
            period,
            formula: None,
            inputs: Vec::new(),
            parameters: Vec::new(),
            is_computed: false,
            default_inputs: true,
            value: stringify_array(Some(array)),
        });
    }

    fn record_computation(
        &mut self,
        variable: &Variable,
        requested: Period,
        period: Period,
        formula: String,
        frame: Frame,
        array: &Array,
    ) {
        let default_inputs = frame.inputs.iter().all(|(_, is_default)| *is_default);
        let mut inputs: Vec<TracedInput> = Vec::with_capacity(frame.inputs.len());
        for (input, _) in frame.inputs {
            if !inputs.contains(&input) {
                inputs.push(input);
            }
        }
        let entity = entity_label(variable.entity()).to_string();
        let value = stringify_array(Some(array));
        if self.options.debug && (self.options.debug_all || !default_inputs) {
            let arguments: Vec<String> = inputs.iter().map(|i| format!("{}<{}>", i.variable, i.period)).collect();
            tracing::info!(
                "<=> {}@{}<{}>({}) --> <{}>{}",
                variable.name(),
                entity,
                requested,
                arguments.join(", "),
                period,
                value
            );
        }
        self.trace.record(TraceStep {
            variable: variable.name().to_string(),
            entity,
            requested,
            period,
            formula: Some(formula),
            inputs,
            parameters: frame.parameters,
            is_computed: true,
            default_inputs,
            value,
        });
    }

    /// The default array of `name` for its whole population.
    pub fn default_array(&self, name: &str) -> Result<Array, SimulationError> {
        let variable = self.variable(name)?;
        let count = self.population(variable.entity().key())?.count();
        Ok(variable.default_array(count)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arrays::{DType, Value};
    use crate::display::format_trace;
    use crate::parameters::ParameterNode;
    use crate::simulation::SimulationBuilder;
    use crate::system::TaxBenefitSystemBuilder;
    use crate::test_support::{household, person};
    use crate::tracers::DependencyGraph;
    use crate::variables::{Aggregation, DefinitionError, VariableBuilder};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn period(s: &str) -> Period {
        s.parse().unwrap()
    }

    fn instant(s: &str) -> Instant {
        s.parse().unwrap()
    }

    struct Fixture {
        persons: Arc<Entity>,
        households: Arc<Entity>,
        system: TaxBenefitSystemBuilder,
    }

    impl Fixture {
        fn new() -> Self {
            let persons = person();
            let households = household();
            let system = TaxBenefitSystem::builder(persons.clone(), vec![households.clone()]).unwrap();
            Self { persons, households, system }
        }

        fn person_variable(&self, name: &str) -> VariableBuilder {
            Variable::builder(name, &self.persons, DType::Float)
        }

        fn add(mut self, variable: VariableBuilder) -> Self {
            self.system = self.system.add_variable(variable.build().unwrap()).unwrap();
            self
        }

        // Persons 0 and 1 are the parents of household 0, person 2 its child.
        fn simulation(self, options: SimulationOptions) -> Simulation {
            SimulationBuilder::new()
                .persons(3)
                .group("household", 1, vec![0, 0, 0], ["parent", "parent", "child"])
                .options(options)
                .build(&self.system.build().unwrap())
                .unwrap()
        }
    }

    #[test]
    fn test_formula_runs_once_per_period() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let fixture = Fixture::new();
        let salary = fixture.person_variable("salary").formula(move |ctx, period| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok((period, Array::Float(vec![1000.0; ctx.count()])))
        });
        let mut simulation = fixture.add(salary).simulation(SimulationOptions::default());

        let first = simulation.calculate("salary", period("2015")).unwrap();
        let second = simulation.calculate("salary", period("2015")).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        simulation.calculate("salary", period("2015-03")).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        simulation.calculate("salary", period("2016")).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(simulation.holder("salary").unwrap().known_periods(), vec![period("2015"), period("2016")]);

        simulation.delete_arrays("salary", Some(period("2015")));
        simulation.calculate("salary", period("2015")).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_inputs_override_formulas_and_missing_inputs_default() {
        let fixture = Fixture::new();
        let age = fixture.person_variable("age").default(Value::Float(30.0));
        let salary = fixture
            .person_variable("salary")
            .formula(|ctx, period| Ok((period, Array::Float(vec![1.0; ctx.count()]))));
        let mut simulation = fixture.add(age).add(salary).simulation(SimulationOptions::default());

        simulation.set_input("salary", period("2015"), Array::Int(vec![1, 2, 3])).unwrap();
        assert_eq!(*simulation.calculate("salary", period("2015")).unwrap(), Array::Float(vec![1.0, 2.0, 3.0]));
        assert_eq!(*simulation.calculate("age", period("2015")).unwrap(), Array::Float(vec![30.0; 3]));
        assert!(simulation.holder("age").is_none());
        assert_eq!(simulation.default_array("age").unwrap(), Array::Float(vec![30.0; 3]));

        let err = simulation.calculate("pension", period("2015")).unwrap_err();
        assert_eq!(err, SimulationError::Entity(EntityError::VariableNotFound { variable: "pension".into() }));
    }

    #[test]
    fn test_cycle_is_reported_with_its_chain() {
        let fixture = Fixture::new();
        let a = fixture.person_variable("a").formula(|ctx, period| {
            let b = ctx.calculate("b", period)?;
            Ok((period, (*b).clone()))
        });
        let b = fixture.person_variable("b").formula(|ctx, period| {
            let a = ctx.calculate("a", period)?;
            Ok((period, (*a).clone()))
        });
        let mut simulation = fixture.add(a).add(b).simulation(SimulationOptions::default());

        let err = simulation.calculate("a", period("2015")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Infinite loop in formula a<2015>. Missing values for columns: a<2015>, b<2015>"
        );
        assert!(simulation.holder("a").is_none());
    }

    #[test]
    fn test_previous_period_is_not_a_cycle() {
        let fixture = Fixture::new();
        let stock = fixture.person_variable("stock").formula(|ctx, period| {
            if period.start().year() <= 2013 {
                return Ok((period, Array::Float(vec![1.0; ctx.count()])));
            }
            let previous = ctx.calculate_f64("stock", period.offset(-1, None)?)?;
            Ok((period, Array::Float(previous.iter().map(|x| x * 2.0).collect())))
        });
        let mut simulation = fixture.add(stock).simulation(SimulationOptions::default());
        assert_eq!(*simulation.calculate("stock", period("2015")).unwrap(), Array::Float(vec![4.0; 3]));
    }

    #[rstest::rstest]
    #[case::too_short("2015", 2, "size")]
    #[case::wrong_period("2016", 3, "coverage")]
    fn test_formula_output_is_validated(#[case] output: &'static str, #[case] len: usize, #[case] expected: &str) {
        let fixture = Fixture::new();
        let broken = fixture
            .person_variable("broken")
            .formula(move |_, _| Ok((output.parse::<Period>()?, Array::Float(vec![0.0; len]))));
        let mut simulation = fixture.add(broken).simulation(SimulationOptions::default());
        let err = simulation.calculate("broken", period("2015")).unwrap_err();
        match expected {
            "size" => {
                assert!(matches!(err, SimulationError::SizeMismatch { actual: 2, expected: 3, .. }));
                assert!(err.to_string().contains("@persons<2015>() --> <2015>[0, 0] returns an array of size 2, but size 3 is expected for person"));
            }
            _ => assert!(matches!(err, SimulationError::PeriodCoverage { .. })),
        }
    }

    #[test]
    fn test_nan_is_an_error_in_debug_mode_only() {
        let fixture = Fixture::new();
        let ratio = fixture
            .person_variable("ratio")
            .formula(|ctx, period| Ok((period, Array::Float(vec![f64::NAN; ctx.count()]))));
        let fixture = fixture.add(ratio);
        let mut simulation = fixture.simulation(SimulationOptions { debug: true, ..Default::default() });
        let err = simulation.calculate("ratio", period("2015")).unwrap_err();
        assert!(matches!(err, SimulationError::NanCreation { count: 3, .. }));

        let fixture = Fixture::new();
        let ratio = fixture
            .person_variable("ratio")
            .formula(|ctx, period| Ok((period, Array::Float(vec![f64::NAN; ctx.count()]))));
        let mut simulation = fixture.add(ratio).simulation(SimulationOptions::default());
        assert_eq!(simulation.calculate("ratio", period("2015")).unwrap().count_nan(), 3);
    }

    #[test]
    fn test_output_is_cast_or_rejected() {
        let fixture = Fixture::new();
        let eligible = Variable::builder("eligible", &fixture.persons, DType::Bool)
            .formula(|_, period| Ok((period, Array::Float(vec![0.0, 2.0, 0.0]))));
        let mut simulation = fixture.add(eligible).simulation(SimulationOptions::default());
        assert_eq!(*simulation.calculate("eligible", period("2015")).unwrap(), Array::Bool(vec![false, true, false]));

        let fixture = Fixture::new();
        let count = Variable::builder("count", &fixture.persons, DType::Int)
            .formula(|ctx, period| Ok((period, Array::Float(vec![f64::INFINITY; ctx.count()]))));
        let mut simulation = fixture.add(count).simulation(SimulationOptions::default());
        let err = simulation.calculate("count", period("2015")).unwrap_err();
        assert!(matches!(err, SimulationError::WrongType { .. }));
    }

    #[test]
    fn test_dated_formulas_receive_their_own_slice_of_the_period() {
        let fixture = Fixture::new();
        let benefit = fixture
            .person_variable("benefit")
            .dated_formula(instant("2015-01-01"), Some(instant("2015-06-30")), |ctx, period| {
                assert_eq!(period, "month:2015-01:6".parse::<Period>().unwrap());
                Ok((period, Array::Float(vec![1.0; ctx.count()])))
            })
            .dated_formula(instant("2015-07-01"), None, |ctx, period| {
                Ok((period, Array::Float(vec![2.0; ctx.count()])))
            });
        let mut simulation = fixture.add(benefit).simulation(SimulationOptions::default());

        assert_eq!(*simulation.calculate("benefit", period("2014")).unwrap(), Array::Float(vec![0.0; 3]));
        assert_eq!(*simulation.calculate("benefit", period("2015")).unwrap(), Array::Float(vec![1.0; 3]));
        assert_eq!(*simulation.calculate("benefit", period("2015-03")).unwrap(), Array::Float(vec![1.0; 3]));
        assert_eq!(*simulation.calculate("benefit", period("2015-08")).unwrap(), Array::Float(vec![2.0; 3]));
        assert_eq!(
            simulation.holder("benefit").unwrap().known_periods(),
            vec![period("month:2015-01:6"), period("2015-08")]
        );
    }

    #[test]
    fn test_permanent_and_ended_variables() {
        let fixture = Fixture::new();
        let birth = fixture
            .person_variable("birth_year")
            .permanent()
            .formula(|ctx, _| Ok((Period::eternity(), Array::Float(vec![1980.0; ctx.count()]))));
        let old_benefit = fixture
            .person_variable("old_benefit")
            .end(instant("2014-12-31"))
            .formula(|ctx, period| Ok((period, Array::Float(vec![5.0; ctx.count()]))));
        let mut simulation = fixture.add(birth).add(old_benefit).simulation(SimulationOptions::default());

        simulation.calculate("birth_year", period("2015")).unwrap();
        assert_eq!(simulation.holder("birth_year").unwrap().known_periods(), vec![Period::eternity()]);
        assert_eq!(*simulation.calculate("old_benefit", period("2014")).unwrap(), Array::Float(vec![5.0; 3]));
        assert_eq!(*simulation.calculate("old_benefit", period("2015")).unwrap(), Array::Float(vec![0.0; 3]));
    }

    #[test]
    fn test_conversion_variables() {
        let fixture = Fixture::new();
        let salary = fixture.person_variable("salary").build().unwrap();
        let rent = Variable::builder("rent", &fixture.households, DType::Float).build().unwrap();
        let household_rent = Variable::entity_to_person("household_rent", &fixture.persons, &rent, None).unwrap();
        let child_rent =
            Variable::entity_to_person("child_rent", &fixture.persons, &rent, Some(&["child"])).unwrap();
        let total =
            Variable::person_to_entity("total_salary", &fixture.households, &salary, None, Some(Aggregation::Add))
                .unwrap();
        let first =
            Variable::person_to_entity("first_salary", &fixture.households, &salary, Some(&["first_parent"]), None)
                .unwrap();
        let parent_salary =
            Variable::person_to_entity("parent_salary", &fixture.households, &salary, Some(&["parent"]), None);
        assert!(matches!(parent_salary, Err(DefinitionError::MissingAggregation { .. })));
        let parent_salary = Variable::person_to_entity(
            "parent_salary",
            &fixture.households,
            &salary,
            Some(&["parent"]),
            Some(Aggregation::Add),
        )
        .unwrap();
        let any_parent = Variable::person_to_entity(
            "parent_earns",
            &fixture.households,
            &salary,
            Some(&["first_parent", "second_parent"]),
            Some(Aggregation::Or),
        )
        .unwrap();

        let fixture = Fixture { system: fixture.system.add_variable(salary).unwrap(), ..fixture };
        let fixture = Fixture { system: fixture.system.add_variable(rent).unwrap(), ..fixture };
        let mut simulation = fixture
            .add(household_rent)
            .add(child_rent)
            .add(total)
            .add(first)
            .add(any_parent)
            .add(parent_salary)
            .simulation(SimulationOptions::default());
        let year = period("2015");
        simulation.set_input("salary", year, Array::Float(vec![1000.0, 2000.0, 10.0])).unwrap();
        simulation.set_input("rent", year, Array::Float(vec![600.0])).unwrap();

        assert_eq!(*simulation.calculate("household_rent", year).unwrap(), Array::Float(vec![600.0; 3]));
        assert_eq!(*simulation.calculate("child_rent", year).unwrap(), Array::Float(vec![0.0, 0.0, 600.0]));
        assert_eq!(*simulation.calculate("total_salary", year).unwrap(), Array::Float(vec![3010.0]));
        assert_eq!(*simulation.calculate("parent_salary", year).unwrap(), Array::Float(vec![3000.0]));
        assert_eq!(*simulation.calculate("first_salary", year).unwrap(), Array::Float(vec![1000.0]));
        assert_eq!(*simulation.calculate("parent_earns", year).unwrap(), Array::Bool(vec![true]));
    }

    #[test]
    fn test_broadcast_then_filter_round_trips() {
        let fixture = Fixture::new();
        let rent = Variable::builder("rent", &fixture.households, DType::Float);
        let echo = Variable::builder("rent_echo", &fixture.households, DType::Float).formula(|ctx, period| {
            let rent = ctx.calculate("rent", period)?;
            let by_person = ctx.cast_from_entity_to_role(&rent, Value::Float(-1.0), "household", "first_parent")?;
            assert_eq!(by_person, Array::Float(vec![750.0, -1.0, -1.0]));
            let back = ctx.filter_role(&by_person, Value::Float(0.0), None, "first_parent")?;
            Ok((period, back))
        });
        let split = Variable::builder("split_count", &fixture.households, DType::Int).formula(|ctx, period| {
            let ones = Array::Float(vec![1.0; ctx.population("person")?.count()]);
            let parts = ctx.split_by_roles(&ones, Value::Float(0.0), None, None)?;
            let keys: Vec<&str> = parts.iter().map(|(key, _)| key.as_str()).collect();
            assert_eq!(keys, vec!["first_parent", "second_parent"]);
            let err = ctx.filter_role(&ones, Value::Float(0.0), None, "grandparent").unwrap_err();
            assert!(matches!(err, SimulationError::Population(PopulationError::UnknownRole { .. })));
            Ok((period, ctx.sum_by_entity(&ones, None, Some(&["parent"]))?))
        });
        let mut simulation = fixture.add(rent).add(echo).add(split).simulation(SimulationOptions::default());
        let year = period("2015");
        simulation.set_input("rent", year, Array::Float(vec![750.0])).unwrap();
        assert_eq!(*simulation.calculate("rent_echo", year).unwrap(), Array::Float(vec![750.0]));
        assert_eq!(*simulation.calculate("split_count", year).unwrap(), Array::Int(vec![2]));
    }

    #[test]
    fn test_projection_shape_errors_name_the_role() {
        let fixture = Fixture::new();
        let broken = Variable::builder("broken", &fixture.households, DType::Float).formula(|ctx, period| {
            let short = Array::Float(vec![1.0]);
            Ok((period, ctx.filter_role(&short, Value::Float(0.0), None, "second_parent")?))
        });
        let mut simulation = fixture.add(broken).simulation(SimulationOptions::default());
        let err = simulation.calculate("broken", period("2015")).unwrap_err();
        assert!(matches!(&err, SimulationError::Projection { action: "filtering", role, .. } if role == "second_parent"));
    }

    #[test]
    fn test_projection_errors_name_the_helper() {
        let fixture = Fixture::new();
        let summed = Variable::builder("summed", &fixture.households, DType::Float).formula(|ctx, period| {
            Ok((period, ctx.sum_by_entity(&Array::Float(vec![1.0]), None, None)?))
        });
        let tested = Variable::builder("tested", &fixture.households, DType::Bool).formula(|ctx, period| {
            Ok((period, ctx.any_by_roles(&Array::Bool(vec![true]), None, Some(&["child"]))?))
        });
        let mut simulation = fixture.add(summed).add(tested).simulation(SimulationOptions::default());
        let year = period("2015");

        let err = simulation.calculate("summed", year).unwrap_err();
        assert!(matches!(&err, SimulationError::Projection { action: "summing", role, .. } if role == "*"));
        let err = simulation.calculate("tested", year).unwrap_err();
        assert!(matches!(&err, SimulationError::Projection { action: "testing", role, .. } if role == "child"));
        assert!(err.to_string().starts_with("An error occurred while testing array for role household[child] in function tested"));
    }

    #[rstest::rstest]
    #[case::parent_with_subroles("parent")]
    #[case::unbounded_child("child")]
    fn test_filter_role_rejects_roles_held_by_several_members(#[case] role: &'static str) {
        let fixture = Fixture::new();
        let salary = fixture.person_variable("salary");
        let picked = Variable::builder("picked_salary", &fixture.households, DType::Float).formula(move |ctx, period| {
            let salaries = ctx.calculate("salary", period)?;
            Ok((period, ctx.filter_role(&salaries, Value::Float(0.0), None, role)?))
        });
        let mut simulation = fixture.add(salary).add(picked).simulation(SimulationOptions::default());
        let year = period("2015");
        simulation.set_input("salary", year, Array::Float(vec![1000.0, 2000.0, 0.0])).unwrap();

        let err = simulation.calculate("picked_salary", year).unwrap_err();
        assert!(matches!(&err, SimulationError::SharedRole { role: shared, .. } if shared == role));
        assert!(simulation.holder("picked_salary").is_none());
    }

    #[test]
    fn test_calculate_for_checks_the_entity() {
        let fixture = Fixture::new();
        let salary = fixture.person_variable("salary");
        let mut simulation = fixture.add(salary).simulation(SimulationOptions::default());
        assert!(simulation.calculate_for("person", "salary", period("2015")).is_ok());
        let err = simulation.calculate_for("household", "salary", period("2015")).unwrap_err();
        assert!(matches!(err, SimulationError::Entity(EntityError::WrongEntity { .. })));
    }

    #[test]
    fn test_calculate_for_uses_the_simulation_system() {
        let fixture = Fixture::new();
        let benefit = fixture.person_variable("benefit");
        let (persons, households) = (fixture.persons.clone(), fixture.households.clone());
        let mut simulation = fixture.add(benefit).simulation(SimulationOptions::default());
        let year = period("2015");

        // A reform built from the same entities moves the variable to households.
        let reform = TaxBenefitSystem::builder(persons, vec![households.clone()])
            .unwrap()
            .add_variable(Variable::builder("benefit", &households, DType::Float).build().unwrap())
            .unwrap()
            .build()
            .unwrap();
        assert!(simulation.calculate_for("person", "benefit", year).is_ok());
        let err = simulation.calculate_for("household", "benefit", year).unwrap_err();
        assert!(matches!(err, SimulationError::Entity(EntityError::WrongEntity { .. })));

        drop(reform);
        assert!(simulation.calculate_for("person", "benefit", year).is_ok());
        let err = simulation.calculate_for("household", "benefit", year).unwrap_err();
        assert!(matches!(err, SimulationError::Entity(EntityError::WrongEntity { .. })));
    }

    #[test]
    fn test_formula_failures_propagate_uncached() {
        let fixture = Fixture::new();
        let failing = fixture.person_variable("failing").formula(|_, _| {
            Err(SimulationError::Formula { formula: "failing".into(), message: "no data for this year".into() })
        });
        let reader = fixture.person_variable("reader").formula(|ctx, period| {
            let failing = ctx.calculate("failing", period)?;
            Ok((period, (*failing).clone()))
        });
        let mut simulation = fixture.add(failing).add(reader).simulation(SimulationOptions::default());

        let expected = SimulationError::Formula { formula: "failing".into(), message: "no data for this year".into() };
        assert_eq!(simulation.calculate("reader", period("2015")).unwrap_err(), expected);
        assert_eq!(simulation.calculate("failing", period("2015")).unwrap_err(), expected);
        assert!(simulation.holder("failing").is_none());
        assert!(simulation.holder("reader").is_none());
    }

    #[test]
    fn test_trace_records_inputs_and_parameters() {
        let parameters = ParameterNode::from_json(r#"{"tax_rate": {"values": {"2015-01-01": 0.2}}}"#).unwrap();
        let fixture = Fixture::new();
        let salary = fixture.person_variable("salary");
        let bonus = fixture.person_variable("bonus");
        let tax = fixture.person_variable("tax").formula(|ctx, period| {
            let rate = ctx.parameters(period.start())?.number("tax_rate")?;
            let salary = ctx.calculate_f64("salary", period)?;
            let bonus = ctx.calculate_f64("bonus", period)?;
            let base = crate::arrays::kernel::add(&salary, &bonus)?;
            Ok((period, Array::Float(crate::arrays::kernel::scale(&base, rate))))
        });
        let fixture = Fixture { system: fixture.system.parameters(Arc::new(parameters)), ..fixture };
        let mut simulation = fixture
            .add(salary)
            .add(bonus)
            .add(tax)
            .simulation(SimulationOptions { trace: true, ..Default::default() });
        let year = period("2015");
        simulation.set_input("salary", year, Array::Float(vec![1000.0, 0.0, 0.0])).unwrap();

        assert_eq!(*simulation.calculate("tax", year).unwrap(), Array::Float(vec![200.0, 0.0, 0.0]));
        let step = simulation.trace().step("tax", year).unwrap();
        assert!(step.is_computed);
        assert!(!step.default_inputs);
        assert_eq!(step.parameters, vec![instant("2015-01-01")]);
        let inputs: Vec<&str> = step.inputs.iter().map(|i| i.variable.as_str()).collect();
        assert_eq!(inputs, vec!["salary", "bonus"]);
        assert!(!simulation.trace().step("bonus", year).unwrap().is_computed);
        assert_eq!(simulation.trace().len(), 3);

        let graph = DependencyGraph::from_trace(simulation.trace());
        assert_eq!(graph.dependencies_of("tax<2015>"), vec!["bonus<2015>", "salary<2015>"]);
        assert_eq!(graph.evaluation_order().unwrap().last().map(String::as_str), Some("tax<2015>"));
        let tree = format_trace(simulation.trace(), "tax", year);
        assert!(tree.contains("[L1] tax<2015>[200, 0, 0] = tax(salary[1000, 0, 0], bonus[0, 0, 0])"));
        assert!(tree.contains("|  parameters at 2015-01-01"));
    }
}
