use super::{Aggregation, Conversion, DatedFormula, DefinitionError, Formula};
use crate::arrays::{Array, ArrayError, DType, Value};
use crate::entities::{Documentable, Entity, Personifiable, Role};
use crate::periods::{DateUnit, Instant, Period};
use crate::simulation::{FormulaContext, SimulationError};
use serde::Serialize;
use std::sync::Arc;

/// A named, typed quantity defined for one entity.
///
/// Built once through [`Variable::builder`] or one of the conversion
/// constructors, then shared immutably by every simulation.
#[derive(Debug)]
pub struct Variable {
    name: String,
    entity: Arc<Entity>,
    value_type: DType,
    default: Value,
    label: Option<String>,
    doc: Option<String>,
    url: Option<String>,
    permanent: bool,
    end: Option<Instant>,
    formulas: Vec<DatedFormula>,
    conversion: Option<Conversion>,
}

impl Variable {
    pub fn builder(name: impl Into<String>, entity: &Arc<Entity>, value_type: DType) -> VariableBuilder {
        VariableBuilder {
            name: name.into(),
            entity: entity.clone(),
            default: value_type.default_value(),
            value_type,
            label: None,
            doc: None,
            url: None,
            permanent: false,
            end: None,
            formulas: Vec::new(),
            conversion: None,
        }
    }

    /// A person variable copying `source`, a group variable, to the members
    /// holding one of `roles`. Other members get the source default.
    pub fn entity_to_person(
        name: impl Into<String>,
        persons: &Arc<Entity>,
        source: &Variable,
        roles: Option<&[&str]>,
    ) -> Result<VariableBuilder, DefinitionError> {
        let name = name.into();
        if !persons.is_person() {
            return Err(DefinitionError::ConversionTarget {
                variable: name,
                expected: "a person entity",
                entity: persons.key().to_string(),
            });
        }
        if source.entity.is_person() {
            return Err(DefinitionError::ConversionTarget {
                variable: name,
                expected: "a source defined for a group entity",
                entity: source.entity.key().to_string(),
            });
        }
        let roles = resolve_roles(&name, source.entity(), roles)?;
        let mut builder = Self::builder(name, persons, source.value_type.clone()).like(source);
        builder.conversion = Some(Conversion::EntityToPerson { source: source.name.clone(), roles });
        Ok(builder)
    }

    /// A group variable collecting `source`, a person variable, from the
    /// members of each group.
    ///
    /// A single role held by at most one member copies the value of its
    /// holder and takes no aggregation; any other selection requires one. Adding
    /// booleans counts them, so the variable is an int.
    pub fn person_to_entity(
        name: impl Into<String>,
        group: &Arc<Entity>,
        source: &Variable,
        roles: Option<&[&str]>,
        aggregation: Option<Aggregation>,
    ) -> Result<VariableBuilder, DefinitionError> {
        let name = name.into();
        if group.is_person() {
            return Err(DefinitionError::ConversionTarget {
                variable: name,
                expected: "a group entity",
                entity: group.key().to_string(),
            });
        }
        if !source.entity.is_person() {
            return Err(DefinitionError::ConversionTarget {
                variable: name,
                expected: "a source defined for persons",
                entity: source.entity.key().to_string(),
            });
        }
        let roles = resolve_roles(&name, group, roles)?;
        let single_role = matches!(roles.as_deref(), Some([role]) if role.is_single_holder());
        match (single_role, aggregation) {
            (true, Some(_)) => return Err(DefinitionError::UnexpectedAggregation { variable: name }),
            (false, None) => return Err(DefinitionError::MissingAggregation { variable: name }),
            _ => {}
        }
        let value_type = match (aggregation, &source.value_type) {
            (Some(Aggregation::Add), DType::Bool) => DType::Int,
            (Some(Aggregation::Or), _) => DType::Bool,
            (_, value_type) => value_type.clone(),
        };
        let mut builder = Self::builder(name, group, value_type.clone()).like(source);
        if value_type != source.value_type {
            builder.default = value_type.default_value();
        }
        builder.conversion = Some(Conversion::PersonToEntity { source: source.name.clone(), roles, aggregation });
        Ok(builder)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entity(&self) -> &Arc<Entity> {
        &self.entity
    }

    pub fn value_type(&self) -> &DType {
        &self.value_type
    }

    pub fn default_value(&self) -> Value {
        self.default
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn doc(&self) -> Option<&str> {
        self.doc.as_deref()
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// Permanent variables have one value for all time.
    pub fn is_permanent(&self) -> bool {
        self.permanent
    }

    /// Last day the variable is defined. Later requests yield the default.
    pub fn end(&self) -> Option<Instant> {
        self.end
    }

    pub fn formulas(&self) -> &[DatedFormula] {
        &self.formulas
    }

    pub fn conversion(&self) -> Option<&Conversion> {
        self.conversion.as_ref()
    }

    /// Input variables have neither formula nor conversion.
    pub fn is_input(&self) -> bool {
        self.formulas.is_empty() && self.conversion.is_none()
    }

    /// The first dated formula whose interval contains `instant`.
    pub fn formula_at(&self, instant: Instant) -> Option<&DatedFormula> {
        self.formulas.iter().find(|dated| dated.covers(instant))
    }

    pub fn default_array(&self, count: usize) -> Result<Array, ArrayError> {
        Array::filled(&self.value_type, self.default, count)
    }

    pub fn to_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        let description = VariableDescription {
            name: &self.name,
            entity: self.entity.plural().unwrap_or_else(|| self.entity.key()),
            label: self.label.as_deref().unwrap_or(&self.name),
            doc: self.doc.as_deref(),
            url: self.url.as_deref(),
            value_type: &self.value_type,
            default: self.default,
            permanent: self.permanent,
            end: self.end,
            formulas: self
                .formulas
                .iter()
                .map(|dated| FormulaDescription {
                    name: dated.formula.name(),
                    start: dated.start,
                    stop: dated.stop,
                })
                .collect(),
            conversion: self.conversion.as_ref().map(|conversion| ConversionDescription {
                kind: match conversion {
                    Conversion::EntityToPerson { .. } => "entity_to_person",
                    Conversion::PersonToEntity { .. } => "person_to_entity",
                },
                source: conversion.source(),
                roles: conversion.roles().map(|roles| roles.iter().map(|r| r.key()).collect()),
                aggregation: match conversion {
                    Conversion::PersonToEntity { aggregation, .. } => *aggregation,
                    Conversion::EntityToPerson { .. } => None,
                },
            }),
        };
        serde_json::to_value(description)
    }
}

#[derive(Serialize)]
struct VariableDescription<'a> {
    name: &'a str,
    entity: &'a str,
    label: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    doc: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<&'a str>,
    value_type: &'a DType,
    default: Value,
    permanent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    end: Option<Instant>,
    formulas: Vec<FormulaDescription<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    conversion: Option<ConversionDescription<'a>>,
}

#[derive(Serialize)]
struct FormulaDescription<'a> {
    name: &'a str,
    start: Option<Instant>,
    stop: Option<Instant>,
}

#[derive(Serialize)]
struct ConversionDescription<'a> {
    kind: &'static str,
    source: &'a str,
    roles: Option<Vec<&'a str>>,
    aggregation: Option<Aggregation>,
}

fn resolve_roles(
    variable: &str,
    group: &Entity,
    keys: Option<&[&str]>,
) -> Result<Option<Vec<Arc<Role>>>, DefinitionError> {
    let Some(keys) = keys else {
        return Ok(None);
    };
    keys.iter()
        .map(|key| {
            group.role(key).cloned().ok_or_else(|| DefinitionError::UnknownRole {
                variable: variable.to_string(),
                entity: group.key().to_string(),
                role: key.to_string(),
            })
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}

/// Declarative description of a [`Variable`].
#[must_use]
pub struct VariableBuilder {
    name: String,
    entity: Arc<Entity>,
    value_type: DType,
    default: Value,
    label: Option<String>,
    doc: Option<String>,
    url: Option<String>,
    permanent: bool,
    end: Option<Instant>,
    formulas: Vec<DatedFormula>,
    conversion: Option<Conversion>,
}

impl VariableBuilder {
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn doc(mut self, doc: &str) -> Self {
        self.doc = Some(crate::entities::dedent(doc));
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn default(mut self, value: Value) -> Self {
        self.default = value;
        self
    }

    pub fn permanent(mut self) -> Self {
        self.permanent = true;
        self
    }

    pub fn end(mut self, last_day: Instant) -> Self {
        self.end = Some(last_day);
        self
    }

    /// A formula valid for all time, named after the variable.
    pub fn formula<F>(self, function: F) -> Self
    where
        F: Fn(&mut FormulaContext<'_>, Period) -> Result<(Period, Array), SimulationError> + Send + Sync + 'static,
    {
        let name = self.name.clone();
        self.with_formula(None, None, Formula::new(name, function))
    }

    /// A formula valid from `start`, and until `stop` when given. A missing
    /// stop is closed by the next formula's start.
    pub fn dated_formula<F>(self, start: Instant, stop: Option<Instant>, function: F) -> Self
    where
        F: Fn(&mut FormulaContext<'_>, Period) -> Result<(Period, Array), SimulationError> + Send + Sync + 'static,
    {
        let name = format!("{}@{}", self.name, start);
        self.with_formula(Some(start), stop, Formula::new(name, function))
    }

    pub fn with_formula(mut self, start: Option<Instant>, stop: Option<Instant>, formula: Formula) -> Self {
        self.formulas.push(DatedFormula { start, stop, formula });
        self
    }

    fn like(mut self, source: &Variable) -> Self {
        self.default = source.default;
        self.permanent = source.permanent;
        self.end = source.end;
        self
    }

    pub fn build(mut self) -> Result<Arc<Variable>, DefinitionError> {
        if !self.formulas.is_empty() && self.conversion.is_some() {
            return Err(DefinitionError::ConflictingFormulas { variable: self.name });
        }
        Array::filled(&self.value_type, self.default, 0)
            .map_err(|source| DefinitionError::InvalidDefault { variable: self.name.clone(), source })?;
        self.order_formulas()?;
        Ok(Arc::new(Variable {
            name: self.name,
            entity: self.entity,
            value_type: self.value_type,
            default: self.default,
            label: self.label,
            doc: self.doc,
            url: self.url,
            permanent: self.permanent,
            end: self.end,
            formulas: self.formulas,
            conversion: self.conversion,
        }))
    }

    /// Sorts formulas by start, closes open stops, and rejects overlaps and
    /// gaps: consecutive intervals must abut exactly.
    fn order_formulas(&mut self) -> Result<(), DefinitionError> {
        for dated in &self.formulas {
            if let (Some(start), Some(stop)) = (dated.start, dated.stop) {
                if start > stop {
                    return Err(DefinitionError::InvalidInterval {
                        formula: dated.formula.name().to_string(),
                        start,
                        stop,
                    });
                }
            }
        }
        // `None` starts sort first.
        self.formulas.sort_by_key(|dated| dated.start);
        for i in 1..self.formulas.len() {
            let (head, tail) = self.formulas.split_at_mut(i);
            let (previous, next) = (&mut head[i - 1], &tail[0]);
            let Some(next_start) = next.start else {
                return Err(DefinitionError::OverlappingFormulas {
                    variable: self.name.clone(),
                    first: previous.formula.name().to_string(),
                    second: next.formula.name().to_string(),
                    stop: Instant::END_OF_TIME,
                    start: Instant::START_OF_TIME,
                });
            };
            let day_before = next_start
                .offset(-1, DateUnit::Day)
                .map_err(|_| DefinitionError::OverlappingFormulas {
                    variable: self.name.clone(),
                    first: previous.formula.name().to_string(),
                    second: next.formula.name().to_string(),
                    stop: Instant::START_OF_TIME,
                    start: next_start,
                })?;
            match previous.stop {
                None => previous.stop = Some(day_before),
                Some(stop) if stop >= next_start => {
                    return Err(DefinitionError::OverlappingFormulas {
                        variable: self.name.clone(),
                        first: previous.formula.name().to_string(),
                        second: next.formula.name().to_string(),
                        stop,
                        start: next_start,
                    })
                }
                Some(stop) if stop < day_before => {
                    return Err(DefinitionError::FormulaGap { variable: self.name.clone(), stop, start: next_start })
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{household, person};
    use rstest::rstest;

    fn constant(
        value: f64,
    ) -> impl Fn(&mut FormulaContext<'_>, Period) -> Result<(Period, Array), SimulationError> + Send + Sync + 'static {
        move |ctx, period| Ok((period, Array::Float(vec![value; ctx.count()])))
    }

    fn day(s: &str) -> Instant {
        s.parse().unwrap()
    }

    #[test]
    fn test_dated_formulas_are_sorted_and_closed() {
        let variable = Variable::builder("benefit", &person(), DType::Float)
            .dated_formula(day("2016-01-01"), None, constant(2.0))
            .dated_formula(day("2015-01-01"), None, constant(1.0))
            .build()
            .unwrap();
        let formulas = variable.formulas();
        assert_eq!(formulas[0].start, Some(day("2015-01-01")));
        assert_eq!(formulas[0].stop, Some(day("2015-12-31")));
        assert_eq!(formulas[1].stop, None);
        assert_eq!(variable.formula_at(day("2015-06-01")).unwrap().formula.name(), "benefit@2015-01-01");
        assert_eq!(variable.formula_at(day("2017-06-01")).unwrap().formula.name(), "benefit@2016-01-01");
        assert!(variable.formula_at(day("2014-06-01")).is_none());
    }

    #[rstest]
    #[case("2015-06-30", "2015-06-01", "overlap")]
    #[case("2015-06-30", "2015-08-01", "gap")]
    #[case("2015-07-31", "2015-08-01", "ok")]
    fn test_overlaps_and_gaps_are_rejected(#[case] stop: &str, #[case] next_start: &str, #[case] expected: &str) {
        let result = Variable::builder("benefit", &person(), DType::Float)
            .dated_formula(day("2015-01-01"), Some(day(stop)), constant(1.0))
            .dated_formula(day(next_start), None, constant(2.0))
            .build();
        let outcome = match result {
            Ok(_) => "ok",
            Err(DefinitionError::OverlappingFormulas { .. }) => "overlap",
            Err(DefinitionError::FormulaGap { .. }) => "gap",
            Err(other) => panic!("unexpected {other:?}"),
        };
        assert_eq!(outcome, expected);
    }

    #[test]
    fn test_conversion_rules() {
        let household = household();
        let age = Variable::builder("is_adult", &person(), DType::Bool).build().unwrap();

        let count = Variable::person_to_entity("adults", &household, &age, None, Some(Aggregation::Add))
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(*count.value_type(), DType::Int);
        assert_eq!(count.default_value(), Value::Int(0));

        let first = Variable::person_to_entity("first_parent_is_adult", &household, &age, Some(&["first_parent"]), None)
            .unwrap();
        assert!(first.build().is_ok());

        assert!(matches!(
            Variable::person_to_entity("parent_is_adult", &household, &age, Some(&["parent"]), None),
            Err(DefinitionError::MissingAggregation { .. })
        ));
        assert!(matches!(
            Variable::person_to_entity("child_is_adult", &household, &age, Some(&["child"]), None),
            Err(DefinitionError::MissingAggregation { .. })
        ));
        let any = Variable::person_to_entity("has_adult_parent", &household, &age, Some(&["parent"]), Some(Aggregation::Or))
            .unwrap();
        assert_eq!(*any.build().unwrap().value_type(), DType::Bool);

        assert!(matches!(
            Variable::person_to_entity("x", &household, &age, Some(&["first_parent"]), Some(Aggregation::Or)),
            Err(DefinitionError::UnexpectedAggregation { .. })
        ));
        assert!(matches!(
            Variable::person_to_entity("x", &household, &age, None, None),
            Err(DefinitionError::MissingAggregation { .. })
        ));
        assert!(matches!(
            Variable::person_to_entity("x", &person(), &age, None, Some(Aggregation::Add)),
            Err(DefinitionError::ConversionTarget { .. })
        ));
        assert!(matches!(
            Variable::person_to_entity("x", &household, &age, Some(&["butler"]), None),
            Err(DefinitionError::UnknownRole { .. })
        ));
    }

    #[test]
    fn test_invalid_default_is_rejected() {
        let result = Variable::builder("salary", &person(), DType::Int).default(Value::Float(f64::NAN)).build();
        assert!(matches!(result, Err(DefinitionError::InvalidDefault { .. })));
    }

    #[test]
    fn test_to_json() {
        let variable = Variable::builder("salary", &person(), DType::Float)
            .label("Gross salary")
            .dated_formula(day("2015-01-01"), None, constant(1.0))
            .build()
            .unwrap();
        let json = variable.to_json().unwrap();
        assert_eq!(json["name"], "salary");
        assert_eq!(json["entity"], "persons");
        assert_eq!(json["value_type"], "float");
        assert_eq!(json["formulas"][0]["start"], "2015-01-01");
        assert!(json["formulas"][0]["stop"].is_null());
    }
}
