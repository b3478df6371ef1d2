use super::{PopulationError, SimulationError};
use crate::arrays::Array;
use crate::entities::Documentable;
use crate::periods::Period;
use crate::variables::Variable;
use std::collections::BTreeMap;
use std::sync::Arc;

/// The arrays of one variable in one simulation, keyed by period.
///
/// Every stored array has one cell per member of the variable's entity and
/// the variable's value type. Permanent variables keep a single array under
/// the eternal period.
#[derive(Debug, Clone)]
pub struct Holder {
    variable: Arc<Variable>,
    arrays: BTreeMap<Period, Arc<Array>>,
}

impl Holder {
    pub fn new(variable: Arc<Variable>) -> Self {
        Self { variable, arrays: BTreeMap::new() }
    }

    pub fn variable(&self) -> &Arc<Variable> {
        &self.variable
    }

    fn key(&self, period: Period) -> Period {
        if self.variable.is_permanent() {
            Period::eternity()
        } else {
            period
        }
    }

    /// The array stored for exactly `period`.
    pub fn get_array(&self, period: Period) -> Option<&Arc<Array>> {
        self.arrays.get(&self.key(period))
    }

    /// The array stored for `period`, or else for the first stored period
    /// containing it.
    pub fn covering(&self, period: Period) -> Option<(Period, &Arc<Array>)> {
        let key = self.key(period);
        if let Some(array) = self.arrays.get(&key) {
            return Some((key, array));
        }
        self.arrays
            .iter()
            .find(|(stored, _)| stored.contains(&key))
            .map(|(stored, array)| (*stored, array))
    }

    pub(crate) fn put(&mut self, period: Period, array: Arc<Array>) {
        let key = self.key(period);
        self.arrays.insert(key, array);
    }

    /// Stores an input array after checking its length against the
    /// population and casting it to the variable's type.
    pub fn set_input(&mut self, period: Period, array: Array, count: usize) -> Result<(), SimulationError> {
        if array.len() != count {
            let entity = self.variable.entity();
            return Err(PopulationError::InputLength {
                variable: self.variable.name().to_string(),
                entity: entity.plural().unwrap_or_else(|| entity.key()).to_string(),
                expected: count,
                actual: array.len(),
            }
            .into());
        }
        let array = array.cast(self.variable.value_type())?;
        self.put(period, Arc::new(array));
        Ok(())
    }

    /// Drops the array of `period`, or every array.
    pub fn delete_arrays(&mut self, period: Option<Period>) {
        match period {
            Some(period) => {
                let key = self.key(period);
                self.arrays.remove(&key);
            }
            None => self.arrays.clear(),
        }
    }

    /// Stored periods, in period order.
    pub fn known_periods(&self) -> Vec<Period> {
        self.arrays.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arrays::DType;
    use crate::test_support::person;

    fn period(s: &str) -> Period {
        s.parse().unwrap()
    }

    fn salary_holder(permanent: bool) -> Holder {
        let builder = Variable::builder("salary", &person(), DType::Float);
        let builder = if permanent { builder.permanent() } else { builder };
        Holder::new(builder.build().unwrap())
    }

    #[test]
    fn test_set_input_checks_size_and_casts() {
        let mut holder = salary_holder(false);
        holder.set_input(period("2015"), Array::Int(vec![1, 2]), 2).unwrap();
        assert_eq!(**holder.get_array(period("2015")).unwrap(), Array::Float(vec![1.0, 2.0]));

        let err = holder.set_input(period("2016"), Array::Float(vec![1.0]), 2).unwrap_err();
        assert!(matches!(err, SimulationError::Population(PopulationError::InputLength { expected: 2, actual: 1, .. })));
    }

    #[test]
    fn test_covering_finds_enclosing_period() {
        let mut holder = salary_holder(false);
        holder.put(period("2015"), Arc::new(Array::Float(vec![1.0])));
        assert!(holder.get_array(period("2015-03")).is_none());
        let (stored, _) = holder.covering(period("2015-03")).unwrap();
        assert_eq!(stored, period("2015"));
        assert!(holder.covering(period("2016-01")).is_none());
    }

    #[test]
    fn test_permanent_variables_have_one_array() {
        let mut holder = salary_holder(true);
        holder.put(period("2015"), Arc::new(Array::Float(vec![1.0])));
        assert!(holder.get_array(period("1990-05")).is_some());
        assert_eq!(holder.known_periods(), vec![Period::eternity()]);
    }

    #[test]
    fn test_delete_arrays() {
        let mut holder = salary_holder(false);
        holder.put(period("2015"), Arc::new(Array::Float(vec![1.0])));
        holder.put(period("2016"), Arc::new(Array::Float(vec![2.0])));
        holder.delete_arrays(Some(period("2015")));
        assert_eq!(holder.known_periods(), vec![period("2016")]);
        holder.delete_arrays(None);
        assert!(holder.known_periods().is_empty());
    }
}
