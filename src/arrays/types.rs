use super::{kernel, ArrayError};
use crate::indexed_enums::{EnumArray, EnumCode, EnumDef};
use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::Arc;

/// Declared storage type of a variable.
#[derive(Debug, Clone)]
pub enum DType {
    Float,
    Int,
    Bool,
    Enum(Arc<EnumDef>),
}

impl DType {
    pub fn name(&self) -> &str {
        match self {
            DType::Float => "float",
            DType::Int => "int",
            DType::Bool => "bool",
            DType::Enum(def) => def.name(),
        }
    }

    /// The zero of the type: `0.0`, `0`, `false`, or the first enum item.
    pub fn default_value(&self) -> Value {
        match self {
            DType::Float => Value::Float(0.0),
            DType::Int => Value::Int(0),
            DType::Bool => Value::Bool(false),
            DType::Enum(_) => Value::Enum(0),
        }
    }
}

impl PartialEq for DType {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (DType::Enum(a), DType::Enum(b)) => a.name() == b.name(),
            (a, b) => std::mem::discriminant(a) == std::mem::discriminant(b),
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for DType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

/// A single cell value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Float(f64),
    Int(i64),
    Bool(bool),
    Enum(EnumCode),
}

impl Value {
    pub fn as_f64(self) -> f64 {
        match self {
            Value::Float(v) => v,
            Value::Int(v) => v as f64,
            Value::Bool(v) => f64::from(u8::from(v)),
            Value::Enum(v) => f64::from(v),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Float(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Bool(v) => write!(f, "{}", if *v { "True" } else { "False" }),
            Value::Enum(v) => write!(f, "{v}"),
        }
    }
}

/// A column of values, one per member of a population.
#[derive(Debug, Clone, PartialEq)]
pub enum Array {
    Float(Vec<f64>),
    Int(Vec<i64>),
    Bool(Vec<bool>),
    Enum(EnumArray),
}

impl Array {
    /// An array of `len` copies of `value`, cast to `dtype`.
    pub fn filled(dtype: &DType, value: Value, len: usize) -> Result<Self, ArrayError> {
        let cast_error = |reason: &str| ArrayError::CastNotPossible {
            from: format!("{value:?}"),
            to: dtype.name().to_string(),
            reason: reason.to_string(),
        };
        Ok(match dtype {
            DType::Float => Array::Float(vec![value.as_f64(); len]),
            DType::Int => match value {
                Value::Float(v) if !v.is_finite() => return Err(cast_error("not a finite number")),
                Value::Float(v) => Array::Int(vec![v as i64; len]),
                Value::Int(v) => Array::Int(vec![v; len]),
                Value::Bool(v) => Array::Int(vec![i64::from(v); len]),
                Value::Enum(v) => Array::Int(vec![i64::from(v); len]),
            },
            DType::Bool => Array::Bool(vec![value.as_f64() != 0.0; len]),
            DType::Enum(def) => {
                let code = match value {
                    Value::Enum(code) => code,
                    Value::Int(v) => EnumCode::try_from(v).map_err(|_| cast_error("code out of range"))?,
                    _ => return Err(cast_error("enum values must be codes")),
                };
                Array::Enum(EnumArray::new(vec![code; len], def.clone()))
            }
        })
    }

    pub fn len(&self) -> usize {
        match self {
            Array::Float(v) => v.len(),
            Array::Int(v) => v.len(),
            Array::Bool(v) => v.len(),
            Array::Enum(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dtype(&self) -> DType {
        match self {
            Array::Float(_) => DType::Float,
            Array::Int(_) => DType::Int,
            Array::Bool(_) => DType::Bool,
            Array::Enum(v) => DType::Enum(v.possible_values().clone()),
        }
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        match self {
            Array::Float(v) => v.get(index).copied().map(Value::Float),
            Array::Int(v) => v.get(index).copied().map(Value::Int),
            Array::Bool(v) => v.get(index).copied().map(Value::Bool),
            Array::Enum(v) => v.codes().get(index).copied().map(Value::Enum),
        }
    }

    pub fn float(&self) -> Result<&[f64], ArrayError> {
        match self {
            Array::Float(v) => Ok(v),
            other => Err(other.wrong_dtype("float")),
        }
    }

    pub fn int(&self) -> Result<&[i64], ArrayError> {
        match self {
            Array::Int(v) => Ok(v),
            other => Err(other.wrong_dtype("int")),
        }
    }

    pub fn bool(&self) -> Result<&[bool], ArrayError> {
        match self {
            Array::Bool(v) => Ok(v),
            other => Err(other.wrong_dtype("bool")),
        }
    }

    pub fn enums(&self) -> Result<&EnumArray, ArrayError> {
        match self {
            Array::Enum(v) => Ok(v),
            other => Err(other.wrong_dtype("enum")),
        }
    }

    /// Numeric view of any array: bools become `0.0`/`1.0`, enums their codes.
    pub fn to_f64(&self) -> Vec<f64> {
        match self {
            Array::Float(v) => v.clone(),
            Array::Int(v) => v.iter().map(|x| *x as f64).collect(),
            Array::Bool(v) => v.iter().map(|x| f64::from(u8::from(*x))).collect(),
            Array::Enum(v) => v.codes().iter().map(|x| f64::from(*x)).collect(),
        }
    }

    /// Converts to `dtype`, following numeric conversion rules.
    ///
    /// Floats truncate toward zero when cast to int; non-finite floats cannot
    /// become ints. Enums only convert to and from ints or their own enum.
    pub fn cast(&self, dtype: &DType) -> Result<Array, ArrayError> {
        if self.dtype() == *dtype {
            return Ok(self.clone());
        }
        let cast_error = |reason: &str| ArrayError::CastNotPossible {
            from: self.dtype().name().to_string(),
            to: dtype.name().to_string(),
            reason: reason.to_string(),
        };
        match (self, dtype) {
            (_, DType::Float) => Ok(Array::Float(self.to_f64())),
            (Array::Float(v), DType::Int) => v
                .iter()
                .map(|x| if x.is_finite() { Ok(*x as i64) } else { Err(cast_error("not a finite number")) })
                .collect::<Result<Vec<_>, _>>()
                .map(Array::Int),
            (Array::Bool(v), DType::Int) => Ok(Array::Int(v.iter().map(|x| i64::from(*x)).collect())),
            (Array::Enum(v), DType::Int) => Ok(Array::Int(v.codes().iter().map(|x| i64::from(*x)).collect())),
            (Array::Float(v), DType::Bool) => Ok(Array::Bool(v.iter().map(|x| *x != 0.0).collect())),
            (Array::Int(v), DType::Bool) => Ok(Array::Bool(v.iter().map(|x| *x != 0).collect())),
            (Array::Int(v), DType::Enum(def)) => v
                .iter()
                .map(|x| EnumCode::try_from(*x).map_err(|_| cast_error("code out of range")))
                .collect::<Result<Vec<_>, _>>()
                .map(|codes| Array::Enum(EnumArray::new(codes, def.clone()))),
            _ => Err(cast_error("incompatible types")),
        }
    }

    pub fn count_nan(&self) -> usize {
        match self {
            Array::Float(v) => kernel::count_nan(v),
            _ => 0,
        }
    }

    /// True when every cell equals `value`. Empty arrays are uniform.
    pub fn all_equal(&self, value: Value) -> bool {
        match (self, value) {
            (Array::Float(v), Value::Float(x)) => v.iter().all(|c| *c == x),
            (Array::Int(v), Value::Int(x)) => v.iter().all(|c| *c == x),
            (Array::Bool(v), Value::Bool(x)) => v.iter().all(|c| *c == x),
            (Array::Enum(v), Value::Enum(x)) => v.codes().iter().all(|c| *c == x),
            (array, value) => array.to_f64().iter().all(|c| *c == value.as_f64()),
        }
    }

    /// Picks `self[indices[i]]` for every `i`.
    pub fn take(&self, indices: &[usize]) -> Result<Array, ArrayError> {
        let len = self.len();
        if let Some(bad) = indices.iter().find(|i| **i >= len) {
            return Err(ArrayError::LengthMismatch { function: "take", expected: len, actual: *bad + 1 });
        }
        Ok(match self {
            Array::Float(v) => Array::Float(indices.iter().map(|i| v[*i]).collect()),
            Array::Int(v) => Array::Int(indices.iter().map(|i| v[*i]).collect()),
            Array::Bool(v) => Array::Bool(indices.iter().map(|i| v[*i]).collect()),
            Array::Enum(v) => Array::Enum(EnumArray::new(
                indices.iter().map(|i| v.codes()[*i]).collect(),
                v.possible_values().clone(),
            )),
        })
    }

    fn wrong_dtype(&self, expected: &'static str) -> ArrayError {
        ArrayError::WrongDType { expected, actual: self.dtype().name().to_string() }
    }
}

impl From<Vec<f64>> for Array {
    fn from(v: Vec<f64>) -> Self {
        Array::Float(v)
    }
}

impl From<Vec<i64>> for Array {
    fn from(v: Vec<i64>) -> Self {
        Array::Int(v)
    }
}

impl From<Vec<bool>> for Array {
    fn from(v: Vec<bool>) -> Self {
        Array::Bool(v)
    }
}

impl From<EnumArray> for Array {
    fn from(v: EnumArray) -> Self {
        Array::Enum(v)
    }
}

impl fmt::Display for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Array::Enum(v) = self {
            return write!(f, "{v}");
        }
        write!(f, "[")?;
        for i in 0..self.len() {
            if i > 0 {
                write!(f, ", ")?;
            }
            if let Some(value) = self.get(i) {
                write!(f, "{value}")?;
            }
        }
        write!(f, "]")
    }
}
