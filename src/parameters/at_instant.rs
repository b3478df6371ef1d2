use super::ParameterError;
use crate::taxscales::SingleAmountTaxScale;
use serde::Serialize;
use std::collections::BTreeMap;

/// A parameter tree frozen at one instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParameterAtInstant {
    Number(f64),
    Bool(bool),
    Scale(SingleAmountTaxScale),
    Node(BTreeMap<String, ParameterAtInstant>),
}

impl ParameterAtInstant {
    /// Follows a dotted path such as `taxes.income.rate`.
    pub fn get(&self, path: &str) -> Result<&ParameterAtInstant, ParameterError> {
        path.split('.').try_fold(self, |node, segment| match node {
            ParameterAtInstant::Node(children) => {
                children.get(segment).ok_or_else(|| ParameterError::MissingPath { path: path.to_string() })
            }
            _ => Err(ParameterError::MissingPath { path: path.to_string() }),
        })
    }

    pub fn number(&self, path: &str) -> Result<f64, ParameterError> {
        match self.get(path)? {
            ParameterAtInstant::Number(v) => Ok(*v),
            _ => Err(ParameterError::WrongKind { path: path.to_string(), expected: "a number" }),
        }
    }

    pub fn flag(&self, path: &str) -> Result<bool, ParameterError> {
        match self.get(path)? {
            ParameterAtInstant::Bool(v) => Ok(*v),
            _ => Err(ParameterError::WrongKind { path: path.to_string(), expected: "a boolean" }),
        }
    }

    pub fn scale(&self, path: &str) -> Result<&SingleAmountTaxScale, ParameterError> {
        match self.get(path)? {
            ParameterAtInstant::Scale(scale) => Ok(scale),
            _ => Err(ParameterError::WrongKind { path: path.to_string(), expected: "a scale" }),
        }
    }
}
