use super::{ParameterAtInstant, ParameterError, ParameterTree};
use crate::periods::Instant;
use crate::taxscales::SingleAmountTaxScale;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A leaf value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Number(f64),
    Bool(bool),
}

/// A value history. Each entry applies from its instant until the next one;
/// a `null` entry stops the parameter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Parameter {
    values: BTreeMap<Instant, Option<ParameterValue>>,
}

impl Parameter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(mut self, start: Instant, value: Option<ParameterValue>) -> Self {
        self.values.insert(start, value);
        self
    }

    /// The value of the latest entry starting on or before `instant`.
    pub fn value_at(&self, instant: Instant) -> Option<ParameterValue> {
        self.values.range(..=instant).next_back().and_then(|(_, value)| *value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Bracket {
    pub threshold: Parameter,
    pub amount: Parameter,
}

/// A single-amount scale whose brackets each have their own history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scale {
    brackets: Vec<Bracket>,
}

impl Scale {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bracket(mut self, threshold: Parameter, amount: Parameter) -> Self {
        self.brackets.push(Bracket { threshold, amount });
        self
    }

    /// The scale made of the brackets fully defined at `instant`.
    pub fn at_instant(&self, instant: Instant) -> Result<SingleAmountTaxScale, ParameterError> {
        let mut scale = SingleAmountTaxScale::new();
        for bracket in &self.brackets {
            if let (Some(ParameterValue::Number(threshold)), Some(ParameterValue::Number(amount))) =
                (bracket.threshold.value_at(instant), bracket.amount.value_at(instant))
            {
                scale.add_bracket(threshold, amount)?;
            }
        }
        Ok(scale)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterItem {
    Value(Parameter),
    Scale(Scale),
    Node(ParameterNode),
}

/// An in-memory parameter tree, loadable from JSON:
///
/// ```
/// use fisca_core::parameters::{ParameterNode, ParameterTree};
/// let tree = ParameterNode::from_json(r#"{
///     "taxes": {"rate": {"values": {"2015-01-01": 0.2, "2017-01-01": null}}}
/// }"#).unwrap();
/// let snapshot = tree.get_at_instant("2016-06-01".parse().unwrap()).unwrap();
/// assert_eq!(snapshot.number("taxes.rate").unwrap(), 0.2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterNode {
    children: BTreeMap<String, ParameterItem>,
}

impl ParameterNode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self, ParameterError> {
        serde_json::from_str(json).map_err(|e| ParameterError::Json { message: e.to_string() })
    }

    pub fn with_child(mut self, name: impl Into<String>, item: ParameterItem) -> Self {
        self.children.insert(name.into(), item);
        self
    }

    pub fn children(&self) -> &BTreeMap<String, ParameterItem> {
        &self.children
    }
}

impl ParameterTree for ParameterNode {
    /// Leaves without a value at `instant` are left out of the snapshot.
    fn get_at_instant(&self, instant: Instant) -> Result<ParameterAtInstant, ParameterError> {
        let mut children = BTreeMap::new();
        for (name, item) in &self.children {
            let value = match item {
                ParameterItem::Value(parameter) => match parameter.value_at(instant) {
                    Some(ParameterValue::Number(v)) => ParameterAtInstant::Number(v),
                    Some(ParameterValue::Bool(v)) => ParameterAtInstant::Bool(v),
                    None => continue,
                },
                ParameterItem::Scale(scale) => ParameterAtInstant::Scale(scale.at_instant(instant)?),
                ParameterItem::Node(node) => node.get_at_instant(instant)?,
            };
            children.insert(name.clone(), value);
        }
        Ok(ParameterAtInstant::Node(children))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instant(s: &str) -> Instant {
        s.parse().unwrap()
    }

    #[test]
    fn test_latest_value_wins_and_null_stops() {
        let parameter = Parameter::new()
            .with_value(instant("2015-01-01"), Some(ParameterValue::Number(1.0)))
            .with_value(instant("2016-01-01"), Some(ParameterValue::Number(2.0)))
            .with_value(instant("2017-01-01"), None);
        assert_eq!(parameter.value_at(instant("2014-12-31")), None);
        assert_eq!(parameter.value_at(instant("2015-06-01")), Some(ParameterValue::Number(1.0)));
        assert_eq!(parameter.value_at(instant("2016-01-01")), Some(ParameterValue::Number(2.0)));
        assert_eq!(parameter.value_at(instant("2018-01-01")), None);
    }

    #[test]
    fn test_scale_from_json() {
        let tree = ParameterNode::from_json(
            r#"{
                "social_security_contribution": {
                    "brackets": [
                        {"threshold": {"values": {"2017-10-01": 0.23}}, "amount": {"values": {"2017-10-01": 6}}}
                    ]
                }
            }"#,
        )
        .unwrap();
        let snapshot = tree.get_at_instant(instant("2017-11-01")).unwrap();
        let scale = snapshot.scale("social_security_contribution").unwrap();
        assert_eq!(scale.thresholds(), &[0.23]);
        assert_eq!(scale.amounts(), &[6.0]);

        let before = tree.get_at_instant(instant("2017-01-01")).unwrap();
        assert!(before.scale("social_security_contribution").unwrap().thresholds().is_empty());
    }

    #[test]
    fn test_nested_nodes_and_bools() {
        let tree = ParameterNode::new().with_child(
            "benefits",
            ParameterItem::Node(ParameterNode::new().with_child(
                "enabled",
                ParameterItem::Value(Parameter::new().with_value(instant("2015-01-01"), Some(ParameterValue::Bool(true)))),
            )),
        );
        let snapshot = tree.get_at_instant(instant("2015-01-01")).unwrap();
        assert!(snapshot.flag("benefits.enabled").unwrap());
        assert!(matches!(snapshot.number("benefits.enabled"), Err(ParameterError::WrongKind { .. })));
        assert!(ParameterNode::from_json("[1, 2]").is_err());
    }
}
