use super::TaxScaleError;
use serde::Serialize;
use std::collections::BTreeMap;

/// Brackets mapping a base to a fixed amount: a base falling in
/// `[threshold[i], threshold[i + 1])` yields `amounts[i]`, and a base below
/// the first threshold yields `0`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SingleAmountTaxScale {
    thresholds: Vec<f64>,
    amounts: Vec<f64>,
}

impl SingleAmountTaxScale {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a scale from parallel threshold and amount lists.
    pub fn from_brackets(thresholds: Vec<f64>, amounts: Vec<f64>) -> Result<Self, TaxScaleError> {
        if thresholds.len() != amounts.len() {
            return Err(TaxScaleError::BracketMismatch { thresholds: thresholds.len(), amounts: amounts.len() });
        }
        let mut scale = Self::new();
        for (threshold, amount) in thresholds.into_iter().zip(amounts) {
            scale.add_bracket(threshold, amount)?;
        }
        Ok(scale)
    }

    pub fn thresholds(&self) -> &[f64] {
        &self.thresholds
    }

    pub fn amounts(&self) -> &[f64] {
        &self.amounts
    }

    /// Inserts a bracket, keeping thresholds sorted. Amounts of a repeated
    /// threshold add up.
    pub fn add_bracket(&mut self, threshold: f64, amount: f64) -> Result<(), TaxScaleError> {
        if threshold.is_nan() {
            return Err(TaxScaleError::InvalidThreshold { threshold });
        }
        match self.thresholds.iter().position(|t| *t >= threshold) {
            Some(i) if self.thresholds[i] == threshold => self.amounts[i] += amount,
            Some(i) => {
                self.thresholds.insert(i, threshold);
                self.amounts.insert(i, amount);
            }
            None => {
                self.thresholds.push(threshold);
                self.amounts.push(amount);
            }
        }
        Ok(())
    }

    /// The amount of the bracket each base falls in.
    ///
    /// With `right`, brackets are closed on the right: a base equal to a
    /// threshold belongs to the bracket below it. Bases past the `+inf`
    /// guard, or NaN, yield `0`.
    pub fn calc(&self, tax_base: &[f64], right: bool) -> Vec<f64> {
        let guarded_thresholds: Vec<f64> = std::iter::once(f64::NEG_INFINITY)
            .chain(self.thresholds.iter().copied())
            .chain(std::iter::once(f64::INFINITY))
            .collect();
        let guarded_amounts: Vec<f64> = std::iter::once(0.0)
            .chain(self.amounts.iter().copied())
            .chain(std::iter::once(0.0))
            .collect();
        tax_base
            .iter()
            .map(|base| {
                let index = digitize(*base, &guarded_thresholds, right);
                index.checked_sub(1).and_then(|i| guarded_amounts.get(i)).copied().unwrap_or(0.0)
            })
            .collect()
    }

    /// Thresholds, as strings, mapped to their amounts.
    pub fn to_dict(&self) -> BTreeMap<String, f64> {
        self.thresholds
            .iter()
            .zip(&self.amounts)
            .map(|(threshold, amount)| (format_threshold(*threshold), *amount))
            .collect()
    }
}

/// Index of the bin `value` falls in, for increasing `bins`. NaN falls past
/// the last bin.
fn digitize(value: f64, bins: &[f64], right: bool) -> usize {
    if value.is_nan() {
        return bins.len();
    }
    if right {
        bins.iter().take_while(|bin| **bin < value).count()
    } else {
        bins.iter().take_while(|bin| **bin <= value).count()
    }
}

fn format_threshold(threshold: f64) -> String {
    if threshold.fract() == 0.0 && threshold.is_finite() {
        format!("{threshold:.0}")
    } else {
        threshold.to_string()
    }
}
