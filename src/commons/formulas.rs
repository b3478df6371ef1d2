use super::CommonsError;
use crate::arrays::Array;

/// Picks, for each input, the choice of the first threshold it does not
/// exceed. With one more choice than thresholds, the last choice covers
/// inputs above every threshold; otherwise they get `0`.
///
/// ```
/// use fisca_core::commons::apply_thresholds;
/// let picked = apply_thresholds(&[4.0, 5.0, 6.0, 7.0, 8.0], &[5.0, 7.0], &[10.0, 15.0, 20.0]).unwrap();
/// assert_eq!(picked, vec![10.0, 10.0, 15.0, 15.0, 20.0]);
/// ```
pub fn apply_thresholds(input: &[f64], thresholds: &[f64], choices: &[f64]) -> Result<Vec<f64>, CommonsError> {
    let open_ended = choices.len() == thresholds.len() + 1;
    if !open_ended && choices.len() != thresholds.len() {
        return Err(CommonsError::ThresholdMismatch { thresholds: thresholds.len(), choices: choices.len() });
    }
    Ok(input
        .iter()
        .map(|value| match thresholds.iter().position(|threshold| value <= threshold) {
            Some(i) => choices[i],
            None if open_ended => choices[thresholds.len()],
            None => 0.0,
        })
        .collect())
}

/// Replaces each condition by the value paired with it, or `0` when no pair
/// matches. The first matching pair wins.
///
/// ```
/// use fisca_core::commons::switch;
/// let values = switch(&[1, 1, 1, 2], &[(1, 80.0), (2, 90.0)]).unwrap();
/// assert_eq!(values, vec![80.0, 80.0, 80.0, 90.0]);
/// ```
pub fn switch<C: PartialEq>(conditions: &[C], value_by_condition: &[(C, f64)]) -> Result<Vec<f64>, CommonsError> {
    if value_by_condition.is_empty() {
        return Err(CommonsError::EmptySwitch);
    }
    Ok(conditions
        .iter()
        .map(|condition| {
            value_by_condition
                .iter()
                .find(|(candidate, _)| candidate == condition)
                .map_or(0.0, |(_, value)| *value)
        })
        .collect())
}

/// Renders an array for log lines, `None` when there is none.
pub fn stringify_array(array: Option<&Array>) -> String {
    match array {
        Some(array) => array.to_string(),
        None => "None".to_string(),
    }
}
