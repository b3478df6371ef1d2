//! Gather and scatter between a group entity and its members.
//!
//! Person `i` belongs to group `group_index[i]` with role `roles[i]`; a
//! role mask selects the persons taking part, and fancy indexing moves
//! the values.
use super::Membership;
use crate::arrays::{Array, ArrayError, Value};
use crate::entities::RoleCode;
use crate::variables::Aggregation;

#[derive(Clone, Copy)]
enum Direction {
    /// Group value into each member slot.
    Gather,
    /// Member value into its group slot.
    Scatter,
}

fn copy_cells<T: Copy>(target: &mut [T], source: &[T], membership: &Membership, codes: &[RoleCode], direction: Direction) {
    for (person, group) in membership.members_with(codes) {
        match direction {
            Direction::Gather => target[person] = source[group],
            Direction::Scatter => target[group] = source[person],
        }
    }
}

fn project(
    source: &Array,
    default: Value,
    membership: &Membership,
    codes: &[RoleCode],
    direction: Direction,
) -> Result<Array, ArrayError> {
    let (function, expected, target_len) = match direction {
        Direction::Gather => ("broadcast", membership.group_count(), membership.person_count()),
        Direction::Scatter => ("pick", membership.person_count(), membership.group_count()),
    };
    if source.len() != expected {
        return Err(ArrayError::LengthMismatch { function, expected, actual: source.len() });
    }
    let mut target = Array::filled(&source.dtype(), default, target_len)?;
    match (&mut target, source) {
        (Array::Float(t), Array::Float(s)) => copy_cells(t, s, membership, codes, direction),
        (Array::Int(t), Array::Int(s)) => copy_cells(t, s, membership, codes, direction),
        (Array::Bool(t), Array::Bool(s)) => copy_cells(t, s, membership, codes, direction),
        (Array::Enum(t), Array::Enum(s)) => copy_cells(t.codes_mut(), s.codes(), membership, codes, direction),
        (t, s) => {
            return Err(ArrayError::WrongDType { expected: "the source type", actual: format!("{} for {}", t.dtype(), s.dtype()) })
        }
    }
    Ok(target)
}

/// A person array holding, for members with one of `codes`, the value of
/// their group. Other members get `default`.
pub(crate) fn broadcast(
    source: &Array,
    default: Value,
    membership: &Membership,
    codes: &[RoleCode],
) -> Result<Array, ArrayError> {
    project(source, default, membership, codes, Direction::Gather)
}

/// A group array holding the value of the member with one of `codes`.
/// Groups without such a member get `default`; with several, the last
/// member wins.
pub(crate) fn pick(source: &Array, default: Value, membership: &Membership, codes: &[RoleCode]) -> Result<Array, ArrayError> {
    project(source, default, membership, codes, Direction::Scatter)
}

/// A group array combining the values of all members with one of `codes`.
///
/// `Add` keeps float and int types and counts booleans; `Or` yields booleans.
pub(crate) fn reduce(
    source: &Array,
    aggregation: Aggregation,
    membership: &Membership,
    codes: &[RoleCode],
) -> Result<Array, ArrayError> {
    if source.len() != membership.person_count() {
        return Err(ArrayError::LengthMismatch {
            function: "reduce",
            expected: membership.person_count(),
            actual: source.len(),
        });
    }
    let groups = membership.group_count();
    let members = membership.members_with(codes);
    Ok(match (aggregation, source) {
        (Aggregation::Add, Array::Float(s)) => {
            let mut target = vec![0.0; groups];
            members.for_each(|(person, group)| target[group] += s[person]);
            Array::Float(target)
        }
        (Aggregation::Add, Array::Int(s)) => {
            let mut target = vec![0_i64; groups];
            members.for_each(|(person, group)| target[group] += s[person]);
            Array::Int(target)
        }
        (Aggregation::Add, Array::Bool(s)) => {
            let mut target = vec![0_i64; groups];
            members.for_each(|(person, group)| target[group] += i64::from(s[person]));
            Array::Int(target)
        }
        (Aggregation::Add, Array::Enum(_)) => {
            return Err(ArrayError::WrongDType { expected: "numeric", actual: source.dtype().to_string() })
        }
        (Aggregation::Or, source) => {
            let values = source.to_f64();
            let mut target = vec![false; groups];
            members.for_each(|(person, group)| target[group] |= values[person] != 0.0);
            Array::Bool(target)
        }
    })
}
