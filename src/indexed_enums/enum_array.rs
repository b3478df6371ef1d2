use super::{EnumCode, EnumDef, EnumError, EnumItem};
use std::fmt;
use std::sync::Arc;

/// A vector of enum codes tagged with the enum it belongs to.
///
/// Only equality comparisons are offered. Arithmetic, ordering and logical
/// operators are not implemented and fail to compile:
///
/// ```compile_fail
/// use fisca_core::indexed_enums::{EnumArray, EnumDef};
/// let def = EnumDef::new("Housing", [("owner", "Owner")]).unwrap();
/// let _ = EnumArray::new(vec![0], def) + 1;
/// ```
///
/// ```compile_fail
/// use fisca_core::indexed_enums::{EnumArray, EnumDef};
/// let def = EnumDef::new("Housing", [("owner", "Owner")]).unwrap();
/// let _ = EnumArray::new(vec![0], def) * 2;
/// ```
///
/// ```compile_fail
/// use fisca_core::indexed_enums::{EnumArray, EnumDef};
/// let def = EnumDef::new("Housing", [("owner", "Owner")]).unwrap();
/// let a = EnumArray::new(vec![0], def.clone());
/// let b = EnumArray::new(vec![0], def);
/// let _ = a < b;
/// ```
///
/// ```compile_fail
/// use fisca_core::indexed_enums::{EnumArray, EnumDef};
/// let def = EnumDef::new("Housing", [("owner", "Owner")]).unwrap();
/// let a = EnumArray::new(vec![0], def.clone());
/// let b = EnumArray::new(vec![0], def);
/// let _ = a & b;
/// ```
///
/// ```compile_fail
/// use fisca_core::indexed_enums::{EnumArray, EnumDef};
/// let def = EnumDef::new("Housing", [("owner", "Owner")]).unwrap();
/// let a = EnumArray::new(vec![0], def.clone());
/// let b = EnumArray::new(vec![0], def);
/// let _ = a | b;
/// ```
#[derive(Debug, Clone)]
pub struct EnumArray {
    codes: Vec<EnumCode>,
    possible_values: Arc<EnumDef>,
}

/// Right-hand side of an element-wise enum comparison.
#[derive(Debug, Clone, Copy)]
pub enum EnumOperand<'a> {
    Code(EnumCode),
    Codes(&'a [EnumCode]),
    Item(&'a EnumItem),
    Items(&'a [EnumItem]),
    Array(&'a EnumArray),
}

impl EnumArray {
    pub fn new(codes: Vec<EnumCode>, possible_values: Arc<EnumDef>) -> Self {
        Self { codes, possible_values }
    }

    #[inline]
    pub fn codes(&self) -> &[EnumCode] {
        &self.codes
    }

    pub(crate) fn codes_mut(&mut self) -> &mut [EnumCode] {
        &mut self.codes
    }

    pub fn into_codes(self) -> Vec<EnumCode> {
        self.codes
    }

    pub fn possible_values(&self) -> &Arc<EnumDef> {
        &self.possible_values
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Element-wise equality.
    ///
    /// Items and arrays of another enum never match; a list of the wrong
    /// length matches nowhere.
    pub fn equals<'a>(&self, other: impl Into<EnumOperand<'a>>) -> Vec<bool> {
        let n = self.codes.len();
        match other.into() {
            EnumOperand::Code(code) => self.codes.iter().map(|c| *c == code).collect(),
            EnumOperand::Codes(codes) => self.zip_with(codes.iter().copied(), codes.len()),
            EnumOperand::Item(item) => {
                if self.owns(item) {
                    self.codes.iter().map(|c| *c == item.index()).collect()
                } else {
                    vec![false; n]
                }
            }
            EnumOperand::Items(items) => {
                if items.iter().all(|item| self.owns(item)) {
                    self.zip_with(items.iter().map(EnumItem::index), items.len())
                } else {
                    vec![false; n]
                }
            }
            EnumOperand::Array(array) => {
                if array.possible_values.name() == self.possible_values.name() {
                    self.zip_with(array.codes.iter().copied(), array.len())
                } else {
                    vec![false; n]
                }
            }
        }
    }

    /// Element-wise negation of [`EnumArray::equals`].
    pub fn not_equals<'a>(&self, other: impl Into<EnumOperand<'a>>) -> Vec<bool> {
        self.equals(other).into_iter().map(|eq| !eq).collect()
    }

    /// Maps every code back to its item.
    pub fn decode(&self) -> Result<Vec<&EnumItem>, EnumError> {
        self.codes.iter().map(|code| self.possible_values.item(*code)).collect()
    }

    /// Maps every code back to its item name.
    pub fn decode_to_str(&self) -> Result<Vec<&str>, EnumError> {
        self.codes
            .iter()
            .map(|code| self.possible_values.item(*code).map(EnumItem::name))
            .collect()
    }

    fn owns(&self, item: &EnumItem) -> bool {
        item.enum_name() == self.possible_values.name()
    }

    fn zip_with(&self, other: impl Iterator<Item = EnumCode>, other_len: usize) -> Vec<bool> {
        if other_len != self.codes.len() {
            return vec![false; self.codes.len()];
        }
        self.codes.iter().zip(other).map(|(a, b)| *a == b).collect()
    }
}

impl PartialEq for EnumArray {
    fn eq(&self, other: &Self) -> bool {
        self.possible_values.name() == other.possible_values.name() && self.codes == other.codes
    }
}

impl fmt::Display for EnumArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, code) in self.codes.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match self.possible_values.item(*code) {
                Ok(item) => write!(f, "'{}'", item.name())?,
                Err(_) => write!(f, "{code}")?,
            }
        }
        write!(f, "]")
    }
}

impl From<EnumCode> for EnumOperand<'_> {
    fn from(code: EnumCode) -> Self {
        EnumOperand::Code(code)
    }
}

impl<'a> From<&'a [EnumCode]> for EnumOperand<'a> {
    fn from(codes: &'a [EnumCode]) -> Self {
        EnumOperand::Codes(codes)
    }
}

impl<'a> From<&'a Vec<EnumCode>> for EnumOperand<'a> {
    fn from(codes: &'a Vec<EnumCode>) -> Self {
        EnumOperand::Codes(codes)
    }
}

impl<'a> From<&'a EnumItem> for EnumOperand<'a> {
    fn from(item: &'a EnumItem) -> Self {
        EnumOperand::Item(item)
    }
}

impl<'a> From<&'a [EnumItem]> for EnumOperand<'a> {
    fn from(items: &'a [EnumItem]) -> Self {
        EnumOperand::Items(items)
    }
}

impl<'a> From<&'a EnumArray> for EnumOperand<'a> {
    fn from(array: &'a EnumArray) -> Self {
        EnumOperand::Array(array)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn housing() -> Arc<EnumDef> {
        EnumDef::new(
            "Housing",
            [("owner", "Owner"), ("tenant", "Tenant"), ("free_lodger", "Free lodger")],
        )
        .unwrap()
    }

    #[test]
    fn test_equals_item_and_name_lookup() {
        let def = housing();
        let array = def.encode(vec!["tenant", "owner", "tenant"].into());
        let tenant = def.get("tenant").unwrap();
        assert_eq!(array.equals(tenant), vec![true, false, true]);
        assert_eq!(array.not_equals(tenant), vec![false, true, false]);
        assert_eq!(array.equals(0_i16), vec![false, true, false]);
    }

    #[test]
    fn test_equals_lists_element_wise() {
        let def = housing();
        let array = EnumArray::new(vec![0, 1, 2], def.clone());
        assert_eq!(array.equals(&vec![0_i16, 2, 2]), vec![true, false, true]);
        assert_eq!(array.equals(&vec![0_i16, 1]), vec![false, false, false]);
        let items = vec![def.get("owner").unwrap().clone(), def.get("owner").unwrap().clone(), def.get("free_lodger").unwrap().clone()];
        assert_eq!(array.equals(items.as_slice()), vec![true, false, true]);
    }

    #[test]
    fn test_item_of_another_enum_never_matches() {
        let def = housing();
        let other = EnumDef::new("Tenure", [("owner", "Owner")]).unwrap();
        let array = EnumArray::new(vec![0, 0], def);
        let foreign = other.get("owner").unwrap();
        assert_eq!(array.equals(foreign), vec![false, false]);
        assert_eq!(array.not_equals(foreign), vec![true, true]);
        let foreign_array = EnumArray::new(vec![0, 0], other);
        assert_eq!(array.equals(&foreign_array), vec![false, false]);
    }

    #[test]
    fn test_decode() {
        let def = housing();
        let array = EnumArray::new(vec![2, 0], def.clone());
        let decoded = array.decode().unwrap();
        assert_eq!(decoded[0], def.get("free_lodger").unwrap());
        assert_eq!(array.decode_to_str().unwrap(), vec!["free_lodger", "owner"]);
        assert_eq!(array.to_string(), "['free_lodger', 'owner']");

        let broken = EnumArray::new(vec![7], def);
        assert!(broken.decode().is_err());
        assert_eq!(broken.to_string(), "[7]");
    }
}
