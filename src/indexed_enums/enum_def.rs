use super::{EnumArray, EnumError};
use serde::Serialize;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Storage type of enum codes.
pub type EnumCode = i16;

/// One member of an [`EnumDef`]. Its `index` is its declaration position.
///
/// Items compare by enum and index only, never by name or value.
#[derive(Debug, Clone, Serialize)]
pub struct EnumItem {
    index: EnumCode,
    name: String,
    value: String,
    #[serde(skip)]
    enum_name: Arc<str>,
}

impl EnumItem {
    #[inline]
    pub fn index(&self) -> EnumCode {
        self.index
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn enum_name(&self) -> &str {
        &self.enum_name
    }
}

impl PartialEq for EnumItem {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.enum_name == other.enum_name
    }
}

impl Eq for EnumItem {}

impl Hash for EnumItem {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
    }
}

/// An ordered categorical type, e.g. housing occupancy status.
#[derive(Debug, Clone, Serialize)]
pub struct EnumDef {
    name: String,
    items: Vec<EnumItem>,
}

/// Raw values `EnumDef::encode` understands.
#[derive(Debug, Clone)]
pub enum Encodable {
    Encoded(EnumArray),
    Items(Vec<EnumItem>),
    Bytes(Vec<Vec<u8>>),
    Strings(Vec<String>),
    Codes(Vec<EnumCode>),
}

impl EnumDef {
    /// Declares an enum from `(name, value)` pairs, in order.
    pub fn new<I, N, V>(name: &str, items: I) -> Result<Arc<Self>, EnumError>
    where
        I: IntoIterator<Item = (N, V)>,
        N: Into<String>,
        V: Into<String>,
    {
        let enum_name: Arc<str> = Arc::from(name);
        let items = items
            .into_iter()
            .enumerate()
            .map(|(position, (item_name, value))| {
                let index = EnumCode::try_from(position)
                    .map_err(|_| EnumError::TooManyItems { enum_name: name.to_string() })?;
                Ok(EnumItem {
                    index,
                    name: item_name.into(),
                    value: value.into(),
                    enum_name: enum_name.clone(),
                })
            })
            .collect::<Result<Vec<_>, EnumError>>()?;
        Ok(Arc::new(Self { name: name.to_string(), items }))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn items(&self) -> &[EnumItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Looks an item up by name, like `Housing["tenant"]`.
    pub fn get(&self, name: &str) -> Result<&EnumItem, EnumError> {
        self.items
            .iter()
            .find(|item| item.name == name)
            .ok_or_else(|| EnumError::UnknownItem { enum_name: self.name.clone(), name: name.to_string() })
    }

    pub fn item(&self, code: EnumCode) -> Result<&EnumItem, EnumError> {
        usize::try_from(code)
            .ok()
            .and_then(|position| self.items.get(position))
            .ok_or_else(|| EnumError::UnknownCode { enum_name: self.name.clone(), code })
    }

    /// Encodes raw values into an [`EnumArray`] of this enum.
    ///
    /// Already-encoded arrays and integer codes pass through unchanged.
    /// Names (bytes are decoded as UTF-8 first) and items map to their index;
    /// unmatched values encode as `0`. Items are matched against the enum of
    /// the first item.
    pub fn encode(self: &Arc<Self>, input: Encodable) -> EnumArray {
        let codes = match input {
            Encodable::Encoded(array) => return array,
            Encodable::Codes(codes) => codes,
            Encodable::Strings(names) => names.iter().map(|name| self.code_of(name)).collect(),
            Encodable::Bytes(raw) => raw
                .iter()
                .map(|bytes| self.code_of(&String::from_utf8_lossy(bytes)))
                .collect(),
            Encodable::Items(items) => {
                let family = items.first().map(|item| item.enum_name.clone());
                items
                    .iter()
                    .map(|item| match &family {
                        Some(name) if item.enum_name == *name => item.index,
                        _ => 0,
                    })
                    .collect()
            }
        };
        EnumArray::new(codes, self.clone())
    }

    fn code_of(&self, name: &str) -> EnumCode {
        self.items
            .iter()
            .find(|item| item.name == name)
            .map_or(0, |item| item.index)
    }
}

impl From<EnumArray> for Encodable {
    fn from(array: EnumArray) -> Self {
        Encodable::Encoded(array)
    }
}

impl From<Vec<EnumCode>> for Encodable {
    fn from(codes: Vec<EnumCode>) -> Self {
        Encodable::Codes(codes)
    }
}

impl From<Vec<String>> for Encodable {
    fn from(names: Vec<String>) -> Self {
        Encodable::Strings(names)
    }
}

impl From<Vec<&str>> for Encodable {
    fn from(names: Vec<&str>) -> Self {
        Encodable::Strings(names.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<EnumItem>> for Encodable {
    fn from(items: Vec<EnumItem>) -> Self {
        Encodable::Items(items)
    }
}
