//! Categorical values stored as small integer codes.
mod enum_array;
mod enum_def;

pub use enum_array::{EnumArray, EnumOperand};
pub use enum_def::{Encodable, EnumCode, EnumDef, EnumItem};

pub use self::error::EnumError;
mod error {
    use super::EnumCode;
    use thiserror::Error;

    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum EnumError {
        #[error("Enum '{enum_name}' has no item with index {code}")]
        UnknownCode { enum_name: String, code: EnumCode },
        #[error("Enum '{enum_name}' has no item named '{name}'")]
        UnknownItem { enum_name: String, name: String },
        #[error("Enum '{enum_name}' declares more items than its codes can index")]
        TooManyItems { enum_name: String },
    }
}
