use thiserror::Error;

use crate::value::DataType;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq)]
pub enum TypeError {
    #[error("value of type {actual} where {expected} was declared")]
    DataTypeMismatch {
        expected: DataType,
        actual: DataType,
    },

    #[error("serialization error: {0}")]
    Serialization(String),
}
