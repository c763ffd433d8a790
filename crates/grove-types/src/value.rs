use std::fmt;

use serde::{Deserialize, Serialize};

use crate::reference::NodeRef;

/// The persistable data types a property value can carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Null,
    Integer,
    Boolean,
    Double,
    String,
    PngImage,
    /// A pointer to another node in the tree, by ref.
    Reference,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Null => "null",
            DataType::Integer => "integer",
            DataType::Boolean => "boolean",
            DataType::Double => "double",
            DataType::String => "string",
            DataType::PngImage => "png-image",
            DataType::Reference => "reference",
        };
        f.write_str(name)
    }
}

/// A typed property value.
///
/// The payload variants mirror [`DataType`] one-for-one. `Reference` carries
/// the ref of the node it points at, which is what the reconciliation engine
/// inspects when deciding whether a removal would orphan a dependency.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Integer(i64),
    Boolean(bool),
    Double(f64),
    String(String),
    PngImage(Vec<u8>),
    Reference(NodeRef),
}

impl Value {
    /// The data type this value carries.
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Null => DataType::Null,
            Value::Integer(_) => DataType::Integer,
            Value::Boolean(_) => DataType::Boolean,
            Value::Double(_) => DataType::Double,
            Value::String(_) => DataType::String,
            Value::PngImage(_) => DataType::PngImage,
            Value::Reference(_) => DataType::Reference,
        }
    }

    /// Returns `true` for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The target ref when this is a [`Value::Reference`].
    pub fn as_reference(&self) -> Option<&NodeRef> {
        match self {
            Value::Reference(r) => Some(r),
            _ => None,
        }
    }

    /// Validate this value against a declared data type. `Null` is accepted
    /// for any declared type; every property is nullable.
    pub fn check_type(&self, declared: DataType) -> Result<(), crate::error::TypeError> {
        let actual = self.data_type();
        if actual == DataType::Null || actual == declared {
            Ok(())
        } else {
            Err(crate::error::TypeError::DataTypeMismatch {
                expected: declared,
                actual,
            })
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Integer(v) => write!(f, "{v}"),
            Value::Boolean(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::String(v) => f.write_str(v),
            Value::PngImage(bytes) => write!(f, "<png {} bytes>", bytes.len()),
            Value::Reference(r) => write!(f, "->{r}"),
        }
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<NodeRef> for Value {
    fn from(r: NodeRef) -> Self {
        Value::Reference(r)
    }
}
