//! Wire-independent operation vocabulary.
//!
//! Any transport or storage layer that wants to carry a Grove transaction
//! must be able to encode exactly these operations: the three mutation kinds
//! plus begin/commit/rollback framing. The encoding itself (JSON, files,
//! whatever) is a transport concern and lives elsewhere.

use serde::{Deserialize, Serialize};

use crate::record::{CreationRecord, PropertyChange, RemovalRecord};
use crate::reference::NodeRef;
use crate::value::{DataType, Value};

/// One persisted operation as carried between sessions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum PersistedOperation {
    /// Open a (possibly nested) transaction.
    Begin,
    /// Create a node of `type_name` under `parent` at sibling `index`.
    Create {
        parent: Option<NodeRef>,
        type_name: String,
        node: NodeRef,
        index: usize,
    },
    /// Set one named property on `node`.
    SetProperty {
        node: NodeRef,
        property: String,
        data_type: DataType,
        old_value: Option<Value>,
        new_value: Value,
        unconditional: bool,
    },
    /// Detach `node` from `parent`.
    Remove { parent: NodeRef, node: NodeRef },
    /// Close the innermost transaction, applying buffers when outermost.
    Commit,
    /// Abandon the in-flight transaction.
    Rollback,
}

impl From<CreationRecord> for PersistedOperation {
    fn from(r: CreationRecord) -> Self {
        PersistedOperation::Create {
            parent: r.parent,
            type_name: r.type_name,
            node: r.node,
            index: r.index,
        }
    }
}

impl From<PropertyChange> for PersistedOperation {
    fn from(c: PropertyChange) -> Self {
        PersistedOperation::SetProperty {
            node: c.node,
            property: c.property,
            data_type: c.data_type,
            old_value: c.old_value,
            new_value: c.new_value,
            unconditional: c.unconditional,
        }
    }
}

impl From<RemovalRecord> for PersistedOperation {
    fn from(r: RemovalRecord) -> Self {
        PersistedOperation::Remove {
            parent: r.parent,
            node: r.node,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_from_record() {
        let record = CreationRecord::new(None, "Session", NodeRef::from("root"), 0);
        let op = PersistedOperation::from(record);
        assert!(matches!(
            op,
            PersistedOperation::Create { parent: None, index: 0, .. }
        ));
    }

    #[test]
    fn serde_roundtrip() {
        let op = PersistedOperation::SetProperty {
            node: NodeRef::from("n"),
            property: "name".into(),
            data_type: DataType::String,
            old_value: None,
            new_value: Value::from("x"),
            unconditional: true,
        };
        let json = serde_json::to_string(&op).unwrap();
        let parsed: PersistedOperation = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, op);
    }
}
