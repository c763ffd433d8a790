//! Buffered change records.
//!
//! Each record describes one not-yet-applied operation against the object
//! tree, carrying enough data both to apply it during commit and to undo it
//! during rollback.

use serde::{Deserialize, Serialize};

use crate::reference::NodeRef;
use crate::value::{DataType, Value};

/// A buffered "create node" operation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CreationRecord {
    /// Parent under which the node will be attached; `None` for the root.
    pub parent: Option<NodeRef>,
    /// Concrete type tag of the node to create.
    pub type_name: String,
    /// Ref the new node will carry.
    pub node: NodeRef,
    /// Persisted sibling position among children of the same type.
    pub index: usize,
    /// Set when the node is already materialized in the tree (root refresh).
    pub loaded: bool,
}

impl CreationRecord {
    pub fn new(
        parent: Option<NodeRef>,
        type_name: impl Into<String>,
        node: NodeRef,
        index: usize,
    ) -> Self {
        Self {
            parent,
            type_name: type_name.into(),
            node,
            index,
            loaded: false,
        }
    }

    /// Returns `true` when the two records describe the same creation,
    /// field for field. Used by the reconciliation engine to spot true
    /// duplicates between inbound and outbound change sets.
    pub fn same_creation(&self, other: &CreationRecord) -> bool {
        self.parent == other.parent
            && self.type_name == other.type_name
            && self.node == other.node
            && self.index == other.index
    }
}

/// A buffered "set property" operation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PropertyChange {
    /// Node whose property changes.
    pub node: NodeRef,
    /// Property name.
    pub property: String,
    /// Declared type of the new value.
    pub data_type: DataType,
    /// Expected prior value for conditional changes; `None` when the caller
    /// did not supply one.
    pub old_value: Option<Value>,
    /// Value to apply.
    pub new_value: Value,
    /// Skip expected-old-value validation when set.
    pub unconditional: bool,
}

impl PropertyChange {
    pub fn conditional(
        node: NodeRef,
        property: impl Into<String>,
        data_type: DataType,
        old_value: Value,
        new_value: Value,
    ) -> Self {
        Self {
            node,
            property: property.into(),
            data_type,
            old_value: Some(old_value),
            new_value,
            unconditional: false,
        }
    }

    pub fn unconditional(
        node: NodeRef,
        property: impl Into<String>,
        data_type: DataType,
        new_value: Value,
    ) -> Self {
        Self {
            node,
            property: property.into(),
            data_type,
            old_value: None,
            new_value,
            unconditional: true,
        }
    }
}

/// A buffered "remove node" operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovalRecord {
    /// Node to detach.
    pub node: NodeRef,
    /// Parent it is expected to be detached from.
    pub parent: NodeRef,
}

impl RemovalRecord {
    pub fn new(node: NodeRef, parent: NodeRef) -> Self {
        Self { node, parent }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_creation_ignores_loaded_flag() {
        let mut a = CreationRecord::new(
            Some(NodeRef::from("p")),
            "Folder",
            NodeRef::from("n"),
            0,
        );
        let mut b = a.clone();
        b.loaded = true;
        a.loaded = false;
        assert!(a.same_creation(&b));
    }

    #[test]
    fn same_creation_detects_moved_node() {
        let a = CreationRecord::new(Some(NodeRef::from("p1")), "Folder", NodeRef::from("n"), 0);
        let b = CreationRecord::new(Some(NodeRef::from("p2")), "Folder", NodeRef::from("n"), 0);
        assert!(!a.same_creation(&b));
    }

    #[test]
    fn conditional_change_records_expected_value() {
        let c = PropertyChange::conditional(
            NodeRef::from("n"),
            "name",
            DataType::String,
            Value::from("old"),
            Value::from("new"),
        );
        assert_eq!(c.old_value, Some(Value::from("old")));
        assert!(!c.unconditional);
    }
}
