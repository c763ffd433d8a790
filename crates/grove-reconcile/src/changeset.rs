//! Partitioned view of one side's buffered operations.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use grove_types::{
    CreationRecord, PersistedOperation, PropertyChange, RemovalRecord, NodeRef,
};

/// One side of a reconciliation: buffered operations partitioned into
/// additions, property changes, and removals, each keyed by the affected
/// ref.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeSet {
    /// Buffered creations by created ref.
    pub additions: BTreeMap<NodeRef, CreationRecord>,
    /// Buffered property changes by changed ref, in buffer order per ref.
    pub properties: BTreeMap<NodeRef, Vec<PropertyChange>>,
    /// Buffered removals by removed ref.
    pub removals: BTreeMap<NodeRef, RemovalRecord>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Partition a flat operation list. Begin/commit/rollback framing is
    /// ignored; a later creation or removal for a ref replaces an earlier
    /// one.
    pub fn from_operations<I>(operations: I) -> Self
    where
        I: IntoIterator<Item = PersistedOperation>,
    {
        let mut set = Self::new();
        for operation in operations {
            match operation {
                PersistedOperation::Create {
                    parent,
                    type_name,
                    node,
                    index,
                } => {
                    set.additions.insert(
                        node.clone(),
                        CreationRecord::new(parent, type_name, node, index),
                    );
                }
                PersistedOperation::SetProperty {
                    node,
                    property,
                    data_type,
                    old_value,
                    new_value,
                    unconditional,
                } => {
                    set.properties.entry(node.clone()).or_default().push(
                        PropertyChange {
                            node,
                            property,
                            data_type,
                            old_value,
                            new_value,
                            unconditional,
                        },
                    );
                }
                PersistedOperation::Remove { parent, node } => {
                    set.removals
                        .insert(node.clone(), RemovalRecord::new(node, parent));
                }
                PersistedOperation::Begin
                | PersistedOperation::Commit
                | PersistedOperation::Rollback => {}
            }
        }
        set
    }

    /// Returns `true` when nothing is buffered on this side.
    pub fn is_empty(&self) -> bool {
        self.additions.is_empty() && self.properties.is_empty() && self.removals.is_empty()
    }

    /// Total number of buffered operations.
    pub fn len(&self) -> usize {
        self.additions.len()
            + self.properties.values().map(Vec::len).sum::<usize>()
            + self.removals.len()
    }
}
