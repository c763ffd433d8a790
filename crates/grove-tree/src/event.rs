use serde::{Deserialize, Serialize};

use grove_types::{NodeRef, Value};

/// A change notification emitted by the tree.
///
/// Events are only recorded while notification ("magic") is enabled; the
/// transaction engine wraps commit and rollback in a batch that suppresses
/// them, so observers see user-level edits rather than replication traffic.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum TreeEvent {
    ChildAdded {
        parent: NodeRef,
        child: NodeRef,
        index: usize,
    },
    ChildRemoved {
        parent: NodeRef,
        child: NodeRef,
        index: usize,
    },
    PropertyChanged {
        node: NodeRef,
        property: String,
        new_value: Value,
    },
}
