//! Undo log recorded during commit.
//!
//! Each entry captures exactly what is needed to reverse one applied
//! operation. The log is appended in apply order (removals, creations,
//! properties) and replayed back to front on rollback, so property restores
//! run first and re-attachments of removed ancestors run before their
//! descendants.

use grove_types::{DataType, NodeRef, Value};

/// One reversible step applied during commit.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum UndoEntry {
    /// A property was set; `prior` is the value it held before.
    Property {
        node: NodeRef,
        property: String,
        data_type: DataType,
        prior: Value,
    },
    /// A node was constructed and attached.
    Creation { parent: NodeRef, node: NodeRef },
    /// A node was detached from `parent` at `index`.
    Removal {
        parent: NodeRef,
        node: NodeRef,
        index: usize,
    },
}
