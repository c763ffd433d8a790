//! Error types for the session persister.

use grove_tree::TreeError;
use grove_types::{NodeRef, Value};
use thiserror::Error;

/// Errors raised by the transaction engine.
///
/// Every error on a mutating entry point is raised only after the engine has
/// already rolled the in-flight transaction back; callers never observe a
/// half-applied state alongside one of these.
#[derive(Debug, Error, PartialEq)]
pub enum SessionError {
    /// A buffering or commit call arrived outside an active transaction.
    #[error("no transaction in progress")]
    NoActiveTransaction,

    /// A call arrived from a thread other than the one that first used this
    /// persister.
    #[error("session persister is owned by another thread")]
    WrongThread,

    /// A creation was buffered for a ref that already names a node of a
    /// different type.
    #[error("node {node} already exists as type {type_name}")]
    NodeExists { node: NodeRef, type_name: String },

    /// The ref does not name an existing node (live, or buffered for
    /// creation in this transaction).
    #[error("node not found: {0}")]
    NodeNotFound(NodeRef),

    /// A conditional property change did not match the current value.
    #[error(
        "conditional change of {node}.{property} expected {expected} but found {actual}"
    )]
    StaleValue {
        node: NodeRef,
        property: String,
        expected: Value,
        actual: Value,
    },

    /// A commit phase failed against the tree; the transaction was rolled
    /// back.
    #[error(transparent)]
    Tree(#[from] TreeError),
}

impl SessionError {
    /// The ref of the affected node, when the failure names one.
    pub fn node(&self) -> Option<&NodeRef> {
        match self {
            SessionError::NodeExists { node, .. }
            | SessionError::NodeNotFound(node)
            | SessionError::StaleValue { node, .. } => Some(node),
            SessionError::Tree(TreeError::NodeNotFound(node))
            | SessionError::Tree(TreeError::NodeExists(node))
            | SessionError::Tree(TreeError::NotAChild { node, .. })
            | SessionError::Tree(TreeError::HasDependents { node, .. }) => Some(node),
            _ => None,
        }
    }
}

/// Convenience alias for engine results.
pub type SessionResult<T> = Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn affected_node_is_surfaced() {
        let error = SessionError::NodeNotFound(NodeRef::from("n1"));
        assert_eq!(error.node(), Some(&NodeRef::from("n1")));

        let error = SessionError::Tree(TreeError::HasDependents {
            node: NodeRef::from("n1"),
            dependent: NodeRef::from("n2"),
        });
        assert_eq!(error.node(), Some(&NodeRef::from("n1")));

        assert_eq!(SessionError::NoActiveTransaction.node(), None);
    }
}
