//! Error types for tree operations.

use grove_types::{NodeRef, TypeError};
use thiserror::Error;

/// Errors that can occur while inspecting or mutating the object tree.
#[derive(Debug, Error, PartialEq)]
pub enum TreeError {
    /// The ref does not resolve to a reachable node.
    #[error("node not found: {0}")]
    NodeNotFound(NodeRef),

    /// A node with this ref is already attached.
    #[error("node already exists: {0}")]
    NodeExists(NodeRef),

    /// The node is not a child of the named parent.
    #[error("node {node} is not a child of {parent}")]
    NotAChild { node: NodeRef, parent: NodeRef },

    /// Another attached node holds a reference into the subtree being
    /// detached.
    #[error("node {node} cannot be removed: {dependent} depends on it")]
    HasDependents { node: NodeRef, dependent: NodeRef },

    /// No descriptor is registered for this type tag.
    #[error("unknown node type: {0}")]
    UnknownType(String),

    /// The property is not declared by the type or any of its supertypes.
    #[error("type {type_name} has no persistable property {property:?}")]
    UnknownProperty {
        type_name: String,
        property: String,
    },

    /// The type is not an allowed child of the named parent type.
    #[error("type {child_type} is not an allowed child of {parent_type}")]
    DisallowedChildType {
        parent_type: String,
        child_type: String,
    },

    /// A value did not match its declared data type.
    #[error(transparent)]
    Type(#[from] TypeError),
}

/// Convenience alias for tree results.
pub type TreeResult<T> = Result<T, TreeError>;
