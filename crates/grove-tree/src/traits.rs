use grove_types::{CreationRecord, DataType, NodeRef, PropertyBundle, Value};

use crate::error::TreeResult;
use crate::node::Node;

/// The tree capability the transaction engine drives.
///
/// Implementations own node storage and structural links; property access is
/// dispatched through the implementation's helper registry so unknown names
/// fail the same way everywhere. Indices in this trait are always persisted
/// indices: positions among same-type siblings, with any synthetic leading
/// children excluded.
pub trait SessionTree {
    /// Ref of the tree root.
    fn root(&self) -> NodeRef;

    /// Type tag of the tree root.
    fn root_type(&self) -> String;

    /// Look up a node by ref, whether attached or not.
    fn node(&self, node_ref: &NodeRef) -> Option<&Node>;

    /// Whether the ref resolves to a node reachable from the root.
    fn is_attached(&self, node_ref: &NodeRef) -> bool;

    /// Parent ref of an attached node; `None` for the root or for
    /// unreachable refs.
    fn parent(&self, node_ref: &NodeRef) -> Option<NodeRef>;

    /// Ordered children of an attached node.
    fn children(&self, parent: &NodeRef) -> Vec<NodeRef>;

    /// Ordered children of an attached node, filtered by type tag.
    fn children_of_type(&self, parent: &NodeRef, type_name: &str) -> Vec<NodeRef>;

    /// Persisted sibling index of an attached child.
    fn persisted_index(&self, child: &NodeRef) -> Option<usize>;

    /// Read one named property of an attached node.
    fn get_property(&self, node_ref: &NodeRef, property: &str) -> TreeResult<Value>;

    /// Write one named property of an attached node, returning the prior
    /// value (`Null` when it was never set).
    fn set_property(
        &mut self,
        node_ref: &NodeRef,
        property: &str,
        data_type: DataType,
        value: Value,
    ) -> TreeResult<Value>;

    /// Attach a freshly constructed node under `parent` at the given
    /// persisted index.
    fn attach(&mut self, parent: &NodeRef, node: Node, index: usize) -> TreeResult<()>;

    /// Re-attach a previously detached node at the given persisted index.
    /// Used by rollback to reverse a committed removal.
    fn reattach(&mut self, parent: &NodeRef, child: &NodeRef, index: usize) -> TreeResult<()>;

    /// Detach a child from its parent, returning its pre-removal persisted
    /// index. Fails when another attached node holds a reference into the
    /// detached subtree.
    fn detach(&mut self, parent: &NodeRef, child: &NodeRef) -> TreeResult<usize>;

    /// Refresh the root node in place from a creation record, consuming the
    /// root's constructor properties from the bundle. Covers the case where
    /// a whole session is re-persisted over an already materialized root.
    fn refresh_root(
        &mut self,
        record: &CreationRecord,
        bundle: &mut PropertyBundle,
    ) -> TreeResult<()>;

    /// Suppress change notifications until the matching [`end_batch`] call.
    /// Batches nest.
    ///
    /// [`end_batch`]: SessionTree::end_batch
    fn begin_batch(&mut self);

    /// Re-enable change notifications suppressed by [`begin_batch`].
    ///
    /// [`begin_batch`]: SessionTree::begin_batch
    fn end_batch(&mut self);

    /// Whether change notifications are currently enabled.
    fn magic_enabled(&self) -> bool;
}
