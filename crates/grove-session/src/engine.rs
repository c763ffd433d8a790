//! The session persister: a transactional replicator for object trees.

use std::sync::Arc;
use std::thread::{self, ThreadId};

use tracing::{debug, error, warn};

use grove_tree::{Schema, SessionTree};
use grove_types::{
    CreationRecord, DataType, NodeRef, PersistedOperation, PropertyBundle, PropertyChange,
    RemovalRecord, Value,
};

use crate::error::{SessionError, SessionResult};
use crate::ordering::{creation_order, removal_order};
use crate::undo::UndoEntry;

/// Transactional persister applying buffered operations to a session tree.
///
/// Operations buffered between `begin` and the outermost `commit` are applied
/// in a fixed phase order: removals, then creations (comparator-sorted,
/// deferred types last), then property changes. Any failure during commit
/// rolls the tree back to its pre-transaction state and surfaces a single
/// error; rollback itself is best-effort and never fails.
///
/// The persister is single-writer: the first thread to call a mutating
/// method owns it, and calls from any other thread force a rollback and
/// fail.
pub struct SessionPersister<T: SessionTree> {
    tree: T,
    schema: Arc<Schema>,
    creations: Vec<CreationRecord>,
    properties: PropertyBundle,
    removals: Vec<RemovalRecord>,
    undo: Vec<UndoEntry>,
    txn_depth: u32,
    owner: Option<ThreadId>,
    rolling_back: bool,
    god_mode: bool,
}

impl<T: SessionTree> SessionPersister<T> {
    pub fn new(tree: T, schema: Arc<Schema>) -> Self {
        Self {
            tree,
            schema,
            creations: Vec::new(),
            properties: PropertyBundle::new(),
            removals: Vec::new(),
            undo: Vec::new(),
            txn_depth: 0,
            owner: None,
            rolling_back: false,
            god_mode: false,
        }
    }

    /// The tree this persister drives.
    pub fn tree(&self) -> &T {
        &self.tree
    }

    /// Mutable access to the tree, for edits made outside any transaction.
    pub fn tree_mut(&mut self) -> &mut T {
        &mut self.tree
    }

    /// Consume the persister, returning the tree.
    pub fn into_tree(self) -> T {
        self.tree
    }

    /// Current transaction nesting depth.
    pub fn txn_depth(&self) -> u32 {
        self.txn_depth
    }

    /// Whether no transaction is open and nothing is buffered.
    pub fn is_idle(&self) -> bool {
        self.txn_depth == 0
            && self.creations.is_empty()
            && self.properties.is_empty()
            && self.removals.is_empty()
    }

    /// When set, every property change is applied without expected-value
    /// validation. Used by trusted replay such as undo/redo, which already
    /// knows its old values are correct.
    pub fn set_god_mode(&mut self, god_mode: bool) {
        self.god_mode = god_mode;
    }

    pub fn god_mode(&self) -> bool {
        self.god_mode
    }

    /// Open a transaction. Transactions nest; only the outermost commit
    /// touches the tree.
    pub fn begin(&mut self) -> SessionResult<()> {
        self.check_owner()?;
        self.txn_depth += 1;
        debug!(depth = self.txn_depth, "transaction begin");
        Ok(())
    }

    /// Buffer the creation of a node of `type_name` under `parent` at the
    /// given persisted sibling index.
    pub fn persist_object(
        &mut self,
        parent: Option<NodeRef>,
        type_name: impl Into<String>,
        node: NodeRef,
        index: usize,
    ) -> SessionResult<()> {
        self.check_owner()?;
        if self.txn_depth == 0 {
            return Err(self.fail(SessionError::NoActiveTransaction));
        }

        // A ref that already names a node is only re-creatable when it is
        // the root type: re-persisting a whole session refreshes the root
        // instead of duplicating it.
        if let Some(existing) = self.existing_type(&node) {
            if existing != self.tree.root_type() {
                return Err(self.fail(SessionError::NodeExists {
                    node,
                    type_name: existing,
                }));
            }
        }

        let record = CreationRecord::new(parent, type_name, node, index);
        debug!(node = %record.node, type_name = %record.type_name, "buffer creation");
        self.creations.push(record);
        Ok(())
    }

    /// Buffer a conditional property change: the current value must equal
    /// `old_value` or the transaction fails.
    pub fn persist_property(
        &mut self,
        node: NodeRef,
        property: impl Into<String>,
        data_type: DataType,
        old_value: Value,
        new_value: Value,
    ) -> SessionResult<()> {
        let property = property.into();
        self.check_property_target(&node)?;

        if !self.god_mode {
            let actual = self.current_value(&node, &property)?;
            if actual != old_value {
                return Err(self.fail(SessionError::StaleValue {
                    node,
                    property,
                    expected: old_value,
                    actual,
                }));
            }
        }

        let mut change =
            PropertyChange::conditional(node, property, data_type, old_value, new_value);
        change.unconditional = self.god_mode;
        debug!(node = %change.node, property = %change.property, "buffer property change");
        self.properties.push(change);
        Ok(())
    }

    /// Buffer an unconditional property change.
    pub fn persist_property_unconditional(
        &mut self,
        node: NodeRef,
        property: impl Into<String>,
        data_type: DataType,
        new_value: Value,
    ) -> SessionResult<()> {
        self.check_property_target(&node)?;
        let change = PropertyChange::unconditional(node, property, data_type, new_value);
        debug!(node = %change.node, property = %change.property, "buffer property change");
        self.properties.push(change);
        Ok(())
    }

    /// Buffer the removal of `node` from `parent`.
    pub fn remove_object(&mut self, parent: NodeRef, node: NodeRef) -> SessionResult<()> {
        self.check_owner()?;
        if self.txn_depth == 0 {
            return Err(self.fail(SessionError::NoActiveTransaction));
        }
        if !self.exists(&node) {
            return Err(self.fail(SessionError::NodeNotFound(node)));
        }
        if !self.removals.iter().any(|r| r.node == node) {
            debug!(node = %node, "buffer removal");
            self.removals.push(RemovalRecord::new(node, parent));
        }
        Ok(())
    }

    /// Close the innermost transaction. The outermost commit applies every
    /// buffered operation to the tree, or rolls everything back and returns
    /// the failure.
    pub fn commit(&mut self) -> SessionResult<()> {
        self.check_owner()?;
        if self.txn_depth == 0 {
            return Err(self.fail(SessionError::NoActiveTransaction));
        }
        if self.txn_depth > 1 {
            self.txn_depth -= 1;
            debug!(depth = self.txn_depth, "nested commit");
            return Ok(());
        }

        self.tree.begin_batch();
        let result = self.apply();
        self.tree.end_batch();

        match result {
            Ok(()) => {
                self.creations.clear();
                self.properties.clear();
                self.removals.clear();
                self.undo.clear();
                self.txn_depth = 0;
                debug!("commit complete");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "commit failed; rolling back");
                self.rollback();
                Err(e)
            }
        }
    }

    /// Restore whatever the current commit has already applied, then clear
    /// all buffers. Best-effort: individual undo failures are logged and
    /// skipped so the persister always comes back to a clean, usable state.
    pub fn rollback(&mut self) {
        if self.rolling_back {
            return;
        }
        self.rolling_back = true;
        self.tree.begin_batch();

        while let Some(entry) = self.undo.pop() {
            match entry {
                UndoEntry::Property {
                    node,
                    property,
                    data_type,
                    prior,
                } => {
                    if let Err(e) = self.tree.set_property(&node, &property, data_type, prior) {
                        warn!(node = %node, property = %property, error = %e,
                            "rollback: property restore failed");
                    }
                }
                UndoEntry::Creation { parent, node } => {
                    if let Err(e) = self.tree.detach(&parent, &node) {
                        warn!(node = %node, error = %e, "rollback: detach of created node failed");
                    }
                }
                UndoEntry::Removal {
                    parent,
                    node,
                    index,
                } => {
                    if let Err(e) = self.tree.reattach(&parent, &node, index) {
                        warn!(node = %node, error = %e,
                            "rollback: re-attach of removed node failed");
                    }
                }
            }
        }

        self.tree.end_batch();
        self.creations.clear();
        self.properties.clear();
        self.removals.clear();
        self.txn_depth = 0;
        self.rolling_back = false;
        debug!("rollback complete");
    }

    /// Snapshot the buffers as transport operations, creations first, then
    /// property changes, then removals, each in buffer order.
    pub fn buffered_operations(&self) -> Vec<PersistedOperation> {
        let mut ops: Vec<PersistedOperation> = Vec::new();
        ops.extend(self.creations.iter().cloned().map(Into::into));
        ops.extend(self.properties.iter().cloned().map(Into::into));
        ops.extend(self.removals.iter().cloned().map(Into::into));
        ops
    }

    fn apply(&mut self) -> SessionResult<()> {
        self.undo.clear();
        self.commit_removals()?;
        self.commit_objects()?;
        self.commit_properties()?;
        Ok(())
    }

    fn commit_removals(&mut self) -> SessionResult<()> {
        let mut pending = self.removals.clone();
        pending.sort_by(|a, b| removal_order(&a.node, &b.node, &self.tree));

        for removal in pending {
            if !self.tree.is_attached(&removal.node) {
                return Err(SessionError::NodeNotFound(removal.node));
            }
            let parent = self
                .tree
                .parent(&removal.node)
                .ok_or_else(|| SessionError::NodeNotFound(removal.node.clone()))?;
            let index = self.tree.detach(&parent, &removal.node)?;
            debug!(node = %removal.node, index, "removal applied");
            self.undo.push(UndoEntry::Removal {
                parent,
                node: removal.node,
                index,
            });
        }
        Ok(())
    }

    fn commit_objects(&mut self) -> SessionResult<()> {
        let pending = self.creations.clone();
        let mut sorted = pending.clone();
        sorted.sort_by(|a, b| creation_order(a, b, &pending, &self.tree, &self.schema));

        // Deferred types resolve references to siblings created in the same
        // commit, so they always apply after everything else.
        let (normal, deferred): (Vec<_>, Vec<_>) = sorted
            .into_iter()
            .partition(|r| !self.schema.deferred_commit(&r.type_name));

        for record in normal.into_iter().chain(deferred) {
            if record.loaded {
                continue;
            }
            self.apply_creation(&record)?;
        }
        Ok(())
    }

    fn apply_creation(&mut self, record: &CreationRecord) -> SessionResult<()> {
        let parent = match &record.parent {
            Some(parent) if self.tree.is_attached(parent) => parent.clone(),
            unresolved => {
                // A parentless or orphaned record of the root type means the
                // whole session is being re-persisted over a live root. The
                // refresh rewrites the root in place and records no undo
                // entry, so a later phase failure rolls back every other
                // applied operation but leaves the refreshed root standing.
                if record.type_name == self.tree.root_type() {
                    self.tree.refresh_root(record, &mut self.properties)?;
                    debug!(node = %record.node, "root refreshed");
                    return Ok(());
                }
                let missing = unresolved.clone().unwrap_or_else(|| record.node.clone());
                return Err(SessionError::NodeNotFound(missing));
            }
        };

        let node = self.schema.construct(record, &mut self.properties)?;
        let sibling_count = self
            .tree
            .children_of_type(&parent, &record.type_name)
            .len();
        // Clamp against index drift between buffering time and commit time.
        let index = record.index.min(sibling_count);
        self.tree.attach(&parent, node, index)?;
        debug!(node = %record.node, parent = %parent, index, "creation applied");
        self.undo.push(UndoEntry::Creation {
            parent,
            node: record.node.clone(),
        });
        Ok(())
    }

    fn commit_properties(&mut self) -> SessionResult<()> {
        for node in self.properties.nodes() {
            if !self.tree.is_attached(&node) {
                // Buffer validation guaranteed existence; a vanished node
                // here means the tree changed under us.
                return Err(SessionError::NodeNotFound(node));
            }
            let changes: Vec<PropertyChange> = self
                .properties
                .changes_for(&node)
                .into_iter()
                .cloned()
                .collect();
            for change in changes {
                let prior = self.tree.set_property(
                    &node,
                    &change.property,
                    change.data_type,
                    change.new_value.clone(),
                )?;
                debug!(node = %node, property = %change.property, "property applied");
                self.undo.push(UndoEntry::Property {
                    node: node.clone(),
                    property: change.property,
                    data_type: change.data_type,
                    prior,
                });
            }
        }
        Ok(())
    }

    /// Common guards for both property entry points.
    fn check_property_target(&mut self, node: &NodeRef) -> SessionResult<()> {
        self.check_owner()?;
        if self.txn_depth == 0 {
            return Err(self.fail(SessionError::NoActiveTransaction));
        }
        if !self.exists(node) {
            return Err(self.fail(SessionError::NodeNotFound(node.clone())));
        }
        Ok(())
    }

    /// The value a conditional change must match: the latest buffered value
    /// for the property, else the live value, else `Null` for a node that
    /// only exists as a buffered creation.
    fn current_value(&mut self, node: &NodeRef, property: &str) -> SessionResult<Value> {
        if let Some(buffered) = self.properties.latest(node, property) {
            return Ok(buffered.clone());
        }
        if self.tree.is_attached(node) {
            match self.tree.get_property(node, property) {
                Ok(value) => Ok(value),
                Err(e) => Err(self.fail(SessionError::Tree(e))),
            }
        } else {
            Ok(Value::Null)
        }
    }

    /// A node exists when it is buffered for creation, or live and not
    /// buffered for removal.
    fn exists(&self, node: &NodeRef) -> bool {
        if self.creations.iter().any(|c| &c.node == node) {
            return true;
        }
        self.tree.is_attached(node) && !self.removals.iter().any(|r| &r.node == node)
    }

    /// Type tag of the node `ref` currently names, live or buffered.
    fn existing_type(&self, node: &NodeRef) -> Option<String> {
        if let Some(record) = self.creations.iter().find(|c| &c.node == node) {
            return Some(record.type_name.clone());
        }
        if self.tree.is_attached(node) {
            return self.tree.node(node).map(|n| n.type_name().to_string());
        }
        None
    }

    /// Roll back and pass the error through. Usage and validation failures
    /// abandon the whole transaction.
    fn fail(&mut self, error: SessionError) -> SessionError {
        self.rollback();
        error
    }

    /// First-caller-wins single-writer guard.
    fn check_owner(&mut self) -> SessionResult<()> {
        let current = thread::current().id();
        match self.owner {
            None => {
                self.owner = Some(current);
                Ok(())
            }
            Some(owner) if owner == current => Ok(()),
            Some(_) => {
                error!("session persister touched from a second thread");
                self.rollback();
                Err(SessionError::WrongThread)
            }
        }
    }
}
