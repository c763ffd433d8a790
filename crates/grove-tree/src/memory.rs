use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use grove_types::{CreationRecord, DataType, NodeRef, PropertyBundle, Value};

use crate::error::{TreeError, TreeResult};
use crate::event::TreeEvent;
use crate::node::Node;
use crate::schema::Schema;
use crate::traits::SessionTree;

/// In-memory session tree for tests, local sessions, and embedding.
///
/// Nodes live in an arena keyed by ref. Detaching a node unlinks it from its
/// parent but keeps its subtree intact in the arena, so a later rollback can
/// re-attach it without rebuilding anything.
pub struct MemoryTree {
    schema: Arc<Schema>,
    root: NodeRef,
    root_type: String,
    slots: HashMap<NodeRef, Slot>,
    magic_suppressed: u32,
    events: Vec<TreeEvent>,
}

struct Slot {
    node: Node,
    parent: Option<NodeRef>,
    children: Vec<NodeRef>,
}

impl MemoryTree {
    /// Create a tree holding only a root node of `root_type`.
    pub fn new(schema: Arc<Schema>, root_type: impl Into<String>, root: NodeRef) -> Self {
        let root_type = root_type.into();
        let mut slots = HashMap::new();
        slots.insert(
            root.clone(),
            Slot {
                node: Node::new(root.clone(), root_type.clone()),
                parent: None,
                children: Vec::new(),
            },
        );
        Self {
            schema,
            root,
            root_type,
            slots,
            magic_suppressed: 0,
            events: Vec::new(),
        }
    }

    /// The schema this tree dispatches property access through.
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Take all recorded change events.
    pub fn drain_events(&mut self) -> Vec<TreeEvent> {
        std::mem::take(&mut self.events)
    }

    fn slot(&self, node_ref: &NodeRef) -> TreeResult<&Slot> {
        self.slots
            .get(node_ref)
            .ok_or_else(|| TreeError::NodeNotFound(node_ref.clone()))
    }

    fn attached_slot(&self, node_ref: &NodeRef) -> TreeResult<&Slot> {
        if !self.is_attached(node_ref) {
            return Err(TreeError::NodeNotFound(node_ref.clone()));
        }
        self.slot(node_ref)
    }

    fn record_event(&mut self, event: TreeEvent) {
        if self.magic_suppressed == 0 {
            self.events.push(event);
        }
    }

    /// Refs of `node_ref` and every descendant still linked below it.
    fn subtree(&self, node_ref: &NodeRef) -> Vec<NodeRef> {
        let mut out = vec![node_ref.clone()];
        let mut queue = vec![node_ref.clone()];
        while let Some(current) = queue.pop() {
            if let Some(slot) = self.slots.get(&current) {
                for child in &slot.children {
                    out.push(child.clone());
                    queue.push(child.clone());
                }
            }
        }
        out
    }

    /// First attached node outside `subtree` holding a reference into it.
    fn find_dependent(&self, subtree: &[NodeRef]) -> Option<NodeRef> {
        let members: HashSet<&NodeRef> = subtree.iter().collect();
        for (node_ref, slot) in &self.slots {
            if members.contains(node_ref) || !self.is_attached(node_ref) {
                continue;
            }
            for (_, value) in slot.node.properties() {
                if let Some(target) = value.as_reference() {
                    if members.contains(target) {
                        return Some(node_ref.clone());
                    }
                }
            }
        }
        None
    }

    /// Translate a persisted index into an insertion position in the
    /// parent's full child list.
    fn insertion_position(
        &self,
        parent: &Slot,
        child_type: &str,
        persisted_index: usize,
    ) -> usize {
        let offset = self
            .schema
            .position_offset(parent.node.type_name(), child_type);
        let target = persisted_index + offset;

        let mut same_type_seen = 0;
        for (position, child_ref) in parent.children.iter().enumerate() {
            let is_same_type = self
                .slots
                .get(child_ref)
                .map(|slot| slot.node.type_name() == child_type)
                .unwrap_or(false);
            if is_same_type {
                if same_type_seen == target {
                    return position;
                }
                same_type_seen += 1;
            }
        }
        parent.children.len()
    }

    fn link_child(
        &mut self,
        parent_ref: &NodeRef,
        child_ref: &NodeRef,
        child_type: &str,
        persisted_index: usize,
    ) -> TreeResult<()> {
        let parent_type = self.attached_slot(parent_ref)?.node.type_name().to_string();
        if !self.schema.allows_child(&parent_type, child_type)? {
            return Err(TreeError::DisallowedChildType {
                parent_type,
                child_type: child_type.to_string(),
            });
        }

        let position = {
            let parent = self.slot(parent_ref)?;
            self.insertion_position(parent, child_type, persisted_index)
        };

        let parent = self
            .slots
            .get_mut(parent_ref)
            .ok_or_else(|| TreeError::NodeNotFound(parent_ref.clone()))?;
        parent.children.insert(position, child_ref.clone());

        let child = self
            .slots
            .get_mut(child_ref)
            .ok_or_else(|| TreeError::NodeNotFound(child_ref.clone()))?;
        child.parent = Some(parent_ref.clone());

        self.record_event(TreeEvent::ChildAdded {
            parent: parent_ref.clone(),
            child: child_ref.clone(),
            index: persisted_index,
        });
        Ok(())
    }
}

impl SessionTree for MemoryTree {
    fn root(&self) -> NodeRef {
        self.root.clone()
    }

    fn root_type(&self) -> String {
        self.root_type.clone()
    }

    fn node(&self, node_ref: &NodeRef) -> Option<&Node> {
        self.slots.get(node_ref).map(|slot| &slot.node)
    }

    fn is_attached(&self, node_ref: &NodeRef) -> bool {
        let mut current = node_ref.clone();
        let mut hops = 0usize;
        loop {
            if current == self.root {
                return true;
            }
            match self.slots.get(&current).and_then(|s| s.parent.clone()) {
                Some(parent) => current = parent,
                None => return false,
            }
            // A cycle would mean corrupted links; bail out instead of spinning.
            hops += 1;
            if hops > self.slots.len() {
                return false;
            }
        }
    }

    fn parent(&self, node_ref: &NodeRef) -> Option<NodeRef> {
        if !self.is_attached(node_ref) {
            return None;
        }
        self.slots.get(node_ref).and_then(|s| s.parent.clone())
    }

    fn children(&self, parent: &NodeRef) -> Vec<NodeRef> {
        self.slots
            .get(parent)
            .map(|s| s.children.clone())
            .unwrap_or_default()
    }

    fn children_of_type(&self, parent: &NodeRef, type_name: &str) -> Vec<NodeRef> {
        self.children(parent)
            .into_iter()
            .filter(|child| {
                self.slots
                    .get(child)
                    .map(|s| s.node.type_name() == type_name)
                    .unwrap_or(false)
            })
            .collect()
    }

    fn persisted_index(&self, child: &NodeRef) -> Option<usize> {
        let parent_ref = self.parent(child)?;
        let parent = self.slots.get(&parent_ref)?;
        let child_type = self.slots.get(child)?.node.type_name().to_string();

        let type_position = parent
            .children
            .iter()
            .filter(|sibling| {
                self.slots
                    .get(sibling)
                    .map(|s| s.node.type_name() == child_type)
                    .unwrap_or(false)
            })
            .position(|sibling| sibling == child)?;

        let offset = self
            .schema
            .position_offset(parent.node.type_name(), &child_type);
        Some(type_position.saturating_sub(offset))
    }

    fn get_property(&self, node_ref: &NodeRef, property: &str) -> TreeResult<Value> {
        let slot = self.attached_slot(node_ref)?;
        self.schema.get_property(&slot.node, property)
    }

    fn set_property(
        &mut self,
        node_ref: &NodeRef,
        property: &str,
        data_type: DataType,
        value: Value,
    ) -> TreeResult<Value> {
        if !self.is_attached(node_ref) {
            return Err(TreeError::NodeNotFound(node_ref.clone()));
        }
        let schema = Arc::clone(&self.schema);
        let slot = self
            .slots
            .get_mut(node_ref)
            .ok_or_else(|| TreeError::NodeNotFound(node_ref.clone()))?;
        let prior = schema
            .set_property(&mut slot.node, property, data_type, value.clone())?
            .unwrap_or(Value::Null);
        self.record_event(TreeEvent::PropertyChanged {
            node: node_ref.clone(),
            property: property.to_string(),
            new_value: value,
        });
        Ok(prior)
    }

    fn attach(&mut self, parent: &NodeRef, node: Node, index: usize) -> TreeResult<()> {
        let node_ref = node.node_ref().clone();
        if self.is_attached(&node_ref) {
            return Err(TreeError::NodeExists(node_ref));
        }
        let type_name = node.type_name().to_string();
        self.slots.insert(
            node_ref.clone(),
            Slot {
                node,
                parent: None,
                children: Vec::new(),
            },
        );
        if let Err(error) = self.link_child(parent, &node_ref, &type_name, index) {
            self.slots.remove(&node_ref);
            return Err(error);
        }
        Ok(())
    }

    fn reattach(&mut self, parent: &NodeRef, child: &NodeRef, index: usize) -> TreeResult<()> {
        if self.is_attached(child) {
            return Err(TreeError::NodeExists(child.clone()));
        }
        let type_name = self.slot(child)?.node.type_name().to_string();
        self.link_child(parent, child, &type_name, index)
    }

    fn detach(&mut self, parent: &NodeRef, child: &NodeRef) -> TreeResult<usize> {
        let child_slot = self.attached_slot(child)?;
        if child_slot.parent.as_ref() != Some(parent) {
            return Err(TreeError::NotAChild {
                node: child.clone(),
                parent: parent.clone(),
            });
        }

        let subtree = self.subtree(child);
        if let Some(dependent) = self.find_dependent(&subtree) {
            return Err(TreeError::HasDependents {
                node: child.clone(),
                dependent,
            });
        }

        let index = self
            .persisted_index(child)
            .ok_or_else(|| TreeError::NodeNotFound(child.clone()))?;

        if let Some(parent_slot) = self.slots.get_mut(parent) {
            parent_slot.children.retain(|c| c != child);
        }
        if let Some(child_slot) = self.slots.get_mut(child) {
            child_slot.parent = None;
        }

        self.record_event(TreeEvent::ChildRemoved {
            parent: parent.clone(),
            child: child.clone(),
            index,
        });
        Ok(index)
    }

    fn refresh_root(
        &mut self,
        record: &CreationRecord,
        bundle: &mut PropertyBundle,
    ) -> TreeResult<()> {
        if record.type_name != self.root_type {
            return Err(TreeError::UnknownType(record.type_name.clone()));
        }

        let old_root = self.root.clone();
        if record.node != old_root {
            let mut slot = self
                .slots
                .remove(&old_root)
                .ok_or_else(|| TreeError::NodeNotFound(old_root.clone()))?;
            slot.node.set_node_ref(record.node.clone());
            let children = slot.children.clone();
            self.slots.insert(record.node.clone(), slot);
            for child in children {
                if let Some(child_slot) = self.slots.get_mut(&child) {
                    child_slot.parent = Some(record.node.clone());
                }
            }
            self.root = record.node.clone();
        }

        let refreshed = self.schema.construct(record, bundle)?;
        let slot = self
            .slots
            .get_mut(&self.root)
            .ok_or_else(|| TreeError::NodeNotFound(self.root.clone()))?;
        for (name, value) in refreshed.properties() {
            slot.node.set_property(name, value.clone());
        }
        Ok(())
    }

    fn begin_batch(&mut self) {
        self.magic_suppressed += 1;
    }

    fn end_batch(&mut self) {
        self.magic_suppressed = self.magic_suppressed.saturating_sub(1);
    }

    fn magic_enabled(&self) -> bool {
        self.magic_suppressed == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::TypeDescriptor;
    use grove_types::PropertyChange;

    fn schema() -> Arc<Schema> {
        let mut schema = Schema::new();
        schema
            .register(
                TypeDescriptor::new("Session")
                    .with_properties(["name"])
                    .with_constructor_properties(["name"])
                    .with_child_types(["Folder", "Link"]),
            )
            .register(
                TypeDescriptor::new("Folder")
                    .with_properties(["name"])
                    .with_child_types(["Report", "Page"])
                    .with_child_offset("Page", 1),
            )
            .register(TypeDescriptor::new("Report").with_properties(["name"]))
            .register(TypeDescriptor::new("Page").with_properties(["name"]))
            .register(TypeDescriptor::new("Link").with_properties(["name", "target"]));
        Arc::new(schema)
    }

    fn tree() -> MemoryTree {
        MemoryTree::new(schema(), "Session", NodeRef::from("root"))
    }

    fn folder(tree: &mut MemoryTree, name: &str) -> NodeRef {
        let node_ref = NodeRef::from(name);
        let node = Node::new(node_ref.clone(), "Folder");
        tree.attach(&tree.root(), node, 0).unwrap();
        node_ref
    }

    #[test]
    fn attach_and_resolve() {
        let mut tree = tree();
        let f = folder(&mut tree, "f1");
        assert!(tree.is_attached(&f));
        assert_eq!(tree.parent(&f), Some(tree.root()));
        assert_eq!(tree.children(&tree.root()), vec![f]);
    }

    #[test]
    fn attach_rejects_duplicate_ref() {
        let mut tree = tree();
        folder(&mut tree, "f1");
        let duplicate = Node::new(NodeRef::from("f1"), "Folder");
        let error = tree.attach(&tree.root(), duplicate, 0).unwrap_err();
        assert_eq!(error, TreeError::NodeExists(NodeRef::from("f1")));
    }

    #[test]
    fn attach_rejects_disallowed_child_type() {
        let mut tree = tree();
        let report = Node::new(NodeRef::from("r1"), "Report");
        let error = tree.attach(&tree.root(), report, 0).unwrap_err();
        assert!(matches!(error, TreeError::DisallowedChildType { .. }));
    }

    #[test]
    fn detach_keeps_subtree_and_reattach_restores_it() {
        let mut tree = tree();
        let f = folder(&mut tree, "f1");
        let page = Node::new(NodeRef::from("p1"), "Page");
        tree.attach(&f, page, 0).unwrap();

        let index = tree.detach(&tree.root(), &f).unwrap();
        assert_eq!(index, 0);
        assert!(!tree.is_attached(&f));
        assert!(!tree.is_attached(&NodeRef::from("p1")));
        assert!(tree.node(&NodeRef::from("p1")).is_some());

        tree.reattach(&tree.root(), &f, index).unwrap();
        assert!(tree.is_attached(&NodeRef::from("p1")));
    }

    #[test]
    fn detach_refuses_when_referenced() {
        let mut tree = tree();
        let f = folder(&mut tree, "f1");
        let link = Node::new(NodeRef::from("l1"), "Link");
        tree.attach(&tree.root(), link, 0).unwrap();
        tree.set_property(
            &NodeRef::from("l1"),
            "target",
            DataType::Reference,
            Value::Reference(f.clone()),
        )
        .unwrap();

        let error = tree.detach(&tree.root(), &f).unwrap_err();
        assert!(matches!(error, TreeError::HasDependents { .. }));
    }

    #[test]
    fn persisted_index_skips_synthetic_children() {
        let mut tree = tree();
        let f = folder(&mut tree, "f1");
        // First page under a Folder is synthetic (offset 1): persisted
        // index 0 lands after it.
        let synthetic = Node::new(NodeRef::from("p0"), "Page");
        tree.attach(&f, synthetic, 0).unwrap();
        let page = Node::new(NodeRef::from("p1"), "Page");
        tree.attach(&f, page, 0).unwrap();

        assert_eq!(tree.persisted_index(&NodeRef::from("p1")), Some(0));
        assert_eq!(
            tree.children_of_type(&f, "Page"),
            vec![NodeRef::from("p0"), NodeRef::from("p1")]
        );
    }

    #[test]
    fn sibling_order_follows_persisted_indices() {
        let mut tree = tree();
        let f = folder(&mut tree, "f1");
        tree.attach(&f, Node::new(NodeRef::from("r2"), "Report"), 0)
            .unwrap();
        tree.attach(&f, Node::new(NodeRef::from("r1"), "Report"), 0)
            .unwrap();
        tree.attach(&f, Node::new(NodeRef::from("r3"), "Report"), 2)
            .unwrap();

        assert_eq!(
            tree.children_of_type(&f, "Report"),
            vec![
                NodeRef::from("r1"),
                NodeRef::from("r2"),
                NodeRef::from("r3")
            ]
        );
    }

    #[test]
    fn property_access_requires_attachment() {
        let mut tree = tree();
        let f = folder(&mut tree, "f1");
        tree.detach(&tree.root(), &f).unwrap();
        let error = tree.get_property(&f, "name").unwrap_err();
        assert_eq!(error, TreeError::NodeNotFound(f));
    }

    #[test]
    fn events_are_suppressed_inside_batches() {
        let mut tree = tree();
        folder(&mut tree, "f1");
        assert_eq!(tree.drain_events().len(), 1);

        tree.begin_batch();
        folder(&mut tree, "f2");
        tree.end_batch();
        assert!(tree.drain_events().is_empty());
        assert!(tree.magic_enabled());
    }

    #[test]
    fn refresh_root_rekeys_and_applies_constructor_properties() {
        let mut tree = tree();
        let f = folder(&mut tree, "f1");

        let record = CreationRecord::new(None, "Session", NodeRef::from("root2"), 0);
        let mut bundle = PropertyBundle::new();
        bundle.push(PropertyChange::unconditional(
            NodeRef::from("root2"),
            "name",
            DataType::String,
            Value::from("refreshed"),
        ));

        tree.refresh_root(&record, &mut bundle).unwrap();
        assert_eq!(tree.root(), NodeRef::from("root2"));
        assert_eq!(tree.parent(&f), Some(NodeRef::from("root2")));
        assert_eq!(
            tree.get_property(&NodeRef::from("root2"), "name").unwrap(),
            Value::from("refreshed")
        );
        assert!(bundle.is_empty());
    }
}
