//! Commit-order comparators.
//!
//! A single transaction may buffer a whole subtree of creations, or a mixed
//! bag of removals, in whatever order the caller happened to make its calls.
//! These comparators impose the tree-consistent application order: parents
//! attach before their children, with cross-type sibling order taken from
//! the schema's canonical child-type lists; removals run deepest-first so no
//! removal ever targets a node whose ancestor is already gone.
//!
//! Both functions are total orders over their inputs, falling back to raw
//! ref order so sorting is deterministic.

use std::cmp::Ordering;
use std::collections::HashSet;

use grove_tree::{Schema, SessionTree};
use grove_types::{CreationRecord, NodeRef};

/// Application order for buffered creations.
///
/// Parentless records sort first. Records under the same parent with the
/// same type sort by their own persisted index. Everything else is decided
/// by walking the two ancestor chains (through other pending creations
/// first, falling back to the live tree) until they diverge and comparing
/// the diverging pair by schema child-type rank, then index. A chain that is
/// a prefix of the other sorts first: ancestors attach before descendants.
pub fn creation_order<T: SessionTree>(
    a: &CreationRecord,
    b: &CreationRecord,
    pending: &[CreationRecord],
    tree: &T,
    schema: &Schema,
) -> Ordering {
    if a.node == b.node {
        return Ordering::Equal;
    }

    match (&a.parent, &b.parent) {
        (None, Some(_)) => return Ordering::Less,
        (Some(_), None) => return Ordering::Greater,
        (None, None) => {
            return a
                .index
                .cmp(&b.index)
                .then_with(|| a.node.cmp(&b.node));
        }
        (Some(_), Some(_)) => {}
    }

    if a.parent == b.parent && a.type_name == b.type_name {
        return a
            .index
            .cmp(&b.index)
            .then_with(|| a.node.cmp(&b.node));
    }

    let chain_a = pending_chain(&a.node, pending, tree);
    let chain_b = pending_chain(&b.node, pending, tree);
    compare_chains(&chain_a, &chain_b, pending, tree, schema)
        .then_with(|| a.node.cmp(&b.node))
}

/// Application order for buffered removals.
///
/// Refs that no longer resolve sort first, among themselves by raw ref
/// order. Live refs sort deepest-first along ancestor/descendant lines, so
/// committing in this order never detaches a node before its buffered
/// descendants; unrelated refs compare by sibling position where their live
/// ancestor chains diverge.
pub fn removal_order<T: SessionTree>(a: &NodeRef, b: &NodeRef, tree: &T) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }

    match (tree.is_attached(a), tree.is_attached(b)) {
        (false, false) => return a.cmp(b),
        (false, true) => return Ordering::Less,
        (true, false) => return Ordering::Greater,
        (true, true) => {}
    }

    let chain_a = live_chain(a, tree);
    let chain_b = live_chain(b, tree);

    let common = chain_a
        .iter()
        .zip(chain_b.iter())
        .take_while(|(x, y)| x == y)
        .count();

    if common == chain_a.len() || common == chain_b.len() {
        // Ancestor/descendant pair: the deeper node is removed first.
        return chain_b.len().cmp(&chain_a.len()).then_with(|| a.cmp(b));
    }

    let x = &chain_a[common];
    let y = &chain_b[common];
    let siblings = tree.children(&chain_a[common - 1]);
    let position = |node: &NodeRef| siblings.iter().position(|c| c == node).unwrap_or(usize::MAX);
    position(x).cmp(&position(y)).then_with(|| a.cmp(b))
}

/// Ancestor chain from the root-most known ancestor down to `node`,
/// preferring pending creation records over the live tree so chains work
/// for nodes that do not exist yet.
fn pending_chain<T: SessionTree>(
    node: &NodeRef,
    pending: &[CreationRecord],
    tree: &T,
) -> Vec<NodeRef> {
    let mut chain = vec![node.clone()];
    let mut seen: HashSet<NodeRef> = chain.iter().cloned().collect();
    let mut current = node.clone();
    loop {
        let parent = match pending.iter().find(|c| c.node == current) {
            Some(record) => record.parent.clone(),
            None => tree.parent(&current),
        };
        match parent {
            Some(p) if seen.insert(p.clone()) => {
                chain.push(p.clone());
                current = p;
            }
            _ => break,
        }
    }
    chain.reverse();
    chain
}

fn live_chain<T: SessionTree>(node: &NodeRef, tree: &T) -> Vec<NodeRef> {
    let mut chain = vec![node.clone()];
    let mut current = node.clone();
    while let Some(parent) = tree.parent(&current) {
        chain.push(parent.clone());
        current = parent;
    }
    chain.reverse();
    chain
}

fn compare_chains<T: SessionTree>(
    chain_a: &[NodeRef],
    chain_b: &[NodeRef],
    pending: &[CreationRecord],
    tree: &T,
    schema: &Schema,
) -> Ordering {
    let common = chain_a
        .iter()
        .zip(chain_b.iter())
        .take_while(|(x, y)| x == y)
        .count();

    if common == chain_a.len() || common == chain_b.len() {
        // Prefix: the shorter chain's record is an ancestor and attaches
        // first.
        return chain_a.len().cmp(&chain_b.len());
    }

    let x = &chain_a[common];
    let y = &chain_b[common];
    let parent_type = if common == 0 {
        None
    } else {
        node_type(&chain_a[common - 1], pending, tree)
    };

    let key = |node: &NodeRef| sibling_key(node, parent_type.as_deref(), pending, tree, schema);
    key(x).cmp(&key(y))
}

/// (child-type rank, persisted index, ref) for one diverging ancestor.
fn sibling_key<T: SessionTree>(
    node: &NodeRef,
    parent_type: Option<&str>,
    pending: &[CreationRecord],
    tree: &T,
    schema: &Schema,
) -> (usize, usize, NodeRef) {
    let record = pending.iter().find(|c| &c.node == node);

    let type_name = record
        .map(|r| r.type_name.clone())
        .or_else(|| node_type(node, pending, tree));

    let rank = match (parent_type, &type_name) {
        (Some(parent), Some(child)) => schema
            .child_type_rank(parent, child)
            .unwrap_or(usize::MAX),
        _ => 0,
    };

    let index = record
        .map(|r| r.index)
        .or_else(|| tree.persisted_index(node))
        .unwrap_or(0);

    (rank, index, node.clone())
}

fn node_type<T: SessionTree>(
    node: &NodeRef,
    pending: &[CreationRecord],
    tree: &T,
) -> Option<String> {
    pending
        .iter()
        .find(|c| &c.node == node)
        .map(|c| c.type_name.clone())
        .or_else(|| tree.node(node).map(|n| n.type_name().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use grove_tree::{MemoryTree, Node, TypeDescriptor};
    use proptest::prelude::*;

    fn schema() -> Arc<Schema> {
        let mut schema = Schema::new();
        schema
            .register(
                TypeDescriptor::new("Session").with_child_types(["Folder"]),
            )
            .register(
                TypeDescriptor::new("Folder")
                    .with_child_types(["Report", "Page", "Folder"]),
            )
            .register(TypeDescriptor::new("Report"))
            .register(TypeDescriptor::new("Page"));
        Arc::new(schema)
    }

    fn tree() -> MemoryTree {
        MemoryTree::new(schema(), "Session", NodeRef::from("root"))
    }

    fn creation(parent: Option<&str>, type_name: &str, node: &str, index: usize) -> CreationRecord {
        CreationRecord::new(
            parent.map(NodeRef::from),
            type_name,
            NodeRef::from(node),
            index,
        )
    }

    fn sort(records: &mut Vec<CreationRecord>, tree: &MemoryTree) {
        let pending = records.clone();
        let schema = Arc::clone(tree.schema());
        records.sort_by(|a, b| creation_order(a, b, &pending, tree, &schema));
    }

    fn refs(records: &[CreationRecord]) -> Vec<&str> {
        records.iter().map(|r| r.node.as_str()).collect()
    }

    #[test]
    fn parents_sort_before_children() {
        let tree = tree();
        let mut records = vec![
            creation(Some("f1"), "Page", "p1", 0),
            creation(Some("root"), "Folder", "f1", 0),
        ];
        sort(&mut records, &tree);
        assert_eq!(refs(&records), vec!["f1", "p1"]);
    }

    #[test]
    fn parentless_records_sort_first() {
        let tree = tree();
        let mut records = vec![
            creation(Some("root"), "Folder", "f1", 0),
            creation(None, "Session", "root2", 0),
        ];
        sort(&mut records, &tree);
        assert_eq!(refs(&records), vec!["root2", "f1"]);
    }

    #[test]
    fn same_type_siblings_sort_by_index() {
        let tree = tree();
        let mut records = vec![
            creation(Some("root"), "Folder", "b", 1),
            creation(Some("root"), "Folder", "a", 0),
            creation(Some("root"), "Folder", "c", 2),
        ];
        sort(&mut records, &tree);
        assert_eq!(refs(&records), vec!["a", "b", "c"]);
    }

    #[test]
    fn cross_type_siblings_sort_by_schema_rank() {
        let tree = tree();
        // Folder declares Report before Page, whatever the indices say.
        let mut records = vec![
            creation(Some("root"), "Folder", "f1", 0),
            creation(Some("f1"), "Page", "p1", 0),
            creation(Some("f1"), "Report", "r1", 5),
        ];
        sort(&mut records, &tree);
        assert_eq!(refs(&records), vec!["f1", "r1", "p1"]);
    }

    #[test]
    fn divergence_below_live_ancestors_is_ordered() {
        let mut tree = tree();
        tree.attach(&tree.root(), Node::new(NodeRef::from("f1"), "Folder"), 0)
            .unwrap();
        tree.attach(&tree.root(), Node::new(NodeRef::from("f2"), "Folder"), 1)
            .unwrap();

        // Pending nodes under two different live folders: order follows the
        // folders' sibling positions.
        let mut records = vec![
            creation(Some("f2"), "Page", "p2", 0),
            creation(Some("f1"), "Page", "p1", 0),
        ];
        sort(&mut records, &tree);
        assert_eq!(refs(&records), vec!["p1", "p2"]);
    }

    #[test]
    fn removal_order_is_deepest_first() {
        let mut tree = tree();
        tree.attach(&tree.root(), Node::new(NodeRef::from("f1"), "Folder"), 0)
            .unwrap();
        tree.attach(&NodeRef::from("f1"), Node::new(NodeRef::from("p1"), "Page"), 0)
            .unwrap();

        let mut refs = vec![NodeRef::from("f1"), NodeRef::from("p1")];
        refs.sort_by(|a, b| removal_order(a, b, &tree));
        assert_eq!(refs, vec![NodeRef::from("p1"), NodeRef::from("f1")]);
    }

    #[test]
    fn removal_order_puts_unresolvable_refs_first() {
        let mut tree = tree();
        tree.attach(&tree.root(), Node::new(NodeRef::from("f1"), "Folder"), 0)
            .unwrap();

        let mut refs = vec![
            NodeRef::from("f1"),
            NodeRef::from("zz-gone"),
            NodeRef::from("aa-gone"),
        ];
        refs.sort_by(|a, b| removal_order(a, b, &tree));
        assert_eq!(
            refs,
            vec![
                NodeRef::from("aa-gone"),
                NodeRef::from("zz-gone"),
                NodeRef::from("f1")
            ]
        );
    }

    #[test]
    fn removal_order_siblings_by_position() {
        let mut tree = tree();
        tree.attach(&tree.root(), Node::new(NodeRef::from("f2"), "Folder"), 0)
            .unwrap();
        tree.attach(&tree.root(), Node::new(NodeRef::from("f1"), "Folder"), 0)
            .unwrap();

        let mut refs = vec![NodeRef::from("f2"), NodeRef::from("f1")];
        refs.sort_by(|a, b| removal_order(a, b, &tree));
        // f1 was inserted at position 0, ahead of f2.
        assert_eq!(refs, vec![NodeRef::from("f1"), NodeRef::from("f2")]);
    }

    /// root ── f1 ── f2 ── p1
    ///      └─ f3
    /// plus three refs that resolve to nothing.
    fn removal_universe() -> (MemoryTree, Vec<NodeRef>) {
        let mut tree = tree();
        tree.attach(&tree.root(), Node::new(NodeRef::from("f1"), "Folder"), 0)
            .unwrap();
        tree.attach(&tree.root(), Node::new(NodeRef::from("f3"), "Folder"), 1)
            .unwrap();
        tree.attach(&NodeRef::from("f1"), Node::new(NodeRef::from("f2"), "Folder"), 0)
            .unwrap();
        tree.attach(&NodeRef::from("f2"), Node::new(NodeRef::from("p1"), "Page"), 0)
            .unwrap();
        let refs = ["root", "f1", "f2", "f3", "p1", "gone-a", "gone-b", "gone-c"]
            .into_iter()
            .map(NodeRef::from)
            .collect();
        (tree, refs)
    }

    fn pending_fixture() -> Vec<CreationRecord> {
        vec![
            creation(Some("root"), "Folder", "f1", 0),
            creation(Some("root"), "Folder", "f2", 1),
            creation(Some("f1"), "Report", "r1", 0),
            creation(Some("f1"), "Page", "p1", 0),
            creation(Some("f1"), "Page", "p2", 1),
            creation(Some("f2"), "Folder", "f3", 0),
            creation(Some("f3"), "Page", "p3", 0),
        ]
    }

    proptest! {
        #[test]
        fn creation_sort_is_permutation_independent(
            shuffled in Just(pending_fixture()).prop_shuffle()
        ) {
            let tree = tree();
            let schema = Arc::clone(tree.schema());

            let mut canonical = pending_fixture();
            let pending = canonical.clone();
            canonical.sort_by(|a, b| creation_order(a, b, &pending, &tree, &schema));

            let mut sorted = shuffled.clone();
            let pending = shuffled;
            sorted.sort_by(|a, b| creation_order(a, b, &pending, &tree, &schema));

            prop_assert_eq!(sorted, canonical);
        }

        #[test]
        fn creation_order_is_antisymmetric(
            i in 0usize..7,
            j in 0usize..7,
        ) {
            let tree = tree();
            let schema = Arc::clone(tree.schema());
            let pending = pending_fixture();
            let a = &pending[i];
            let b = &pending[j];
            let forward = creation_order(a, b, &pending, &tree, &schema);
            let backward = creation_order(b, a, &pending, &tree, &schema);
            prop_assert_eq!(forward, backward.reverse());
        }

        #[test]
        fn removal_order_is_antisymmetric(
            i in 0usize..8,
            j in 0usize..8,
        ) {
            let (tree, refs) = removal_universe();
            let forward = removal_order(&refs[i], &refs[j], &tree);
            let backward = removal_order(&refs[j], &refs[i], &tree);
            prop_assert_eq!(forward, backward.reverse());
        }

        #[test]
        fn removal_order_is_transitive(
            i in 0usize..8,
            j in 0usize..8,
            k in 0usize..8,
        ) {
            let (tree, refs) = removal_universe();
            let ab = removal_order(&refs[i], &refs[j], &tree);
            let bc = removal_order(&refs[j], &refs[k], &tree);
            let ac = removal_order(&refs[i], &refs[k], &tree);
            if ab == bc {
                prop_assert_eq!(ac, ab);
            } else if ab == Ordering::Equal {
                prop_assert_eq!(ac, bc);
            } else if bc == Ordering::Equal {
                prop_assert_eq!(ac, ab);
            }
        }
    }
}
