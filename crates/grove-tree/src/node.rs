use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use grove_types::{NodeRef, Value};

/// One node of the session object tree: a ref, a type tag, and its property
/// map. Structural links (parent, children) are owned by the tree, not the
/// node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node {
    node_ref: NodeRef,
    type_name: String,
    properties: BTreeMap<String, Value>,
}

impl Node {
    pub fn new(node_ref: NodeRef, type_name: impl Into<String>) -> Self {
        Self {
            node_ref,
            type_name: type_name.into(),
            properties: BTreeMap::new(),
        }
    }

    pub fn node_ref(&self) -> &NodeRef {
        &self.node_ref
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Raw property read; `None` when the property has never been set.
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    /// Raw property write, returning the prior value. Callers outside tests
    /// should go through the schema so unknown names are rejected.
    pub fn set_property(&mut self, name: impl Into<String>, value: Value) -> Option<Value> {
        self.properties.insert(name.into(), value)
    }

    /// All set properties, name-ordered.
    pub fn properties(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.properties.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub(crate) fn set_node_ref(&mut self, node_ref: NodeRef) {
        self.node_ref = node_ref;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_property_returns_prior_value() {
        let mut node = Node::new(NodeRef::from("n"), "Folder");
        assert_eq!(node.set_property("name", Value::from("a")), None);
        assert_eq!(
            node.set_property("name", Value::from("b")),
            Some(Value::from("a"))
        );
        assert_eq!(node.property("name"), Some(&Value::from("b")));
    }

    #[test]
    fn unset_property_is_none() {
        let node = Node::new(NodeRef::from("n"), "Folder");
        assert_eq!(node.property("missing"), None);
    }
}
