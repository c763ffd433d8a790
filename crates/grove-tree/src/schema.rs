//! Type schema and persister-helper registry.
//!
//! Each concrete node type registers a [`TypeDescriptor`]: its supertype,
//! persistable property names, constructor properties, ordered allowed child
//! types, per-child position offsets, and whether its creations are deferred
//! to the end of a commit. The [`Schema`] dispatches property access and
//! construction by type tag, chaining to the supertype when a name is not
//! declared locally.

use std::collections::{BTreeMap, HashMap};

use grove_types::{CreationRecord, DataType, PropertyBundle, Value};

use crate::error::{TreeError, TreeResult};
use crate::node::Node;

/// The persistence contract of one node type.
#[derive(Clone, Debug, Default)]
pub struct TypeDescriptor {
    type_name: String,
    supertype: Option<String>,
    properties: Vec<String>,
    constructor_properties: Vec<String>,
    allowed_child_types: Vec<String>,
    child_offsets: BTreeMap<String, usize>,
    deferred_commit: bool,
}

impl TypeDescriptor {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            ..Self::default()
        }
    }

    /// Declare a persistable supertype whose properties this type inherits.
    pub fn with_supertype(mut self, supertype: impl Into<String>) -> Self {
        self.supertype = Some(supertype.into());
        self
    }

    /// Declare persistable properties in addition to any inherited ones.
    pub fn with_properties<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.properties.extend(names.into_iter().map(Into::into));
        self
    }

    /// Declare which properties are consumed at construction time.
    pub fn with_constructor_properties<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.constructor_properties
            .extend(names.into_iter().map(Into::into));
        self
    }

    /// Declare the allowed child types, in their canonical sibling order.
    pub fn with_child_types<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_child_types
            .extend(names.into_iter().map(Into::into));
        self
    }

    /// Declare how many leading children of `child_type` are synthetic and
    /// not counted in persisted indices.
    pub fn with_child_offset(mut self, child_type: impl Into<String>, offset: usize) -> Self {
        self.child_offsets.insert(child_type.into(), offset);
        self
    }

    /// Defer creations of this type to the end of every commit. Used for
    /// types that resolve cross-references to siblings created in the same
    /// transaction.
    pub fn with_deferred_commit(mut self) -> Self {
        self.deferred_commit = true;
        self
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn supertype(&self) -> Option<&str> {
        self.supertype.as_deref()
    }

    pub fn deferred_commit(&self) -> bool {
        self.deferred_commit
    }

    /// Rank of `child_type` in this type's canonical sibling order.
    pub fn child_type_rank(&self, child_type: &str) -> Option<usize> {
        self.allowed_child_types
            .iter()
            .position(|t| t == child_type)
    }

    fn declares(&self, property: &str) -> bool {
        self.properties.iter().any(|p| p == property)
    }
}

/// Registry of type descriptors, dispatched by runtime type tag.
#[derive(Clone, Debug, Default)]
pub struct Schema {
    types: HashMap<String, TypeDescriptor>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a descriptor, replacing any previous one for the same tag.
    pub fn register(&mut self, descriptor: TypeDescriptor) -> &mut Self {
        self.types
            .insert(descriptor.type_name.clone(), descriptor);
        self
    }

    pub fn descriptor(&self, type_name: &str) -> TreeResult<&TypeDescriptor> {
        self.types
            .get(type_name)
            .ok_or_else(|| TreeError::UnknownType(type_name.to_string()))
    }

    /// All persistable property names for `type_name`, inherited names
    /// first, in declaration order.
    pub fn persistable_properties(&self, type_name: &str) -> TreeResult<Vec<String>> {
        let mut chain = Vec::new();
        let mut current = Some(type_name.to_string());
        while let Some(name) = current {
            let descriptor = self.descriptor(&name)?;
            chain.push(descriptor);
            current = descriptor.supertype.clone();
        }

        let mut names = Vec::new();
        for descriptor in chain.iter().rev() {
            names.extend(descriptor.properties.iter().cloned());
        }
        Ok(names)
    }

    /// Whether `property` is declared by `type_name` or any supertype.
    pub fn declares(&self, type_name: &str, property: &str) -> TreeResult<bool> {
        let mut current = Some(type_name.to_string());
        while let Some(name) = current {
            let descriptor = self.descriptor(&name)?;
            if descriptor.declares(property) {
                return Ok(true);
            }
            current = descriptor.supertype.clone();
        }
        Ok(false)
    }

    /// Apply one named property to a node, failing on unknown names or a
    /// value that does not match the declared data type.
    pub fn set_property(
        &self,
        node: &mut Node,
        property: &str,
        data_type: DataType,
        value: Value,
    ) -> TreeResult<Option<Value>> {
        self.require_declared(node.type_name(), property)?;
        value.check_type(data_type)?;
        Ok(node.set_property(property, value))
    }

    /// Read one named property; unset but declared reads as `Null`.
    pub fn get_property(&self, node: &Node, property: &str) -> TreeResult<Value> {
        self.require_declared(node.type_name(), property)?;
        Ok(node.property(property).cloned().unwrap_or(Value::Null))
    }

    /// Build a node from a creation record, consuming its constructor
    /// properties from the bundle so the property phase does not re-apply
    /// them.
    pub fn construct(
        &self,
        record: &CreationRecord,
        bundle: &mut PropertyBundle,
    ) -> TreeResult<Node> {
        let constructor_properties = self.constructor_chain(&record.type_name)?;
        let mut node = Node::new(record.node.clone(), record.type_name.clone());
        for property in constructor_properties {
            if let Some(value) = bundle.take_latest(&record.node, &property) {
                node.set_property(property, value);
            }
        }
        Ok(node)
    }

    /// Rank of `child_type` in `parent_type`'s canonical sibling order.
    /// Unlisted types rank after all listed ones, by name.
    pub fn child_type_rank(&self, parent_type: &str, child_type: &str) -> TreeResult<usize> {
        Ok(self
            .descriptor(parent_type)?
            .child_type_rank(child_type)
            .unwrap_or(usize::MAX))
    }

    /// Whether `child_type` may be attached under `parent_type`.
    pub fn allows_child(&self, parent_type: &str, child_type: &str) -> TreeResult<bool> {
        Ok(self
            .descriptor(parent_type)?
            .child_type_rank(child_type)
            .is_some())
    }

    /// Synthetic-children offset for `child_type` under `parent_type`.
    pub fn position_offset(&self, parent_type: &str, child_type: &str) -> usize {
        self.types
            .get(parent_type)
            .and_then(|d| d.child_offsets.get(child_type).copied())
            .unwrap_or(0)
    }

    /// Whether creations of this type are deferred to the end of a commit.
    pub fn deferred_commit(&self, type_name: &str) -> bool {
        self.types
            .get(type_name)
            .map(|d| d.deferred_commit)
            .unwrap_or(false)
    }

    fn require_declared(&self, type_name: &str, property: &str) -> TreeResult<()> {
        if self.declares(type_name, property)? {
            Ok(())
        } else {
            Err(TreeError::UnknownProperty {
                type_name: type_name.to_string(),
                property: property.to_string(),
            })
        }
    }

    fn constructor_chain(&self, type_name: &str) -> TreeResult<Vec<String>> {
        let mut chain = Vec::new();
        let mut current = Some(type_name.to_string());
        while let Some(name) = current {
            let descriptor = self.descriptor(&name)?;
            chain.push(descriptor);
            current = descriptor.supertype.clone();
        }

        let mut names = Vec::new();
        for descriptor in chain.iter().rev() {
            names.extend(descriptor.constructor_properties.iter().cloned());
        }
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grove_types::{NodeRef, PropertyChange};

    fn schema() -> Schema {
        let mut schema = Schema::new();
        schema
            .register(
                TypeDescriptor::new("Named").with_properties(["name"]),
            )
            .register(
                TypeDescriptor::new("Folder")
                    .with_supertype("Named")
                    .with_properties(["color"])
                    .with_constructor_properties(["name"])
                    .with_child_types(["Report", "Page"])
                    .with_child_offset("Page", 1),
            )
            .register(TypeDescriptor::new("Page").with_supertype("Named"))
            .register(
                TypeDescriptor::new("Link")
                    .with_supertype("Named")
                    .with_properties(["target"])
                    .with_deferred_commit(),
            );
        schema
    }

    #[test]
    fn inherited_properties_are_declared() {
        let schema = schema();
        assert!(schema.declares("Folder", "name").unwrap());
        assert!(schema.declares("Folder", "color").unwrap());
        assert!(!schema.declares("Named", "color").unwrap());
    }

    #[test]
    fn persistable_properties_include_supertype_names_first() {
        let schema = schema();
        let names = schema.persistable_properties("Folder").unwrap();
        assert_eq!(names, vec!["name".to_string(), "color".to_string()]);
    }

    #[test]
    fn unknown_property_is_rejected() {
        let schema = schema();
        let mut node = Node::new(NodeRef::from("n"), "Folder");
        let error = schema
            .set_property(&mut node, "bogus", DataType::String, Value::from("x"))
            .unwrap_err();
        assert!(matches!(error, TreeError::UnknownProperty { .. }));
    }

    #[test]
    fn unknown_type_is_rejected() {
        let schema = schema();
        let node = Node::new(NodeRef::from("n"), "Mystery");
        let error = schema.get_property(&node, "name").unwrap_err();
        assert_eq!(error, TreeError::UnknownType("Mystery".into()));
    }

    #[test]
    fn unset_declared_property_reads_null() {
        let schema = schema();
        let node = Node::new(NodeRef::from("n"), "Folder");
        assert_eq!(schema.get_property(&node, "name").unwrap(), Value::Null);
    }

    #[test]
    fn mismatched_data_type_is_rejected() {
        let schema = schema();
        let mut node = Node::new(NodeRef::from("n"), "Folder");
        let error = schema
            .set_property(&mut node, "name", DataType::String, Value::from(7i64))
            .unwrap_err();
        assert!(matches!(error, TreeError::Type(_)));
    }

    #[test]
    fn construct_consumes_constructor_properties() {
        let schema = schema();
        let record = CreationRecord::new(None, "Folder", NodeRef::from("f"), 0);
        let mut bundle = PropertyBundle::new();
        bundle.push(PropertyChange::unconditional(
            NodeRef::from("f"),
            "name",
            DataType::String,
            Value::from("docs"),
        ));
        bundle.push(PropertyChange::unconditional(
            NodeRef::from("f"),
            "color",
            DataType::String,
            Value::from("red"),
        ));

        let node = schema.construct(&record, &mut bundle).unwrap();
        assert_eq!(node.property("name"), Some(&Value::from("docs")));
        // Non-constructor property stays buffered for the property phase.
        assert_eq!(node.property("color"), None);
        assert_eq!(bundle.len(), 1);
    }

    #[test]
    fn child_type_rank_follows_declaration_order() {
        let schema = schema();
        assert_eq!(schema.child_type_rank("Folder", "Report").unwrap(), 0);
        assert_eq!(schema.child_type_rank("Folder", "Page").unwrap(), 1);
        assert_eq!(
            schema.child_type_rank("Folder", "Mystery").unwrap(),
            usize::MAX
        );
    }

    #[test]
    fn offsets_and_deferred_commit() {
        let schema = schema();
        assert_eq!(schema.position_offset("Folder", "Page"), 1);
        assert_eq!(schema.position_offset("Folder", "Report"), 0);
        assert!(schema.deferred_commit("Link"));
        assert!(!schema.deferred_commit("Folder"));
    }
}
