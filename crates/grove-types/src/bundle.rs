//! Insertion-ordered property-change buffer.
//!
//! The transaction engine appends every buffered [`PropertyChange`] here.
//! During commit, node constructors consume the changes they need as
//! constructor arguments; whatever remains is applied in the property phase,
//! grouped by node in first-seen order.

use serde::{Deserialize, Serialize};

use crate::record::PropertyChange;
use crate::reference::NodeRef;
use crate::value::Value;

/// An ordered buffer of property changes with per-(node, property)
/// last-write lookup and consumption.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertyBundle {
    changes: Vec<PropertyChange>,
}

impl PropertyBundle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a change, preserving insertion order.
    pub fn push(&mut self, change: PropertyChange) {
        self.changes.push(change);
    }

    /// Returns `true` when nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Number of buffered changes.
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// The latest buffered value for `(node, property)`, if any.
    pub fn latest(&self, node: &NodeRef, property: &str) -> Option<&Value> {
        self.changes
            .iter()
            .rev()
            .find(|c| &c.node == node && c.property == property)
            .map(|c| &c.new_value)
    }

    /// Remove every change buffered for `(node, property)` and return the
    /// latest value, if any. Constructors use this to claim the properties
    /// they consume so the property phase does not re-apply them.
    pub fn take_latest(&mut self, node: &NodeRef, property: &str) -> Option<Value> {
        let mut latest = None;
        let mut i = 0;
        while i < self.changes.len() {
            if &self.changes[i].node == node && self.changes[i].property == property {
                latest = Some(self.changes.remove(i).new_value);
            } else {
                i += 1;
            }
        }
        latest
    }

    /// Remove and return every change buffered for `node`, in order.
    pub fn take_node(&mut self, node: &NodeRef) -> Vec<PropertyChange> {
        let mut taken = Vec::new();
        let mut i = 0;
        while i < self.changes.len() {
            if &self.changes[i].node == node {
                taken.push(self.changes.remove(i));
            } else {
                i += 1;
            }
        }
        taken
    }

    /// Nodes with buffered changes, in first-seen order.
    pub fn nodes(&self) -> Vec<NodeRef> {
        let mut seen = Vec::new();
        for change in &self.changes {
            if !seen.contains(&change.node) {
                seen.push(change.node.clone());
            }
        }
        seen
    }

    /// All changes for `node`, in insertion order.
    pub fn changes_for(&self, node: &NodeRef) -> Vec<&PropertyChange> {
        self.changes.iter().filter(|c| &c.node == node).collect()
    }

    /// All buffered changes in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &PropertyChange> {
        self.changes.iter()
    }

    /// Drop everything.
    pub fn clear(&mut self) {
        self.changes.clear();
    }
}
