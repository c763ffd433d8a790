//! Conflict detection between divergent change sets.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use grove_tree::SessionTree;
use grove_types::{DataType, NodeRef};

use crate::changeset::ChangeSet;
use crate::conflict::{ConflictKind, ConflictMessage};

/// Reconcile a locally buffered (`outbound`) change set against one received
/// from a remote peer (`inbound`), before either is applied to `tree`.
///
/// Returns the conflicts that require a caller decision. As a side effect,
/// outbound operations that exactly duplicate inbound ones are removed from
/// `outbound`: identical concurrent creations, removals of already-removed
/// nodes, and property writes of identical values are agreement rather than
/// conflict.
///
/// The three passes run in a fixed order — additions, removals, property
/// changes — because the earlier passes may drop entries the later ones
/// would otherwise inspect.
pub fn check_for_simultaneous_edit<T: SessionTree>(
    tree: &T,
    outbound: &mut ChangeSet,
    inbound: &ChangeSet,
) -> Vec<ConflictMessage> {
    let mut conflicts = Vec::new();

    // Inbound summaries consulted by every pass.
    let added_parents: BTreeSet<NodeRef> = inbound
        .additions
        .values()
        .filter_map(|c| c.parent.clone())
        .collect();
    let removed_parents: BTreeSet<NodeRef> = inbound
        .removals
        .values()
        .map(|r| r.parent.clone())
        .collect();
    let changed: BTreeSet<NodeRef> = inbound.properties.keys().cloned().collect();
    let reference_targets: BTreeMap<NodeRef, NodeRef> = inbound
        .properties
        .values()
        .flatten()
        .filter(|c| c.data_type == DataType::Reference)
        .filter_map(|c| {
            c.new_value
                .as_reference()
                .map(|target| (target.clone(), c.node.clone()))
        })
        .collect();

    // Outbound additions.
    let mut duplicate_moves: BTreeSet<NodeRef> = BTreeSet::new();
    let pending_additions: Vec<_> = outbound.additions.values().cloned().collect();
    for record in pending_additions {
        let node = record.node.clone();

        // Both sides added the same node: exact agreement dedups, anything
        // else is a move conflict. This is checked before the sibling
        // checks, which the inbound twin would otherwise trip.
        if let Some(remote) = inbound.additions.get(&node) {
            if record.same_creation(remote) {
                debug!(node = %node, "identical concurrent creation dropped");
                outbound.additions.remove(&node);
                outbound.properties.remove(&node);
                duplicate_moves.insert(node);
            } else {
                conflicts.push(ConflictMessage::new(
                    ConflictKind::DifferentMove,
                    vec![node.to_string()],
                ));
            }
            continue;
        }

        if let Some(parent) = &record.parent {
            if added_parents.contains(parent) || removed_parents.contains(parent) {
                conflicts.push(ConflictMessage::new(
                    ConflictKind::SimultaneousAddition,
                    vec![node.to_string(), parent.to_string()],
                ));
                continue;
            }
            if changed.contains(parent) {
                conflicts.push(ConflictMessage::new(
                    ConflictKind::AdditionUnderChange,
                    vec![node.to_string(), parent.to_string()],
                ));
                continue;
            }
        }

        // Walk up through outbound additions to the highest freshly added
        // ancestor; the node it attaches to must still exist. The seen set
        // bounds the walk when a malformed set links its additions in a
        // cycle.
        let mut top = record.clone();
        let mut seen: BTreeSet<NodeRef> = BTreeSet::new();
        seen.insert(top.node.clone());
        while let Some(parent) = top.parent.clone() {
            if !seen.insert(parent.clone()) {
                break;
            }
            match outbound.additions.get(&parent) {
                Some(ancestor) => top = ancestor.clone(),
                None => break,
            }
        }
        if let Some(anchor) = &top.parent {
            if !tree.is_attached(anchor) {
                conflicts.push(ConflictMessage::new(
                    ConflictKind::AdditionUnderRemoval,
                    vec![node.to_string(), anchor.to_string()],
                ));
            }
        }
    }

    // Outbound removals.
    let pending_removals: Vec<NodeRef> = outbound.removals.keys().cloned().collect();
    for node in pending_removals {
        if !tree.is_attached(&node) {
            if outbound.additions.contains_key(&node) {
                conflicts.push(ConflictMessage::new(
                    ConflictKind::MoveOfRemoved,
                    vec![node.to_string()],
                ));
            } else {
                debug!(node = %node, "concurrent removal dropped");
                outbound.removals.remove(&node);
            }
        } else if let Some(dependent) = reference_targets.get(&node) {
            conflicts.push(ConflictMessage::new(
                ConflictKind::RemovalOfDependency,
                vec![node.to_string(), dependent.to_string()],
            ));
        } else if duplicate_moves.contains(&node) {
            outbound.removals.remove(&node);
        }
    }

    // Outbound property changes. Refs that are themselves outbound
    // additions are skipped: a fresh object's properties cannot conflict.
    let pending_changes: Vec<NodeRef> = outbound.properties.keys().cloned().collect();
    for node in pending_changes {
        if outbound.additions.contains_key(&node) {
            continue;
        }
        if !tree.is_attached(&node) {
            conflicts.push(ConflictMessage::new(
                ConflictKind::ChangeOfRemoved,
                vec![node.to_string()],
            ));
            continue;
        }

        if let Some(parent) = tree.parent(&node) {
            if changed.contains(&parent) {
                conflicts.push(ConflictMessage::new(
                    ConflictKind::ChangeUnderChange,
                    vec![node.to_string(), parent.to_string()],
                ));
            }
        }

        if changed.contains(&node) {
            let remote_changes = inbound.properties.get(&node);
            if let Some(local_changes) = outbound.properties.get_mut(&node) {
                // Identical writes reconcile silently; anything left is a
                // genuine mismatch, reported once per node.
                local_changes.retain(|local| {
                    !remote_changes
                        .map(|remote| {
                            remote.iter().any(|r| {
                                r.property == local.property && r.new_value == local.new_value
                            })
                        })
                        .unwrap_or(false)
                });
                if local_changes.is_empty() {
                    outbound.properties.remove(&node);
                } else {
                    conflicts.push(ConflictMessage::new(
                        ConflictKind::SimultaneousObjectChange,
                        vec![node.to_string()],
                    ));
                }
            }
        }

        for child in tree.children(&node) {
            if changed.contains(&child) {
                conflicts.push(ConflictMessage::new(
                    ConflictKind::ChangeUnderChange,
                    vec![node.to_string(), child.to_string()],
                ));
                break;
            }
        }

        if let Some((added, _)) = inbound.additions.iter().find(|(added, record)| {
            record.parent.as_ref() == Some(&node) && !inbound.removals.contains_key(*added)
        }) {
            conflicts.push(ConflictMessage::new(
                ConflictKind::ChangeAfterAddition,
                vec![node.to_string(), added.to_string()],
            ));
        }
    }

    conflicts
}
