//! The conflict taxonomy.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Why an outbound operation cannot safely apply given a concurrent inbound
/// one.
///
/// Each kind carries a fixed message template with a fixed number of `%s`
/// placeholders; the arity is declared explicitly rather than derived from
/// the template so the two cannot drift apart silently (a test pins them
/// together).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConflictKind {
    /// An outbound addition targets a parent whose child list changed
    /// remotely.
    SimultaneousAddition,
    /// An outbound addition targets a parent with remote property changes.
    AdditionUnderChange,
    /// An ancestor of an outbound addition was removed remotely.
    AdditionUnderRemoval,
    /// Both sides moved the same node to different places.
    DifferentMove,
    /// An outbound move targets a node that was removed remotely.
    MoveOfRemoved,
    /// A remote change now depends on the node an outbound removal targets.
    RemovalOfDependency,
    /// An outbound property change targets a node removed remotely.
    ChangeOfRemoved,
    /// A related node (parent or child) has remote property changes.
    ChangeUnderChange,
    /// Both sides changed properties of the same node, with at least one
    /// genuine mismatch.
    SimultaneousObjectChange,
    /// A child was freshly added remotely beneath a node with outbound
    /// property changes.
    ChangeAfterAddition,
}

impl ConflictKind {
    /// The user-facing message template for this kind.
    pub fn template(&self) -> &'static str {
        match self {
            ConflictKind::SimultaneousAddition => {
                "%s cannot be added because the children of %s changed on the server"
            }
            ConflictKind::AdditionUnderChange => {
                "%s cannot be added because its parent %s changed on the server"
            }
            ConflictKind::AdditionUnderRemoval => {
                "%s cannot be added because its ancestor %s was removed on the server"
            }
            ConflictKind::DifferentMove => "%s was moved in two different ways at once",
            ConflictKind::MoveOfRemoved => {
                "%s cannot be moved because it was removed on the server"
            }
            ConflictKind::RemovalOfDependency => {
                "%s cannot be removed because %s now depends on it"
            }
            ConflictKind::ChangeOfRemoved => {
                "%s cannot be changed because it was removed on the server"
            }
            ConflictKind::ChangeUnderChange => {
                "%s cannot be changed because related object %s changed on the server"
            }
            ConflictKind::SimultaneousObjectChange => {
                "%s was changed in two different ways at once"
            }
            ConflictKind::ChangeAfterAddition => {
                "%s cannot be changed because %s was added beneath it on the server"
            }
        }
    }

    /// Number of substitution arguments this kind requires.
    pub fn arity(&self) -> usize {
        match self {
            ConflictKind::SimultaneousAddition
            | ConflictKind::AdditionUnderChange
            | ConflictKind::AdditionUnderRemoval
            | ConflictKind::RemovalOfDependency
            | ConflictKind::ChangeUnderChange
            | ConflictKind::ChangeAfterAddition => 2,
            ConflictKind::DifferentMove
            | ConflictKind::MoveOfRemoved
            | ConflictKind::ChangeOfRemoved
            | ConflictKind::SimultaneousObjectChange => 1,
        }
    }
}

/// One reported conflict: a kind plus the identifiers of the nodes involved.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConflictMessage {
    kind: ConflictKind,
    args: Vec<String>,
}

impl ConflictMessage {
    /// Build a message for `kind`.
    ///
    /// # Panics
    ///
    /// Panics when the argument count does not match the kind's arity;
    /// passing the wrong arguments is a programming error, not a runtime
    /// conflict.
    pub fn new(kind: ConflictKind, args: Vec<String>) -> Self {
        assert_eq!(
            args.len(),
            kind.arity(),
            "conflict message for {kind:?} takes {} argument(s), got {}",
            kind.arity(),
            args.len()
        );
        Self { kind, args }
    }

    pub fn kind(&self) -> ConflictKind {
        self.kind
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl fmt::Display for ConflictMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut rendered = self.kind.template().to_string();
        for arg in &self.args {
            rendered = rendered.replacen("%s", arg, 1);
        }
        f.write_str(&rendered)
    }
}
