//! Reconciliation engine for Grove.
//!
//! When a session has buffered local ("outbound") operations while operations
//! from a remote peer ("inbound") arrive, the two change sets may conflict.
//! [`check_for_simultaneous_edit`] classifies every unsafe pairwise
//! interaction into a fixed [`ConflictKind`] taxonomy and, as a side effect,
//! silently drops outbound operations that exactly duplicate inbound ones —
//! both sides deleting the same node is agreement, not a conflict.
//!
//! Conflicts are data, not errors: the caller decides whether to block,
//! warn, or auto-resolve.

pub mod changeset;
pub mod conflict;
pub mod detect;

pub use changeset::ChangeSet;
pub use conflict::{ConflictKind, ConflictMessage};
pub use detect::check_for_simultaneous_edit;
