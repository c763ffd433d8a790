//! Session persister for Grove.
//!
//! The [`SessionPersister`] buffers create, set-property, and remove
//! operations inside nested transactions, applies them to a live
//! [`SessionTree`] in a tree-consistent order on the outermost commit, and
//! restores the pre-transaction state from an undo log when anything fails.
//!
//! # Key Types
//!
//! - [`SessionPersister`] — The transaction engine
//! - [`SessionError`] — Usage, validation, and commit-phase failures
//! - [`ordering`] — The comparators fixing commit application order
//!
//! [`SessionTree`]: grove_tree::SessionTree

pub mod engine;
pub mod error;
pub mod ordering;
mod undo;

pub use engine::SessionPersister;
pub use error::{SessionError, SessionResult};
pub use ordering::{creation_order, removal_order};
