//! Object-tree capability for Grove.
//!
//! The transaction engine does not own a domain model; it drives any tree
//! that implements [`SessionTree`]. This crate provides that trait, the
//! [`MemoryTree`] implementation backing tests and embedded sessions, and the
//! [`Schema`] registry that stands in for per-type persister helpers:
//! construction from buffered properties, named property access with
//! supertype chaining, sibling-type ordering, and position offsets.

pub mod error;
pub mod event;
pub mod memory;
pub mod node;
pub mod schema;
pub mod traits;

pub use error::{TreeError, TreeResult};
pub use event::TreeEvent;
pub use memory::MemoryTree;
pub use node::Node;
pub use schema::{Schema, TypeDescriptor};
pub use traits::SessionTree;
