//! Foundation types for Grove, the session-graph object replication engine.
//!
//! This crate provides the vocabulary shared by every other Grove crate: node
//! references, typed property values, and the buffered change records that the
//! transaction engine accumulates and the reconciliation engine compares.
//!
//! # Key Types
//!
//! - [`NodeRef`] — Stable string identifier of one node in the object tree
//! - [`DataType`] / [`Value`] — Typed property payloads
//! - [`CreationRecord`] / [`PropertyChange`] / [`RemovalRecord`] — Buffered operations
//! - [`PropertyBundle`] — Insertion-ordered property-change buffer
//! - [`PersistedOperation`] — The wire-independent operation vocabulary

pub mod bundle;
pub mod error;
pub mod operation;
pub mod record;
pub mod reference;
pub mod value;

pub use bundle::PropertyBundle;
pub use error::TypeError;
pub use operation::PersistedOperation;
pub use record::{CreationRecord, PropertyChange, RemovalRecord};
pub use reference::NodeRef;
pub use value::{DataType, Value};
