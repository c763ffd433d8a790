use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable identifier of one node in the session object tree.
///
/// A `NodeRef` is an opaque string chosen when the node is first persisted
/// and never changed afterwards. At most one reachable node carries a given
/// ref at any time; refs are not reused after removal within a session.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeRef(String);

impl NodeRef {
    /// Wrap an existing identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Mint a fresh, time-ordered identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::now_v7().to_string())
    }

    /// The underlying identifier string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeRef({})", self.0)
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeRef {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for NodeRef {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl AsRef<str> for NodeRef {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
