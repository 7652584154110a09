// SPDX-License-Identifier: MIT OR Apache-2.0
//! Identifiers for nodes, graphs, scripts and threads.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use uuid::Uuid;

/// Stable identity of a node or graph.
///
/// The `uid` is the identity proper. The `index` is a hint into the owning
/// director's master table and is only meaningful while the item is
/// registered there; equality and hashing ignore it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Id {
    /// Unique identity
    pub uid: Uuid,
    /// Master table slot, if registered
    pub index: Option<usize>,
}

impl Id {
    /// Create a new random, unregistered ID
    pub fn new() -> Self {
        Self::from_uid(Uuid::new_v4())
    }

    /// Create an unregistered ID for an existing identity
    pub fn from_uid(uid: Uuid) -> Self {
        Self { uid, index: None }
    }

    /// Same identity with the table hint stripped
    pub fn unindexed(&self) -> Self {
        Self::from_uid(self.uid)
    }
}

impl Default for Id {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Id {
    fn eq(&self, other: &Self) -> bool {
        self.uid == other.uid
    }
}

impl Eq for Id {}

impl Hash for Id {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.uid.hash(state);
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.index {
            Some(index) => write!(f, "{}#{}", self.uid, index),
            None => write!(f, "{}", self.uid),
        }
    }
}

/// Unique identifier for a director script instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DirectorId(pub Uuid);

impl DirectorId {
    /// Create a new random director ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DirectorId {
    fn default() -> Self {
        Self::new()
    }
}

/// A node addressed across a director family: which script owns it, and
/// which node inside that script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeRef {
    /// Owning script
    pub script: DirectorId,
    /// Node within the script
    pub node: Id,
}

impl NodeRef {
    /// Create a new node reference
    pub fn new(script: DirectorId, node: Id) -> Self {
        Self { script, node }
    }
}

/// Logical thread identifier handed out by the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ThreadId(pub u32);

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "thread {}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_equality_ignores_index() {
        let mut a = Id::new();
        let b = Id { uid: a.uid, index: Some(7) };
        assert_eq!(a, b);

        a.index = Some(3);
        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
        assert!(set.contains(&b.unindexed()));
    }

    #[test]
    fn test_distinct_ids() {
        assert_ne!(Id::new(), Id::new());
        assert_ne!(DirectorId::new(), DirectorId::new());
    }
}
