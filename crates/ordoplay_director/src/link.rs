// SPDX-License-Identifier: MIT OR Apache-2.0
//! Control-flow and data-flow links on nodes.

use crate::id::Id;
use crate::value::Value;
use serde::{Deserialize, Serialize};

/// Reference to an input link on a node of the same script
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InputRef {
    /// Node owning the input
    pub node: Id,
    /// Input index on that node
    pub input: usize,
}

impl InputRef {
    /// Create a new input reference
    pub fn new(node: Id, input: usize) -> Self {
        Self { node, input }
    }
}

/// Reference to an output link on a node of the same script
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutputRef {
    /// Node owning the output
    pub node: Id,
    /// Output index on that node
    pub output: usize,
}

impl OutputRef {
    /// Create a new output reference
    pub fn new(node: Id, output: usize) -> Self {
        Self { node, output }
    }
}

/// A named entry point into a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputLink {
    /// Link name
    pub name: String,
    /// Set when the input has been activated and not yet tested
    #[serde(skip)]
    activated: bool,
    /// Input that receives activations in place of this one
    pub redirect: Option<InputRef>,
}

impl InputLink {
    /// Create a new input link
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            activated: false,
            redirect: None,
        }
    }

    /// Flag the input as activated
    pub fn activate(&mut self) {
        self.activated = true;
    }

    /// Read and clear the activation flag
    pub fn test(&mut self) -> bool {
        std::mem::take(&mut self.activated)
    }
}

/// A named exit point from a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputLink {
    /// Link name
    pub name: String,
    /// Set when the node fires this output
    #[serde(skip)]
    activated: bool,
    /// Downstream inputs, in declaration order
    pub links: Vec<InputRef>,
    /// Output whose links are followed instead of this one's
    pub redirect: Option<OutputRef>,
}

impl OutputLink {
    /// Create a new output link
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            activated: false,
            links: Vec::new(),
            redirect: None,
        }
    }

    /// Fire the output; it is consumed by the scheduler after the node runs
    pub fn activate(&mut self) {
        self.activated = true;
    }

    /// Whether the output is currently activated
    pub fn is_activated(&self) -> bool {
        self.activated
    }

    /// Read and clear the activation flag
    pub fn test(&mut self) -> bool {
        std::mem::take(&mut self.activated)
    }

    /// Connect to a downstream input. Returns false if already connected.
    pub fn connect(&mut self, target: InputRef) -> bool {
        if self.links.contains(&target) {
            return false;
        }
        self.links.push(target);
        true
    }

    /// Disconnect from a downstream input
    pub fn disconnect(&mut self, target: &InputRef) -> bool {
        let before = self.links.len();
        self.links.retain(|link| link != target);
        self.links.len() != before
    }
}

/// A named data input on a node, bound to zero or more value nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueLink {
    /// Link name
    pub name: String,
    /// Value used while no value node is connected
    pub default: Value,
    /// Whether connected value nodes may be written through this link
    pub writable: bool,
    /// Connected value nodes
    pub values: Vec<Id>,
}

impl ValueLink {
    /// Create a read-only value link with a default value
    pub fn new(name: impl Into<String>, default: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            default: default.into(),
            writable: false,
            values: Vec::new(),
        }
    }

    /// Create a value link whose connected values may be written
    pub fn writable(name: impl Into<String>, default: impl Into<Value>) -> Self {
        Self {
            writable: true,
            ..Self::new(name, default)
        }
    }

    /// Bind a value node. Returns false if already bound.
    pub fn connect(&mut self, value: Id) -> bool {
        if self.values.contains(&value) {
            return false;
        }
        self.values.push(value);
        true
    }

    /// Unbind a value node
    pub fn disconnect(&mut self, value: &Id) -> bool {
        let before = self.values.len();
        self.values.retain(|id| id != value);
        self.values.len() != before
    }
}
