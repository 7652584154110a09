// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node types, node instances and the behavior contract.

use crate::context::NodeContext;
use crate::id::Id;
use crate::link::{InputLink, OutputLink, ValueLink};
use crate::table::TableEntry;
use crate::value::{Value, ValueType};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// How the scheduler treats a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    /// Entry point fired from outside the graph
    Event,
    /// Runs to completion in a single visit
    Action,
    /// May span several ticks
    LatentAction,
    /// Holds a value; never executed
    Value,
    /// Forwards links across graph boundaries
    Link,
}

impl NodeKind {
    /// Check if this is an event node
    pub fn is_event(&self) -> bool {
        matches!(self, Self::Event)
    }

    /// Check if nodes of this kind may stay on a frame across ticks
    pub fn is_latent(&self) -> bool {
        matches!(self, Self::LatentAction)
    }

    /// Check if this is a value node
    pub fn is_value(&self) -> bool {
        matches!(self, Self::Value)
    }
}

/// Description of a node type provided by a library
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeType {
    /// Type name
    pub name: String,
    /// Category, usually the library name
    pub category: String,
    /// Library providing the type
    pub library: String,
    /// Scheduler treatment
    pub kind: NodeKind,
    /// Description for tooling
    pub description: String,
}

impl NodeType {
    /// Create a node type
    pub fn new(
        name: impl Into<String>,
        category: impl Into<String>,
        library: impl Into<String>,
        kind: NodeKind,
    ) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
            library: library.into(),
            kind,
            description: String::new(),
        }
    }

    /// Builder: set description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Fully qualified name, `Category.Name`
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.category, self.name)
    }

    /// Check whether `name` refers to this type, either fully qualified or
    /// by bare name
    pub fn matches(&self, name: &str) -> bool {
        self.name == name || self.full_name() == name
    }
}

/// Current and initial value of a value node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueState {
    /// Current value
    pub value: Value,
    /// Value restored by a reset
    pub initial: Value,
}

impl ValueState {
    /// Create a state whose current and initial values match
    pub fn new(value: Value) -> Self {
        Self {
            initial: value.clone(),
            value,
        }
    }
}

/// Shared cell holding a value node's state
pub type SharedValue = Rc<RefCell<ValueState>>;

/// Per-type node logic, created by a node library.
///
/// `update` returns `true` while the node still has work to do on its
/// frame. Only latent nodes should return `true`.
pub trait NodeBehavior {
    /// Build the links and value of a freshly created node
    fn init(&self, node: &mut Node) {
        node.add_input("In");
        node.add_output("Out");
    }

    /// Run one visit of the node
    fn update(&mut self, ctx: &mut NodeContext<'_>) -> bool {
        ctx.activate_output("Out");
        false
    }

    /// Called once when the owning script starts
    fn on_start(&mut self, _ctx: &mut NodeContext<'_>) {}

    /// A latent node began waiting and may listen for external messages
    fn register_messages(&mut self) {}

    /// A latent node finished waiting
    fn unregister_messages(&mut self) {}
}

/// A node instance inside a director graph
pub struct Node {
    pub(crate) id: Id,
    pub(crate) graph: Id,
    node_type: NodeType,
    pub(crate) name: String,
    comment: String,
    enabled: bool,
    logging: bool,
    pub(crate) global: bool,
    pub(crate) imported: bool,
    inputs: Vec<InputLink>,
    outputs: Vec<OutputLink>,
    values: Vec<ValueLink>,
    value: Option<SharedValue>,
    pub(crate) behavior: Option<Box<dyn NodeBehavior>>,
}

impl Node {
    /// Create a node of the given type and let its behavior build it
    pub fn new(node_type: NodeType, graph: Id, behavior: Option<Box<dyn NodeBehavior>>) -> Self {
        let mut node = Self {
            id: Id::new(),
            graph,
            name: String::new(),
            node_type,
            comment: String::new(),
            enabled: true,
            logging: true,
            global: false,
            imported: false,
            inputs: Vec::new(),
            outputs: Vec::new(),
            values: Vec::new(),
            value: None,
            behavior: None,
        };

        if let Some(behavior) = &behavior {
            behavior.init(&mut node);
        }
        node.behavior = behavior;
        node
    }

    /// Node identity
    pub fn id(&self) -> Id {
        self.id
    }

    /// Graph containing the node
    pub fn graph(&self) -> Id {
        self.graph
    }

    /// Node type
    pub fn node_type(&self) -> &NodeType {
        &self.node_type
    }

    /// Scheduler treatment of this node
    pub fn kind(&self) -> NodeKind {
        self.node_type.kind
    }

    /// Instance name; value nodes use it as their variable name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Designer comment
    pub fn comment(&self) -> &str {
        &self.comment
    }

    /// Set the designer comment
    pub fn set_comment(&mut self, comment: impl Into<String>) {
        self.comment = comment.into();
    }

    /// Node-level enabled flag. The effective state also depends on the
    /// owning script, see `Director::is_node_enabled`.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub(crate) fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Whether execution of this node is logged when script logging is on
    pub fn logging(&self) -> bool {
        self.logging
    }

    /// Set the per-node logging flag
    pub fn set_logging(&mut self, logging: bool) {
        self.logging = logging;
    }

    /// Whether this value node shares its value across the script family
    pub fn is_global(&self) -> bool {
        self.global
    }

    /// Whether the node belongs to an imported script
    pub fn is_imported(&self) -> bool {
        self.imported
    }

    /// Display name for diagnostics: `Type.Name` plus the instance name
    pub fn display_name(&self) -> String {
        if self.name.is_empty() {
            self.node_type.full_name()
        } else {
            format!("{}: {}", self.node_type.full_name(), self.name)
        }
    }

    /// Add an input link and return its index
    pub fn add_input(&mut self, name: impl Into<String>) -> usize {
        self.inputs.push(InputLink::new(name));
        self.inputs.len() - 1
    }

    /// Add an output link and return its index
    pub fn add_output(&mut self, name: impl Into<String>) -> usize {
        self.outputs.push(OutputLink::new(name));
        self.outputs.len() - 1
    }

    /// Add a value link and return its index
    pub fn add_value_link(&mut self, link: ValueLink) -> usize {
        self.values.push(link);
        self.values.len() - 1
    }

    /// Make this a value node holding `value`
    pub fn set_value_slot(&mut self, value: Value) {
        self.value = Some(Rc::new(RefCell::new(ValueState::new(value))));
    }

    /// Input links
    pub fn inputs(&self) -> &[InputLink] {
        &self.inputs
    }

    /// Output links
    pub fn outputs(&self) -> &[OutputLink] {
        &self.outputs
    }

    /// Value links
    pub fn value_links(&self) -> &[ValueLink] {
        &self.values
    }

    pub(crate) fn inputs_mut(&mut self) -> &mut [InputLink] {
        &mut self.inputs
    }

    pub(crate) fn outputs_mut(&mut self) -> &mut [OutputLink] {
        &mut self.outputs
    }

    pub(crate) fn value_links_mut(&mut self) -> &mut [ValueLink] {
        &mut self.values
    }

    /// Index of the named input
    pub fn input_index(&self, name: &str) -> Option<usize> {
        self.inputs.iter().position(|link| link.name == name)
    }

    /// Index of the named output
    pub fn output_index(&self, name: &str) -> Option<usize> {
        self.outputs.iter().position(|link| link.name == name)
    }

    /// Index of the named value link
    pub fn value_link_index(&self, name: &str) -> Option<usize> {
        self.values.iter().position(|link| link.name == name)
    }

    /// Name of the input at `index`
    pub fn input_name(&self, index: usize) -> Option<&str> {
        self.inputs.get(index).map(|link| link.name.as_str())
    }

    /// Fire the named output. Returns false if no such output exists.
    pub fn activate_output(&mut self, name: &str) -> bool {
        match self.outputs.iter_mut().find(|link| link.name == name) {
            Some(output) => {
                output.activate();
                true
            }
            None => false,
        }
    }

    /// Current value, for value nodes
    pub fn value(&self) -> Option<Value> {
        self.value.as_ref().map(|cell| cell.borrow().value.clone())
    }

    /// Initial value, for value nodes
    pub fn initial_value(&self) -> Option<Value> {
        self.value.as_ref().map(|cell| cell.borrow().initial.clone())
    }

    /// Type of the held value, for value nodes
    pub fn value_type(&self) -> Option<ValueType> {
        self.value.as_ref().map(|cell| cell.borrow().value.value_type())
    }

    pub(crate) fn shared_value(&self) -> Option<&SharedValue> {
        self.value.as_ref()
    }

    /// Store a new current value, converted to the held type. Returns the
    /// stored value when it changed.
    pub(crate) fn write_value(&self, value: &Value) -> Option<Value> {
        let cell = self.value.as_ref()?;
        let mut state = cell.borrow_mut();
        let converted = value.convert(state.value.value_type())?;
        if state.value == converted {
            return None;
        }
        state.value = converted.clone();
        Some(converted)
    }

    /// Store a new initial value, converted to the held type
    pub(crate) fn write_initial_value(&self, value: &Value) -> Option<Value> {
        let cell = self.value.as_ref()?;
        let mut state = cell.borrow_mut();
        let converted = value.convert(state.initial.value_type())?;
        if state.initial == converted {
            return None;
        }
        state.initial = converted.clone();
        Some(converted)
    }

    /// Drop every link that targets `node`
    pub(crate) fn unlink_node(&mut self, node: &Id) {
        for output in &mut self.outputs {
            output.links.retain(|link| link.node != *node);
            if output.redirect.is_some_and(|redirect| redirect.node == *node) {
                output.redirect = None;
            }
        }
        for input in &mut self.inputs {
            if input.redirect.is_some_and(|redirect| redirect.node == *node) {
                input.redirect = None;
            }
        }
        for link in &mut self.values {
            link.values.retain(|value| value != node);
        }
    }
}

impl TableEntry for Node {
    fn entry_id(&self) -> &Id {
        &self.id
    }

    fn entry_id_mut(&mut self) -> &mut Id {
        &mut self.id
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("type", &self.node_type.full_name())
            .field("name", &self.name)
            .field("enabled", &self.enabled)
            .field("value", &self.value())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Branch;

    impl NodeBehavior for Branch {
        fn init(&self, node: &mut Node) {
            node.add_input("In");
            node.add_output("True");
            node.add_output("False");
        }
    }

    fn action_type() -> NodeType {
        NodeType::new("Branch", "Test", "Test", NodeKind::Action)
    }

    #[test]
    fn test_behavior_builds_links() {
        let node = Node::new(action_type(), Id::new(), Some(Box::new(Branch)));
        assert_eq!(node.inputs().len(), 1);
        assert_eq!(node.output_index("False"), Some(1));
        assert_eq!(node.input_name(0), Some("In"));
        assert_eq!(node.node_type().full_name(), "Test.Branch");
        assert!(node.node_type().matches("Branch"));
    }

    #[test]
    fn test_activate_output() {
        let mut node = Node::new(action_type(), Id::new(), Some(Box::new(Branch)));
        assert!(node.activate_output("True"));
        assert!(!node.activate_output("Maybe"));
        assert!(node.outputs()[0].is_activated());
        assert!(!node.outputs()[1].is_activated());
    }

    #[test]
    fn test_value_write_converts() {
        let mut node = Node::new(
            NodeType::new("Int", "Test", "Test", NodeKind::Value),
            Id::new(),
            None,
        );
        node.set_value_slot(Value::Int(1));

        assert_eq!(node.write_value(&Value::Float(4.5)), Some(Value::Int(4)));
        assert_eq!(node.write_value(&Value::Int(4)), None);
        assert_eq!(node.value(), Some(Value::Int(4)));
        assert_eq!(node.initial_value(), Some(Value::Int(1)));
        assert_eq!(node.write_value(&Value::Vec2([0.0, 1.0])), None);
    }

    #[test]
    fn test_unlink_node() {
        let mut node = Node::new(action_type(), Id::new(), Some(Box::new(Branch)));
        let target = Id::new();
        node.outputs_mut()[0].connect(crate::link::InputRef::new(target, 0));
        node.unlink_node(&target);
        assert!(node.outputs()[0].links.is_empty());
    }
}
