// SPDX-License-Identifier: MIT OR Apache-2.0
//! Shared fixtures for unit tests.

use crate::config::DirectorConfig;
use crate::context::NodeContext;
use crate::director::Director;
use crate::id::Id;
use crate::library::{NodeLibrary, NodeManager};
use crate::node::{Node, NodeBehavior, NodeKind, NodeType};
use crate::notifier::DirectorNotifier;
use crate::value::Value;
use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::rc::Rc;
use std::sync::Arc;

pub(crate) const TEST_LIBRARY: &str = "Test";

/// An initialized script using only the `Core` library
pub(crate) fn core_director() -> Director {
    director_with(DirectorConfig::default())
}

/// An initialized script using `Core` and the test library
pub(crate) fn test_director() -> Director {
    let mut director = director_with(DirectorConfig::default());
    director.add_library(TEST_LIBRARY, "1.0").unwrap();
    director
}

pub(crate) fn director_with(config: DirectorConfig) -> Director {
    let manager = NodeManager::with_core();
    manager.register_library(Arc::new(TestLibrary));
    let mut director = Director::new(Arc::new(manager), config);
    director.init(None, None).unwrap();
    director
}

/// Nodes with scheduler-relevant quirks
pub(crate) struct TestLibrary;

impl NodeLibrary for TestLibrary {
    fn name(&self) -> &str {
        TEST_LIBRARY
    }

    fn node_types(&self) -> Vec<NodeType> {
        let node = |name: &str, kind| NodeType::new(name, TEST_LIBRARY, TEST_LIBRARY, kind);
        vec![
            node("Pass", NodeKind::Action),
            node("Fork", NodeKind::Action),
            node("Hold", NodeKind::LatentAction),
            node("Leaky", NodeKind::LatentAction),
            node("Split", NodeKind::LatentAction),
            node("Relay", NodeKind::Link),
        ]
    }

    fn create_behavior(&self, node_type: &NodeType) -> Option<Box<dyn NodeBehavior>> {
        match node_type.name.as_str() {
            "Pass" => Some(Box::new(Pass)),
            "Fork" => Some(Box::new(Fork)),
            "Hold" => Some(Box::new(Hold)),
            "Leaky" => Some(Box::new(Leaky)),
            "Split" => Some(Box::new(Split)),
            "Relay" => Some(Box::new(Pass)),
            _ => None,
        }
    }
}

/// In, Out
struct Pass;

impl NodeBehavior for Pass {}

/// Fires `A` then `B`
struct Fork;

impl NodeBehavior for Fork {
    fn init(&self, node: &mut Node) {
        node.add_input("In");
        node.add_output("A");
        node.add_output("B");
    }

    fn update(&mut self, ctx: &mut NodeContext<'_>) -> bool {
        ctx.activate_output("A");
        ctx.activate_output("B");
        false
    }
}

/// Never finishes
struct Hold;

impl NodeBehavior for Hold {
    fn update(&mut self, _ctx: &mut NodeContext<'_>) -> bool {
        true
    }
}

/// Waits one visit, then fires `A` then `B`
struct Split;

impl NodeBehavior for Split {
    fn init(&self, node: &mut Node) {
        node.add_input("In");
        node.add_output("A");
        node.add_output("B");
    }

    fn update(&mut self, ctx: &mut NodeContext<'_>) -> bool {
        if ctx.is_first() {
            return true;
        }
        ctx.activate_output("A");
        ctx.activate_output("B");
        false
    }
}

/// Finishes without releasing its continuation data
struct Leaky;

impl NodeBehavior for Leaky {
    fn update(&mut self, ctx: &mut NodeContext<'_>) -> bool {
        ctx.set_data(42_u32);
        ctx.activate_output("Out");
        false
    }
}

/// Records everything a family reports
#[derive(Default)]
pub(crate) struct RecordingNotifier {
    executions: RefCell<Vec<String>>,
    keep_alive: Cell<usize>,
    debug_events: RefCell<Vec<&'static str>>,
    breaks: RefCell<Vec<(String, bool)>>,
    breakpoints: RefCell<HashSet<String>>,
    values: RefCell<Vec<(Id, Value)>>,
}

impl RecordingNotifier {
    /// Create a recorder and make it the family notifier of `director`
    pub(crate) fn attach(director: &Director) -> Rc<Self> {
        let notifier = Rc::new(Self::default());
        director.set_notifier(Some(notifier.clone()));
        notifier
    }

    /// Full type names of visited nodes, in visit order
    pub(crate) fn executed(&self) -> Vec<String> {
        self.executions.borrow().clone()
    }

    /// Number of visits to nodes of a type
    pub(crate) fn visits(&self, type_name: &str) -> usize {
        self.executions
            .borrow()
            .iter()
            .filter(|name| name.as_str() == type_name)
            .count()
    }

    /// Number of keep-alive reports for suspended frames
    pub(crate) fn keep_alive_count(&self) -> usize {
        self.keep_alive.get()
    }

    pub(crate) fn debug_events(&self) -> Vec<&'static str> {
        self.debug_events.borrow().clone()
    }

    pub(crate) fn breaks(&self) -> Vec<(String, bool)> {
        self.breaks.borrow().clone()
    }

    /// Pause execution on nodes of this type
    pub(crate) fn add_breakpoint(&self, type_name: &str) {
        self.breakpoints.borrow_mut().insert(type_name.to_string());
    }

    pub(crate) fn value_changes(&self) -> Vec<(Id, Value)> {
        self.values.borrow().clone()
    }
}

impl DirectorNotifier for RecordingNotifier {
    fn on_node_execution(&self, node: &Node, input: &str, outputs: &[String]) {
        if input.is_empty() && outputs.is_empty() {
            self.keep_alive.set(self.keep_alive.get() + 1);
            return;
        }
        self.executions.borrow_mut().push(node.node_type().full_name());
    }

    fn break_node(&self, node: &Node, new_break: bool) {
        self.breaks
            .borrow_mut()
            .push((node.node_type().full_name(), new_break));
    }

    fn should_break(&self, node: &Node) -> bool {
        self.breakpoints.borrow().contains(&node.node_type().full_name())
    }

    fn on_begin_debugging(&self) {
        self.debug_events.borrow_mut().push("begin");
    }

    fn on_end_debugging(&self) {
        self.debug_events.borrow_mut().push("end");
    }

    fn on_step_debugging(&self) {
        self.debug_events.borrow_mut().push("step");
    }

    fn on_value_changed(&self, node: &Id, value: &Value) {
        self.values.borrow_mut().push((*node, value.clone()));
    }
}
