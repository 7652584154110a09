// SPDX-License-Identifier: MIT OR Apache-2.0
//! Notifier that reports director activity through `tracing`.

use ordoplay_director::{DirectorNotifier, Id, Node, Value};
use std::cell::Cell;
use std::collections::HashSet;

/// Logs breaks, debugger transitions and value changes, and counts node
/// visits
#[derive(Debug, Default)]
pub struct TracingNotifier {
    breakpoints: HashSet<String>,
    visits: Cell<u64>,
    breaks: Cell<u64>,
}

impl TracingNotifier {
    /// Pause on nodes whose full type name is listed
    pub fn new(breakpoints: impl IntoIterator<Item = String>) -> Self {
        Self {
            breakpoints: breakpoints.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Node visits seen so far, keep-alive reports excluded
    pub fn visits(&self) -> u64 {
        self.visits.get()
    }

    /// Breakpoint hits so far
    pub fn breaks(&self) -> u64 {
        self.breaks.get()
    }
}

impl DirectorNotifier for TracingNotifier {
    fn on_node_execution(&self, node: &Node, input: &str, outputs: &[String]) {
        if input.is_empty() && outputs.is_empty() {
            tracing::trace!(target: "director::notifier", "{} is waiting", node.display_name());
            return;
        }
        self.visits.set(self.visits.get() + 1);
    }

    fn break_node(&self, node: &Node, new_break: bool) {
        if new_break {
            self.breaks.set(self.breaks.get() + 1);
            tracing::info!(target: "director::notifier", "Breakpoint hit on {}", node.display_name());
        } else {
            tracing::debug!(target: "director::notifier", "Paused on {}", node.display_name());
        }
    }

    fn should_break(&self, node: &Node) -> bool {
        self.breakpoints.contains(&node.node_type().full_name())
    }

    fn on_begin_debugging(&self) {
        tracing::info!(target: "director::notifier", "Debugging started");
    }

    fn on_end_debugging(&self) {
        tracing::info!(target: "director::notifier", "Debugging ended");
    }

    fn on_step_debugging(&self) {
        tracing::debug!(target: "director::notifier", "Stepped");
    }

    fn on_value_changed(&self, node: &Id, value: &Value) {
        tracing::debug!(target: "director::notifier", "Value {} is now {:?}", node, value);
    }
}
