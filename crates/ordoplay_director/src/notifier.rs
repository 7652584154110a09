// SPDX-License-Identifier: MIT OR Apache-2.0
//! Execution and debugging observer.

use crate::id::Id;
use crate::node::Node;
use crate::value::Value;

/// Receives execution and debugging events from a director family.
///
/// Every method has a no-op default. Implementations use interior
/// mutability for any state they keep, since a notifier is shared by all
/// scripts of a family.
pub trait DirectorNotifier {
    /// Called at the start of every tick and every immediate-execution step
    fn update(&self, _debugging: bool, _should_step: bool) {}

    /// A node was visited. `input` is empty when a node is only being kept
    /// alive on a suspended frame.
    fn on_node_execution(&self, _node: &Node, _input: &str, _outputs: &[String]) {}

    /// Execution paused on `node`; `new_break` is set when a breakpoint
    /// caused the pause
    fn break_node(&self, _node: &Node, _new_break: bool) {}

    /// Whether execution should pause on `node`
    fn should_break(&self, _node: &Node) -> bool {
        false
    }

    /// Debugging was enabled
    fn on_begin_debugging(&self) {}

    /// Debugging was disabled
    fn on_end_debugging(&self) {}

    /// A single debugger step completed
    fn on_step_debugging(&self) {}

    /// A value node changed value
    fn on_value_changed(&self, _node: &Id, _value: &Value) {}
}
