// SPDX-License-Identifier: MIT OR Apache-2.0
//! Action nodes.

use super::core_type;
use crate::context::NodeContext;
use crate::id::NodeRef;
use crate::link::ValueLink;
use crate::node::{Node, NodeBehavior, NodeKind, NodeType};
use crate::value::Value;

/// Action node types
pub fn node_types() -> Vec<NodeType> {
    vec![
        core_type("Log", NodeKind::Action, "Write a message to the log"),
        core_type("If", NodeKind::Action, "Branch on a boolean value"),
        core_type("Set Value", NodeKind::Action, "Copy value A into value B"),
        core_type("Increment", NodeKind::Action, "Add an amount to a numeric value"),
        // Latent: it waits on its frame while the called events run.
        core_type(
            "Call Remote Event",
            NodeKind::LatentAction,
            "Run every remote event with the given name, one after the other",
        ),
    ]
}

pub(crate) fn create(name: &str) -> Option<Box<dyn NodeBehavior>> {
    match name {
        "Log" => Some(Box::new(Log)),
        "If" => Some(Box::new(If)),
        "Set Value" => Some(Box::new(SetValue)),
        "Increment" => Some(Box::new(Increment)),
        "Call Remote Event" => Some(Box::new(CallRemoteEvent)),
        _ => None,
    }
}

/// Logs `Message`
#[derive(Debug, Default)]
pub struct Log;

impl NodeBehavior for Log {
    fn init(&self, node: &mut Node) {
        node.add_input("In");
        node.add_output("Out");
        node.add_value_link(ValueLink::new("Message", ""));
    }

    fn update(&mut self, ctx: &mut NodeContext<'_>) -> bool {
        let message = ctx.value("Message").unwrap_or_else(|| Value::from(""));
        tracing::info!(target: "director::log", "{}", message);
        ctx.activate_output("Out");
        false
    }
}

/// Fires `True` or `False` depending on `Value`
#[derive(Debug, Default)]
pub struct If;

impl NodeBehavior for If {
    fn init(&self, node: &mut Node) {
        node.add_input("In");
        node.add_output("True");
        node.add_output("False");
        node.add_value_link(ValueLink::new("Value", false));
    }

    fn update(&mut self, ctx: &mut NodeContext<'_>) -> bool {
        let condition = ctx.value("Value").is_some_and(|value| value.as_bool());
        ctx.activate_output(if condition { "True" } else { "False" });
        false
    }
}

/// Copies `A` into every value bound to `B`
#[derive(Debug, Default)]
pub struct SetValue;

impl NodeBehavior for SetValue {
    fn init(&self, node: &mut Node) {
        node.add_input("In");
        node.add_output("Out");
        node.add_value_link(ValueLink::new("A", 0));
        node.add_value_link(ValueLink::writable("B", 0));
    }

    fn update(&mut self, ctx: &mut NodeContext<'_>) -> bool {
        if let Some(value) = ctx.value("A") {
            ctx.set_value("B", value);
        }
        ctx.activate_output("Out");
        false
    }
}

/// Adds `Amount` to `Value`
#[derive(Debug, Default)]
pub struct Increment;

impl NodeBehavior for Increment {
    fn init(&self, node: &mut Node) {
        node.add_input("In");
        node.add_output("Out");
        node.add_value_link(ValueLink::writable("Value", 0));
        node.add_value_link(ValueLink::new("Amount", 1));
    }

    fn update(&mut self, ctx: &mut NodeContext<'_>) -> bool {
        let amount = ctx.value("Amount").unwrap_or(Value::Int(1));
        let next = match ctx.value("Value") {
            Some(Value::Float(current)) => Value::Float(current + amount.as_float()),
            Some(Value::Double(current)) => Value::Double(current + amount.as_double()),
            Some(current) => Value::Int(current.as_int().wrapping_add(amount.as_int())),
            None => amount,
        };
        ctx.set_value("Value", next);
        ctx.activate_output("Out");
        false
    }
}

/// Runs the remote events named by `Event` in turn, each on top of this
/// node's frame, then fires `Out`
#[derive(Debug, Default)]
pub struct CallRemoteEvent;

struct PendingEvents(Vec<NodeRef>);

impl NodeBehavior for CallRemoteEvent {
    fn init(&self, node: &mut Node) {
        node.add_input("In");
        node.add_output("Out");
        node.add_value_link(ValueLink::new("Event", ""));
    }

    fn update(&mut self, ctx: &mut NodeContext<'_>) -> bool {
        if ctx.is_first() {
            let name = ctx.value("Event").map(|value| value.to_string()).unwrap_or_default();
            let mut events = ctx.remote_events(&name);
            if events.is_empty() {
                tracing::warn!("No remote event named '{}'", name);
                ctx.activate_output("Out");
                return false;
            }
            // Popped from the back.
            events.reverse();
            ctx.set_data(PendingEvents(events));
        }

        let next = ctx.data_mut::<PendingEvents>().and_then(|pending| pending.0.pop());
        match next {
            Some(event) => {
                ctx.push_stack(event, 0);
                true
            }
            None => {
                ctx.clear_data();
                ctx.activate_output("Out");
                false
            }
        }
    }
}
