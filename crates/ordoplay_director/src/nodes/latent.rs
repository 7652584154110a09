// SPDX-License-Identifier: MIT OR Apache-2.0
//! Latent nodes.
//!
//! These keep their frame across ticks and carry their progress in the
//! frame's continuation data. They release it before finishing.

use super::core_type;
use crate::context::NodeContext;
use crate::link::ValueLink;
use crate::node::{Node, NodeBehavior, NodeKind, NodeType};

/// Latent node types
pub fn node_types() -> Vec<NodeType> {
    vec![
        core_type("Delay", NodeKind::LatentAction, "Wait for a number of simulated seconds"),
        core_type("Wait Ticks", NodeKind::LatentAction, "Wait for a number of updates"),
    ]
}

pub(crate) fn create(name: &str) -> Option<Box<dyn NodeBehavior>> {
    match name {
        "Delay" => Some(Box::new(Delay)),
        "Wait Ticks" => Some(Box::new(WaitTicks)),
        _ => None,
    }
}

/// Fires `Out` once `Delay` simulated seconds have passed
#[derive(Debug, Default)]
pub struct Delay;

struct Elapsed(f32);

impl NodeBehavior for Delay {
    fn init(&self, node: &mut Node) {
        node.add_input("In");
        node.add_output("Out");
        node.add_value_link(ValueLink::new("Delay", 1.0));
    }

    fn update(&mut self, ctx: &mut NodeContext<'_>) -> bool {
        let delay = ctx.value("Delay").map_or(0.0, |value| value.as_float());

        if ctx.is_first() {
            if delay <= 0.0 {
                ctx.activate_output("Out");
                return false;
            }
            ctx.set_data(Elapsed(0.0));
            return true;
        }

        let sim_delta = ctx.sim_delta();
        let elapsed = match ctx.data_mut::<Elapsed>() {
            Some(elapsed) => {
                elapsed.0 += sim_delta;
                elapsed.0
            }
            None => delay,
        };
        if elapsed < delay {
            return true;
        }

        ctx.clear_data();
        ctx.activate_output("Out");
        false
    }
}

/// Fires `Out` after `Ticks` further updates
#[derive(Debug, Default)]
pub struct WaitTicks;

struct Remaining(i32);

impl NodeBehavior for WaitTicks {
    fn init(&self, node: &mut Node) {
        node.add_input("In");
        node.add_output("Out");
        node.add_value_link(ValueLink::new("Ticks", 1));
    }

    fn update(&mut self, ctx: &mut NodeContext<'_>) -> bool {
        if ctx.is_first() {
            let ticks = ctx.value("Ticks").map_or(0, |value| value.as_int());
            if ticks <= 0 {
                ctx.activate_output("Out");
                return false;
            }
            ctx.set_data(Remaining(ticks));
            return true;
        }

        let remaining = match ctx.data_mut::<Remaining>() {
            Some(remaining) => {
                remaining.0 -= 1;
                remaining.0
            }
            None => 0,
        };
        if remaining > 0 {
            return true;
        }

        ctx.clear_data();
        ctx.activate_output("Out");
        false
    }
}

#[cfg(test)]
mod tests {
    use crate::test_support::{core_director, RecordingNotifier};
    use crate::value::Value;

    #[test]
    fn test_wait_ticks_finishes_after_count() {
        let mut director = core_director();
        let root = director.root_graph();
        let wait = director.create_node("Wait Ticks", &root).unwrap();
        let after = director.create_node("Log", &root).unwrap();
        director.connect(&wait, "Out", &after, "In").unwrap();
        director.node_mut(&wait).unwrap().value_links_mut()[0].default = Value::Int(3);
        let notifier = RecordingNotifier::attach(&director);
        director.update(0.0, 0.0);

        let node = director.locate_node(&wait).unwrap();
        director.begin_thread(node, 0);
        assert!(director.is_running(None));

        director.update(0.1, 0.1);
        director.update(0.1, 0.1);
        assert!(director.is_running(None));
        assert!(!notifier.executed().contains(&"Core.Log".to_string()));

        director.update(0.1, 0.1);
        assert!(!director.is_running(None));
        assert_eq!(notifier.executed().last().map(String::as_str), Some("Core.Log"));
        assert_eq!(notifier.visits("Core.Wait Ticks"), 4);
    }

    #[test]
    fn test_delay_accumulates_sim_time() {
        let mut director = core_director();
        let root = director.root_graph();
        let delay = director.create_node("Delay", &root).unwrap();
        let seconds = director.create_node("Float", &root).unwrap();
        director.connect_value(&delay, "Delay", &seconds).unwrap();
        director.set_value(&seconds, 0.5);
        director.update(0.0, 0.0);

        let node = director.locate_node(&delay).unwrap();
        director.begin_thread(node, 0);

        director.update(0.25, 1.0);
        assert!(director.is_running(None));
        director.update(0.25, 0.0);
        assert!(!director.is_running(None));
    }

    #[test]
    fn test_zero_delay_finishes_on_first_visit() {
        let mut director = core_director();
        let root = director.root_graph();
        let delay = director.create_node("Delay", &root).unwrap();
        director.node_mut(&delay).unwrap().value_links_mut()[0].default = Value::Float(0.0);
        director.update(0.0, 0.0);

        let node = director.locate_node(&delay).unwrap();
        director.begin_thread(node, 0);

        assert!(!director.is_running(None));
    }
}
