// SPDX-License-Identifier: MIT OR Apache-2.0
//! Event nodes.

use super::{core_type, REMOTE_EVENT};
use crate::context::NodeContext;
use crate::node::{Node, NodeBehavior, NodeKind, NodeType};

/// Event node types
pub fn node_types() -> Vec<NodeType> {
    vec![
        core_type("Start", NodeKind::Event, "Fires once when the script starts"),
        core_type(
            REMOTE_EVENT,
            NodeKind::Event,
            "Fires when a Call Remote Event names this node",
        ),
    ]
}

pub(crate) fn create(name: &str) -> Option<Box<dyn NodeBehavior>> {
    match name {
        "Start" => Some(Box::new(StartEvent)),
        REMOTE_EVENT => Some(Box::new(RemoteEvent)),
        _ => None,
    }
}

/// Begins a thread on itself when the script starts
#[derive(Debug, Default)]
pub struct StartEvent;

impl NodeBehavior for StartEvent {
    fn init(&self, node: &mut Node) {
        node.add_output("Out");
    }

    // Outputs were fired by whoever triggered the event.
    fn update(&mut self, _ctx: &mut NodeContext<'_>) -> bool {
        false
    }

    fn on_start(&mut self, ctx: &mut NodeContext<'_>) {
        ctx.activate_output("Out");
        let node = ctx.node_ref();
        ctx.begin_thread(node, 0);
    }
}

/// Named entry point. Its node name is the event name.
#[derive(Debug, Default)]
pub struct RemoteEvent;

impl NodeBehavior for RemoteEvent {
    fn init(&self, node: &mut Node) {
        node.add_output("Out");
    }

    fn update(&mut self, ctx: &mut NodeContext<'_>) -> bool {
        ctx.activate_output("Out");
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{core_director, RecordingNotifier};

    #[test]
    fn test_start_runs_on_first_update() {
        let mut director = core_director();
        let root = director.root_graph();
        let start = director.create_node("Start", &root).unwrap();
        let log = director.create_node("Log", &root).unwrap();
        director.connect(&start, "Out", &log, "In").unwrap();
        let notifier = RecordingNotifier::attach(&director);

        director.update(0.1, 0.1);

        assert_eq!(notifier.executed(), vec!["Core.Start", "Core.Log"]);
        assert!(!director.is_running(None));

        director.update(0.1, 0.1);
        assert_eq!(notifier.executed().len(), 2);
    }

    #[test]
    fn test_events_have_no_inputs() {
        let mut director = core_director();
        let root = director.root_graph();
        let event = director.create_node(REMOTE_EVENT, &root).unwrap();
        let node = director.node(&event).unwrap();
        assert!(node.inputs().is_empty());
        assert_eq!(node.outputs().len(), 1);
        assert_eq!(node.kind(), NodeKind::Event);
    }
}
