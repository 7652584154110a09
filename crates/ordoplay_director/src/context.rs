// SPDX-License-Identifier: MIT OR Apache-2.0
//! Execution context handed to node behaviors.
//!
//! A context borrows the director that is running the node (the family
//! root during updates) together with the visited frame's continuation
//! data. Thread requests made through it are queued and run once the node
//! returns.

use crate::director::Director;
use crate::id::{Id, NodeRef, ThreadId};
use crate::node::Node;
use crate::value::Value;
use crate::world::{GameManager, GameMap};
use std::any::Any;
use std::rc::Rc;
use uuid::Uuid;

/// What a node sees while it runs
pub struct NodeContext<'a> {
    host: &'a mut Director,
    node: NodeRef,
    sim_delta: f32,
    delta: f32,
    input: usize,
    first: bool,
    data: &'a mut Option<Box<dyn Any>>,
}

impl<'a> NodeContext<'a> {
    pub(crate) fn new(
        host: &'a mut Director,
        node: NodeRef,
        sim_delta: f32,
        delta: f32,
        input: usize,
        first: bool,
        data: &'a mut Option<Box<dyn Any>>,
    ) -> Self {
        Self {
            host,
            node,
            sim_delta,
            delta,
            input,
            first,
            data,
        }
    }

    /// Simulation time step of the current tick
    pub fn sim_delta(&self) -> f32 {
        self.sim_delta
    }

    /// Wall-clock time step of the current tick
    pub fn delta(&self) -> f32 {
        self.delta
    }

    /// Index of the input the node was entered through
    pub fn input(&self) -> usize {
        self.input
    }

    /// Name of the input the node was entered through
    pub fn input_name(&self) -> Option<&str> {
        self.node().and_then(|node| node.input_name(self.input))
    }

    /// Whether this is the node's first visit on this frame
    pub fn is_first(&self) -> bool {
        self.first
    }

    /// Reference to the running node
    pub fn node_ref(&self) -> NodeRef {
        self.node
    }

    /// The running node
    pub fn node(&self) -> Option<&Node> {
        self.host.resolve_node(&self.node)
    }

    /// The script owning the running node
    pub fn director(&self) -> Option<&Director> {
        self.host.find_script(self.node.script)
    }

    fn director_mut(&mut self) -> Option<&mut Director> {
        self.host.find_script_mut(self.node.script)
    }

    fn node_mut(&mut self) -> Option<&mut Node> {
        let id = self.node.node;
        self.director_mut()?.nodes.get_mut(&id)
    }

    /// Fire an output of the running node. Its links are followed once the
    /// node returns.
    pub fn activate_output(&mut self, name: &str) -> bool {
        let activated = self.node_mut().is_some_and(|node| node.activate_output(name));
        if !activated {
            tracing::warn!("Node {} has no output '{}'", self.node.node, name);
        }
        activated
    }

    /// Value seen through a value link: the first linked value node, or the
    /// link's default when nothing is linked
    pub fn value(&self, link: &str) -> Option<Value> {
        let script = self.director()?;
        let node = script.nodes.get(&self.node.node)?;
        let link = node.value_links().iter().find(|value| value.name == link)?;

        match link.values.first() {
            Some(id) => script.value(id),
            None => Some(link.default.clone()),
        }
    }

    /// Every value linked to a value link; the default when nothing is
    /// linked
    pub fn values(&self, link: &str) -> Vec<Value> {
        let Some(script) = self.director() else {
            return Vec::new();
        };
        let Some(link) = script
            .nodes
            .get(&self.node.node)
            .and_then(|node| node.value_links().iter().find(|value| value.name == link))
        else {
            return Vec::new();
        };

        if link.values.is_empty() {
            vec![link.default.clone()]
        } else {
            link.values.iter().filter_map(|id| script.value(id)).collect()
        }
    }

    /// Write through a value link.
    ///
    /// Every linked value node is updated, with global propagation. When
    /// nothing is linked the link's default is replaced. Returns false if
    /// the link does not exist or is read-only.
    pub fn set_value(&mut self, link: &str, value: impl Into<Value>) -> bool {
        let value = value.into();
        let node_id = self.node.node;
        let Some(script) = self.director_mut() else {
            return false;
        };
        let Some(index) = script.nodes.get(&node_id).and_then(|node| node.value_link_index(link)) else {
            return false;
        };

        let targets = match script.nodes.get(&node_id) {
            Some(node) if node.value_links()[index].writable => node.value_links()[index].values.clone(),
            _ => {
                tracing::warn!("Value link '{}' is not writable", link);
                return false;
            }
        };

        if targets.is_empty() {
            if let Some(node) = script.nodes.get_mut(&node_id) {
                node.value_links_mut()[index].default = value;
            }
        } else {
            for target in targets {
                script.set_value(&target, value.clone());
            }
        }
        true
    }

    /// Number of value nodes bound to a value link
    pub fn value_count(&self, link: &str) -> usize {
        self.node()
            .and_then(|node| node.value_links().iter().find(|value| value.name == link))
            .map_or(0, |link| link.values.len())
    }

    /// Request a new thread on `node`. The request runs after this node
    /// returns.
    pub fn begin_thread(&mut self, node: NodeRef, input: usize) -> Option<ThreadId> {
        self.host.begin_thread(node, input)
    }

    /// Request a frame for `node` on top of the running thread. The running
    /// frame stays beneath it as the caller.
    pub fn push_stack(&mut self, node: NodeRef, input: usize) {
        self.host.push_stack(node, input);
    }

    /// Remote event nodes named `name` visible from the running script
    pub fn remote_events(&self, name: &str) -> Vec<NodeRef> {
        self.director()
            .map(|script| script.remote_events(name))
            .unwrap_or_default()
    }

    /// Look up a node of the running script
    pub fn find_node(&self, id: &Id) -> Option<&Node> {
        self.director()?.find_node(id, true)
    }

    /// Continuation data left by an earlier visit
    pub fn data<T: 'static>(&self) -> Option<&T> {
        self.data.as_ref()?.downcast_ref()
    }

    /// Continuation data left by an earlier visit, mutably
    pub fn data_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.data.as_mut()?.downcast_mut()
    }

    /// Store continuation data on the frame
    pub fn set_data<T: 'static>(&mut self, value: T) {
        *self.data = Some(Box::new(value));
    }

    /// Remove and return the continuation data. Nodes must clear their data
    /// before reporting that they finished.
    pub fn take_data<T: 'static>(&mut self) -> Option<T> {
        let data = self.data.take()?;
        match data.downcast::<T>() {
            Ok(value) => Some(*value),
            Err(other) => {
                *self.data = Some(other);
                None
            }
        }
    }

    /// Drop any continuation data
    pub fn clear_data(&mut self) {
        *self.data = None;
    }

    /// Game manager of the running family
    pub fn game_manager(&self) -> Option<Rc<dyn GameManager>> {
        self.host.game_manager().cloned()
    }

    /// Map of the running family
    pub fn map(&self) -> Option<Rc<dyn GameMap>> {
        self.host.map().cloned()
    }

    /// Player actor of the running family
    pub fn player(&self) -> Option<Uuid> {
        self.host.player()
    }

    /// Owning actor of the running script
    pub fn script_owner(&self) -> Option<Uuid> {
        self.director().and_then(Director::script_owner)
    }
}
