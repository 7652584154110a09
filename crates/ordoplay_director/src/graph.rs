// SPDX-License-Identifier: MIT OR Apache-2.0
//! Director graphs: a tree of named node containers.
//!
//! Graphs reference their nodes and sub-graphs by [`Id`]; the items
//! themselves live in the owning director's master tables.

use crate::id::Id;
use crate::node::NodeKind;
use crate::table::TableEntry;
use serde::{Deserialize, Serialize};

/// A named container of nodes and sub-graphs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectorGraph {
    pub(crate) id: Id,
    pub(crate) parent: Option<Id>,
    /// Graph name
    pub name: String,
    /// Designer comment
    pub comment: String,
    /// Whether nodes in this graph may run
    pub enabled: bool,
    pub(crate) imported: bool,
    pub(crate) read_only: bool,
    sub_graphs: Vec<Id>,
    event_nodes: Vec<Id>,
    action_nodes: Vec<Id>,
    value_nodes: Vec<Id>,
}

impl DirectorGraph {
    /// Create an empty graph
    pub fn new(parent: Option<Id>) -> Self {
        Self {
            id: Id::new(),
            parent,
            name: String::from("Graph"),
            comment: String::new(),
            enabled: true,
            imported: false,
            read_only: false,
            sub_graphs: Vec::new(),
            event_nodes: Vec::new(),
            action_nodes: Vec::new(),
            value_nodes: Vec::new(),
        }
    }

    /// Graph identity
    pub fn id(&self) -> Id {
        self.id
    }

    /// Parent graph, `None` for the root graph
    pub fn parent(&self) -> Option<Id> {
        self.parent
    }

    /// Whether this graph mirrors a graph of an imported script
    pub fn is_imported(&self) -> bool {
        self.imported
    }

    /// Whether this graph may be edited
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Child graphs, in order
    pub fn sub_graphs(&self) -> &[Id] {
        &self.sub_graphs
    }

    /// Event nodes owned by this graph
    pub fn event_nodes(&self) -> &[Id] {
        &self.event_nodes
    }

    /// Action and link nodes owned by this graph
    pub fn action_nodes(&self) -> &[Id] {
        &self.action_nodes
    }

    /// Value nodes owned by this graph
    pub fn value_nodes(&self) -> &[Id] {
        &self.value_nodes
    }

    /// All nodes owned by this graph, events first
    pub fn nodes(&self) -> impl Iterator<Item = &Id> {
        self.event_nodes
            .iter()
            .chain(&self.action_nodes)
            .chain(&self.value_nodes)
    }

    /// Check if the graph owns no nodes and no sub-graphs
    pub fn is_empty(&self) -> bool {
        self.sub_graphs.is_empty()
            && self.event_nodes.is_empty()
            && self.action_nodes.is_empty()
            && self.value_nodes.is_empty()
    }

    pub(crate) fn add_sub_graph(&mut self, graph: Id) {
        if !self.sub_graphs.contains(&graph) {
            self.sub_graphs.push(graph);
        }
    }

    pub(crate) fn remove_sub_graph(&mut self, graph: &Id) -> bool {
        let before = self.sub_graphs.len();
        self.sub_graphs.retain(|id| id != graph);
        self.sub_graphs.len() != before
    }

    pub(crate) fn add_node(&mut self, node: Id, kind: NodeKind) {
        let list = match kind {
            NodeKind::Event => &mut self.event_nodes,
            NodeKind::Value => &mut self.value_nodes,
            NodeKind::Action | NodeKind::LatentAction | NodeKind::Link => &mut self.action_nodes,
        };
        if !list.contains(&node) {
            list.push(node);
        }
    }

    pub(crate) fn remove_node(&mut self, node: &Id) -> bool {
        let before = self.event_nodes.len() + self.action_nodes.len() + self.value_nodes.len();
        self.event_nodes.retain(|id| id != node);
        self.action_nodes.retain(|id| id != node);
        self.value_nodes.retain(|id| id != node);
        before != self.event_nodes.len() + self.action_nodes.len() + self.value_nodes.len()
    }

    /// Refresh the index hints of stored references after table compaction
    pub(crate) fn reindex(&mut self, lookup: impl Fn(&Id) -> Option<usize>) {
        for id in self
            .sub_graphs
            .iter_mut()
            .chain(&mut self.event_nodes)
            .chain(&mut self.action_nodes)
            .chain(&mut self.value_nodes)
        {
            id.index = lookup(id);
        }
    }
}

impl TableEntry for DirectorGraph {
    fn entry_id(&self) -> &Id {
        &self.id
    }

    fn entry_id_mut(&mut self) -> &mut Id {
        &mut self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_lists_by_kind() {
        let mut graph = DirectorGraph::new(None);
        let event = Id::new();
        let latent = Id::new();
        let value = Id::new();
        graph.add_node(event, NodeKind::Event);
        graph.add_node(latent, NodeKind::LatentAction);
        graph.add_node(value, NodeKind::Value);
        graph.add_node(value, NodeKind::Value);

        assert_eq!(graph.event_nodes(), &[event]);
        assert_eq!(graph.action_nodes(), &[latent]);
        assert_eq!(graph.value_nodes(), &[value]);
        assert_eq!(graph.nodes().count(), 3);

        assert!(graph.remove_node(&latent));
        assert!(!graph.remove_node(&latent));
    }

    #[test]
    fn test_is_empty() {
        let mut graph = DirectorGraph::new(None);
        assert!(graph.is_empty());
        let child = Id::new();
        graph.add_sub_graph(child);
        assert!(!graph.is_empty());
        assert!(graph.remove_sub_graph(&child));
        assert!(graph.is_empty());
    }
}
