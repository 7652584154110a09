// SPDX-License-Identifier: MIT OR Apache-2.0
//! The director: a script instance owning graphs, nodes and, at the root of
//! a family, the thread forest.
//!
//! Imported and child scripts are owned by the director that imported or
//! adopted them. They share a [`ScriptFamily`] with it, and every thread
//! operation is carried out by the family root.

use crate::config::DirectorConfig;
use crate::error::{DirectorError, Result};
use crate::family::ScriptFamily;
use crate::globals::{GlobalValueRegistry, ValueSlot};
use crate::graph::DirectorGraph;
use crate::id::{DirectorId, Id, NodeRef, ThreadId};
use crate::library::NodeManager;
use crate::link::{InputRef, OutputRef};
use crate::node::{Node, NodeKind};
use crate::notifier::DirectorNotifier;
use crate::persistence::ScriptFactory;
use crate::scheduler::Scheduler;
use crate::table::MasterTable;
use crate::thread::{scrub_node, ThreadData};
use crate::value::Value;
use crate::world::{GameManager, GameMap};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Name given to a cleared script
pub const UNTITLED: &str = "Untitled";

/// Descriptive script metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptMetadata {
    /// Script description
    pub description: String,
    /// Script author
    pub author: String,
    /// Copyright notice
    pub copyright: String,
    /// Creation time, seconds since the Unix epoch
    pub creation_time: String,
    /// Name of the script file the script was loaded from
    pub script_name: String,
    /// Resource identifier the script was loaded from
    pub resource: String,
    /// Script type; imports must match it
    pub script_type: String,
}

/// A director script instance
pub struct Director {
    id: DirectorId,
    pub(crate) family: Rc<ScriptFamily>,
    manager: Arc<NodeManager>,
    factory: Option<Rc<dyn ScriptFactory>>,
    pub(crate) config: DirectorConfig,
    game_manager: Option<Rc<dyn GameManager>>,
    map: Option<Rc<dyn GameMap>>,
    pub(crate) graphs: MasterTable<DirectorGraph>,
    pub(crate) nodes: MasterTable<Node>,
    pub(crate) root_graph: Id,
    pub(crate) imports: Vec<Director>,
    pub(crate) children: Vec<Director>,
    pub(crate) parent: Option<DirectorId>,
    pub(crate) metadata: ScriptMetadata,
    pub(crate) libraries: IndexMap<String, String>,
    pub(crate) scheduler: Scheduler,
    pub(crate) executing: bool,
    pub(crate) started: bool,
    pub(crate) imported: bool,
    enabled: bool,
    inherited_enabled: bool,
    pub(crate) node_logging: bool,
    modified: bool,
    script_owner: Option<Uuid>,
    pub(crate) missing_node_types: Vec<String>,
    pub(crate) missing_libraries: Vec<String>,
    pub(crate) missing_imported_scripts: Vec<String>,
}

impl Director {
    /// Create an empty, untitled script in a family of its own
    pub fn new(manager: Arc<NodeManager>, config: DirectorConfig) -> Self {
        let mut graphs = MasterTable::new();
        let (root_graph, root) = untitled_root();
        let index = graphs.add(root, None);

        let metadata = ScriptMetadata {
            script_type: config.script_type.clone(),
            creation_time: creation_time(),
            ..ScriptMetadata::default()
        };

        Self {
            id: DirectorId::new(),
            family: ScriptFamily::new(),
            manager,
            factory: None,
            scheduler: Scheduler::new(config.safety_timer()),
            node_logging: config.node_logging,
            config,
            game_manager: None,
            map: None,
            graphs,
            nodes: MasterTable::new(),
            root_graph: Id {
                index: Some(index),
                ..root_graph
            },
            imports: Vec::new(),
            children: Vec::new(),
            parent: None,
            metadata,
            libraries: IndexMap::new(),
            executing: false,
            started: false,
            imported: false,
            enabled: true,
            inherited_enabled: true,
            modified: false,
            script_owner: None,
            missing_node_types: Vec::new(),
            missing_libraries: Vec::new(),
            missing_imported_scripts: Vec::new(),
        }
    }

    /// Builder: attach a script factory for loading, saving and imports
    pub fn with_factory(mut self, factory: Rc<dyn ScriptFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Bind the world handles and load the configured default libraries
    pub fn init(
        &mut self,
        game_manager: Option<Rc<dyn GameManager>>,
        map: Option<Rc<dyn GameMap>>,
    ) -> Result<()> {
        self.game_manager = game_manager;
        self.map = map;
        self.reset()
    }

    /// Create an empty script sharing this script's manager, factory,
    /// configuration and world handles
    pub fn spawn_script(&self) -> Director {
        let mut script = Director::new(self.manager.clone(), self.config.clone());
        script.factory = self.factory.clone();
        script.game_manager = self.game_manager.clone();
        script.map = self.map.clone();
        script
    }

    /// Reset to an empty untitled script: graphs, nodes, threads, imports
    /// and metadata. The library list is reset to the configured defaults
    /// and the script waits for a new start notification.
    pub fn clear(&mut self) {
        if let Err(error) = self.reset() {
            tracing::warn!("Unable to load default libraries: {}", error);
        }
    }

    fn reset(&mut self) -> Result<()> {
        self.unregister_all_globals();
        for script in &self.imports {
            script.unregister_tree_globals();
        }

        self.nodes.clear();
        self.graphs.clear();
        let (root_graph, root) = untitled_root();
        let index = self.graphs.add(root, None);
        self.root_graph = Id {
            index: Some(index),
            ..root_graph
        };

        self.scheduler.clear();
        self.libraries.clear();
        self.imports.clear();
        self.metadata = ScriptMetadata {
            script_type: self.metadata.script_type.clone(),
            creation_time: creation_time(),
            ..ScriptMetadata::default()
        };
        self.missing_node_types.clear();
        self.missing_libraries.clear();
        self.missing_imported_scripts.clear();
        self.started = false;

        let libraries = self.config.default_libraries.clone();
        let result = libraries
            .iter()
            .try_for_each(|library| self.add_library(library, "1.0"));
        self.modified = false;
        result
    }

    /// Script identity
    pub fn id(&self) -> DirectorId {
        self.id
    }

    /// Script name, stored on the root graph
    pub fn name(&self) -> &str {
        self.graphs
            .get(&self.root_graph)
            .map_or(UNTITLED, |graph| graph.name.as_str())
    }

    /// Set the script name
    pub fn set_name(&mut self, name: impl Into<String>) {
        if let Some(graph) = self.graphs.get_mut(&self.root_graph) {
            graph.name = name.into();
            self.modified = true;
        }
    }

    /// Script comment, stored on the root graph
    pub fn comment(&self) -> &str {
        self.graphs
            .get(&self.root_graph)
            .map_or("", |graph| graph.comment.as_str())
    }

    /// Set the script comment
    pub fn set_comment(&mut self, comment: impl Into<String>) {
        if let Some(graph) = self.graphs.get_mut(&self.root_graph) {
            graph.comment = comment.into();
            self.modified = true;
        }
    }

    /// Descriptive metadata
    pub fn metadata(&self) -> &ScriptMetadata {
        &self.metadata
    }

    /// Mutable metadata
    pub fn metadata_mut(&mut self) -> &mut ScriptMetadata {
        self.modified = true;
        &mut self.metadata
    }

    /// Script type
    pub fn script_type(&self) -> &str {
        &self.metadata.script_type
    }

    /// Resource identifier the script was loaded from
    pub fn resource(&self) -> &str {
        &self.metadata.resource
    }

    /// Actor owning this script
    pub fn script_owner(&self) -> Option<Uuid> {
        self.script_owner
    }

    /// Set the owning actor of this script, its imports and children
    pub fn set_script_owner(&mut self, owner: Option<Uuid>) {
        self.script_owner = owner;
        for script in self.imports.iter_mut().chain(self.children.iter_mut()) {
            script.set_script_owner(owner);
        }
    }

    /// Player actor, shared by the family
    pub fn player(&self) -> Option<Uuid> {
        self.family.player()
    }

    /// Set the player actor for the family
    pub fn set_player(&self, player: Option<Uuid>) {
        self.family.set_player(player);
    }

    /// Whether node execution logging is on for this script
    pub fn node_logging(&self) -> bool {
        self.node_logging
    }

    /// Toggle node execution logging
    pub fn set_node_logging(&mut self, logging: bool) {
        self.node_logging = logging;
    }

    /// Whether this script and every ancestor are enabled
    pub fn is_enabled(&self) -> bool {
        self.enabled && self.inherited_enabled
    }

    /// Enable or disable the script. Disabling also disables every import
    /// and child.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        self.propagate_enabled();
    }

    fn propagate_enabled(&mut self) {
        let effective = self.is_enabled();
        for script in self.imports.iter_mut().chain(self.children.iter_mut()) {
            script.inherited_enabled = effective;
            script.propagate_enabled();
        }
    }

    /// Whether the script changed since it was loaded or saved
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Set the modified flag
    pub fn set_modified(&mut self, modified: bool) {
        self.modified = modified;
    }

    /// Whether this script was loaded as an import
    pub fn is_imported(&self) -> bool {
        self.imported
    }

    /// Whether the script has received its start notification
    pub fn has_started(&self) -> bool {
        self.started
    }

    /// Node types that could not be created while loading
    pub fn missing_node_types(&self) -> &[String] {
        &self.missing_node_types
    }

    /// Libraries that could not be loaded while loading
    pub fn missing_libraries(&self) -> &[String] {
        &self.missing_libraries
    }

    /// Imports that could not be loaded while loading
    pub fn missing_imported_scripts(&self) -> &[String] {
        &self.missing_imported_scripts
    }

    /// Configuration
    pub fn config(&self) -> &DirectorConfig {
        &self.config
    }

    /// Node library manager
    pub fn manager(&self) -> &Arc<NodeManager> {
        &self.manager
    }

    /// Script factory
    pub fn factory(&self) -> Option<Rc<dyn ScriptFactory>> {
        self.factory.clone()
    }

    /// Attach or replace the script factory
    pub fn set_factory(&mut self, factory: Option<Rc<dyn ScriptFactory>>) {
        self.factory = factory;
    }

    /// Game manager handle
    pub fn game_manager(&self) -> Option<&Rc<dyn GameManager>> {
        self.game_manager.as_ref()
    }

    /// Map handle
    pub fn map(&self) -> Option<&Rc<dyn GameMap>> {
        self.map.as_ref()
    }

    /// Shared family state
    pub fn family(&self) -> &Rc<ScriptFamily> {
        &self.family
    }

    /// Insert a node library at `position` in the library list.
    ///
    /// The library is loaded through the node manager if needed. A library
    /// already in the list is moved to the new position.
    pub fn insert_library(&mut self, position: usize, name: &str, version: &str) -> Result<()> {
        let library = self.manager.load_library(name).map_err(|error| {
            tracing::warn!("Unable to load node library '{}': {}", name, error);
            error
        })?;

        if !library.supports_script_type(self.script_type()) {
            tracing::warn!(
                "Node library '{}' of type '{}' does not support '{}' scripts",
                name,
                library.library_type(),
                self.script_type()
            );
            return Err(DirectorError::UnsupportedLibraryType {
                library: name.to_string(),
                library_type: library.library_type().to_string(),
            });
        }

        self.libraries.shift_remove(name);
        let position = position.min(self.libraries.len());
        self.libraries
            .shift_insert(position, name.to_string(), version.to_string());
        self.modified = true;
        Ok(())
    }

    /// Append a node library
    pub fn add_library(&mut self, name: &str, version: &str) -> Result<()> {
        let position = self.libraries.len();
        self.insert_library(position, name, version)
    }

    /// Remove a node library from the list
    pub fn remove_library(&mut self, name: &str) -> bool {
        let removed = self.libraries.shift_remove(name).is_some();
        self.modified |= removed;
        removed
    }

    /// Whether the library is in this script's list
    pub fn has_library(&self, name: &str) -> bool {
        self.libraries.contains_key(name)
    }

    /// Library names and versions, in order
    pub fn libraries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.libraries
            .iter()
            .map(|(name, version)| (name.as_str(), version.as_str()))
    }

    /// Version of a listed library
    pub fn library_version(&self, name: &str) -> Option<&str> {
        self.libraries.get(name).map(String::as_str)
    }

    fn library_in_use(&self, name: &str) -> bool {
        self.has_library(name) || self.imports.iter().any(|script| script.library_in_use(name))
    }

    /// The root graph
    pub fn root_graph(&self) -> Id {
        self.root_graph
    }

    /// Look up one of this script's graphs
    pub fn graph(&self, id: &Id) -> Option<&DirectorGraph> {
        self.graphs.get(id)
    }

    /// Look up one of this script's graphs mutably
    pub fn graph_mut(&mut self, id: &Id) -> Option<&mut DirectorGraph> {
        self.graphs.get_mut(id)
    }

    /// Look up a graph, optionally searching imported scripts too
    pub fn find_graph(&self, id: &Id, include_imports: bool) -> Option<&DirectorGraph> {
        self.graphs.get(id).or_else(|| {
            include_imports
                .then(|| self.imports.iter().find_map(|script| script.find_graph(id, true)))
                .flatten()
        })
    }

    /// Every graph of this script
    pub fn graphs(&self) -> impl Iterator<Item = &DirectorGraph> {
        self.graphs.iter()
    }

    /// Add an empty sub-graph under `parent`
    pub fn add_graph(&mut self, parent: &Id) -> Option<Id> {
        self.add_graph_with_uid(parent, None)
    }

    pub(crate) fn add_graph_with_uid(&mut self, parent: &Id, uid: Option<Uuid>) -> Option<Id> {
        let parent_id = self.graphs.get(parent)?.id;
        let mut graph = DirectorGraph::new(Some(parent_id));
        if let Some(uid) = uid {
            if self.graphs.contains(&Id::from_uid(uid)) {
                return None;
            }
            graph.id = Id::from_uid(uid);
        }

        let uid = graph.id.uid;
        let index = self.graphs.add(graph, None);
        let id = Id {
            uid,
            index: Some(index),
        };
        if let Some(parent) = self.graphs.get_mut(&parent_id) {
            parent.add_sub_graph(id);
        }
        self.modified = true;
        Some(id)
    }

    /// Delete a graph, its sub-graphs and all their nodes. The root graph
    /// cannot be deleted.
    pub fn delete_graph(&mut self, id: &Id) -> bool {
        if *id == self.root_graph {
            tracing::warn!("{}", DirectorError::RootGraph);
            return false;
        }
        let Some(graph) = self.graphs.get(id) else {
            return false;
        };

        let graph_id = graph.id;
        let parent = graph.parent;
        let sub_graphs = graph.sub_graphs().to_vec();
        let nodes: Vec<Id> = graph.nodes().copied().collect();

        for sub_graph in sub_graphs {
            self.delete_graph(&sub_graph);
        }
        for node in nodes {
            self.delete_node(&node);
        }
        if let Some(parent) = parent.and_then(|parent| self.graphs.get_mut(&parent)) {
            parent.remove_sub_graph(&graph_id);
        }

        self.graphs.remove(&graph_id);
        self.modified = true;
        true
    }

    /// Create a node of type `type_name` (`Category.Name` or bare name) in
    /// `graph`.
    ///
    /// The type's library must be listed by this script or one of its
    /// imports.
    pub fn create_node(&mut self, type_name: &str, graph: &Id) -> Result<Id> {
        self.create_node_with_uid(type_name, graph, None)
    }

    pub(crate) fn create_node_with_uid(
        &mut self,
        type_name: &str,
        graph: &Id,
        uid: Option<Uuid>,
    ) -> Result<Id> {
        let graph_id = self
            .graphs
            .get(graph)
            .map(|graph| graph.id)
            .ok_or(DirectorError::GraphNotFound(*graph))?;

        let (library, node_type) = self
            .manager
            .find_node_type(type_name)
            .ok_or_else(|| DirectorError::NodeTypeNotFound(type_name.to_string()))?;

        if !self.library_in_use(&node_type.library) {
            return Err(DirectorError::LibraryNotUsed(node_type.library.clone()));
        }

        let behavior = library.create_behavior(&node_type);
        if behavior.is_none() {
            tracing::debug!("Node type '{}' has no behavior", node_type.full_name());
        }

        let kind = node_type.kind;
        let mut node = Node::new(node_type, graph_id, behavior);
        if let Some(uid) = uid {
            node.id = Id::from_uid(uid);
        }
        node.imported = self.imported;

        let uid = node.id.uid;
        let index = self.nodes.add(node, None);
        let id = Id {
            uid,
            index: Some(index),
        };

        if let Some(graph) = self.graphs.get_mut(&graph_id) {
            graph.add_node(id, kind);
        }
        self.modified = true;
        Ok(id)
    }

    /// Delete a node.
    ///
    /// The node leaves its graph and the master table, loses every link
    /// pointing at it and its global registration. Frames of the root's
    /// thread forest that visit it are retired.
    pub fn delete_node(&mut self, id: &Id) -> bool {
        let Some(node) = self.nodes.get(id) else {
            return false;
        };
        let node_id = node.id;
        let graph = node.graph;

        if node.global {
            let key = global_key(node);
            self.family.globals.unregister(&key, &node_id);
        }
        if let Some(graph) = self.graphs.get_mut(&graph) {
            graph.remove_node(&node_id);
        }

        let node_ref = NodeRef::new(self.id, node_id);
        let scrubbed = scrub_node(&mut self.scheduler.threads, &node_ref);
        if scrubbed.frames > 0 {
            tracing::debug!("Retired {} frame(s) of deleted node {}", scrubbed.frames, node_id);
        }

        let Some(mut node) = self.nodes.remove(&node_id) else {
            return false;
        };
        if scrubbed.waiting > 0 && !node.kind().is_event() {
            if let Some(behavior) = node.behavior.as_mut() {
                behavior.unregister_messages();
            }
        }

        for other in self.nodes.iter_mut() {
            other.unlink_node(&node_id);
        }

        self.modified = true;
        true
    }

    /// Look up one of this script's nodes
    pub fn node(&self, id: &Id) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Look up one of this script's nodes mutably
    pub fn node_mut(&mut self, id: &Id) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    /// Look up a node, optionally searching imported scripts too
    pub fn find_node(&self, id: &Id, include_imports: bool) -> Option<&Node> {
        self.nodes.get(id).or_else(|| {
            include_imports
                .then(|| self.imports.iter().find_map(|script| script.find_node(id, true)))
                .flatten()
        })
    }

    /// Locate a node anywhere in this script, its imports or its children
    pub fn locate_node(&self, id: &Id) -> Option<NodeRef> {
        if let Some(node) = self.nodes.get(id) {
            return Some(NodeRef::new(self.id, node.id));
        }
        self.imports
            .iter()
            .chain(&self.children)
            .find_map(|script| script.locate_node(id))
    }

    /// Resolve a node reference within this script's subtree
    pub fn resolve_node(&self, node: &NodeRef) -> Option<&Node> {
        self.find_script(node.script)?.nodes.get(&node.node)
    }

    /// Nodes whose name or type name is `name` and whose type category is
    /// `category`; an empty argument matches anything. Imported scripts
    /// are searched after this one.
    pub fn nodes_named(&self, name: &str, category: &str) -> Vec<NodeRef> {
        let mut found: Vec<NodeRef> = self
            .nodes
            .iter()
            .filter(|node| name.is_empty() || node.name == name || node.node_type().name == name)
            .filter(|node| category.is_empty() || node.node_type().category == category)
            .map(|node| NodeRef::new(self.id, node.id))
            .collect();
        for script in &self.imports {
            found.extend(script.nodes_named(name, category));
        }
        found
    }

    /// Every node, optionally including imported scripts
    pub fn all_nodes(&self, include_imports: bool) -> Vec<NodeRef> {
        let mut found: Vec<NodeRef> = self
            .nodes
            .iter()
            .map(|node| NodeRef::new(self.id, node.id))
            .collect();
        if include_imports {
            for script in &self.imports {
                found.extend(script.all_nodes(true));
            }
        }
        found
    }

    /// First value node with this name, searching imports after this script
    pub fn value_node(&self, name: &str) -> Option<NodeRef> {
        self.nodes
            .iter()
            .find(|node| node.kind().is_value() && node.name == name)
            .map(|node| NodeRef::new(self.id, node.id))
            .or_else(|| self.imports.iter().find_map(|script| script.value_node(name)))
    }

    /// Remote event nodes listening for `name`, here and in imports
    pub fn remote_events(&self, name: &str) -> Vec<NodeRef> {
        let mut found: Vec<NodeRef> = self
            .nodes
            .iter()
            .filter(|node| node.node_type().name == crate::nodes::REMOTE_EVENT && node.name == name)
            .map(|node| NodeRef::new(self.id, node.id))
            .collect();
        for script in &self.imports {
            found.extend(script.remote_events(name));
        }
        found
    }

    /// Rename a node. Global value nodes move to the registry key of
    /// their new name.
    pub fn set_node_name(&mut self, id: &Id, name: impl Into<String>) -> bool {
        let name = name.into();
        let Some(node) = self.nodes.get(id) else {
            return false;
        };
        let (node_id, global) = (node.id, node.global);

        if global {
            self.family.globals.unregister(&global_key(node), &node_id);
        }
        if let Some(node) = self.nodes.get_mut(&node_id) {
            node.name = name;
        }
        if global {
            self.register_global(&node_id);
        }
        self.modified = true;
        true
    }

    /// Enable or disable a node
    pub fn set_node_enabled(&mut self, id: &Id, enabled: bool) -> bool {
        match self.nodes.get_mut(id) {
            Some(node) => {
                node.set_enabled(enabled);
                self.modified = true;
                true
            }
            None => false,
        }
    }

    /// A node is enabled when its own flag and its script are enabled
    pub fn is_node_enabled(&self, id: &Id) -> bool {
        self.is_enabled() && self.nodes.get(id).is_some_and(Node::is_enabled)
    }

    fn output_slot(&self, node: &Id, output: &str) -> Result<(Id, usize)> {
        let source = self.nodes.get(node).ok_or(DirectorError::NodeNotFound(*node))?;
        let index = source.output_index(output).ok_or_else(|| DirectorError::LinkNotFound {
            node: *node,
            link: output.to_string(),
        })?;
        Ok((source.id, index))
    }

    fn input_slot(&self, node: &Id, input: &str) -> Result<InputRef> {
        let target = self.nodes.get(node).ok_or(DirectorError::NodeNotFound(*node))?;
        let index = target.input_index(input).ok_or_else(|| DirectorError::LinkNotFound {
            node: *node,
            link: input.to_string(),
        })?;
        Ok(InputRef::new(target.id.unindexed(), index))
    }

    /// Connect an output of one node to an input of another
    pub fn connect(&mut self, from: &Id, output: &str, to: &Id, input: &str) -> Result<()> {
        let (source, index) = self.output_slot(from, output)?;
        let target = self.input_slot(to, input)?;
        if let Some(node) = self.nodes.get_mut(&source) {
            node.outputs_mut()[index].connect(target);
        }
        self.modified = true;
        Ok(())
    }

    /// Remove an output-to-input connection
    pub fn disconnect(&mut self, from: &Id, output: &str, to: &Id, input: &str) -> bool {
        let (Ok((source, index)), Ok(target)) =
            (self.output_slot(from, output), self.input_slot(to, input))
        else {
            return false;
        };
        let removed = self
            .nodes
            .get_mut(&source)
            .is_some_and(|node| node.outputs_mut()[index].disconnect(&target));
        self.modified |= removed;
        removed
    }

    /// Bind a value node to a value link
    pub fn connect_value(&mut self, node: &Id, link: &str, value: &Id) -> Result<()> {
        let value_node = self.nodes.get(value).ok_or(DirectorError::NodeNotFound(*value))?;
        if !value_node.kind().is_value() {
            return Err(DirectorError::NotAValueNode(*value));
        }
        let value_id = value_node.id.unindexed();

        let owner = self.nodes.get_mut(node).ok_or(DirectorError::NodeNotFound(*node))?;
        let index = owner.value_link_index(link).ok_or_else(|| DirectorError::LinkNotFound {
            node: *node,
            link: link.to_string(),
        })?;
        owner.value_links_mut()[index].connect(value_id);
        self.modified = true;
        Ok(())
    }

    /// Unbind a value node from a value link
    pub fn disconnect_value(&mut self, node: &Id, link: &str, value: &Id) -> bool {
        let Some(owner) = self.nodes.get_mut(node) else {
            return false;
        };
        let Some(index) = owner.value_link_index(link) else {
            return false;
        };
        owner.value_links_mut()[index].disconnect(value)
    }

    /// Redirect an output so that its activations follow another output's
    /// links
    pub fn set_output_redirect(&mut self, node: &Id, output: &str, target: Option<(&Id, &str)>) -> Result<()> {
        let (source, index) = self.output_slot(node, output)?;
        let redirect = match target {
            Some((target, name)) => {
                let (target, target_index) = self.output_slot(target, name)?;
                Some(OutputRef::new(target.unindexed(), target_index))
            }
            None => None,
        };
        if let Some(node) = self.nodes.get_mut(&source) {
            node.outputs_mut()[index].redirect = redirect;
        }
        Ok(())
    }

    /// Redirect an input so that activations land on another input
    pub fn set_input_redirect(&mut self, node: &Id, input: &str, target: Option<(&Id, &str)>) -> Result<()> {
        let slot = self.input_slot(node, input)?;
        let redirect = match target {
            Some((target, name)) => Some(self.input_slot(target, name)?),
            None => None,
        };
        if let Some(node) = self.nodes.get_mut(&slot.node) {
            node.inputs_mut()[slot.input].redirect = redirect;
        }
        Ok(())
    }

    /// Current value of a value node
    pub fn value(&self, id: &Id) -> Option<Value> {
        self.nodes.get(id).and_then(Node::value)
    }

    /// Set a value node's current value, converting to its type.
    ///
    /// The notifier is told about the change, and global nodes push the
    /// new value to the rest of their key. Returns true if the value
    /// changed.
    pub fn set_value(&mut self, id: &Id, value: impl Into<Value>) -> bool {
        let value = value.into();
        let Some(node) = self.nodes.get(id) else {
            return false;
        };
        match node.write_value(&value) {
            Some(stored) => {
                self.on_value_changed(node, &stored, ValueSlot::Current);
                true
            }
            None => false,
        }
    }

    /// Set a value node's initial value. Global nodes propagate it.
    pub fn set_initial_value(&mut self, id: &Id, value: impl Into<Value>) -> bool {
        let value = value.into();
        let Some(node) = self.nodes.get(id) else {
            return false;
        };
        match node.write_initial_value(&value) {
            Some(stored) => {
                self.on_value_changed(node, &stored, ValueSlot::Initial);
                self.modified = true;
                true
            }
            None => false,
        }
    }

    fn on_value_changed(&self, node: &Node, value: &Value, slot: ValueSlot) {
        let notifier = self.family.notifier();
        if slot == ValueSlot::Current {
            if let Some(notifier) = &notifier {
                notifier.on_value_changed(&node.id, value);
            }
        }

        if node.global {
            let key = global_key(node);
            self.family.globals.propagate(&key, &node.id, value, slot, |other, value| {
                if let Some(notifier) = &notifier {
                    notifier.on_value_changed(other, value);
                }
            });
        }
    }

    /// Restore every value node of this script and its children to its
    /// initial value
    pub fn reset_values(&mut self) {
        let ids: Vec<Id> = self
            .nodes
            .iter()
            .filter(|node| node.kind().is_value())
            .map(|node| node.id)
            .collect();
        for id in ids {
            if let Some(initial) = self.nodes.get(&id).and_then(Node::initial_value) {
                self.set_value(&id, initial);
            }
        }
        for child in &mut self.children {
            child.reset_values();
        }
    }

    /// Flag a value node as global or local
    pub fn set_global(&mut self, id: &Id, global: bool) -> bool {
        let Some(node) = self.nodes.get_mut(id) else {
            return false;
        };
        if !node.kind().is_value() || node.global == global {
            return false;
        }
        node.global = global;
        let node_id = node.id;

        if global {
            self.register_global(&node_id);
        } else if let Some(node) = self.nodes.get(&node_id) {
            self.family.globals.unregister(&global_key(node), &node_id);
        }
        self.modified = true;
        true
    }

    /// Registry key of a value node
    pub fn global_key(&self, id: &Id) -> Option<String> {
        self.nodes.get(id).map(global_key)
    }

    fn register_global(&self, id: &Id) -> bool {
        let Some(node) = self.nodes.get(id) else {
            return false;
        };
        let Some(cell) = node.shared_value() else {
            return false;
        };
        self.family.globals.register(&global_key(node), node.id, cell)
    }

    fn unregister_all_globals(&self) {
        for node in self.nodes.iter().filter(|node| node.global) {
            self.family.globals.unregister(&global_key(node), &node.id);
        }
    }

    pub(crate) fn unregister_tree_globals(&self) {
        self.unregister_all_globals();
        for script in self.imports.iter().chain(&self.children) {
            script.unregister_tree_globals();
        }
    }

    /// Parent script, if this script is nested
    pub fn parent(&self) -> Option<DirectorId> {
        self.parent
    }

    /// Whether this script owns its family's thread forest
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Imported scripts, in import order
    pub fn imports(&self) -> &[Director] {
        &self.imports
    }

    /// Child scripts
    pub fn children(&self) -> &[Director] {
        &self.children
    }

    /// Look up a child script
    pub fn child(&self, id: DirectorId) -> Option<&Director> {
        self.children.iter().find(|child| child.id == id)
    }

    /// Look up a child script mutably
    pub fn child_mut(&mut self, id: DirectorId) -> Option<&mut Director> {
        self.children.iter_mut().find(|child| child.id == id)
    }

    /// Adopt a script as a child.
    ///
    /// The child joins this family: its globals move to this family's
    /// registry and its thread requests are handled by the family root. A
    /// script already in this subtree is rejected and handed back.
    pub fn add_child(&mut self, mut child: Director) -> std::result::Result<DirectorId, Director> {
        if self.find_script(child.id).is_some() {
            return Err(child);
        }

        child.attach_to(self);
        let id = child.id;
        self.children.push(child);
        Ok(id)
    }

    /// Release a child script into a family of its own
    pub fn remove_child(&mut self, id: DirectorId) -> Option<Director> {
        let index = self.children.iter().position(|child| child.id == id)?;
        let mut child = self.children.remove(index);
        child.detach();
        Some(child)
    }

    pub(crate) fn attach_to(&mut self, parent: &Director) {
        self.parent = Some(parent.id);
        self.inherited_enabled = parent.is_enabled();
        self.propagate_enabled();
        self.adopt_family(parent.family.clone());
    }

    pub(crate) fn detach(&mut self) {
        self.parent = None;
        self.inherited_enabled = true;
        self.propagate_enabled();
        self.adopt_family(ScriptFamily::new());
    }

    /// Move this script and everything below it into `family`
    fn adopt_family(&mut self, family: Rc<ScriptFamily>) {
        if Rc::ptr_eq(&self.family, &family) {
            return;
        }

        self.unregister_all_globals();
        family.absorb(&self.family);
        self.family = family;

        let globals: Vec<Id> = self
            .nodes
            .iter()
            .filter(|node| node.global)
            .map(|node| node.id)
            .collect();
        for id in globals {
            self.register_global(&id);
        }

        let family = self.family.clone();
        for script in self.imports.iter_mut().chain(self.children.iter_mut()) {
            script.adopt_family(family.clone());
        }
    }

    /// Find a script in this script's subtree
    pub fn find_script(&self, id: DirectorId) -> Option<&Director> {
        if self.id == id {
            return Some(self);
        }
        self.imports
            .iter()
            .chain(&self.children)
            .find_map(|script| script.find_script(id))
    }

    /// Find a script in this script's subtree, mutably
    pub fn find_script_mut(&mut self, id: DirectorId) -> Option<&mut Director> {
        if self.id == id {
            return Some(self);
        }
        self.imports
            .iter_mut()
            .chain(self.children.iter_mut())
            .find_map(|script| script.find_script_mut(id))
    }

    /// Attach or detach the family notifier
    pub fn set_notifier(&self, notifier: Option<Rc<dyn DirectorNotifier>>) {
        self.family.set_notifier(notifier);
    }

    /// The family notifier
    pub fn notifier(&self) -> Option<Rc<dyn DirectorNotifier>> {
        self.family.notifier()
    }

    /// Turn debugging on or off for the whole family. Turning it on arms a
    /// single step.
    pub fn toggle_debug_enabled(&self, enabled: bool) {
        let was_debugging = self.family.is_debugging();
        if let Some(notifier) = self.family.notifier() {
            if !was_debugging && enabled {
                notifier.on_begin_debugging();
                self.family.set_should_step(true);
            } else if was_debugging && !enabled {
                notifier.on_end_debugging();
            }
        }
        self.family.set_debugging(enabled);
    }

    /// Whether the family is paused for debugging
    pub fn is_debugging(&self) -> bool {
        self.family.is_debugging()
    }

    /// Arm a single debugger step
    pub fn step_debugger(&self) {
        self.family.set_should_step(true);
    }

    /// Fire an event node's output and begin a thread on it
    pub fn trigger_event(&mut self, node: &Id, output: &str) -> Option<ThreadId> {
        let event = self.nodes.get_mut(node)?;
        if event.kind() != NodeKind::Event {
            tracing::warn!("Node {} is not an event and cannot be triggered", event.display_name());
            return None;
        }
        if !event.activate_output(output) {
            tracing::warn!("Event {} has no output '{}'", event.display_name(), output);
            return None;
        }
        let node_ref = NodeRef::new(self.id, event.id);
        self.begin_thread(node_ref, 0)
    }

    /// Whether a root thread with this ID is running; `None` asks whether
    /// any thread is running. Only the family root runs threads.
    pub fn is_running(&self, thread: Option<ThreadId>) -> bool {
        match thread {
            None => !self.scheduler.threads.is_empty(),
            Some(id) => self.scheduler.threads.iter().any(|data| data.id == id),
        }
    }

    /// The root thread forest
    pub fn threads(&self) -> &[ThreadData] {
        &self.scheduler.threads
    }

    /// Compact both master tables so IDs are dense, then refresh stored
    /// index hints
    pub fn compact_ids(&mut self) {
        let node_moves = self.nodes.compact();
        let graph_moves = self.graphs.compact();
        if node_moves.is_empty() && graph_moves.is_empty() {
            return;
        }

        let positions: HashMap<Uuid, usize> = self
            .nodes
            .iter()
            .map(|node| node.id)
            .chain(self.graphs.iter().map(|graph| graph.id))
            .filter_map(|id| id.index.map(|index| (id.uid, index)))
            .collect();
        let lookup = |id: &Id| positions.get(&id.uid).copied();

        for graph in self.graphs.iter_mut() {
            graph.reindex(lookup);
            graph.parent = graph.parent.map(|parent| Id {
                index: lookup(&parent),
                ..parent
            });
        }
        for node in self.nodes.iter_mut() {
            node.graph.index = lookup(&node.graph);
        }
        self.root_graph.index = lookup(&self.root_graph);

        tracing::debug!(
            "Compacted IDs: {} node(s) and {} graph(s) moved",
            node_moves.len(),
            graph_moves.len()
        );
    }
}

/// Registry key of a value node: `name [Category.Type]`
pub(crate) fn global_key(node: &Node) -> String {
    GlobalValueRegistry::key(&node.name, &node.node_type().full_name())
}

fn untitled_root() -> (Id, DirectorGraph) {
    let mut root = DirectorGraph::new(None);
    root.name = UNTITLED.to_string();
    (root.id, root)
}

fn creation_time() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs().to_string())
        .unwrap_or_default()
}

impl fmt::Debug for Director {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Director")
            .field("id", &self.id)
            .field("name", &self.name())
            .field("script_type", &self.metadata.script_type)
            .field("parent", &self.parent)
            .field("graphs", &self.graphs.len())
            .field("nodes", &self.nodes.len())
            .field("imports", &self.imports.len())
            .field("children", &self.children.len())
            .field("threads", &self.scheduler.threads.len())
            .finish_non_exhaustive()
    }
}
