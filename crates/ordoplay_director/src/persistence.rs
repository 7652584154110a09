// SPDX-License-Identifier: MIT OR Apache-2.0
//! Script documents and the factories that load and save them.
//!
//! A [`ScriptDocument`] is the serialized form of one script: its
//! metadata, libraries, imports and graph tree, with nodes and links
//! addressed by UUID and link name. Mirror graphs of imported scripts are
//! not stored; they are rebuilt when the imports are loaded again.
//!
//! Loading is lenient. Node types, libraries and imports that cannot be
//! resolved are recorded on the script and skipped.

use crate::director::{Director, ScriptMetadata};
use crate::error::{DirectorError, Result};
use crate::graph::DirectorGraph;
use crate::id::Id;
use crate::link::{InputRef, OutputRef};
use crate::node::Node;
use crate::table::MasterTable;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Current document format version
pub const DOCUMENT_VERSION: u32 = 1;

/// File extension of RON script documents
pub const SCRIPT_EXTENSION: &str = "dtdir.ron";

/// Loads and stores script documents by resource name
pub trait ScriptFactory {
    /// Read the document stored under `resource`
    fn load(&self, resource: &str) -> Result<ScriptDocument>;

    /// Store a document under `resource`
    fn save(&self, resource: &str, document: &ScriptDocument) -> Result<()>;

    /// Canonical form of a resource name
    fn resolve_resource(&self, resource: &str) -> String {
        resource.to_string()
    }

    /// Create an empty script to load an import into
    fn create_script(&self, host: &Director) -> Director {
        host.spawn_script()
    }
}

/// Serialized script
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptDocument {
    /// Format version
    pub version: u32,
    /// Script metadata
    #[serde(default)]
    pub metadata: ScriptMetadata,
    /// Node execution logging flag
    #[serde(default)]
    pub node_logging: bool,
    /// Libraries with their versions, in order
    #[serde(default)]
    pub libraries: Vec<LibraryEntry>,
    /// Resources of imported scripts, in order
    #[serde(default)]
    pub imports: Vec<String>,
    /// Graphs, parents before children; the first one is the root
    pub graphs: Vec<GraphDocument>,
}

/// A library listed by a script
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryEntry {
    /// Library name
    pub name: String,
    /// Library version
    pub version: String,
}

/// Serialized graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphDocument {
    /// Graph identity
    pub id: Uuid,
    /// Parent graph, `None` for the root
    #[serde(default)]
    pub parent: Option<Uuid>,
    /// Graph name
    pub name: String,
    /// Designer comment
    #[serde(default)]
    pub comment: String,
    /// Enabled flag
    #[serde(default = "enabled")]
    pub enabled: bool,
    /// Nodes owned by the graph
    #[serde(default)]
    pub nodes: Vec<NodeDocument>,
}

/// Serialized node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDocument {
    /// Node identity
    pub id: Uuid,
    /// Full type name, `Category.Name`
    pub node_type: String,
    /// Instance name
    #[serde(default)]
    pub name: String,
    /// Designer comment
    #[serde(default)]
    pub comment: String,
    /// Enabled flag
    #[serde(default = "enabled")]
    pub enabled: bool,
    /// Per-node logging flag
    #[serde(default = "enabled")]
    pub logging: bool,
    /// Shares its value across the family
    #[serde(default)]
    pub global: bool,
    /// Initial value, for value nodes
    #[serde(default)]
    pub value: Option<Value>,
    /// Outputs that carry links or a redirect
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<OutputDocument>,
    /// Inputs that carry a redirect
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<InputDocument>,
    /// Value links that differ from their defaults
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub value_links: Vec<ValueLinkDocument>,
}

/// A link endpoint addressed by node and link name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkTarget {
    /// Target node
    pub node: Uuid,
    /// Link name on the target node
    pub link: String,
}

/// Serialized output link
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputDocument {
    /// Output name
    pub name: String,
    /// Connected inputs
    #[serde(default)]
    pub links: Vec<LinkTarget>,
    /// Redirect to another output
    #[serde(default)]
    pub redirect: Option<LinkTarget>,
}

/// Serialized input redirect
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputDocument {
    /// Input name
    pub name: String,
    /// Redirect to another input
    pub redirect: LinkTarget,
}

/// Serialized value link
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueLinkDocument {
    /// Value link name
    pub name: String,
    /// Default used while nothing is bound
    #[serde(default)]
    pub default: Option<Value>,
    /// Bound value nodes
    #[serde(default)]
    pub values: Vec<Uuid>,
}

fn enabled() -> bool {
    true
}

impl ScriptDocument {
    /// Parse a RON document
    pub fn from_ron(source: &str) -> Result<Self> {
        let document: Self = ron::from_str(source)?;
        if document.version > DOCUMENT_VERSION {
            return Err(DirectorError::UnsupportedVersion(document.version));
        }
        Ok(document)
    }

    /// Write the document as pretty RON
    pub fn to_ron(&self) -> Result<String> {
        let config = ron::ser::PrettyConfig::default().struct_names(true);
        Ok(ron::ser::to_string_pretty(self, config)?)
    }
}

/// Stores documents as RON files below a root directory
#[derive(Debug, Clone)]
pub struct RonScriptFactory {
    root: PathBuf,
}

impl RonScriptFactory {
    /// Create a factory resolving resources against `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File path of a resource
    pub fn path_of(&self, resource: &str) -> PathBuf {
        self.root.join(self.resolve_resource(resource))
    }
}

impl ScriptFactory for RonScriptFactory {
    fn load(&self, resource: &str) -> Result<ScriptDocument> {
        let content = std::fs::read_to_string(self.path_of(resource))?;
        ScriptDocument::from_ron(&content)
    }

    fn save(&self, resource: &str, document: &ScriptDocument) -> Result<()> {
        let path = self.path_of(resource);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, document.to_ron()?)?;
        Ok(())
    }

    fn resolve_resource(&self, resource: &str) -> String {
        let resource = resource.replace('\\', "/");
        if resource.ends_with(SCRIPT_EXTENSION) {
            resource
        } else {
            format!("{resource}.{SCRIPT_EXTENSION}")
        }
    }
}

/// Keeps documents in memory as RON text
#[derive(Debug, Default)]
pub struct MemoryScriptFactory {
    documents: RefCell<HashMap<String, String>>,
}

impl MemoryScriptFactory {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a document under `resource`
    pub fn insert(&self, resource: impl Into<String>, document: &ScriptDocument) -> Result<()> {
        self.documents
            .borrow_mut()
            .insert(resource.into(), document.to_ron()?);
        Ok(())
    }

    /// Stored RON text of a resource
    pub fn source(&self, resource: &str) -> Option<String> {
        self.documents.borrow().get(resource).cloned()
    }
}

impl ScriptFactory for MemoryScriptFactory {
    fn load(&self, resource: &str) -> Result<ScriptDocument> {
        let source = self.source(resource).ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no script stored as '{resource}'"),
            )
        })?;
        ScriptDocument::from_ron(&source)
    }

    fn save(&self, resource: &str, document: &ScriptDocument) -> Result<()> {
        self.insert(resource, document)
    }
}

impl Director {
    /// Load a script through the factory, replacing this script's content
    pub fn load_script(&mut self, resource: &str) -> Result<()> {
        let factory = self.factory().ok_or(DirectorError::NoScriptFactory)?;
        let resource = factory.resolve_resource(resource);
        let document = factory.load(&resource).map_err(|error| {
            tracing::warn!("Unable to load script '{}': {}", resource, error);
            error
        })?;

        self.apply_document(&document)?;
        self.metadata.script_name = script_name(&resource);
        self.metadata.resource = resource;
        self.set_modified(false);
        tracing::debug!(
            "Loaded script '{}' ({} graphs, {} nodes)",
            self.name(),
            self.graphs.len(),
            self.nodes.len()
        );
        Ok(())
    }

    /// Save this script through the factory
    pub fn save_script(&mut self, resource: &str) -> Result<()> {
        let factory = self.factory().ok_or(DirectorError::NoScriptFactory)?;
        let resource = factory.resolve_resource(resource);
        self.metadata.script_name = script_name(&resource);
        self.metadata.resource.clone_from(&resource);

        factory.save(&resource, &self.to_document()).map_err(|error| {
            tracing::warn!("Unable to save script '{}': {}", resource, error);
            error
        })?;
        self.set_modified(false);
        Ok(())
    }

    /// Serialize this script. Imported scripts are referenced by resource.
    pub fn to_document(&self) -> ScriptDocument {
        let mut graphs = Vec::new();
        self.collect_graph_documents(&self.root_graph, &mut graphs);

        ScriptDocument {
            version: DOCUMENT_VERSION,
            metadata: self.metadata.clone(),
            node_logging: self.node_logging,
            libraries: self
                .libraries()
                .map(|(name, version)| LibraryEntry {
                    name: name.to_string(),
                    version: version.to_string(),
                })
                .collect(),
            imports: self.imports.iter().map(|script| script.resource().to_string()).collect(),
            graphs,
        }
    }

    fn collect_graph_documents(&self, id: &Id, out: &mut Vec<GraphDocument>) {
        let Some(graph) = self.graphs.get(id) else {
            return;
        };
        if graph.is_imported() {
            return;
        }

        out.push(GraphDocument {
            id: graph.id.uid,
            parent: graph.parent.map(|parent| parent.uid),
            name: graph.name.clone(),
            comment: graph.comment.clone(),
            enabled: graph.enabled,
            nodes: graph
                .nodes()
                .filter_map(|node| self.nodes.get(node))
                .map(|node| self.node_document(node))
                .collect(),
        });

        for sub_graph in graph.sub_graphs() {
            self.collect_graph_documents(sub_graph, out);
        }
    }

    fn node_document(&self, node: &Node) -> NodeDocument {
        let outputs = node
            .outputs()
            .iter()
            .filter(|output| !output.links.is_empty() || output.redirect.is_some())
            .map(|output| OutputDocument {
                name: output.name.clone(),
                links: output
                    .links
                    .iter()
                    .filter_map(|target| self.input_target(target))
                    .collect(),
                redirect: output.redirect.and_then(|redirect| self.output_target(&redirect)),
            })
            .collect();

        let inputs = node
            .inputs()
            .iter()
            .filter_map(|input| {
                let redirect = self.input_target(&input.redirect?)?;
                Some(InputDocument {
                    name: input.name.clone(),
                    redirect,
                })
            })
            .collect();

        let value_links = node
            .value_links()
            .iter()
            .map(|link| ValueLinkDocument {
                name: link.name.clone(),
                default: Some(link.default.clone()),
                values: link.values.iter().map(|value| value.uid).collect(),
            })
            .collect();

        NodeDocument {
            id: node.id.uid,
            node_type: node.node_type().full_name(),
            name: node.name().to_string(),
            comment: node.comment().to_string(),
            enabled: node.is_enabled(),
            logging: node.logging(),
            global: node.is_global(),
            value: node.initial_value(),
            outputs,
            inputs,
            value_links,
        }
    }

    fn input_target(&self, target: &InputRef) -> Option<LinkTarget> {
        let node = self.nodes.get(&target.node)?;
        Some(LinkTarget {
            node: node.id.uid,
            link: node.input_name(target.input)?.to_string(),
        })
    }

    fn output_target(&self, target: &OutputRef) -> Option<LinkTarget> {
        let node = self.nodes.get(&target.node)?;
        Some(LinkTarget {
            node: node.id.uid,
            link: node.outputs().get(target.output)?.name.clone(),
        })
    }

    /// Replace this script's content with a document.
    ///
    /// Unknown libraries, node types and imports are recorded in the
    /// `missing_*` lists. Links to nodes that were skipped are dropped.
    pub fn apply_document(&mut self, document: &ScriptDocument) -> Result<()> {
        if document.version > DOCUMENT_VERSION {
            return Err(DirectorError::UnsupportedVersion(document.version));
        }
        let Some(root) = document.graphs.first() else {
            return Err(DirectorError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "script document has no root graph",
            )));
        };

        self.clear();
        self.reset_root_graph(root);
        self.metadata = document.metadata.clone();
        self.node_logging = document.node_logging;

        for library in &document.libraries {
            if self.add_library(&library.name, &library.version).is_err() {
                self.missing_libraries.push(library.name.clone());
            }
        }

        for resource in &document.imports {
            if let Err(error) = self.import_script(resource) {
                tracing::warn!("Unable to import script '{}': {}", resource, error);
                self.missing_imported_scripts.push(resource.clone());
            }
        }

        for graph in document.graphs.iter().skip(1) {
            let parent = graph.parent.map_or(self.root_graph, Id::from_uid);
            if self.add_graph_with_uid(&parent, Some(graph.id)).is_none() {
                tracing::warn!("Skipping graph '{}' with unknown parent", graph.name);
                continue;
            }
            self.apply_graph_fields(graph);
        }

        let mut created = Vec::new();
        for graph in &document.graphs {
            let graph_id = Id::from_uid(graph.id);
            if !self.graphs.contains(&graph_id) {
                continue;
            }
            for node in &graph.nodes {
                match self.create_node_with_uid(&node.node_type, &graph_id, Some(node.id)) {
                    Ok(id) => {
                        self.apply_node_fields(&id, node);
                        created.push((id, node));
                    }
                    Err(error) => {
                        tracing::warn!("Unable to create node '{}': {}", node.node_type, error);
                        if !self.missing_node_types.contains(&node.node_type) {
                            self.missing_node_types.push(node.node_type.clone());
                        }
                    }
                }
            }
        }

        for (id, node) in &created {
            self.apply_node_links(id, node);
        }
        for (id, node) in &created {
            if node.global {
                self.set_global(id, true);
            }
        }
        Ok(())
    }

    fn reset_root_graph(&mut self, document: &GraphDocument) {
        let mut root = DirectorGraph::new(None);
        root.id = Id::from_uid(document.id);
        root.name.clone_from(&document.name);
        root.comment.clone_from(&document.comment);
        root.enabled = document.enabled;

        self.graphs = MasterTable::new();
        let index = self.graphs.add(root, None);
        self.root_graph = Id {
            uid: document.id,
            index: Some(index),
        };
    }

    fn apply_graph_fields(&mut self, document: &GraphDocument) {
        if let Some(graph) = self.graphs.get_mut(&Id::from_uid(document.id)) {
            graph.name.clone_from(&document.name);
            graph.comment.clone_from(&document.comment);
            graph.enabled = document.enabled;
        }
    }

    fn apply_node_fields(&mut self, id: &Id, document: &NodeDocument) {
        if !document.name.is_empty() {
            self.set_node_name(id, document.name.as_str());
        }
        self.set_node_enabled(id, document.enabled);
        if let Some(node) = self.nodes.get_mut(id) {
            node.set_comment(document.comment.as_str());
            node.set_logging(document.logging);
        }
        if let Some(value) = &document.value {
            self.set_initial_value(id, value.clone());
            self.set_value(id, value.clone());
        }
    }

    fn apply_node_links(&mut self, id: &Id, document: &NodeDocument) {
        for output in &document.outputs {
            for target in &output.links {
                if let Err(error) = self.connect(id, &output.name, &Id::from_uid(target.node), &target.link) {
                    tracing::warn!("Dropping link from '{}': {}", output.name, error);
                }
            }
            if let Some(redirect) = &output.redirect {
                let target = Id::from_uid(redirect.node);
                if let Err(error) = self.set_output_redirect(id, &output.name, Some((&target, &redirect.link))) {
                    tracing::warn!("Dropping redirect of '{}': {}", output.name, error);
                }
            }
        }

        for input in &document.inputs {
            let target = Id::from_uid(input.redirect.node);
            if let Err(error) = self.set_input_redirect(id, &input.name, Some((&target, &input.redirect.link))) {
                tracing::warn!("Dropping redirect of '{}': {}", input.name, error);
            }
        }

        for link in &document.value_links {
            if let Some(default) = &link.default {
                let Some(node) = self.nodes.get_mut(id) else {
                    return;
                };
                if let Some(index) = node.value_link_index(&link.name) {
                    node.value_links_mut()[index].default = default.clone();
                }
            }
            for value in &link.values {
                if let Err(error) = self.connect_value(id, &link.name, &Id::from_uid(*value)) {
                    tracing::warn!("Dropping value link '{}': {}", link.name, error);
                }
            }
        }
    }
}

fn script_name(resource: &str) -> String {
    let file = resource.rsplit('/').next().unwrap_or(resource);
    file.strip_suffix(SCRIPT_EXTENSION)
        .map_or(file, |stem| stem.trim_end_matches('.'))
        .to_string()
}
