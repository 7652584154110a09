// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node libraries and the node manager.
//!
//! A node library provides a set of node types and creates their
//! behaviors. The node manager loads libraries by name through registered
//! loaders and is shared between every director in the process.

use crate::error::{DirectorError, Result};
use crate::node::{NodeBehavior, NodeType};
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

/// Library type accepted by every script type
pub const CORE_LIBRARY_TYPE: &str = "Core";

/// A collection of node types
pub trait NodeLibrary: Send + Sync {
    /// Library name
    fn name(&self) -> &str;

    /// Script type this library is written for; `Core` fits any script
    fn library_type(&self) -> &str {
        CORE_LIBRARY_TYPE
    }

    /// Library version
    fn version(&self) -> &str {
        "1.0"
    }

    /// Node types provided by this library
    fn node_types(&self) -> Vec<NodeType>;

    /// Create the behavior for a node of `node_type`
    fn create_behavior(&self, node_type: &NodeType) -> Option<Box<dyn NodeBehavior>>;

    /// Whether a script of `script_type` may use this library
    fn supports_script_type(&self, script_type: &str) -> bool {
        let library_type = self.library_type();
        library_type == CORE_LIBRARY_TYPE || library_type == script_type
    }
}

/// Factory that instantiates a library on first use
pub type LibraryLoader = Arc<dyn Fn() -> Arc<dyn NodeLibrary> + Send + Sync>;

/// Loads and caches node libraries
#[derive(Default)]
pub struct NodeManager {
    loaders: RwLock<IndexMap<String, LibraryLoader>>,
    libraries: RwLock<IndexMap<String, Arc<dyn NodeLibrary>>>,
}

impl NodeManager {
    /// Create a manager with no loaders
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a manager that can load the built-in `Core` library
    pub fn with_core() -> Self {
        let manager = Self::new();
        manager.register_loader(crate::nodes::CORE_LIBRARY, || {
            Arc::new(crate::nodes::CoreLibrary) as Arc<dyn NodeLibrary>
        });
        manager
    }

    /// Register a loader for a library name, replacing any previous one
    pub fn register_loader<F>(&self, name: impl Into<String>, loader: F)
    where
        F: Fn() -> Arc<dyn NodeLibrary> + Send + Sync + 'static,
    {
        self.loaders.write().insert(name.into(), Arc::new(loader));
    }

    /// Register an already constructed library
    pub fn register_library(&self, library: Arc<dyn NodeLibrary>) {
        let name = library.name().to_string();
        let loaded = library.clone();
        self.register_loader(name.clone(), move || loaded.clone());
        self.libraries.write().insert(name, library);
    }

    /// Load a library by name, returning the cached instance if already
    /// loaded
    pub fn load_library(&self, name: &str) -> Result<Arc<dyn NodeLibrary>> {
        if let Some(library) = self.libraries.read().get(name) {
            return Ok(library.clone());
        }

        let loader = self
            .loaders
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| DirectorError::LibraryNotFound(name.to_string()))?;

        let library = loader();
        tracing::debug!("Loaded node library '{}' ({} types)", name, library.node_types().len());
        self.libraries
            .write()
            .insert(name.to_string(), library.clone());
        Ok(library)
    }

    /// Drop a loaded library. Its loader stays registered.
    pub fn unload_library(&self, name: &str) -> bool {
        self.libraries.write().shift_remove(name).is_some()
    }

    /// Check if a library is loaded
    pub fn is_loaded(&self, name: &str) -> bool {
        self.libraries.read().contains_key(name)
    }

    /// Get a loaded library
    pub fn library(&self, name: &str) -> Option<Arc<dyn NodeLibrary>> {
        self.libraries.read().get(name).cloned()
    }

    /// Names of loaded libraries
    pub fn loaded_libraries(&self) -> Vec<String> {
        self.libraries.read().keys().cloned().collect()
    }

    /// Find a node type by full or bare name among loaded libraries.
    ///
    /// Full names are matched before bare names so `Core.Int` and
    /// `Game.Int` stay distinct.
    pub fn find_node_type(&self, name: &str) -> Option<(Arc<dyn NodeLibrary>, NodeType)> {
        let libraries = self.libraries.read();
        let mut bare_match = None;

        for library in libraries.values() {
            for node_type in library.node_types() {
                if node_type.full_name() == name {
                    return Some((library.clone(), node_type));
                }
                if bare_match.is_none() && node_type.name == name {
                    bare_match = Some((library.clone(), node_type));
                }
            }
        }
        bare_match
    }

    /// Every node type of every loaded library
    pub fn node_types(&self) -> Vec<NodeType> {
        self.libraries
            .read()
            .values()
            .flat_map(|library| library.node_types())
            .collect()
    }
}

impl fmt::Debug for NodeManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeManager")
            .field("loaders", &self.loaders.read().keys().collect::<Vec<_>>())
            .field("libraries", &self.loaded_libraries())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeKind;

    struct Scenario;

    impl NodeLibrary for Scenario {
        fn name(&self) -> &str {
            "Scenario"
        }

        fn library_type(&self) -> &str {
            "Scenario"
        }

        fn node_types(&self) -> Vec<NodeType> {
            vec![NodeType::new("Int", "Scenario", "Scenario", NodeKind::Action)]
        }

        fn create_behavior(&self, _node_type: &NodeType) -> Option<Box<dyn NodeBehavior>> {
            None
        }
    }

    #[test]
    fn test_load_core() {
        let manager = NodeManager::with_core();
        assert!(!manager.is_loaded("Core"));
        let library = manager.load_library("Core").expect("core loads");
        assert_eq!(library.name(), "Core");
        assert!(manager.is_loaded("Core"));
        assert!(manager.find_node_type("Core.Log").is_some());
        assert!(manager.find_node_type("Log").is_some());
    }

    #[test]
    fn test_missing_library() {
        let manager = NodeManager::new();
        let error = manager.load_library("Nope").err().expect("load fails");
        assert!(matches!(error, DirectorError::LibraryNotFound(name) if name == "Nope"));
    }

    #[test]
    fn test_full_name_wins_over_bare_name() {
        let manager = NodeManager::with_core();
        manager.register_library(Arc::new(Scenario));
        manager.load_library("Core").expect("core loads");

        let (_, node_type) = manager.find_node_type("Scenario.Int").expect("type found");
        assert_eq!(node_type.library, "Scenario");
        let (_, node_type) = manager.find_node_type("Core.Int").expect("type found");
        assert_eq!(node_type.library, "Core");
    }

    #[test]
    fn test_script_type_support() {
        assert!(Scenario.supports_script_type("Scenario"));
        assert!(!Scenario.supports_script_type("Dialogue"));
        assert!(crate::nodes::CoreLibrary.supports_script_type("Dialogue"));
    }

    #[test]
    fn test_unload_keeps_loader() {
        let manager = NodeManager::with_core();
        manager.load_library("Core").expect("core loads");
        assert!(manager.unload_library("Core"));
        assert!(!manager.is_loaded("Core"));
        assert!(manager.load_library("Core").is_ok());
    }
}
