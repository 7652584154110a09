// SPDX-License-Identifier: MIT OR Apache-2.0
//! Script composition through imports.
//!
//! An imported script is loaded through the importer's factory and owned by
//! the importer. Its sub-graph tree is mirrored under the importer's root
//! graph as read-only placeholders that share the imported graphs' IDs.

use crate::director::Director;
use crate::error::{DirectorError, Result};
use crate::id::{DirectorId, Id};

impl Director {
    /// Import the script stored under `resource`.
    ///
    /// Fails if the script is already imported, cannot be loaded, or has a
    /// different script type. If this script has started, the import is
    /// started as well.
    pub fn import_script(&mut self, resource: &str) -> Result<DirectorId> {
        let factory = self.factory().ok_or(DirectorError::NoScriptFactory)?;
        let resource = factory.resolve_resource(resource);
        if self.imported_script(&resource).is_some() {
            tracing::warn!("Script '{}' is already imported", resource);
            return Err(DirectorError::AlreadyImported(resource));
        }

        let mut script = factory.create_script(self);
        script.imported = true;
        script.load_script(&resource)?;

        if script.script_type() != self.script_type() {
            tracing::warn!(
                "Cannot import '{}': script type '{}' does not match '{}'",
                resource,
                script.script_type(),
                self.script_type()
            );
            return Err(DirectorError::ScriptTypeMismatch {
                expected: self.script_type().to_string(),
                found: script.script_type().to_string(),
            });
        }

        script.set_script_owner(self.script_owner());
        script.set_node_logging(self.node_logging());
        let (source, target) = (script.root_graph(), self.root_graph());
        self.mirror_graphs(&script, &source, &target);

        script.attach_to(self);
        let id = script.id();
        self.imports.push(script);
        self.set_modified(true);
        tracing::debug!("Imported script '{}' into '{}'", resource, self.name());

        if self.started {
            self.start();
        }
        Ok(id)
    }

    /// Remove an imported script and prune its now-empty mirror graphs
    pub fn remove_imported_script(&mut self, resource: &str) -> bool {
        let Some(index) = self
            .imports
            .iter()
            .position(|script| script.resource() == resource)
        else {
            return false;
        };

        let mut script = self.imports.remove(index);
        let source = script.root_graph();
        self.prune_mirrors(&script, &source);
        script.detach();
        self.set_modified(true);
        true
    }

    /// An imported script by resource
    pub fn imported_script(&self, resource: &str) -> Option<&Director> {
        self.imports.iter().find(|script| script.resource() == resource)
    }

    /// Mirror the sub-graphs of `source` under `parent`, depth first
    fn mirror_graphs(&mut self, script: &Director, source: &Id, parent: &Id) {
        let Some(graph) = script.graph(source) else {
            return;
        };

        for sub_graph in graph.sub_graphs() {
            let Some(imported) = script.graph(sub_graph) else {
                continue;
            };
            let mirror = match self.add_graph_with_uid(parent, Some(imported.id().uid)) {
                Some(mirror) => mirror,
                // Already mirrored by another import.
                None => Id::from_uid(imported.id().uid),
            };
            if let Some(graph) = self.graph_mut(&mirror) {
                graph.name.clone_from(&imported.name);
                graph.comment.clone_from(&imported.comment);
                graph.imported = true;
                graph.read_only = true;
            }
            self.mirror_graphs(script, sub_graph, &mirror);
        }
    }

    /// Delete mirror graphs of `script` bottom-up. A mirror is only removed
    /// when it holds no nodes and no sub-graphs.
    fn prune_mirrors(&mut self, script: &Director, source: &Id) {
        let Some(graph) = script.graph(source) else {
            return;
        };

        for sub_graph in graph.sub_graphs() {
            self.prune_mirrors(script, sub_graph);

            let removable = self
                .graph(sub_graph)
                .is_some_and(|mirror| mirror.is_imported() && mirror.is_empty());
            if removable {
                self.delete_graph(sub_graph);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::director::Director;
    use crate::error::DirectorError;
    use crate::persistence::MemoryScriptFactory;
    use crate::test_support::{core_director, RecordingNotifier};
    use crate::value::Value;
    use std::rc::Rc;

    /// A shared script with a nested graph, a global counter and a remote
    /// event that increments it
    fn store_shared(factory: &MemoryScriptFactory) {
        let mut shared = core_director();
        let root = shared.root_graph();
        let outer = shared.add_graph(&root).unwrap();
        let inner = shared.add_graph(&outer).unwrap();
        shared.graph_mut(&inner).unwrap().name = "Doors".to_string();

        let event = shared.create_node("Remote Event", &inner).unwrap();
        shared.set_node_name(&event, "Open");
        let increment = shared.create_node("Increment", &inner).unwrap();
        let counter = shared.create_node("Int", &inner).unwrap();
        shared.set_node_name(&counter, "Opened");
        shared.set_global(&counter, true);
        shared.connect(&event, "Out", &increment, "In").unwrap();
        shared.connect_value(&increment, "Value", &counter).unwrap();

        factory.insert("shared", &shared.to_document()).unwrap();
    }

    fn importer() -> (Director, Rc<MemoryScriptFactory>) {
        let factory = Rc::new(MemoryScriptFactory::new());
        store_shared(&factory);
        let mut director = core_director();
        director.set_factory(Some(factory.clone()));
        (director, factory)
    }

    #[test]
    fn test_import_mirrors_graphs() {
        let (mut director, _factory) = importer();
        director.import_script("shared").unwrap();

        let imported = director.imported_script("shared").unwrap();
        assert!(imported.is_imported());
        assert_eq!(imported.parent(), Some(director.id()));
        assert!(imported.all_nodes(false).iter().all(|node| imported
            .node(&node.node)
            .is_some_and(|node| node.is_imported())));

        let mirrors: Vec<_> = director.graphs().filter(|graph| graph.is_imported()).collect();
        assert_eq!(mirrors.len(), 2);
        assert!(mirrors.iter().all(|graph| graph.is_read_only()));
        assert!(mirrors.iter().any(|graph| graph.name == "Doors"));
        assert!(matches!(
            director.import_script("shared"),
            Err(DirectorError::AlreadyImported(_))
        ));
    }

    #[test]
    fn test_import_then_remove_restores_graphs() {
        let (mut director, _factory) = importer();
        let graphs_before = director.graphs().count();

        director.import_script("shared").unwrap();
        assert!(director.remove_imported_script("shared"));

        assert_eq!(director.graphs().count(), graphs_before);
        assert!(director.imports().is_empty());
        assert!(director.family().globals().keys().is_empty());
        assert!(!director.remove_imported_script("shared"));
    }

    #[test]
    fn test_mirror_with_local_content_survives_removal() {
        let (mut director, _factory) = importer();
        director.import_script("shared").unwrap();
        let mirror = director
            .graphs()
            .find(|graph| graph.name == "Doors")
            .map(|graph| graph.id())
            .unwrap();
        director.create_node("Log", &mirror).unwrap();

        director.remove_imported_script("shared");

        assert!(director.graph(&mirror).is_some());
    }

    #[test]
    fn test_script_type_mismatch() {
        let (mut director, _factory) = importer();
        director.metadata_mut().script_type = "Dialogue".to_string();

        assert!(matches!(
            director.import_script("shared"),
            Err(DirectorError::ScriptTypeMismatch { .. })
        ));
        assert!(director.imports().is_empty());
    }

    #[test]
    fn test_imported_globals_join_family() {
        let (mut director, _factory) = importer();
        let root = director.root_graph();
        let local = director.create_node("Int", &root).unwrap();
        director.set_node_name(&local, "Opened");
        director.set_global(&local, true);

        director.import_script("shared").unwrap();
        let notifier = RecordingNotifier::attach(&director);
        director.update(0.0, 0.0);

        let imported = director.imported_script("shared").unwrap();
        let event = imported.remote_events("Open")[0];
        director.begin_thread(event, 0);

        assert_eq!(director.value(&local), Some(Value::Int(1)));
        assert_eq!(
            notifier.executed(),
            vec!["Core.Remote Event", "Core.Increment"]
        );
    }

    #[test]
    fn test_import_after_start_starts_import() {
        let (mut director, _factory) = importer();
        director.update(0.0, 0.0);
        director.import_script("shared").unwrap();
        assert!(director.imported_script("shared").unwrap().has_started());
    }
}
