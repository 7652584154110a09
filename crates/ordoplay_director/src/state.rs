// SPDX-License-Identifier: MIT OR Apache-2.0
//! Execution state snapshots.
//!
//! A snapshot records the thread forest by node identity together with the
//! current value of every value node in the script tree. Continuation data
//! is not captured: restored frames are visited again as if for the first
//! time.

use crate::director::Director;
use crate::error::Result;
use crate::id::{Id, NodeRef, ThreadId};
use crate::thread::{StackData, ThreadData};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Serializable execution state of a script family
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateData {
    /// Next root thread ID to hand out
    pub next_thread_id: u32,
    /// Root threads
    pub threads: Vec<StateThread>,
    /// Current values of value nodes
    pub values: Vec<StateValue>,
}

/// A saved thread
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateThread {
    /// Thread ID
    pub id: u32,
    /// Frames, bottom first
    pub stack: Vec<StateFrame>,
}

/// A saved stack frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateFrame {
    /// Visited node, if the frame still has one
    pub node: Option<Uuid>,
    /// Input the node was entered through
    pub input: usize,
    /// Whether the node had finished
    pub finished: bool,
    /// Sub-threads spawned from the frame
    pub sub_threads: Vec<StateThread>,
}

/// A saved value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateValue {
    /// Value node
    pub node: Uuid,
    /// Current value
    pub value: Value,
}

impl StateData {
    /// Encode as bincode
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Decode from bincode
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}

impl Director {
    /// Capture the thread forest and every value of this script, its
    /// imports and its children
    pub fn get_state(&self) -> StateData {
        let mut values = Vec::new();
        self.collect_values(&mut values);

        StateData {
            next_thread_id: self.scheduler.next_thread_id,
            threads: self.scheduler.threads.iter().map(save_thread).collect(),
            values,
        }
    }

    fn collect_values(&self, out: &mut Vec<StateValue>) {
        out.extend(self.nodes.iter().filter(|node| node.kind().is_value()).filter_map(|node| {
            Some(StateValue {
                node: node.id().uid,
                value: node.value()?,
            })
        }));
        for script in self.imports.iter().chain(&self.children) {
            script.collect_values(out);
        }
    }

    /// Replace the thread forest and values with a snapshot.
    ///
    /// Nodes are looked up by identity across the script tree. Frames whose
    /// node no longer exists are restored as finished. Returns false if
    /// this script is not a family root or is executing.
    pub fn restore_state(&mut self, state: &StateData) -> bool {
        if !self.is_root() || self.executing {
            tracing::warn!("Only an idle family root can restore execution state");
            return false;
        }

        for saved in &state.values {
            let id = Id::from_uid(saved.node);
            let Some(node) = self.locate_node(&id) else {
                tracing::debug!("Value node {} from the snapshot no longer exists", saved.node);
                continue;
            };
            if let Some(script) = self.find_script_mut(node.script) {
                script.set_value(&node.node, saved.value.clone());
            }
        }

        let threads: Vec<ThreadData> = state
            .threads
            .iter()
            .map(|thread| self.restore_thread(thread))
            .collect();
        let next_id = threads
            .iter()
            .map(|thread| thread.id.0.wrapping_add(1))
            .max()
            .unwrap_or(0)
            .max(state.next_thread_id);

        self.scheduler.clear();
        self.scheduler.threads = threads;
        self.scheduler.next_thread_id = next_id;
        true
    }

    fn restore_thread(&self, saved: &StateThread) -> ThreadData {
        ThreadData {
            id: ThreadId(saved.id),
            stack: saved.stack.iter().map(|frame| self.restore_frame(frame)).collect(),
        }
    }

    fn restore_frame(&self, saved: &StateFrame) -> StackData {
        let node = saved.node.and_then(|uid| self.resolve_saved_node(uid));
        let lost = saved.node.is_some() && node.is_none();
        if lost {
            tracing::warn!("Frame node {:?} from the snapshot no longer exists", saved.node);
        }

        StackData {
            node,
            input: saved.input,
            first: true,
            finished: saved.finished || lost,
            data: None,
            sub_threads: saved
                .sub_threads
                .iter()
                .map(|thread| self.restore_thread(thread))
                .collect(),
        }
    }

    fn resolve_saved_node(&self, uid: Uuid) -> Option<NodeRef> {
        let node = self.locate_node(&Id::from_uid(uid))?;
        let kind = self.resolve_node(&node)?.kind();
        (!kind.is_value()).then_some(node)
    }
}

fn save_thread(thread: &ThreadData) -> StateThread {
    StateThread {
        id: thread.id.0,
        stack: thread
            .stack
            .iter()
            .map(|frame| StateFrame {
                node: frame.node.map(|node| node.node.uid),
                input: frame.input,
                finished: frame.finished,
                sub_threads: frame.sub_threads.iter().map(save_thread).collect(),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{test_director, RecordingNotifier};

    #[test]
    fn test_restore_resumes_latent_frame() {
        let mut director = test_director();
        let root = director.root_graph();
        let hold = director.create_node("Hold", &root).unwrap();
        let counter = director.create_node("Int", &root).unwrap();
        director.set_value(&counter, 3);
        director.update(0.0, 0.0);

        let node = director.locate_node(&hold).unwrap();
        let thread = director.begin_thread(node, 0).unwrap();
        let state = director.get_state();
        let bytes = state.to_bytes().unwrap();

        let mut restored = StateData::from_bytes(&bytes).unwrap();
        assert_eq!(restored, state);
        restored.next_thread_id = 0;

        director.set_value(&counter, 10);
        director.scheduler.clear();
        assert!(director.restore_state(&restored));

        assert_eq!(director.value(&counter), Some(Value::Int(3)));
        assert!(director.is_running(Some(thread)));
        assert!(director.threads()[0].stack()[0].is_first());
        assert!(director.scheduler.next_thread_id > thread.0);

        let notifier = RecordingNotifier::attach(&director);
        director.update(0.1, 0.1);
        assert_eq!(notifier.executed(), vec!["Test.Hold"]);
    }

    #[test]
    fn test_restore_with_deleted_node() {
        let mut director = test_director();
        let root = director.root_graph();
        let hold = director.create_node("Hold", &root).unwrap();
        director.update(0.0, 0.0);
        let node = director.locate_node(&hold).unwrap();
        director.begin_thread(node, 0);
        let state = director.get_state();

        director.delete_node(&hold);
        assert!(director.restore_state(&state));

        let frame = &director.threads()[0].stack()[0];
        assert!(frame.node().is_none());
        assert!(frame.is_finished());

        director.update(0.1, 0.1);
        assert!(!director.is_running(None));
    }

    #[test]
    fn test_values_include_children() {
        let mut director = test_director();
        let mut child = director.spawn_script();
        child.init(None, None).unwrap();
        let root = child.root_graph();
        let flag = child.create_node("Bool", &root).unwrap();
        child.set_value(&flag, true);
        let child_id = director.add_child(child).unwrap();

        let state = director.get_state();
        assert_eq!(state.values.len(), 1);

        director.child_mut(child_id).unwrap().set_value(&flag, false);
        director.restore_state(&state);
        assert_eq!(director.child(child_id).unwrap().value(&flag), Some(Value::Bool(true)));
    }

    #[test]
    fn test_nested_script_cannot_restore() {
        let mut director = test_director();
        let child = director.spawn_script();
        let child_id = director.add_child(child).unwrap();
        let child = director.child_mut(child_id).unwrap();
        assert!(!child.restore_state(&StateData::default()));
    }
}
