// SPDX-License-Identifier: MIT OR Apache-2.0
//! Global value registry.
//!
//! Value nodes flagged as global share their value with every other global
//! value node of the same name and type in the script family. Entries hold
//! weak references to the nodes' value cells so a dropped script never
//! keeps values alive.

use crate::id::Id;
use crate::node::{SharedValue, ValueState};
use crate::value::Value;
use indexmap::IndexMap;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

struct GlobalEntry {
    node: Id,
    cell: Weak<RefCell<ValueState>>,
}

/// Registry of global value nodes, keyed by `name [Type.FullName]`
#[derive(Default)]
pub struct GlobalValueRegistry {
    entries: RefCell<IndexMap<String, Vec<GlobalEntry>>>,
    applying: Cell<bool>,
}

/// Which half of a value node's state is being propagated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueSlot {
    /// The current value
    Current,
    /// The initial value
    Initial,
}

impl GlobalValueRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the registry key for a value node
    pub fn key(name: &str, type_full_name: &str) -> String {
        format!("{name} [{type_full_name}]")
    }

    /// Whether a propagation is in progress
    pub fn is_applying(&self) -> bool {
        self.applying.get()
    }

    /// Register a value node under `key`.
    ///
    /// When the key already has members the newcomer is seeded with the
    /// first member's current and initial values. Returns true only when
    /// the key was created by this call.
    pub fn register(&self, key: &str, node: Id, cell: &SharedValue) -> bool {
        let seed = {
            let mut entries = self.entries.borrow_mut();
            let Some(members) = entries.get_mut(key) else {
                entries.insert(
                    key.to_string(),
                    vec![GlobalEntry {
                        node,
                        cell: Rc::downgrade(cell),
                    }],
                );
                return true;
            };

            members.retain(|entry| entry.cell.strong_count() > 0);
            let seed = members.first().and_then(|entry| entry.cell.upgrade());
            if !members.iter().any(|entry| entry.node == node) {
                members.push(GlobalEntry {
                    node,
                    cell: Rc::downgrade(cell),
                });
            }
            seed
        };

        if let Some(seed) = seed {
            if !Rc::ptr_eq(&seed, cell) {
                let state = seed.borrow().clone();
                self.applying.set(true);
                *cell.borrow_mut() = state;
                self.applying.set(false);
            }
        }
        false
    }

    /// Remove a value node from `key`
    pub fn unregister(&self, key: &str, node: &Id) -> bool {
        let mut entries = self.entries.borrow_mut();
        let Some(members) = entries.get_mut(key) else {
            return false;
        };

        let removed = members.iter().any(|entry| entry.node == *node);
        members.retain(|entry| entry.node != *node && entry.cell.strong_count() > 0);
        if members.is_empty() {
            entries.shift_remove(key);
        }
        removed
    }

    /// Live members of a key, in registration order
    pub fn members(&self, key: &str) -> Vec<Id> {
        self.entries
            .borrow()
            .get(key)
            .map(|members| {
                members
                    .iter()
                    .filter(|entry| entry.cell.strong_count() > 0)
                    .map(|entry| entry.node)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Registered keys
    pub fn keys(&self) -> Vec<String> {
        self.entries.borrow().keys().cloned().collect()
    }

    /// Push `value` from `origin` to every other member of `key`.
    ///
    /// `on_changed` is called for each member that was updated. While a
    /// propagation runs, nested calls return immediately, so a callback may
    /// set values again without recursing. Returns the number of members
    /// updated.
    pub fn propagate(
        &self,
        key: &str,
        origin: &Id,
        value: &Value,
        slot: ValueSlot,
        mut on_changed: impl FnMut(&Id, &Value),
    ) -> usize {
        if self.applying.get() {
            return 0;
        }

        let targets: Vec<(Id, SharedValue)> = {
            let mut entries = self.entries.borrow_mut();
            let Some(members) = entries.get_mut(key) else {
                return 0;
            };
            members.retain(|entry| entry.cell.strong_count() > 0);
            members
                .iter()
                .filter(|entry| entry.node != *origin)
                .filter_map(|entry| entry.cell.upgrade().map(|cell| (entry.node, cell)))
                .collect()
        };

        self.applying.set(true);
        let mut updated = 0;
        for (node, cell) in targets {
            {
                let mut state = cell.borrow_mut();
                let target = match slot {
                    ValueSlot::Current => &mut state.value,
                    ValueSlot::Initial => &mut state.initial,
                };
                match value.convert(target.value_type()) {
                    Some(converted) => *target = converted,
                    None => continue,
                }
            }
            updated += 1;
            if slot == ValueSlot::Current {
                on_changed(&node, value);
            }
        }
        self.applying.set(false);
        updated
    }
}
