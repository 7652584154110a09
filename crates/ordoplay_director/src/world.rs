// SPDX-License-Identifier: MIT OR Apache-2.0
//! Binding to the host game world.
//!
//! The director never inspects actors itself. It stores these handles and
//! passes them through to nodes, which resolve actor identities with them.

use uuid::Uuid;

/// Game-side services available to nodes
pub trait GameManager {
    /// Whether an actor with this identity exists
    fn actor_exists(&self, actor: Uuid) -> bool;

    /// Display name of an actor
    fn actor_name(&self, _actor: Uuid) -> Option<String> {
        None
    }

    /// Find actors by display name
    fn find_actors(&self, _name: &str) -> Vec<Uuid> {
        Vec::new()
    }
}

/// The map a script runs in
pub trait GameMap {
    /// Map name
    fn name(&self) -> &str;
}
