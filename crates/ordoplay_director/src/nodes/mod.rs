// SPDX-License-Identifier: MIT OR Apache-2.0
//! The built-in `Core` node library.
//!
//! Node types are grouped by what the scheduler does with them:
//! - [`events`]: thread entry points
//! - [`actions`]: nodes that finish on their first visit
//! - [`latent`]: nodes that stay on their frame across ticks
//! - [`values`]: typed value holders read and written through value links

pub mod actions;
pub mod events;
pub mod latent;
pub mod values;

use crate::library::NodeLibrary;
use crate::node::{NodeBehavior, NodeKind, NodeType};

/// Name of the built-in library
pub const CORE_LIBRARY: &str = "Core";

/// Type name of the named event fired by `Call Remote Event`
pub const REMOTE_EVENT: &str = "Remote Event";

/// The built-in library
#[derive(Debug, Clone, Copy, Default)]
pub struct CoreLibrary;

impl NodeLibrary for CoreLibrary {
    fn name(&self) -> &str {
        CORE_LIBRARY
    }

    fn node_types(&self) -> Vec<NodeType> {
        let mut types = events::node_types();
        types.extend(actions::node_types());
        types.extend(latent::node_types());
        types.extend(values::node_types());
        types
    }

    fn create_behavior(&self, node_type: &NodeType) -> Option<Box<dyn NodeBehavior>> {
        if node_type.library != CORE_LIBRARY {
            return None;
        }
        let name = node_type.name.as_str();
        events::create(name)
            .or_else(|| actions::create(name))
            .or_else(|| latent::create(name))
            .or_else(|| values::create(name))
    }
}

pub(crate) fn core_type(name: &str, kind: NodeKind, description: &str) -> NodeType {
    NodeType::new(name, CORE_LIBRARY, CORE_LIBRARY, kind).with_description(description)
}
