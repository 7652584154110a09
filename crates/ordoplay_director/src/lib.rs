// SPDX-License-Identifier: MIT OR Apache-2.0
//! Director flow-graph runtime for `OrdoPlay`.
//!
//! A director script is a tree of graphs holding nodes wired by output to
//! input links. Running it means advancing a forest of cooperative logical
//! threads, one step per tick:
//! - Event nodes begin threads
//! - Action nodes run to completion and fire outputs, which begin new
//!   threads on the linked nodes
//! - Latent nodes stay on their frame across ticks until they finish
//! - Value nodes hold data read and written through value links
//!
//! ## Architecture
//!
//! - [`Director`] owns its graphs and nodes in master tables addressed by
//!   stable [`Id`]s, and owns its imported and child scripts
//! - The family root owns the [`Scheduler`]; nested scripts hand their
//!   thread requests to it through the shared [`ScriptFamily`]
//! - Node logic lives in [`NodeBehavior`] implementations provided by node
//!   libraries registered with the [`NodeManager`]
//! - Scripts persist as RON [`ScriptDocument`]s and execution state as
//!   bincode [`StateData`] snapshots

pub mod config;
pub mod context;
pub mod director;
pub mod error;
pub mod family;
pub mod globals;
pub mod graph;
pub mod id;
pub mod import;
pub mod library;
pub mod link;
pub mod node;
pub mod nodes;
pub mod notifier;
pub mod persistence;
pub mod scheduler;
pub mod state;
pub mod table;
pub mod thread;
pub mod value;
pub mod world;

#[cfg(test)]
mod test_support;

pub use config::DirectorConfig;
pub use context::NodeContext;
pub use director::{Director, ScriptMetadata};
pub use error::{DirectorError, Result};
pub use family::ScriptFamily;
pub use globals::GlobalValueRegistry;
pub use graph::DirectorGraph;
pub use id::{DirectorId, Id, NodeRef, ThreadId};
pub use library::{NodeLibrary, NodeManager};
pub use link::{InputLink, InputRef, OutputLink, OutputRef, ValueLink};
pub use node::{Node, NodeBehavior, NodeKind, NodeType};
pub use notifier::DirectorNotifier;
pub use persistence::{MemoryScriptFactory, RonScriptFactory, ScriptDocument, ScriptFactory};
pub use scheduler::Scheduler;
pub use state::StateData;
pub use table::MasterTable;
pub use thread::{StackData, ThreadData};
pub use value::{Value, ValueType};
pub use world::{GameManager, GameMap};
