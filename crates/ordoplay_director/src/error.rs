// SPDX-License-Identifier: MIT OR Apache-2.0
//! Error types for director operations.

use crate::id::Id;
use thiserror::Error;

/// Errors raised by fallible director operations
#[derive(Debug, Error)]
pub enum DirectorError {
    /// Node library is not known to the node manager
    #[error("Node library not found: {0}")]
    LibraryNotFound(String),

    /// Library exists but the script type does not accept it
    #[error("Library type '{library_type}' of '{library}' is not supported by this script")]
    UnsupportedLibraryType {
        /// Library name
        library: String,
        /// Library type reported by the library
        library_type: String,
    },

    /// Library is loaded but not listed by the script
    #[error("Library '{0}' is not used by this script")]
    LibraryNotUsed(String),

    /// Node type not provided by any loaded library
    #[error("Node type not found: {0}")]
    NodeTypeNotFound(String),

    /// Node not found
    #[error("Node not found: {0}")]
    NodeNotFound(Id),

    /// Graph not found
    #[error("Graph not found: {0}")]
    GraphNotFound(Id),

    /// Named link not found on a node
    #[error("Link '{link}' not found on node {node}")]
    LinkNotFound {
        /// Node searched
        node: Id,
        /// Link name
        link: String,
    },

    /// The node is not a value node
    #[error("Node {0} does not hold a value")]
    NotAValueNode(Id),

    /// The root graph cannot be removed
    #[error("The root graph cannot be deleted")]
    RootGraph,

    /// Imported script has a different script type
    #[error("Script type mismatch: expected {expected}, found {found}")]
    ScriptTypeMismatch {
        /// This script's type
        expected: String,
        /// The imported script's type
        found: String,
    },

    /// The script is already imported
    #[error("Script '{0}' is already imported")]
    AlreadyImported(String),

    /// No script factory is attached
    #[error("No script factory is available")]
    NoScriptFactory,

    /// Unsupported script document version
    #[error("Unsupported script document version {0}")]
    UnsupportedVersion(u32),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// RON parse error
    #[error("Parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// RON serialization error
    #[error("Serialization error: {0}")]
    Serialize(#[from] ron::Error),

    /// Binary snapshot encoding error
    #[error("Snapshot error: {0}")]
    Snapshot(#[from] bincode::Error),
}

/// Result type for director operations
pub type Result<T> = std::result::Result<T, DirectorError>;
