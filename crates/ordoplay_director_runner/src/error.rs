// SPDX-License-Identifier: MIT OR Apache-2.0
//! Runner errors.

use ordoplay_director::DirectorError;
use thiserror::Error;

/// Errors that stop the runner
#[derive(Debug, Error)]
pub enum RunnerError {
    /// A settings or snapshot file could not be read or written
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Settings file is not valid RON
    #[error("Failed to parse settings: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// Tick rate must be positive
    #[error("Invalid tick rate {0}")]
    TickRate(f32),

    /// The director rejected the script
    #[error(transparent)]
    Director(#[from] DirectorError),
}

/// Result alias for runner operations
pub type Result<T> = std::result::Result<T, RunnerError>;
