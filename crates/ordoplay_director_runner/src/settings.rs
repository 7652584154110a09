// SPDX-License-Identifier: MIT OR Apache-2.0
//! Runner settings.

use crate::error::{Result, RunnerError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// How the runner loads and drives a script
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerSettings {
    /// Script resource, relative to `resource_root`
    pub script: String,
    /// Directory scripts and imports are resolved against
    pub resource_root: PathBuf,
    /// Ticks per second
    pub tick_rate: f32,
    /// Stop after this many ticks; `None` runs until no thread is left
    pub tick_count: Option<u64>,
    /// Sleep between ticks so the script runs at wall-clock speed
    pub real_time: bool,
    /// Start paused in the debugger and step once per tick
    pub debug: bool,
    /// Node types (`Category.Name`) that pause execution
    pub breakpoints: Vec<String>,
    /// Log every node visit
    pub node_logging: bool,
    /// Write a bincode execution snapshot here when the run ends
    pub snapshot: Option<PathBuf>,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            script: "hello".to_string(),
            resource_root: PathBuf::from("demos"),
            tick_rate: 30.0,
            tick_count: None,
            real_time: false,
            debug: false,
            breakpoints: Vec::new(),
            node_logging: true,
            snapshot: None,
        }
    }
}

impl RunnerSettings {
    /// Load settings from a RON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_ron(&content)
    }

    /// Parse settings from RON text
    pub fn from_ron(source: &str) -> Result<Self> {
        let settings: Self = ron::from_str(source)?;
        if settings.tick_rate.is_nan() || settings.tick_rate <= 0.0 {
            return Err(RunnerError::TickRate(settings.tick_rate));
        }
        Ok(settings)
    }

    /// Simulated seconds per tick
    pub fn tick_seconds(&self) -> f32 {
        self.tick_rate.recip()
    }
}
