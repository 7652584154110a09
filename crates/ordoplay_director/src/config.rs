// SPDX-License-Identifier: MIT OR Apache-2.0
//! Director configuration.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default wall-clock budget for immediate execution, in seconds
pub const DEFAULT_SAFETY_TIMER_SECS: f64 = 0.1;

/// Default script type
pub const DEFAULT_SCRIPT_TYPE: &str = "Scenario";

/// Settings applied to every director created from it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectorConfig {
    /// Immediate execution stops continuing once this much wall-clock time
    /// has passed
    pub safety_timer_secs: f64,
    /// Libraries loaded by `Director::init`
    pub default_libraries: Vec<String>,
    /// Script type of newly created scripts
    pub script_type: String,
    /// Initial state of the script-wide node logging flag
    pub node_logging: bool,
    /// Longest input or output redirect chain followed before giving up
    pub max_redirect_depth: usize,
}

impl Default for DirectorConfig {
    fn default() -> Self {
        Self {
            safety_timer_secs: DEFAULT_SAFETY_TIMER_SECS,
            default_libraries: vec![crate::nodes::CORE_LIBRARY.to_string()],
            script_type: DEFAULT_SCRIPT_TYPE.to_string(),
            node_logging: false,
            max_redirect_depth: 32,
        }
    }
}

impl DirectorConfig {
    /// Load a configuration from a RON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(ron::from_str(&content)?)
    }

    /// Save the configuration as RON
    pub fn save(&self, path: &Path) -> Result<()> {
        let config = ron::ser::PrettyConfig::default().struct_names(true);
        let content = ron::ser::to_string_pretty(self, config)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Safety timer as a duration. Negative values count as zero; values
    /// that are not finite or do not fit a duration use the default.
    pub fn safety_timer(&self) -> Duration {
        let secs = self.safety_timer_secs;
        let timer = if secs.is_nan() {
            None
        } else {
            Duration::try_from_secs_f64(secs.max(0.0)).ok()
        };
        timer.unwrap_or_else(|| {
            tracing::warn!(
                "Invalid safety timer {}, using {}s",
                secs,
                DEFAULT_SAFETY_TIMER_SECS
            );
            default_safety_timer()
        })
    }
}

/// Default safety timer as a duration
pub fn default_safety_timer() -> Duration {
    Duration::from_millis(100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DirectorConfig::default();
        assert_eq!(config.safety_timer(), Duration::from_millis(100));
        assert_eq!(config.default_libraries, vec!["Core".to_string()]);
        assert_eq!(config.script_type, "Scenario");
        assert_eq!(config.max_redirect_depth, 32);
    }

    #[test]
    fn test_invalid_safety_timer_uses_default() {
        let config: DirectorConfig = ron::from_str("(safety_timer_secs: inf)").unwrap();
        assert_eq!(config.safety_timer(), default_safety_timer());

        let config = DirectorConfig {
            safety_timer_secs: f64::NAN,
            ..DirectorConfig::default()
        };
        assert_eq!(config.safety_timer(), default_safety_timer());

        let config = DirectorConfig {
            safety_timer_secs: -1.0,
            ..DirectorConfig::default()
        };
        assert_eq!(config.safety_timer(), Duration::ZERO);
    }

    #[test]
    fn test_partial_ron_uses_defaults() {
        let config: DirectorConfig = ron::from_str("(node_logging: true)").unwrap();
        assert!(config.node_logging);
        assert_eq!(config.script_type, DEFAULT_SCRIPT_TYPE);
    }

    #[test]
    fn test_serialization() {
        let mut config = DirectorConfig::default();
        config.safety_timer_secs = 0.25;
        let ron_str = ron::ser::to_string_pretty(&config, ron::ser::PrettyConfig::default()).unwrap();
        let loaded: DirectorConfig = ron::from_str(&ron_str).unwrap();
        assert_eq!(loaded, config);
    }
}
