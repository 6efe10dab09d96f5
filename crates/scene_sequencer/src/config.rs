// SPDX-License-Identifier: MIT OR Apache-2.0
//! Animation manager configuration.

use crate::error::{AnimationError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Current configuration format version
pub const CONFIG_FORMAT_VERSION: u32 = 1;

/// Manager settings, stored as RON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Format version
    pub version: u32,
    /// Clock multiplier; negative plays backwards
    pub playback_speed: f32,
    /// Start with the clock frozen
    pub paused: bool,
    /// Crossfade used by `run_sequence_default`
    pub default_tween_duration: f32,
    /// Sequence started whenever a sequence without a chain completes
    pub auto_play_sequence: Option<String>,
    /// Container size reported for the root node
    pub root_container_size: [f32; 2],
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_FORMAT_VERSION,
            playback_speed: 1.0,
            paused: false,
            default_tween_duration: 0.0,
            auto_play_sequence: None,
            root_container_size: [0.0, 0.0],
        }
    }
}

impl ManagerConfig {
    /// Parse from a RON string
    pub fn from_ron(source: &str) -> Result<Self> {
        Ok(ron::from_str(source)?)
    }

    /// Serialize to pretty RON
    pub fn to_ron(&self) -> Result<String> {
        let config = ron::ser::PrettyConfig::default()
            .struct_names(true)
            .enumerate_arrays(false);
        Ok(ron::ser::to_string_pretty(self, config)?)
    }

    /// Load from a file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_ron(&content)?;
        if config.version > CONFIG_FORMAT_VERSION {
            return Err(AnimationError::UnsupportedVersion {
                found: config.version,
                supported: CONFIG_FORMAT_VERSION,
            });
        }
        tracing::debug!("Loaded manager config from {:?}", path);
        Ok(config)
    }

    /// Save to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_ron()?)?;
        Ok(())
    }
}
