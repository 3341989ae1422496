//! Player configuration
//!
//! Stored as JSON. Every field has a default, so a config file only needs
//! the values it changes.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ConvoError, Result};

/// Most output channels a processor may be configured for
pub const MAX_OUTPUT_CHANNELS: usize = 8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Frames per device callback
    pub block_size: usize,
    /// Largest block the processor must handle; sizes all scratch storage
    pub max_block_size: usize,
    /// Channels delivered to the output sink
    pub output_channels: usize,
    /// Whether the reverb starts enabled
    pub reverb_enabled: bool,
    /// Whether playback starts with looping on
    pub looping: bool,
    /// Extra directory scanned for `*.wav` impulse responses
    pub ir_directory: Option<PathBuf>,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            block_size: 512,
            max_block_size: 4096,
            output_channels: 2,
            reverb_enabled: false,
            looping: false,
            ir_directory: None,
        }
    }
}

impl PlayerConfig {
    /// Read a config from a JSON file and validate it
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| ConvoError::Config {
            reason: format!("cannot read {}: {}", path.display(), e),
        })?;
        let config: PlayerConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the config as pretty-printed JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 {
            return Err(ConvoError::InvalidParameter {
                param: "block_size".to_string(),
                value: self.block_size.to_string(),
                expected: "at least 1".to_string(),
            });
        }
        if self.block_size > self.max_block_size {
            return Err(ConvoError::InvalidParameter {
                param: "block_size".to_string(),
                value: self.block_size.to_string(),
                expected: format!("at most max_block_size ({})", self.max_block_size),
            });
        }
        if self.output_channels == 0 || self.output_channels > MAX_OUTPUT_CHANNELS {
            return Err(ConvoError::InvalidParameter {
                param: "output_channels".to_string(),
                value: self.output_channels.to_string(),
                expected: format!("1 to {}", MAX_OUTPUT_CHANNELS),
            });
        }
        Ok(())
    }
}
