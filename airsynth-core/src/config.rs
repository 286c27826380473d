//! Engine configuration. Every field has a default, so a config file only
//! needs the values it changes.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::classifier::ClassifierConfig;
use crate::debounce::DebounceConfig;
use crate::quality::QualityConfig;
use crate::synth::SynthConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub classifier: ClassifierConfig,
    pub debounce: DebounceConfig,
    pub synth: SynthConfig,
    pub quality: QualityConfig,
    /// Smoothing applied to display positions, 0 (none) to just below 1.
    pub position_smoothing: f32,
    /// Notes kept in the played-note history.
    pub history_length: usize,
    /// Starting volume in percent.
    pub volume_percent: u8,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            classifier: ClassifierConfig::default(),
            debounce: DebounceConfig::default(),
            synth: SynthConfig::default(),
            quality: QualityConfig::default(),
            position_smoothing: 0.5,
            history_length: 15,
            volume_percent: 30,
        }
    }
}

impl EngineConfig {
    /// Loads a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config = serde_json::from_str(&json)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        Ok(config)
    }

    /// Writes the config as pretty JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).with_context(|| format!("writing config file {}", path.display()))?;
        Ok(())
    }
}
