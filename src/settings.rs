use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, path::PathBuf, time::Duration};

use crate::sensing::Backoff;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::log_warn;

pub const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderSettings {
    pub valid_backoff_secs: u64,
    pub invalid_backoff_secs: u64,
    pub jpeg_quality: u8,
    pub monitor_index: usize,
    pub font_path: Option<PathBuf>,
    pub font_size: f32,
    pub compile_on_stop: bool,
}

impl Default for RecorderSettings {
    fn default() -> Self {
        Self {
            valid_backoff_secs: 30,
            invalid_backoff_secs: 1,
            jpeg_quality: 90,
            monitor_index: 0,
            font_path: None,
            font_size: 100.0,
            compile_on_stop: true,
        }
    }
}

impl RecorderSettings {
    pub fn backoff(&self) -> Backoff {
        Backoff {
            after_valid: Duration::from_secs(self.valid_backoff_secs),
            after_invalid: Duration::from_secs(self.invalid_backoff_secs),
        }
    }
}

pub struct SettingsStore {
    data: RecorderSettings,
}

impl SettingsStore {
    /// Reads `<base>/settings.json`. A missing or malformed file yields defaults.
    pub fn load(base: &Path) -> Result<Self> {
        let path = base.join(SETTINGS_FILE);
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                log_warn!("ignoring malformed settings, using defaults"; path = path.display(), err = err);
                RecorderSettings::default()
            })
        } else {
            RecorderSettings::default()
        };

        Ok(Self { data })
    }

    pub fn settings(&self) -> &RecorderSettings {
        &self.data
    }
}
