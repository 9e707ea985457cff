//! Tunables for the storage backends, persisted as TOML.

use crate::error::Result;
use camino::Utf8Path;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timing and scanning settings shared by the backends.
///
/// Missing keys fall back to their defaults, so a config file only needs the
/// values it overrides:
///
/// ```toml
/// tick_budget_ms = 4
/// archive_suffix = ".wad.client"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VfsConfig {
    /// Wall-clock budget for the work a backend does in one update tick.
    pub tick_budget_ms: u64,

    /// Minimum time between two change polls of the same watched directory.
    pub watch_interval_ms: u64,

    /// Minimum time between two save flushes of the same watched directory.
    /// Saves requested within this window are coalesced into one write.
    pub save_debounce_ms: u64,

    /// File name suffix of the archives picked up by archive backends.
    pub archive_suffix: String,
}

impl Default for VfsConfig {
    fn default() -> Self {
        Self {
            tick_budget_ms: 2,
            watch_interval_ms: 200,
            save_debounce_ms: 5,
            archive_suffix: ".wad.client".to_string(),
        }
    }
}

impl VfsConfig {
    pub fn tick_budget(&self) -> Duration {
        Duration::from_millis(self.tick_budget_ms)
    }

    pub fn watch_interval(&self) -> Duration {
        Duration::from_millis(self.watch_interval_ms)
    }

    pub fn save_debounce(&self) -> Duration {
        Duration::from_millis(self.save_debounce_ms)
    }

    /// Load a config from a TOML file.
    pub fn load(path: &Utf8Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_std_path())?;
        Ok(toml::from_str(&contents)?)
    }

    /// Load a config from a TOML file, or return the defaults if it doesn't exist.
    ///
    /// A file that exists but fails to parse is still an error.
    pub fn load_or_default(path: &Utf8Path) -> Result<Self> {
        if !path.as_std_path().exists() {
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Save the config as TOML, creating parent directories if needed.
    pub fn save(&self, path: &Utf8Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_str().is_empty() {
                std::fs::create_dir_all(parent.as_std_path())?;
            }
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path.as_std_path(), contents)?;
        Ok(())
    }

    /// Returns `true` if `file_name` ends with the archive suffix (case-insensitive).
    pub fn is_archive_name(&self, file_name: &str) -> bool {
        file_name
            .to_ascii_lowercase()
            .ends_with(&self.archive_suffix.to_ascii_lowercase())
    }
}
