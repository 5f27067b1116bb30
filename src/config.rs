//! Application configuration.
//!
//! The configuration is loaded from `$XDG_CONFIG_HOME/waysome/config.json`.
//! Every section is optional; a minimal `{}` file is valid and all sections
//! fall back to their compiled-in defaults.
//!
//! # Example
//!
//! ```json
//! {
//!   "socket": "/run/user/1000/waysome.sock",
//!   "stack": { "initial_capacity": 32 },
//!   "hotkeys": [
//!     { "name": "launcher", "codes": [125, 57] }
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Path of the listening socket.  Defaults to
    /// `$XDG_RUNTIME_DIR/waysome.sock`.
    #[serde(default)]
    pub socket: Option<PathBuf>,

    /// Execution stack sizing.
    #[serde(default)]
    pub stack: StackConfig,

    /// Key combos recognized at startup.
    #[serde(default)]
    pub hotkeys: Vec<HotkeyConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StackConfig {
    /// Slots allocated up front.  The stack never shrinks below this.
    pub initial_capacity: usize,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            initial_capacity: 16,
        }
    }
}

/// A combo: key codes pressed in order, fired as event `name` on release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HotkeyConfig {
    pub name: String,
    pub codes: Vec<u16>,
}

impl Config {
    /// Load configuration from a JSON file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError(format!("failed to read {}: {}", path.display(), e)))?;
        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| ConfigError(format!("failed to parse {}: {}", path.display(), e)))?;
        Ok(config)
    }

    /// The configured socket path, or the default under `runtime_dir`.
    pub fn socket_path(&self, runtime_dir: &Path) -> PathBuf {
        self.socket
            .clone()
            .unwrap_or_else(|| runtime_dir.join("waysome.sock"))
    }
}

/// Error from loading or parsing a configuration file.
#[derive(Debug, thiserror::Error)]
#[error("config error: {0}")]
pub struct ConfigError(String);
