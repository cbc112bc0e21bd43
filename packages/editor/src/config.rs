use std::path::{Path, PathBuf};
use std::time::Duration;

use pagecraft_common::{read_json, FileSystem, RealFileSystem};
use serde::{Deserialize, Serialize};

use crate::clipboard::DEFAULT_CLIPBOARD_TTL;
use crate::errors::EditorError;
use crate::history::DEFAULT_HISTORY_LIMIT;

pub const DEFAULT_CONFIG_NAME: &str = "pagecraft.config.json";

/// Editor configuration file format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorConfig {
    /// Maximum number of retained history snapshots
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// Seconds a copied subtree stays pasteable
    #[serde(default = "default_clipboard_ttl_secs")]
    pub clipboard_ttl_secs: u64,

    /// Where the durable clipboard lives; in-memory when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clipboard_path: Option<PathBuf>,

    /// Whether visibility toggles get their own undo step
    #[serde(default = "default_true")]
    pub record_cosmetic_edits: bool,

    /// Refuse to nest blocks under components that cannot have children
    #[serde(default)]
    pub enforce_containers: bool,
}

fn default_history_limit() -> usize {
    DEFAULT_HISTORY_LIMIT
}

fn default_clipboard_ttl_secs() -> u64 {
    DEFAULT_CLIPBOARD_TTL.as_secs()
}

fn default_true() -> bool {
    true
}

impl EditorConfig {
    /// Load config from a directory, falling back to defaults
    pub fn load(dir: impl AsRef<Path>) -> Result<Self, EditorError> {
        Self::load_with(&RealFileSystem, dir)
    }

    pub fn load_with(fs: &dyn FileSystem, dir: impl AsRef<Path>) -> Result<Self, EditorError> {
        let path = dir.as_ref().join(DEFAULT_CONFIG_NAME);
        let config: Option<Self> = read_json(fs, &path)?;
        Ok(config.unwrap_or_default())
    }

    pub fn from_json(json: &str) -> Result<Self, EditorError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn clipboard_ttl(&self) -> Duration {
        Duration::from_secs(self.clipboard_ttl_secs)
    }
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            history_limit: default_history_limit(),
            clipboard_ttl_secs: default_clipboard_ttl_secs(),
            clipboard_path: None,
            record_cosmetic_edits: true,
            enforce_containers: false,
        }
    }
}
