//! Repository configuration stored at `.strata/config.json`.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::StrataResult;
use crate::storage::Storage;

fn default_branch() -> String {
    "master".to_string()
}

fn default_lock_timeout_ms() -> u64 {
    5_000
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoConfig {
    /// Name of the branch created by the first commit.
    #[serde(default = "default_branch")]
    pub default_branch: String,
    /// How long mutating commands wait for the repository lock.
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            default_branch: default_branch(),
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

impl RepoConfig {
    /// Load the config, falling back to defaults when the file is absent.
    pub fn load(storage: &dyn Storage, path: &Path) -> StrataResult<Self> {
        if !storage.exists(path) {
            return Ok(Self::default());
        }
        let data = storage.read_bytes(path)?;
        Ok(serde_json::from_slice(&data)?)
    }

    pub fn save(&self, storage: &dyn Storage, path: &Path) -> StrataResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        storage.write_bytes(path, json.as_bytes())
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}
