//! Persisted client settings.
//!
//! Stored as JSON at `$XDG_CONFIG_HOME/portfolio-builder/settings.json` (or the
//! platform equivalent). Command-line flags and `PORTFOLIO_*` environment
//! variables take precedence over anything saved here.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::portfolio_tools::DEFAULT_BASE_URL;
use crate::storage::{StorageError, read_json, write_atomic};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Portfolio API base URL.
    pub base_url: String,
    /// Bearer token sent with every request.
    pub api_token: Option<String>,
    /// Owner of the portfolio being built or edited.
    pub user_id: Option<String>,
    /// Refuse to add education or experience before a CV is on file.
    pub require_cv_for_sections: bool,
    /// Overall request timeout.
    pub timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_token: None,
            user_id: None,
            require_cv_for_sections: false,
            timeout_secs: default_timeout_secs(),
        }
    }
}

const fn default_timeout_secs() -> u64 {
    30
}

impl Settings {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("portfolio-builder").join("settings.json"))
    }

    /// Missing file means defaults.
    pub fn load(path: &Path) -> Result<Self, StorageError> {
        Ok(read_json(path)?.unwrap_or_default())
    }

    pub fn save(&self, path: &Path) -> Result<(), StorageError> {
        write_atomic(path, self)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.base_url.trim().is_empty() {
            return Err("base_url cannot be empty".to_string());
        }
        if self.timeout_secs == 0 {
            return Err("timeout_secs must be at least 1".to_string());
        }
        if self.user_id.as_deref().is_some_and(|id| id.trim().is_empty()) {
            return Err("user_id cannot be blank".to_string());
        }
        Ok(())
    }
}
