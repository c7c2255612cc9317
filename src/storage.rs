use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::portfolio_tools::types::{Portfolio, Subscription};

/// How long a cached subscription answer is trusted.
const SUBSCRIPTION_TTL_MINUTES: i64 = 60;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("No cache directory available on this platform")]
    NoCacheDir,
}

/// Write through a temporary file and an atomic rename to avoid partial writes.
pub fn write_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let temp = path.with_extension("tmp");
    let mut f = File::create(&temp)?;
    let content = serde_json::to_string_pretty(value)?;
    f.write_all(content.as_bytes())?;
    f.sync_all()?;
    fs::rename(temp, path)?;
    Ok(())
}

pub fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Option<T>, StorageError> {
    if !path.exists() {
        return Ok(None);
    }
    let mut file = File::open(path)?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;
    Ok(Some(serde_json::from_str(&contents)?))
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cached<T> {
    pub value: T,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionData {
    pub user_id: Option<String>,
    pub subscription: Option<Cached<Subscription>>,
    pub portfolio: Option<Cached<Portfolio>>,
}

/// Read-through cache for server-owned data shared between commands. Never a
/// source of truth: every entry came from a server response and any of them
/// can be dropped at will.
pub struct SessionCache {
    path: PathBuf,
    data: SessionData,
}

impl SessionCache {
    pub fn default_path() -> Result<PathBuf, StorageError> {
        let dir = dirs::cache_dir().ok_or(StorageError::NoCacheDir)?;
        Ok(dir.join("portfolio-builder").join("session.json"))
    }

    /// Load the cache at `path`. A missing or unreadable file starts empty.
    pub fn open(path: PathBuf) -> Self {
        let data = match read_json::<SessionData>(&path) {
            Ok(data) => data.unwrap_or_default(),
            Err(err) => {
                debug!(path = %path.display(), %err, "discarding unreadable session cache");
                SessionData::default()
            }
        };
        Self { path, data }
    }

    pub fn save(&self) -> Result<(), StorageError> {
        write_atomic(&self.path, &self.data)
    }

    #[cfg(test)]
    pub fn data(&self) -> &SessionData {
        &self.data
    }

    /// Switching users drops everything cached for the previous one.
    pub fn bind_user(&mut self, user_id: &str) {
        if self.data.user_id.as_deref() != Some(user_id) {
            self.data = SessionData {
                user_id: Some(user_id.to_string()),
                ..Default::default()
            };
        }
    }

    /// Cached subscription unless stale or expired; otherwise ask `loader`
    /// and remember its answer.
    pub fn subscription<E>(
        &mut self,
        now: DateTime<Utc>,
        loader: impl FnOnce() -> Result<Subscription, E>,
    ) -> Result<Subscription, E> {
        if let Some(cached) = &self.data.subscription {
            let fresh = now - cached.fetched_at < Duration::minutes(SUBSCRIPTION_TTL_MINUTES);
            if fresh && !cached.value.is_expired_at(now) {
                debug!("subscription served from session cache");
                return Ok(cached.value.clone());
            }
        }
        let value = loader()?;
        self.data.subscription = Some(Cached {
            value: value.clone(),
            fetched_at: now,
        });
        Ok(value)
    }

    pub fn invalidate_subscription(&mut self) {
        self.data.subscription = None;
    }

    /// Remember the latest authoritative portfolio.
    pub fn absorb(&mut self, portfolio: &Portfolio) {
        self.data.portfolio = Some(Cached {
            value: portfolio.clone(),
            fetched_at: Utc::now(),
        });
    }

    pub fn cached_portfolio(&self) -> Option<&Portfolio> {
        self.data.portfolio.as_ref().map(|cached| &cached.value)
    }

    pub fn forget_portfolio(&mut self) {
        self.data.portfolio = None;
    }
}
