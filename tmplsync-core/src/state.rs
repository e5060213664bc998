use crate::error::Result;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const STATE_FILE_NAME: &str = "scraper_state.json";

/// Checkpoint of the last successful batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScraperState {
    #[serde(default)]
    pub last_source_id: String,
    #[serde(default)]
    pub last_run_utc: String,
    #[serde(default)]
    pub total_synced: u64,
    #[serde(default)]
    pub total_errors: u64,
}

impl ScraperState {
    pub fn new(last_source_id: impl Into<String>, total_synced: u64, total_errors: u64) -> Self {
        Self {
            last_source_id: last_source_id.into(),
            last_run_utc: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            total_synced,
            total_errors,
        }
    }
}

/// Small JSON file holding the [`ScraperState`]. One writer at a time.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// State file inside a config directory.
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(STATE_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing or unreadable state reads as "no state".
    pub fn load(&self) -> Option<ScraperState> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(_) => return None,
        };
        match serde_json::from_str(&raw) {
            Ok(state) => Some(state),
            Err(e) => {
                warn!("Ignoring corrupt state file {}: {}", self.path.display(), e);
                None
            }
        }
    }

    pub fn save(&self, state: &ScraperState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        // Write then rename so a crash never leaves a half-written file.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(state)?)?;
        fs::rename(&tmp, &self.path)?;
        debug!("Saved state {:?} to {}", state, self.path.display());
        Ok(())
    }

    /// Returns whether a file was removed.
    pub fn clear(&self) -> Result<bool> {
        if !self.path.exists() {
            return Ok(false);
        }
        fs::remove_file(&self.path)?;
        Ok(true)
    }
}
