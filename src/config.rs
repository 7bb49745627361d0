//! User configuration loaded from `<config dir>/gitzen/config.json`.

use serde::{Deserialize, Serialize};
use std::{
    fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::error::StartupError;
use crate::git::Timeouts;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub short_timeout_ms: u64,
    pub diff_timeout_ms: u64,
    pub network_timeout_ms: u64,
    pub log_limit: usize,
    pub reflog_limit: usize,
    pub command_log_capacity: usize,
    pub status_ttl_ms: u64,
    pub patch_cache_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            short_timeout_ms: 3_000,
            diff_timeout_ms: 10_000,
            network_timeout_ms: 30_000,
            log_limit: 200,
            reflog_limit: 100,
            command_log_capacity: 100,
            status_ttl_ms: 3_000,
            patch_cache_capacity: 64,
        }
    }
}

impl Config {
    /// Load from `path`, or from the default location when `path` is `None`.
    /// A missing file yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, StartupError> {
        let Some(path) = path.map(Path::to_path_buf).or_else(default_config_path) else {
            return Ok(Self::default());
        };

        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(StartupError::Io(e)),
        };

        serde_json::from_str(&text).map_err(|source| StartupError::Config { path, source })
    }

    pub fn timeouts(&self) -> Timeouts {
        Timeouts {
            short: Duration::from_millis(self.short_timeout_ms),
            diff: Duration::from_millis(self.diff_timeout_ms),
            network: Duration::from_millis(self.network_timeout_ms),
        }
    }

    pub fn status_ttl(&self) -> Duration {
        Duration::from_millis(self.status_ttl_ms)
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("gitzen").join("config.json"))
}

pub fn log_file_path() -> Option<PathBuf> {
    dirs::cache_dir().map(|d| d.join("gitzen").join("gitzen.log"))
}
