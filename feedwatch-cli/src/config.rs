use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notification_client::config::DEFAULT_BASE_URL;
use notification_client::{ClientConfig, QueryOptions, StreamOptions};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cli::Args;
use crate::error::{AppError, Result};

const CONFIG_DIR: &str = "feedwatch";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub base_url: String,
    /// Cookie header value of an authenticated session.
    pub cookie: Option<String>,
    pub timeout_secs: u64,
    pub stream: StreamOptions,
    pub queries: QueryOptions,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            cookie: None,
            timeout_secs: 10,
            stream: StreamOptions::default(),
            queries: QueryOptions::default(),
        }
    }
}

impl AppConfig {
    /// Load from `path`, or the default location. A missing file yields
    /// the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = resolve_path(path)?;
        if !path.exists() {
            debug!(path = %path.display(), "no configuration file, using defaults");
            return Ok(Self::default());
        }
        let content = fs::read_to_string(&path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Overwrite the configuration file with the defaults.
    pub fn reset(path: Option<&Path>) -> Result<PathBuf> {
        let path = resolve_path(path)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, Self::default().show()?)?;
        Ok(path)
    }

    pub fn show(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Command-line flags and environment variables win over file values.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(base_url) = &args.base_url {
            self.base_url = base_url.clone();
        }
        if let Some(cookie) = &args.cookie {
            self.cookie = Some(cookie.clone());
        }
        if let Some(timeout) = args.timeout {
            self.timeout_secs = timeout;
        }
    }

    pub fn client_config(&self) -> ClientConfig {
        let mut config =
            ClientConfig::new(&self.base_url).with_timeout(Duration::from_secs(self.timeout_secs));
        if let Some(cookie) = &self.cookie {
            config = config.with_cookie(cookie);
        }
        config
    }
}

fn resolve_path(path: Option<&Path>) -> Result<PathBuf> {
    match path {
        Some(path) => Ok(path.to_path_buf()),
        None => dirs::config_dir()
            .map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
            .ok_or_else(|| AppError::InvalidInput("cannot determine config directory".to_string())),
    }
}
