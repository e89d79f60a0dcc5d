//! Pipeline configuration
//!
//! Built once at startup and passed by reference into every collector and
//! extractor. Resolution order: defaults, then TOML file, then environment.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

use crate::error::{PipelineError, Result};

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Cap on identifiers processed per platform
    pub max_apps_per_platform: usize,
    /// Root of the store-scoped output directories
    pub data_dir: PathBuf,
    /// Reviews requested per app
    pub review_limit: usize,
    /// WebDriver endpoint used for dynamically loaded reviews
    pub webdriver_url: String,
    pub wait_timeout_secs: u64,
    pub scroll_pause_millis: u64,
    pub http_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_apps_per_platform: 1000,
            data_dir: PathBuf::from("data"),
            review_limit: 100,
            webdriver_url: "http://localhost:4444".to_string(),
            wait_timeout_secs: 10,
            scroll_pause_millis: 2000,
            http_timeout_secs: 30,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// On-disk overrides; every field optional
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    pub max_apps_per_platform: Option<usize>,
    pub data_dir: Option<String>,
    pub review_limit: Option<usize>,
    pub webdriver_url: Option<String>,
    pub wait_timeout_secs: Option<u64>,
    pub scroll_pause_millis: Option<u64>,
    pub http_timeout_secs: Option<u64>,
    pub user_agent: Option<String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| PipelineError::Config(e.to_string()))
    }
}

impl PipelineConfig {
    /// Merge defaults, an optional file and an environment lookup.
    ///
    /// The lookup is injected so tests never touch the process environment.
    pub fn resolve<F>(file: Option<FileConfig>, env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let file = file.unwrap_or_default();
        let defaults = Self::default();

        let mut config = Self {
            max_apps_per_platform: file
                .max_apps_per_platform
                .unwrap_or(defaults.max_apps_per_platform),
            data_dir: file
                .data_dir
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            review_limit: file.review_limit.unwrap_or(defaults.review_limit),
            webdriver_url: file.webdriver_url.unwrap_or(defaults.webdriver_url),
            wait_timeout_secs: file.wait_timeout_secs.unwrap_or(defaults.wait_timeout_secs),
            scroll_pause_millis: file
                .scroll_pause_millis
                .unwrap_or(defaults.scroll_pause_millis),
            http_timeout_secs: file.http_timeout_secs.unwrap_or(defaults.http_timeout_secs),
            user_agent: file.user_agent.unwrap_or(defaults.user_agent),
        };

        if let Some(raw) = env("MAX_APPS_PER_PLATFORM") {
            match raw.trim().parse::<usize>() {
                Ok(n) => config.max_apps_per_platform = n,
                Err(_) => warn!(value = %raw, "ignoring invalid MAX_APPS_PER_PLATFORM"),
            }
        }
        if let Some(dir) = env("ARPS_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(url) = env("WEBDRIVER_URL") {
            config.webdriver_url = url;
        }

        config
    }

    /// Resolve against the real process environment
    pub fn from_env(file: Option<FileConfig>) -> Self {
        Self::resolve(file, |key| std::env::var(key).ok())
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_secs)
    }

    pub fn scroll_pause(&self) -> Duration {
        Duration::from_millis(self.scroll_pause_millis)
    }

    pub fn http_agent(&self) -> ureq::Agent {
        ureq::Agent::new_with_config(
            ureq::Agent::config_builder()
                .timeout_global(Some(Duration::from_secs(self.http_timeout_secs)))
                .user_agent(self.user_agent.as_str())
                .build(),
        )
    }
}
