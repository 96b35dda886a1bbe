//! `~/.stepsync/config.yaml` — connection settings for live runs.
//!
//! ```yaml
//! environment_url: https://contoso.crm.dynamics.com
//! api_version: "9.2"
//! token_env: STEPSYNC_TOKEN
//! timeout_secs: 30
//! ```
//!
//! `STEPSYNC_URL` overrides `environment_url`. The bearer token itself never
//! lives in the file; it is read from the variable named by `token_env`.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use stepsync_remote::WebApiConfig;

pub const URL_ENV: &str = "STEPSYNC_URL";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub environment_url: Option<String>,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_token_env")]
    pub token_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_api_version() -> String {
    "9.2".to_string()
}

fn default_token_env() -> String {
    "STEPSYNC_TOKEN".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for Config {
    fn default() -> Self {
        Self {
            environment_url: None,
            api_version: default_api_version(),
            token_env: default_token_env(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Config {
    /// Load `explicit` if given (it must exist), else the default location
    /// (missing is fine), then apply environment overrides.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let config = match explicit {
            Some(path) => Self::load_at(path)?
                .with_context(|| format!("config file not found: {}", path.display()))?,
            None => match default_path() {
                Some(path) => Self::load_at(&path)?.unwrap_or_default(),
                None => Self::default(),
            },
        };
        Ok(config.with_env_overrides(std::env::var(URL_ENV).ok()))
    }

    /// `Ok(None)` when the file does not exist.
    pub fn load_at(path: &Path) -> Result<Option<Self>> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("failed to read {}", path.display()))
            }
        };
        let config = serde_yaml::from_str(&contents)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(Some(config))
    }

    fn with_env_overrides(mut self, url: Option<String>) -> Self {
        if let Some(url) = url.filter(|u| !u.trim().is_empty()) {
            self.environment_url = Some(url);
        }
        self
    }

    /// Connection settings for [`stepsync_remote::WebApiClient`].
    pub fn web_api(&self) -> Result<WebApiConfig> {
        let Some(url) = self.environment_url.clone() else {
            bail!("no environment_url configured (set it in the config file or {URL_ENV})");
        };
        let token = std::env::var(&self.token_env)
            .with_context(|| format!("bearer token variable {} is not set", self.token_env))?;
        Ok(WebApiConfig {
            environment_url: url,
            api_version: self.api_version.clone(),
            token,
            timeout: Duration::from_secs(self.timeout_secs),
        })
    }
}

/// `~/.stepsync/config.yaml`.
pub fn default_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".stepsync").join("config.yaml"))
}
