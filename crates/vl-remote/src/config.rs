use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RemoteError, RemoteResult};

/// File path used when the configuration does not name one.
pub const DEFAULT_LEDGER_PATH: &str = "ledger.json";

/// Where the ledger file lives.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoLocation {
    /// Human-facing repository URL, used in error messages.
    pub url: String,
    pub owner: String,
    pub name: String,
    #[serde(default = "default_path")]
    pub path: String,
}

fn default_path() -> String {
    DEFAULT_LEDGER_PATH.to_string()
}

impl RepoLocation {
    pub fn new(url: impl Into<String>, owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            owner: owner.into(),
            name: name.into(),
            path: default_path(),
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Reject locations that cannot address a file.
    pub fn validate(&self) -> RemoteResult<()> {
        for (field, value) in [("owner", &self.owner), ("name", &self.name), ("path", &self.path)] {
            if value.trim().is_empty() {
                return Err(RemoteError::Config(format!("repository {field} must not be empty")));
            }
        }
        Ok(())
    }
}

/// Settings for the HTTP transport.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub api_base: String,
    pub user_agent: String,
    pub timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.github.com".into(),
            user_agent: concat!("vl/", env!("CARGO_PKG_VERSION")).into(),
            timeout_secs: 15,
        }
    }
}

impl RemoteConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Parse a TOML table into any config type.
pub fn from_toml_str<T: serde::de::DeserializeOwned>(raw: &str) -> RemoteResult<T> {
    toml::from_str(raw).map_err(|e| RemoteError::Config(e.to_string()))
}

/// Read and parse a TOML config file.
pub fn load_toml<T: serde::de::DeserializeOwned>(path: &Path) -> RemoteResult<T> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| RemoteError::Config(format!("cannot read {}: {e}", path.display())))?;
    from_toml_str(&raw)
}
