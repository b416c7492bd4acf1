use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use vl_remote::config::load_toml;
use vl_remote::{RemoteConfig, RepoLocation, DEFAULT_LEDGER_PATH};

/// Looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "vl.toml";

/// Contents of `vl.toml`.
///
/// ```toml
/// token_env = "VL_TOKEN"
///
/// [repo]
/// url = "https://github.com/acme/qa"
/// owner = "acme"
/// name = "qa"
/// path = "ledger.json"
///
/// [remote]
/// api_base = "https://api.github.com"
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub repo: Option<RepoLocation>,
    pub remote: RemoteConfig,
    /// Environment variable holding the access token.
    pub token_env: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            repo: None,
            remote: RemoteConfig::default(),
            token_env: "VL_TOKEN".into(),
        }
    }
}

/// Repository fields given on the command line.
#[derive(Clone, Debug, Default)]
pub struct LocationOverrides {
    pub owner: Option<String>,
    pub repo: Option<String>,
    pub path: Option<String>,
}

impl LedgerConfig {
    /// Load `explicit`, else `vl.toml` if present, else defaults.
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let fallback = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !fallback.exists() {
                    return Ok(Self::default());
                }
                fallback
            }
        };
        let config = load_toml(&path)
            .with_context(|| format!("loading configuration from {}", path.display()))?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    pub fn location(&self, overrides: &LocationOverrides) -> anyhow::Result<RepoLocation> {
        let base = self.repo.as_ref();
        let owner = overrides.owner.clone().or_else(|| base.map(|r| r.owner.clone()));
        let name = overrides.repo.clone().or_else(|| base.map(|r| r.name.clone()));
        let (Some(owner), Some(name)) = (owner, name) else {
            bail!("no repository configured; pass --owner and --repo or add a [repo] table to {DEFAULT_CONFIG_FILE}");
        };

        let url = match base {
            Some(r) if r.owner == owner && r.name == name => r.url.clone(),
            _ => format!("https://github.com/{owner}/{name}"),
        };
        let path = overrides
            .path
            .clone()
            .or_else(|| base.map(|r| r.path.clone()))
            .unwrap_or_else(|| DEFAULT_LEDGER_PATH.to_string());

        let location = RepoLocation::new(url, owner, name).with_path(path);
        location.validate()?;
        Ok(location)
    }

    pub fn token(&self) -> Option<String> {
        std::env::var(&self.token_env)
            .ok()
            .filter(|token| !token.trim().is_empty())
    }
}
