use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use directories::BaseDirs;
use serde::Deserialize;
use url::Url;

const CONFIG_FILE_NAME: &str = "config.toml";
const APP_NAME: &str = "rax-backup-schedule";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

const ENV_COMPUTE_URL: &str = "OS_COMPUTE_URL";
const ENV_AUTH_TOKEN: &str = "OS_AUTH_TOKEN";

#[derive(Debug, Clone)]
pub struct Config {
    /// File the configuration was read from, if one existed
    pub config_path: Option<PathBuf>,
    pub api: ApiConfig,
}

/// Compute API connection settings
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Compute endpoint including the tenant, e.g.
    /// `https://ord.servers.api.rackspacecloud.com/v2/123456`
    pub compute_url: Url,
    /// Token sent as `X-Auth-Token`
    pub auth_token: Option<String>,
    /// Per-request timeout
    pub timeout_secs: u64,
}

// =============================================================================
// File format
// =============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    api: ApiFile,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ApiFile {
    compute_url: Option<String>,
    auth_token: Option<String>,
    auth_token_file: Option<PathBuf>,
    timeout_secs: Option<u64>,
}

impl ApiFile {
    fn into_config(self, env: &dyn Fn(&str) -> Option<String>) -> Result<ApiConfig> {
        let raw_url = env(ENV_COMPUTE_URL)
            .or(self.compute_url)
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty())
            .ok_or_else(|| {
                anyhow!(
                    "api.compute_url must be specified in configuration (or set {})",
                    ENV_COMPUTE_URL
                )
            })?;

        let compute_url = Url::parse(&raw_url)
            .with_context(|| format!("api.compute_url is not a valid URL: '{}'", raw_url))?;
        if !matches!(compute_url.scheme(), "http" | "https") || compute_url.cannot_be_a_base() {
            bail!("api.compute_url must be an http(s) URL, got '{}'", raw_url);
        }

        let auth_token = match (env(ENV_AUTH_TOKEN), self.auth_token, self.auth_token_file) {
            (Some(token), _, _) => Some(token),
            (None, Some(token), _) => Some(token),
            (None, None, Some(path)) => Some(read_token_file(&path)?),
            (None, None, None) => None,
        }
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty());

        let timeout_secs = self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);
        if timeout_secs == 0 {
            bail!("api.timeout_secs must be greater than zero");
        }

        Ok(ApiConfig {
            compute_url,
            auth_token,
            timeout_secs,
        })
    }
}

fn read_token_file(path: &Path) -> Result<String> {
    let expanded = expand_tilde(path);
    fs::read_to_string(&expanded)
        .with_context(|| format!("failed to read auth token file {}", expanded.display()))
}

/// Expand ~ to home directory in paths
fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = home::home_dir() {
            return home.join(stripped);
        }
    }
    path.to_path_buf()
}

// =============================================================================
// Loading
// =============================================================================

fn config_root() -> Result<PathBuf> {
    let base = BaseDirs::new().context("unable to determine base directories")?;
    Ok(base.config_dir().join(APP_NAME))
}

pub fn config_path() -> Result<PathBuf> {
    Ok(config_root()?.join(CONFIG_FILE_NAME))
}

/// Load configuration from `path` (or the default location), overlaid with
/// `OS_COMPUTE_URL` / `OS_AUTH_TOKEN` from the environment.
pub fn load(path: Option<&Path>) -> Result<Config> {
    load_with_env(path, &|key| std::env::var(key).ok())
}

fn load_with_env(path: Option<&Path>, env: &dyn Fn(&str) -> Option<String>) -> Result<Config> {
    let path = match path {
        Some(p) => {
            if !p.exists() {
                bail!("configuration file not found at {}", p.display());
            }
            p.to_path_buf()
        }
        None => config_path()?,
    };

    if !path.exists() {
        tracing::debug!("no configuration file at {}, using environment", path.display());
        let api = ApiFile::default()
            .into_config(env)
            .with_context(|| format!("no configuration file at {}", path.display()))?;
        return Ok(Config {
            config_path: None,
            api,
        });
    }

    let raw = fs::read_to_string(&path)
        .with_context(|| format!("failed to read configuration file at {}", path.display()))?;

    let mut config = parse(&raw, env)
        .with_context(|| format!("invalid configuration in {}", path.display()))?;
    config.config_path = Some(path);
    Ok(config)
}

fn parse(raw: &str, env: &dyn Fn(&str) -> Option<String>) -> Result<Config> {
    let value: toml::Value = toml::from_str(raw).context("failed to parse as TOML")?;

    warn_unknown_keys(&value);

    let cfg_file: ConfigFile = value.try_into().context("failed to deserialize config")?;

    Ok(Config {
        config_path: None,
        api: cfg_file.api.into_config(env)?,
    })
}

// =============================================================================
// Unknown key warnings
// =============================================================================

fn warn_unknown_keys(value: &toml::Value) {
    let Some(table) = value.as_table() else {
        return;
    };

    for key in table.keys() {
        if key != "api" {
            eprintln!("warning: unknown configuration key `{}`", key);
        }
    }

    if let Some(api) = table.get("api").and_then(|v| v.as_table()) {
        let known = HashSet::from(["compute_url", "auth_token", "auth_token_file", "timeout_secs"]);
        for key in api.keys() {
            if !known.contains(key.as_str()) {
                eprintln!("warning: unknown key `{}` in [api]", key);
            }
        }
    }
}
