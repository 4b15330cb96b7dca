//! Board configuration.
//!
//! The data layer needs two settings, an endpoint URL and an access key.
//! Resolution order (highest wins):
//!
//! 1. explicit overrides (CLI flags)
//! 2. environment: `EMOBOARD_URL` / `EMOBOARD_KEY`, then the hosted-service
//!    names `VITE_SUPABASE_URL` / `VITE_SUPABASE_ANON_KEY`
//! 3. project file `.emoboard/config.toml`
//! 4. user file `<config_dir>/emoboard/config.toml`
//!
//! A missing endpoint or key is fatal: [`resolve_config`] refuses to build a
//! [`BoardConfig`] and the data layer is never constructed.

use crate::error::ErrorCode;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENDPOINT_ENV: &str = "EMOBOARD_URL";
pub const KEY_ENV: &str = "EMOBOARD_KEY";
const HOSTED_ENDPOINT_ENV: &str = "VITE_SUPABASE_URL";
const HOSTED_KEY_ENV: &str = "VITE_SUPABASE_ANON_KEY";

/// Relative path of the project config file.
pub const PROJECT_CONFIG_PATH: &str = ".emoboard/config.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing backend endpoint URL (set EMOBOARD_URL or `endpoint` in config.toml)")]
    MissingEndpoint,
    #[error("missing backend access key (set EMOBOARD_KEY or `access_key` in config.toml)")]
    MissingAccessKey,
    #[error("unsupported endpoint '{0}': expected http(s)://, sqlite://<path>, or memory:")]
    UnsupportedEndpoint(String),
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl ConfigError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::MissingEndpoint => ErrorCode::MissingEndpoint,
            Self::MissingAccessKey => ErrorCode::MissingAccessKey,
            Self::UnsupportedEndpoint(_) => ErrorCode::UnsupportedEndpoint,
            Self::Read { .. } | Self::Parse { .. } => ErrorCode::ConfigParseError,
        }
    }
}

/// Where the board's table lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Hosted REST service base URL.
    Rest(String),
    /// Local `SQLite` database file.
    Sqlite(PathBuf),
    /// Process-local table, gone when the process exits.
    Memory,
}

impl Endpoint {
    /// Parse an endpoint string by scheme.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnsupportedEndpoint`] for any other scheme.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let trimmed = raw.trim();
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            return Ok(Self::Rest(trimmed.trim_end_matches('/').to_string()));
        }
        if let Some(path) = trimmed.strip_prefix("sqlite://") {
            if !path.is_empty() {
                return Ok(Self::Sqlite(PathBuf::from(path)));
            }
        }
        if trimmed == "memory:" {
            return Ok(Self::Memory);
        }
        Err(ConfigError::UnsupportedEndpoint(raw.to_string()))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rest(url) => f.write_str(url),
            Self::Sqlite(path) => write!(f, "sqlite://{}", path.display()),
            Self::Memory => f.write_str("memory:"),
        }
    }
}

/// Optional feed tuning, all with defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedSettings {
    #[serde(default = "default_feed_limit")]
    pub feed_limit: usize,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_http_timeout_ms")]
    pub http_timeout_ms: u64,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            feed_limit: default_feed_limit(),
            poll_interval_ms: default_poll_interval_ms(),
            http_timeout_ms: default_http_timeout_ms(),
        }
    }
}

impl FeedSettings {
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    #[must_use]
    pub const fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }
}

const fn default_feed_limit() -> usize {
    100
}

const fn default_poll_interval_ms() -> u64 {
    1_000
}

const fn default_http_timeout_ms() -> u64 {
    10_000
}

/// Contents of a `config.toml` file. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub access_key: Option<String>,
    #[serde(default)]
    pub feed: Option<FeedSettings>,
}

/// Values supplied directly by the caller, e.g. CLI flags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub endpoint: Option<String>,
    pub access_key: Option<String>,
}

/// Fully resolved configuration for the data layer.
#[derive(Clone, PartialEq, Eq)]
pub struct BoardConfig {
    pub endpoint: Endpoint,
    pub access_key: String,
    pub feed: FeedSettings,
}

impl BoardConfig {
    /// Build a config directly, bypassing file and environment lookup.
    #[must_use]
    pub fn new(endpoint: Endpoint, access_key: impl Into<String>) -> Self {
        Self {
            endpoint,
            access_key: access_key.into(),
            feed: FeedSettings::default(),
        }
    }
}

impl fmt::Debug for BoardConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoardConfig")
            .field("endpoint", &self.endpoint)
            .field("access_key", &"<redacted>")
            .field("feed", &self.feed)
            .finish()
    }
}

/// Environment reader trait for dependency injection in tests.
pub trait EnvReader {
    fn get(&self, key: &str) -> Option<String>;
}

/// Real process environment.
pub struct ProcessEnv;

impl EnvReader for ProcessEnv {
    fn get(&self, key: &str) -> Option<String> {
        env::var(key).ok().filter(|v| !v.trim().is_empty())
    }
}

/// Load a config file. A missing file is an empty config.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_file_config(path: &Path) -> Result<FileConfig, ConfigError> {
    if !path.exists() {
        return Ok(FileConfig::default());
    }

    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    toml::from_str::<FileConfig>(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Load the per-user config file, if the platform has a config directory.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_user_config() -> Result<FileConfig, ConfigError> {
    let Some(config_dir) = dirs::config_dir() else {
        return Ok(FileConfig::default());
    };
    load_file_config(&config_dir.join("emoboard/config.toml"))
}

/// Resolve the effective board configuration for `project_root`.
///
/// # Errors
///
/// Returns [`ConfigError::MissingEndpoint`] or [`ConfigError::MissingAccessKey`]
/// when a required setting is absent everywhere, and file errors as-is.
pub fn resolve_config(
    project_root: &Path,
    overrides: &ConfigOverrides,
) -> Result<BoardConfig, ConfigError> {
    let project = load_file_config(&project_root.join(PROJECT_CONFIG_PATH))?;
    let user = load_user_config()?;
    resolve_with(overrides, &ProcessEnv, &project, &user)
}

/// Core resolution logic, separated from I/O for testability.
///
/// # Errors
///
/// See [`resolve_config`].
pub fn resolve_with(
    overrides: &ConfigOverrides,
    env: &dyn EnvReader,
    project: &FileConfig,
    user: &FileConfig,
) -> Result<BoardConfig, ConfigError> {
    let endpoint = first_present([
        overrides.endpoint.clone(),
        env.get(ENDPOINT_ENV),
        env.get(HOSTED_ENDPOINT_ENV),
        project.endpoint.clone(),
        user.endpoint.clone(),
    ])
    .ok_or(ConfigError::MissingEndpoint)?;

    let access_key = first_present([
        overrides.access_key.clone(),
        env.get(KEY_ENV),
        env.get(HOSTED_KEY_ENV),
        project.access_key.clone(),
        user.access_key.clone(),
    ])
    .ok_or(ConfigError::MissingAccessKey)?;

    let endpoint = Endpoint::parse(&endpoint)?;
    let feed = project
        .feed
        .clone()
        .or_else(|| user.feed.clone())
        .unwrap_or_default();

    tracing::debug!(%endpoint, "resolved board configuration");

    Ok(BoardConfig {
        endpoint,
        access_key,
        feed,
    })
}

fn first_present<const N: usize>(candidates: [Option<String>; N]) -> Option<String> {
    candidates
        .into_iter()
        .flatten()
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
}
