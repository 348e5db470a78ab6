//! Configuration loading for inatd.
//!
//! Settings are layered, lowest precedence first:
//! 1. built-in defaults
//! 2. a TOML file: `--config <path>`, else `~/.inatproxy/config.toml`,
//!    else `/etc/inatproxy/config.toml` (no file at all is fine)
//! 3. environment variables (`INAT_MAX_CONCURRENT`, `INAT_CACHE_TTL`, ...)
//!
//! The upstream bearer token is a secret and loaded separately:
//! 1. `~/.inatproxy/secrets.toml` (user, must be 0600)
//! 2. `/etc/inatproxy/secrets.toml` (system, must be 0600)
//! 3. `INAT_TOKEN`

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::cache::CacheConfig;
use crate::fetcher::FetcherBuilder;
use crate::upstream::{DEFAULT_BASE_URL, RetryConfig};
use crate::{ProxyError, Result};

/// Daemon configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub cache: CacheSection,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to (default: 127.0.0.1:8000).
    #[serde(default = "default_address")]
    pub address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
        }
    }
}

fn default_address() -> String {
    "127.0.0.1:8000".to_string()
}

/// Upstream client configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-attempt timeout in seconds (default: 20).
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Ceiling on concurrent upstream calls (default: 8).
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    /// Attempts per fetch, including the first (default: 6).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// First backoff delay in milliseconds (default: 1000).
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,
    /// Share one upstream call between concurrent identical misses.
    #[serde(default)]
    pub coalesce_in_flight: bool,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout(),
            max_concurrent: default_max_concurrent(),
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff(),
            coalesce_in_flight: false,
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout() -> u64 {
    20
}

fn default_max_concurrent() -> usize {
    8
}

fn default_max_attempts() -> u32 {
    6
}

fn default_initial_backoff() -> u64 {
    1_000
}

/// Response cache configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSection {
    /// Entry lifetime in seconds (default: 30).
    #[serde(default = "default_ttl")]
    pub ttl_secs: u64,
    /// Maximum number of entries (default: 1024).
    #[serde(default = "default_max_entries")]
    pub max_entries: u64,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl(),
            max_entries: default_max_entries(),
        }
    }
}

fn default_ttl() -> u64 {
    30
}

fn default_max_entries() -> u64 {
    1_024
}

/// Environment variable overrides.
pub const ENV_BASE_URL: &str = "INAT_BASE_URL";
pub const ENV_MAX_CONCURRENT: &str = "INAT_MAX_CONCURRENT";
pub const ENV_CACHE_TTL: &str = "INAT_CACHE_TTL";
pub const ENV_CACHE_MAXSIZE: &str = "INAT_CACHE_MAXSIZE";
pub const ENV_TIMEOUT: &str = "INAT_TIMEOUT_SECS";
pub const ENV_MAX_ATTEMPTS: &str = "INAT_MAX_ATTEMPTS";
pub const ENV_TOKEN: &str = "INAT_TOKEN";

impl Config {
    /// Load configuration from the standard locations, then apply the
    /// process environment.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let mut config = match Self::resolve_config_path(explicit_path)? {
            Some(path) => Self::load_from_file(&path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            ProxyError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            ProxyError::Configuration(format!("Failed to parse config file {path:?}: {e}"))
        })
    }

    /// Resolve the config file path. `Ok(None)` means "use defaults".
    fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(Some(path.to_path_buf()));
            }
            return Err(ProxyError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".inatproxy").join("config.toml");
            if user_config.exists() {
                return Ok(Some(user_config));
            }
        }

        let system_config = PathBuf::from("/etc/inatproxy/config.toml");
        if system_config.exists() {
            return Ok(Some(system_config));
        }

        Ok(None)
    }

    /// Override settings from environment-style variables.
    ///
    /// `lookup` is `std::env::var` in production; tests pass a map.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_BASE_URL) {
            self.upstream.base_url = url;
        }
        if let Some(n) = parse_env(&lookup, ENV_MAX_CONCURRENT)? {
            self.upstream.max_concurrent = n;
        }
        if let Some(secs) = parse_env(&lookup, ENV_CACHE_TTL)? {
            self.cache.ttl_secs = secs;
        }
        if let Some(n) = parse_env(&lookup, ENV_CACHE_MAXSIZE)? {
            self.cache.max_entries = n;
        }
        if let Some(secs) = parse_env(&lookup, ENV_TIMEOUT)? {
            self.upstream.timeout_secs = secs;
        }
        if let Some(n) = parse_env(&lookup, ENV_MAX_ATTEMPTS)? {
            self.upstream.max_attempts = n;
        }
        Ok(())
    }

    /// Map this configuration onto a [`FetcherBuilder`].
    pub fn fetcher_builder(&self, secrets: &Secrets) -> FetcherBuilder {
        let upstream = &self.upstream;
        let mut builder = FetcherBuilder::new()
            .base_url(&upstream.base_url)
            .timeout(Duration::from_secs(upstream.timeout_secs))
            .max_concurrent(upstream.max_concurrent)
            .coalesce_in_flight(upstream.coalesce_in_flight)
            .retry(
                RetryConfig::new()
                    .max_attempts(upstream.max_attempts)
                    .initial_delay(Duration::from_millis(upstream.initial_backoff_ms)),
            )
            .cache(
                CacheConfig::new()
                    .max_entries(self.cache.max_entries)
                    .ttl(Duration::from_secs(self.cache.ttl_secs)),
            );
        if let Some(token) = secrets.token() {
            builder = builder.bearer_token(token);
        }
        builder
    }
}

fn parse_env<F, T>(lookup: &F, key: &str) -> Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|e| {
            ProxyError::Configuration(format!("invalid value for {key}: {raw:?} ({e})"))
        }),
    }
}

/// Secrets configuration (upstream token).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Secrets {
    /// Personal iNaturalist API token.
    #[serde(default)]
    pub token: Option<String>,
}

impl Secrets {
    /// Load secrets from the standard locations with permission checks.
    ///
    /// Returns the environment-only view when no file exists.
    pub fn load() -> Result<Self> {
        if let Some(home) = dirs::home_dir() {
            let user_secrets = home.join(".inatproxy").join("secrets.toml");
            if user_secrets.exists() {
                return Self::load_from_file(&user_secrets);
            }
        }

        let system_secrets = PathBuf::from("/etc/inatproxy/secrets.toml");
        if system_secrets.exists() {
            return Self::load_from_file(&system_secrets);
        }

        Ok(Self::default())
    }

    /// Load a specific secrets file; its permissions are checked first.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        Self::check_permissions(path)?;
        let content = fs::read_to_string(path).map_err(|e| {
            ProxyError::Configuration(format!("Failed to read secrets file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            ProxyError::Configuration(format!("Failed to parse secrets file {path:?}: {e}"))
        })
    }

    /// Check that the secrets file has secure permissions (0600 or 0400).
    #[cfg(unix)]
    fn check_permissions(path: &Path) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let metadata = fs::metadata(path).map_err(|e| {
            ProxyError::Configuration(format!("Failed to stat secrets file {path:?}: {e}"))
        })?;

        let mode = metadata.permissions().mode();
        if mode & 0o077 != 0 {
            return Err(ProxyError::Configuration(format!(
                "Secrets file {path:?} has insecure permissions {:o}. Must be 0600 or 0400.",
                mode & 0o777
            )));
        }

        Ok(())
    }

    #[cfg(not(unix))]
    fn check_permissions(_path: &Path) -> Result<()> {
        Ok(())
    }

    /// Upstream token, falling back to `INAT_TOKEN`.
    pub fn token(&self) -> Option<String> {
        self.token_with(|key| std::env::var(key).ok())
    }

    /// [`token`](Self::token) with an explicit environment lookup.
    pub fn token_with<F>(&self, lookup: F) -> Option<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        self.token
            .clone()
            .or_else(|| lookup(ENV_TOKEN))
            .filter(|t| !t.trim().is_empty())
    }
}
