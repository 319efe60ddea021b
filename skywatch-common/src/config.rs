//! Configuration loading
//!
//! Bootstrap configuration lives in a single TOML file. Resolution order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`SKYWATCH_CONFIG`)
//! 3. User config file (`~/.config/skywatch/skywatch.toml`)
//! 4. System config file (`/etc/skywatch/skywatch.toml`)
//! 5. Compiled defaults (fallback)
//!
//! A missing file is never fatal; a malformed one is.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "SKYWATCH_CONFIG";

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Top-level TOML configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP listener
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Response cache timing
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    /// Freshness window for upstream payloads
    #[serde(default = "default_ttl_ms")]
    pub ttl_ms: u64,
    /// Period of the background expiry sweep
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,
}

/// Outbound request policy
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpstreamConfig {
    /// Hard per-request timeout
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Politeness limit per upstream source
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Upstream endpoints
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourcesConfig {
    #[serde(default = "default_fr24_url")]
    pub fr24_url: String,
    #[serde(default = "default_adsb_mil_url")]
    pub adsb_mil_url: String,
    #[serde(default = "default_adsb_ladd_url")]
    pub adsb_ladd_url: String,
    #[serde(default = "default_opensky_url")]
    pub opensky_url: String,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8787
}

fn default_ttl_ms() -> u64 {
    2000
}

fn default_sweep_interval_ms() -> u64 {
    10_000
}

fn default_timeout_ms() -> u64 {
    8000
}

fn default_requests_per_second() -> u32 {
    10
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_fr24_url() -> String {
    "https://data-cloud.flightradar24.com/zones/fcgi/feeds.js".to_string()
}

fn default_adsb_mil_url() -> String {
    "https://api.adsb.lol/v2/mil".to_string()
}

fn default_adsb_ladd_url() -> String {
    "https://api.adsb.lol/v2/ladd".to_string()
}

fn default_opensky_url() -> String {
    "https://opensky-network.org/api/states/all".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_ms: default_ttl_ms(),
            sweep_interval_ms: default_sweep_interval_ms(),
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            requests_per_second: default_requests_per_second(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            fr24_url: default_fr24_url(),
            adsb_mil_url: default_adsb_mil_url(),
            adsb_ladd_url: default_adsb_ladd_url(),
            opensky_url: default_opensky_url(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl TomlConfig {
    /// Reject values the service cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.cache.ttl_ms == 0 {
            return Err(Error::Config("cache.ttl_ms must be greater than 0".to_string()));
        }
        if self.cache.sweep_interval_ms == 0 {
            return Err(Error::Config(
                "cache.sweep_interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.upstream.timeout_ms == 0 {
            return Err(Error::Config("upstream.timeout_ms must be greater than 0".to_string()));
        }
        if self.upstream.requests_per_second == 0 {
            return Err(Error::Config(
                "upstream.requests_per_second must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Read and validate a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;
    config.validate()?;
    Ok(config)
}

/// Locate the config file following the documented priority order
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3/4: user then system config file
    let user_config = dirs::config_dir().map(|d| d.join("skywatch").join("skywatch.toml"));
    let system_config = PathBuf::from("/etc/skywatch/skywatch.toml");

    user_config
        .into_iter()
        .chain(std::iter::once(system_config))
        .find(|path| path.exists())
}

/// Load configuration, degrading to compiled defaults when no file exists
pub fn load_config(cli_arg: Option<&Path>) -> Result<TomlConfig> {
    match resolve_config_path(cli_arg) {
        Some(path) if path.exists() => {
            let config = load_toml_config(&path)?;
            info!("Configuration loaded from {}", path.display());
            Ok(config)
        }
        Some(path) => {
            warn!(
                "Config file {} not found, using compiled defaults",
                path.display()
            );
            Ok(TomlConfig::default())
        }
        None => {
            info!("No config file found, using compiled defaults");
            Ok(TomlConfig::default())
        }
    }
}
