//! Configuration management
//!
//! Precedence (highest first): `AAF_*` env vars > legacy `LMS_HOST`/`LMS_PORT`
//! > `<config dir>/config.{toml,json,yaml}` > built-in defaults.

use anyhow::Result;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::adapters::cli_transport::DEFAULT_CLI_PORT;
use crate::adapters::lms::{SessionConfig, DEFAULT_SUBSCRIBE_FLAGS};
use crate::adapters::lms_players::DEFAULT_MAX_PLAYERS;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub lms: LmsConfig,

    #[serde(default)]
    pub session: SessionSettings,

    #[serde(default)]
    pub cover_art: CoverArtConfig,

    /// Control-loop period
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

impl Config {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

fn default_tick_interval_ms() -> u64 {
    100
}

#[derive(Debug, Deserialize)]
pub struct LmsConfig {
    pub host: String,
    /// Telnet CLI port
    #[serde(default = "default_cli_port")]
    pub cli_port: u16,
    /// Web server port, used for artwork URLs
    #[serde(default = "default_http_port")]
    pub http_port: u16,
}

fn default_cli_port() -> u16 {
    DEFAULT_CLI_PORT
}

fn default_http_port() -> u16 {
    9000
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionSettings {
    #[serde(default = "default_query_timeout_ms")]
    pub query_timeout_ms: u64,
    #[serde(default = "default_refresh_idle_secs")]
    pub refresh_idle_secs: u64,
    #[serde(default = "default_refresh_active_secs")]
    pub refresh_active_secs: u64,
    #[serde(default = "default_status_dump_secs")]
    pub status_dump_secs: u64,
    #[serde(default = "default_max_players")]
    pub max_players: usize,
    /// Forwarded verbatim in `status - 1 subscribe:<flags>`
    #[serde(default = "default_subscribe_flags")]
    pub subscribe_flags: String,
}

fn default_query_timeout_ms() -> u64 {
    2000
}

fn default_refresh_idle_secs() -> u64 {
    60
}

fn default_refresh_active_secs() -> u64 {
    300
}

fn default_status_dump_secs() -> u64 {
    10
}

fn default_max_players() -> usize {
    DEFAULT_MAX_PLAYERS
}

fn default_subscribe_flags() -> String {
    DEFAULT_SUBSCRIBE_FLAGS.to_string()
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            query_timeout_ms: default_query_timeout_ms(),
            refresh_idle_secs: default_refresh_idle_secs(),
            refresh_active_secs: default_refresh_active_secs(),
            status_dump_secs: default_status_dump_secs(),
            max_players: default_max_players(),
            subscribe_flags: default_subscribe_flags(),
        }
    }
}

impl From<&SessionSettings> for SessionConfig {
    fn from(s: &SessionSettings) -> Self {
        Self {
            query_timeout: Duration::from_millis(s.query_timeout_ms),
            refresh_idle: Duration::from_secs(s.refresh_idle_secs),
            refresh_active: Duration::from_secs(s.refresh_active_secs),
            status_dump_interval: Duration::from_secs(s.status_dump_secs),
            max_players: s.max_players,
            subscribe_flags: s.subscribe_flags.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CoverArtConfig {
    /// Edge length in pixels of the (square) artwork requested from LMS
    #[serde(default = "default_cover_size")]
    pub size: u32,
    #[serde(default = "default_cover_format")]
    pub format: String,
}

fn default_cover_size() -> u32 {
    64
}

fn default_cover_format() -> String {
    "png".to_string()
}

impl Default for CoverArtConfig {
    fn default() -> Self {
        Self {
            size: default_cover_size(),
            format: default_cover_format(),
        }
    }
}

/// Get config directory (AAF_CONFIG_DIR, XDG_CONFIG_HOME or platform default)
pub fn get_config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("AAF_CONFIG_DIR") {
        return PathBuf::from(dir);
    }

    #[cfg(target_os = "macos")]
    {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join("Library/Application Support/album-art-follower");
        }
    }

    #[cfg(target_os = "linux")]
    {
        if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
            return PathBuf::from(xdg).join("album-art-follower");
        }
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(".config/album-art-follower");
        }
    }

    #[cfg(target_os = "windows")]
    {
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata).join("album-art-follower");
        }
    }

    PathBuf::from(".")
}

pub fn load_config() -> Result<Config> {
    let config_dir = get_config_dir();

    let mut builder = ::config::Config::builder()
        .set_default("lms.host", "127.0.0.1")?
        // Load from config file if it exists
        .add_source(
            ::config::File::with_name(&config_dir.join("config").to_string_lossy()).required(false),
        )
        // AAF_LMS__HOST, AAF_SESSION__QUERY_TIMEOUT_MS, AAF_TICK_INTERVAL_MS, ...
        .add_source(
            ::config::Environment::with_prefix("AAF")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

    // Legacy LMS_HOST/LMS_PORT, unless the AAF_ form is set
    if std::env::var("AAF_LMS__HOST").is_err() {
        if let Ok(host) = std::env::var("LMS_HOST") {
            builder = builder.set_override("lms.host", host)?;
        }
    }
    if std::env::var("AAF_LMS__CLI_PORT").is_err() {
        if let Ok(port) = std::env::var("LMS_PORT") {
            if let Ok(port_num) = port.parse::<u16>() {
                builder = builder.set_override("lms.cli_port", port_num as i64)?;
            }
        }
    }

    let config = builder.build()?;

    Ok(config.try_deserialize()?)
}
