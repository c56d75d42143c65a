//! Bootstrap configuration loading
//!
//! Configuration file resolution priority:
//! 1. Command-line argument (highest priority)
//! 2. `KIOSK_CONFIG` environment variable
//! 3. User config (`~/.config/kiosk/config.toml`), then `/etc/kiosk/config.toml`
//! 4. Compiled defaults (fallback)
//!
//! A missing file is never fatal: the service logs a warning and starts on
//! compiled defaults. A file that exists but cannot be read or parsed is a
//! configuration error.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the configuration file
pub const CONFIG_ENV_VAR: &str = "KIOSK_CONFIG";

/// Bootstrap configuration shared by all kiosk services
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Root of the per-project content tree
    pub storage_root: PathBuf,
    pub ingest: IngestConfig,
    pub device: DeviceConfig,
    pub playback: PlaybackConfig,
    pub logging: LoggingConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            storage_root: PathBuf::from("./content"),
            ingest: IngestConfig::default(),
            device: DeviceConfig::default(),
            playback: PlaybackConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Content ingestion server settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub bind_address: String,
    pub port: u16,
    /// Upper bound on downloads running at once for a single request
    pub max_concurrent_downloads: usize,
    /// Extension of stored media artifacts (without the dot)
    pub media_extension: String,
    /// Per-download deadline; `None` waits for the transport indefinitely
    pub download_timeout_secs: Option<u64>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 3000,
            max_concurrent_downloads: 8,
            media_extension: "mp4".to_string(),
            download_timeout_secs: None,
        }
    }
}

/// Device identity and registry settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub device_id: String,
    /// Registration endpoint; registration is disabled when absent
    pub registry_endpoint: Option<String>,
    /// Local tunnel introspection endpoint used to discover the public URL
    pub tunnel_api_url: String,
    /// Fixed public URL; skips tunnel discovery when set
    pub public_url: Option<String>,
    pub heartbeat_interval_secs: u64,
    pub registration_timeout_secs: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            device_id: "kiosk-001".to_string(),
            registry_endpoint: None,
            tunnel_api_url: "http://localhost:4040/api/tunnels".to_string(),
            public_url: None,
            heartbeat_interval_secs: 300,
            registration_timeout_secs: 30,
        }
    }
}

/// Tag reader and player settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    pub serial_port: String,
    pub baud_rate: u32,
    /// Bytes requested per serial read
    pub read_buffer_size: usize,
    /// JSON object mapping tag UIDs to video paths
    pub mapping_path: PathBuf,
    pub player_program: String,
    /// Arguments placed before the video path
    pub player_args: Vec<String>,
    /// Applied to the player only when `XDG_RUNTIME_DIR` is unset
    pub xdg_runtime_dir: Option<String>,
    pub reconnect: ReconnectConfig,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            serial_port: "/dev/ttyACM0".to_string(),
            baud_rate: 9600,
            read_buffer_size: 100,
            mapping_path: PathBuf::from("tag_video_map.json"),
            player_program: "mpv".to_string(),
            player_args: vec![
                "--msg-level=all=v".to_string(),
                "--no-audio".to_string(),
                "--fs".to_string(),
                "--loop".to_string(),
            ],
            xdg_runtime_dir: Some("/run/user/1000".to_string()),
            reconnect: ReconnectConfig::default(),
        }
    }
}

/// Serial reconnect policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    /// Consecutive failed reopen attempts before giving up
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            initial_backoff_ms: 500,
            max_backoff_ms: 30_000,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl TomlConfig {
    /// Parse configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
            .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TomlConfig =
            toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make a service unusable
    pub fn validate(&self) -> Result<()> {
        if self.ingest.max_concurrent_downloads == 0 {
            return Err(Error::Config(
                "ingest.max_concurrent_downloads must be at least 1".to_string(),
            ));
        }
        if self.ingest.media_extension.is_empty() || self.ingest.media_extension.contains('/') {
            return Err(Error::Config(format!(
                "ingest.media_extension is not a valid extension: {:?}",
                self.ingest.media_extension
            )));
        }
        if self.playback.read_buffer_size == 0 {
            return Err(Error::Config(
                "playback.read_buffer_size must be at least 1".to_string(),
            ));
        }
        if self.playback.player_program.trim().is_empty() {
            return Err(Error::Config("playback.player_program is empty".to_string()));
        }
        Ok(())
    }
}

/// Resolves and loads the configuration file
pub struct ConfigResolver {
    cli_path: Option<PathBuf>,
}

impl ConfigResolver {
    pub fn new(cli_path: Option<PathBuf>) -> Self {
        Self { cli_path }
    }

    /// Path of the configuration file to use, if any exists
    pub fn locate(&self) -> Option<PathBuf> {
        // Priority 1: Command-line argument
        if let Some(path) = &self.cli_path {
            return Some(path.clone());
        }

        // Priority 2: Environment variable
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            if !path.trim().is_empty() {
                return Some(PathBuf::from(path));
            }
        }

        // Priority 3: Well-known locations
        default_config_paths().into_iter().find(|p| p.exists())
    }

    /// Load configuration, falling back to compiled defaults
    pub fn resolve(&self) -> Result<TomlConfig> {
        match self.locate() {
            Some(path) if path.exists() => {
                info!("Loading configuration from {}", path.display());
                TomlConfig::from_file(&path)
            }
            Some(path) => {
                warn!(
                    "Configuration file {} not found, using compiled defaults",
                    path.display()
                );
                Ok(TomlConfig::default())
            }
            None => {
                info!("No configuration file found, using compiled defaults");
                Ok(TomlConfig::default())
            }
        }
    }
}

/// Well-known configuration file locations, in priority order
pub fn default_config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("kiosk").join("config.toml"));
    }
    if cfg!(unix) {
        paths.push(PathBuf::from("/etc/kiosk/config.toml"));
    }
    paths
}
