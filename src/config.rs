//! Service configuration loading from file and environment variables.

use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Top-level service configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub backends: BackendsConfig,

    #[serde(default)]
    pub tasks: TasksConfig,

    #[serde(default)]
    pub gpu: GpuConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// File the settings were read from; `None` when defaults were used.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,

    #[serde(default = "default_port")]
    pub port: u16,
}

/// Where voice samples are read from and generated audio is written to.
#[derive(Debug, Clone, Deserialize)]
pub struct PathsConfig {
    /// Directory holding the reference `*.wav` samples.
    #[serde(default = "default_voices_dir")]
    pub voices_dir: PathBuf,

    /// Directory generated audio is saved to and served from.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

/// Synthesis tiers, tried in order.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BackendsConfig {
    #[serde(default)]
    pub primary: PrimaryBackendConfig,

    #[serde(default)]
    pub standalone: TierToggle,

    #[serde(default)]
    pub placeholder: TierToggle,
}

/// The remote model server.
#[derive(Debug, Clone, Deserialize)]
pub struct PrimaryBackendConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_primary_url")]
    pub url: String,

    /// Per-request timeout. Voice cloning on CPU can take minutes.
    #[serde(default = "default_primary_timeout")]
    pub timeout_secs: u64,

    /// Bound on connecting and on the start-up health check.
    #[serde(default = "default_health_timeout")]
    pub health_timeout_secs: u64,
}

/// A tier that only needs switching on or off.
#[derive(Debug, Clone, Deserialize)]
pub struct TierToggle {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// Background execution limits.
#[derive(Debug, Clone, Deserialize)]
pub struct TasksConfig {
    /// Syntheses allowed to run at once; 0 means unbounded.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    #[serde(default = "default_short_text_threshold")]
    pub short_text_cpu_threshold: usize,
}

/// GPU detection.
#[derive(Debug, Clone, Deserialize)]
pub struct GpuConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_min_free_memory")]
    pub min_free_memory_mb: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "character_tts_rs=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub json: bool,
}

fn default_true() -> bool {
    true
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    5000
}

fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("character-tts-rs")
}

fn default_voices_dir() -> PathBuf {
    data_dir().join("voices").join("input")
}

fn default_output_dir() -> PathBuf {
    data_dir().join("voices").join("output")
}

fn default_primary_url() -> String {
    "http://localhost:9290".to_string()
}

fn default_primary_timeout() -> u64 {
    300
}

fn default_health_timeout() -> u64 {
    5
}

fn default_max_concurrent() -> usize {
    2
}

fn default_short_text_threshold() -> usize {
    crate::engine::DEFAULT_SHORT_TEXT_CPU_THRESHOLD
}

fn default_min_free_memory() -> u64 {
    2000
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

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            voices_dir: default_voices_dir(),
            output_dir: default_output_dir(),
        }
    }
}

impl Default for PrimaryBackendConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: default_primary_url(),
            timeout_secs: default_primary_timeout(),
            health_timeout_secs: default_health_timeout(),
        }
    }
}

impl Default for TierToggle {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Default for TasksConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            short_text_cpu_threshold: default_short_text_threshold(),
        }
    }
}

impl Default for GpuConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_free_memory_mb: default_min_free_memory(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Loads configuration from a TOML file, falling back to defaults, then
/// applies environment overrides.
///
/// Environment variable overrides:
/// - `TTS_HOST` overrides `server.host`
/// - `TTS_PORT` overrides `server.port`
/// - `TTS_VOICES_DIR` overrides `paths.voices_dir`
/// - `TTS_OUTPUT_DIR` overrides `paths.output_dir`
/// - `TTS_PRIMARY_URL` overrides `backends.primary.url`
/// - `TTS_LOG_LEVEL` overrides `logging.level`
/// - `TTS_LOG_JSON` overrides `logging.json` (set to "true" to enable)
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => Config {
                source: Some(p.to_path_buf()),
                ..toml::from_str(&contents)?
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Config::default(),
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

/// Apply `TTS_*` overrides obtained through `lookup`. Unparseable values are
/// ignored.
pub fn apply_env_overrides(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(parsed) = lookup("TTS_HOST").and_then(|host| host.parse().ok()) {
        config.server.host = parsed;
    }
    if let Some(parsed) = lookup("TTS_PORT").and_then(|port| port.parse().ok()) {
        config.server.port = parsed;
    }
    if let Some(dir) = lookup("TTS_VOICES_DIR") {
        config.paths.voices_dir = PathBuf::from(dir);
    }
    if let Some(dir) = lookup("TTS_OUTPUT_DIR") {
        config.paths.output_dir = PathBuf::from(dir);
    }
    if let Some(url) = lookup("TTS_PRIMARY_URL") {
        config.backends.primary.url = url;
    }
    if let Some(level) = lookup("TTS_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = lookup("TTS_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }
}
