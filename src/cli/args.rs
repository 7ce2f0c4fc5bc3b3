//! CLI argument definitions.

use std::net::IpAddr;
use std::path::PathBuf;

use clap::Parser;

use crate::backend::Model;
use crate::config::Config;
use crate::engine::DevicePreference;

/// Config file read when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

/// Voice cloning text-to-speech service.
#[derive(Parser, Debug)]
#[command(name = "character-tts-rs")]
#[command(about = "Voice cloning text-to-speech service with background generation tasks")]
#[command(version)]
pub struct Args {
    /// Configuration file (TOML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address to bind the HTTP server to
    #[arg(long)]
    pub host: Option<IpAddr>,

    /// Port to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Directory containing reference voice samples
    #[arg(long)]
    pub voices_dir: Option<PathBuf>,

    /// Directory generated audio is written to
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Primary model server URL
    #[arg(long)]
    pub primary_url: Option<String>,

    /// Disable the primary model server tier
    #[arg(long)]
    pub no_primary: bool,

    /// Never use the GPU
    #[arg(long)]
    pub no_gpu: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// List available voices and exit
    #[arg(long)]
    pub list_voices: bool,

    /// Generate speech for this text and exit instead of serving
    #[arg(short, long)]
    pub generate: Option<String>,

    /// Voice to use with --generate (name or path; defaults to the first voice)
    #[arg(long, requires = "generate")]
    pub voice: Option<String>,

    /// Device to use with --generate (auto, cuda, cpu)
    #[arg(long, default_value = "auto")]
    pub device: DevicePreference,

    /// Model to use with --generate (simple, primary)
    #[arg(short, long, default_value = "simple")]
    pub model: Model,

    /// Output file for --generate (defaults to a timestamped file in the output directory)
    #[arg(short, long, requires = "generate")]
    pub output: Option<PathBuf>,
}

impl Args {
    /// Config file to load.
    pub fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
    }

    /// Apply command-line overrides on top of file and environment settings.
    pub fn apply(&self, config: &mut Config) {
        if let Some(host) = self.host {
            config.server.host = host;
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(dir) = &self.voices_dir {
            config.paths.voices_dir = dir.clone();
        }
        if let Some(dir) = &self.output_dir {
            config.paths.output_dir = dir.clone();
        }
        if let Some(url) = &self.primary_url {
            config.backends.primary.url = url.clone();
        }
        if self.no_primary {
            config.backends.primary.enabled = false;
        }
        if self.no_gpu {
            config.gpu.enabled = false;
        }
        if self.verbose {
            config.logging.level = "debug".to_string();
        }
    }
}
