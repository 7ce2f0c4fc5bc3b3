//! Compute device resolution.

use std::fmt;
use std::process::Command;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Device requested by the client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DevicePreference {
    /// Prefer CUDA, fall back to CPU.
    #[default]
    Auto,
    Cuda,
    Cpu,
}

impl FromStr for DevicePreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(DevicePreference::Auto),
            "cuda" | "gpu" => Ok(DevicePreference::Cuda),
            "cpu" => Ok(DevicePreference::Cpu),
            other => Err(format!(
                "Unknown device '{other}', expected 'auto', 'cuda' or 'cpu'"
            )),
        }
    }
}

/// Concrete device a task runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    Cuda,
    Cpu,
}

impl Device {
    pub fn as_str(&self) -> &'static str {
        match self {
            Device::Cuda => "cuda",
            Device::Cpu => "cpu",
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a GPU cannot be used.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DeviceError {
    #[error("no CUDA device available: {0}")]
    NoGpu(String),

    #[error("not enough GPU memory ({free_mb} MB free, {required_mb} MB required)")]
    InsufficientMemory { free_mb: u64, required_mb: u64 },

    #[error("GPU probe failed: {0}")]
    ProbeFailed(String),
}

/// A detected GPU.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GpuInfo {
    pub name: String,
    pub total_memory_mb: u64,
    pub free_memory_mb: u64,
}

/// Hardware availability check.
#[cfg_attr(test, mockall::automock)]
pub trait GpuProbe: Send + Sync {
    /// Report a usable GPU, or why none can be used.
    fn probe(&self) -> Result<GpuInfo, DeviceError>;
}

/// Probe that queries `nvidia-smi`.
#[derive(Debug, Clone)]
pub struct NvidiaSmiProbe {
    min_free_memory_mb: u64,
}

impl NvidiaSmiProbe {
    pub fn new(min_free_memory_mb: u64) -> Self {
        Self { min_free_memory_mb }
    }
}

/// Parse `nvidia-smi --query-gpu=name,memory.total,memory.used
/// --format=csv,noheader,nounits` output, first GPU only.
pub fn parse_nvidia_smi(output: &str) -> Result<GpuInfo, DeviceError> {
    let line = output
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .ok_or_else(|| DeviceError::NoGpu("nvidia-smi listed no devices".to_string()))?;

    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    let [name, total, used] = fields.as_slice() else {
        return Err(DeviceError::ProbeFailed(format!(
            "unexpected nvidia-smi output: {line}"
        )));
    };

    let parse = |value: &str| {
        value
            .parse::<u64>()
            .map_err(|_| DeviceError::ProbeFailed(format!("unexpected memory value: {value}")))
    };
    let total_memory_mb = parse(*total)?;
    let used_memory_mb = parse(*used)?;

    Ok(GpuInfo {
        name: (*name).to_string(),
        total_memory_mb,
        free_memory_mb: total_memory_mb.saturating_sub(used_memory_mb),
    })
}

impl GpuProbe for NvidiaSmiProbe {
    fn probe(&self) -> Result<GpuInfo, DeviceError> {
        let output = Command::new("nvidia-smi")
            .args([
                "--query-gpu=name,memory.total,memory.used",
                "--format=csv,noheader,nounits",
            ])
            .output()
            .map_err(|e| DeviceError::NoGpu(format!("nvidia-smi not runnable: {e}")))?;

        if !output.status.success() {
            return Err(DeviceError::NoGpu(format!(
                "nvidia-smi exited with {}",
                output.status
            )));
        }

        let info = parse_nvidia_smi(&String::from_utf8_lossy(&output.stdout))?;

        if info.free_memory_mb < self.min_free_memory_mb {
            return Err(DeviceError::InsufficientMemory {
                free_mb: info.free_memory_mb,
                required_mb: self.min_free_memory_mb,
            });
        }

        Ok(info)
    }
}

/// Probe used when GPU support is switched off.
#[derive(Debug, Clone, Default)]
pub struct NoGpu;

impl GpuProbe for NoGpu {
    fn probe(&self) -> Result<GpuInfo, DeviceError> {
        Err(DeviceError::NoGpu("GPU support disabled".to_string()))
    }
}

/// Outcome of resolving a preference.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceResolution {
    pub device: Device,
    /// Set when `auto` could not use the GPU.
    pub fallback_reason: Option<String>,
}

/// Maps a [`DevicePreference`] to a concrete [`Device`].
#[derive(Clone)]
pub struct DeviceResolver {
    probe: Arc<dyn GpuProbe>,
}

impl DeviceResolver {
    pub fn new(probe: Arc<dyn GpuProbe>) -> Self {
        Self { probe }
    }

    /// Resolve once; `cuda` fails instead of falling back.
    pub fn resolve(&self, preference: DevicePreference) -> Result<DeviceResolution, DeviceError> {
        match preference {
            DevicePreference::Cpu => Ok(DeviceResolution {
                device: Device::Cpu,
                fallback_reason: None,
            }),
            DevicePreference::Cuda => {
                let gpu = self.probe.probe()?;
                tracing::debug!(gpu = %gpu.name, free_mb = gpu.free_memory_mb, "using requested GPU");
                Ok(DeviceResolution {
                    device: Device::Cuda,
                    fallback_reason: None,
                })
            }
            DevicePreference::Auto => match self.probe.probe() {
                Ok(gpu) => {
                    tracing::debug!(gpu = %gpu.name, free_mb = gpu.free_memory_mb, "auto selected GPU");
                    Ok(DeviceResolution {
                        device: Device::Cuda,
                        fallback_reason: None,
                    })
                }
                Err(err) => {
                    tracing::info!(reason = %err, "GPU unavailable, falling back to CPU");
                    Ok(DeviceResolution {
                        device: Device::Cpu,
                        fallback_reason: Some(err.to_string()),
                    })
                }
            },
        }
    }

    /// Run the probe directly, for diagnostics.
    pub fn probe(&self) -> Result<GpuInfo, DeviceError> {
        self.probe.probe()
    }
}
