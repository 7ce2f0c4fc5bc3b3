//! Backend request/response types.

use std::io::Cursor;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine::Device;

/// Sample rate used by the in-process backends.
pub const DEFAULT_SAMPLE_RATE: u32 = 24_000;

/// Errors that can occur when synthesizing with a backend.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Model unavailable: {0}")]
    Unavailable(String),

    #[error("Model load failed: {0}")]
    LoadFailed(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid voice reference: {0}")]
    InvalidVoice(String),

    #[error("Audio encoding failed: {0}")]
    Encoding(String),
}

impl BackendError {
    /// Whether switching to another backend tier could succeed.
    ///
    /// Bad text or a bad voice reference is rejected by every tier alike, so
    /// those are final. Everything else is a property of this particular
    /// backend (missing server, weights that fail to load, broken output).
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            BackendError::InvalidInput(_) | BackendError::InvalidVoice(_)
        )
    }
}

impl From<hound::Error> for BackendError {
    fn from(err: hound::Error) -> Self {
        BackendError::Encoding(err.to_string())
    }
}

/// Health check response from the primary model server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub model: String,
    #[serde(default)]
    pub cuda_available: bool,
    #[serde(default)]
    pub gpu: Option<String>,
    #[serde(default)]
    pub device: String,
}

impl HealthResponse {
    /// Health report for an in-process backend.
    pub fn local(model: &str) -> Self {
        Self {
            status: "healthy".to_string(),
            model: model.to_string(),
            cuda_available: false,
            gpu: None,
            device: Device::Cpu.as_str().to_string(),
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status == "healthy" || self.status == "ok"
    }
}

/// Request for speech synthesis.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesizeRequest {
    pub text: String,
    /// On-disk path of the voice reference sample.
    pub voice_path: Option<PathBuf>,
    pub speaker_id: u32,
    pub temperature: f32,
    pub topk: u32,
    pub device: Device,
}

impl SynthesizeRequest {
    /// Create a new synthesis request.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            voice_path: None,
            speaker_id: 0,
            temperature: 0.9,
            topk: 50,
            device: Device::Cpu,
        }
    }

    /// Set the voice reference sample.
    pub fn with_voice(mut self, path: impl Into<PathBuf>) -> Self {
        self.voice_path = Some(path.into());
        self
    }

    /// Set the speaker id.
    pub fn with_speaker(mut self, speaker_id: u32) -> Self {
        self.speaker_id = speaker_id;
        self
    }

    /// Set sampling parameters.
    pub fn with_sampling(mut self, temperature: f32, topk: u32) -> Self {
        self.temperature = temperature;
        self.topk = topk;
        self
    }

    /// Set the compute device.
    pub fn with_device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    /// Reject text that no backend can speak.
    pub fn check_text(&self) -> Result<(), BackendError> {
        if self.text.trim().is_empty() {
            return Err(BackendError::InvalidInput("Text is empty".to_string()));
        }
        if !self.text.chars().any(char::is_alphanumeric) {
            return Err(BackendError::InvalidInput(
                "Text contains nothing speakable".to_string(),
            ));
        }
        Ok(())
    }
}

/// Rough spoken duration of `text` in seconds, clamped to `[min, max]`.
pub fn estimate_duration(text: &str, min: f32, max: f32) -> f32 {
    let chars = text.chars().filter(|c| !c.is_whitespace()).count() as f32;
    (chars * 0.08).clamp(min, max)
}

/// Encode mono float samples as a 16-bit PCM WAV file.
pub fn encode_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>, BackendError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        for &sample in samples {
            let clamped = sample.clamp(-1.0, 1.0);
            writer.write_sample((clamped * f32::from(i16::MAX)) as i16)?;
        }
        writer.finalize()?;
    }

    Ok(cursor.into_inner())
}
