//! HTTP client for the primary model server.

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::multipart::{Form, Part};

use super::Backend;
use super::types::{BackendError, HealthResponse, SynthesizeRequest};

/// Default bound on connecting and on the `/health` request.
pub const DEFAULT_HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Primary backend: a voice-cloning model served over HTTP.
pub struct HttpBackend {
    base_url: String,
    client: reqwest::blocking::Client,
    health_timeout: Duration,
}

impl HttpBackend {
    /// Create a new HTTP backend client.
    ///
    /// `timeout` bounds synthesis requests. Connecting and health checks use
    /// [`DEFAULT_HEALTH_TIMEOUT`].
    ///
    /// Must not be called from inside an async context; the blocking client
    /// owns its own runtime.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, BackendError> {
        Self::with_timeouts(base_url, timeout, DEFAULT_HEALTH_TIMEOUT)
    }

    /// Create a client with an explicit health-check timeout.
    pub fn with_timeouts(
        base_url: &str,
        timeout: Duration,
        health_timeout: Duration,
    ) -> Result<Self, BackendError> {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(health_timeout)
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::LoadFailed(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            health_timeout,
        })
    }

    /// Get the base URL for this backend.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn voice_part(request: &SynthesizeRequest) -> Result<Option<Part>, BackendError> {
        let Some(path) = &request.voice_path else {
            return Ok(None);
        };

        let audio_data = std::fs::read(path)
            .map_err(|e| BackendError::InvalidVoice(format!("{}: {e}", path.display())))?;

        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("voice.wav");

        let part = Part::bytes(audio_data)
            .file_name(file_name.to_string())
            .mime_str("audio/wav")
            .map_err(|e| BackendError::RequestFailed(e.to_string()))?;

        Ok(Some(part))
    }
}

/// Short prompts without terminal punctuation make the model trail off.
pub fn prepare_text(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() < 10 && !trimmed.ends_with(['.', '!', '?']) {
        format!("{trimmed}.")
    } else {
        trimmed.to_string()
    }
}

impl Backend for HttpBackend {
    fn health(&self) -> Result<HealthResponse, BackendError> {
        let url = format!("{}/health", self.base_url);

        let response = self
            .client
            .get(&url)
            .timeout(self.health_timeout)
            .send()
            .map_err(|e| BackendError::ConnectionFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(BackendError::Unavailable(format!(
                "Status: {}",
                response.status()
            )));
        }

        let health: HealthResponse = response
            .json()
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))?;

        if !health.is_healthy() {
            return Err(BackendError::Unavailable(format!(
                "{} reports status '{}'",
                health.model, health.status
            )));
        }

        Ok(health)
    }

    fn synthesize(&self, request: &SynthesizeRequest) -> Result<Vec<u8>, BackendError> {
        request.check_text()?;

        let url = format!("{}/synthesize", self.base_url);

        let mut form = Form::new()
            .text("text", prepare_text(&request.text))
            .text("speaker_id", request.speaker_id.to_string())
            .text("temperature", request.temperature.to_string())
            .text("topk", request.topk.to_string())
            .text("device", request.device.as_str());

        if let Some(part) = Self::voice_part(request)? {
            form = form.part("audio", part);
        }

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .map_err(|e| BackendError::ConnectionFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().unwrap_or_default();
            return Err(match status {
                StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                    BackendError::InvalidInput(detail)
                }
                StatusCode::SERVICE_UNAVAILABLE => BackendError::Unavailable(detail),
                _ => BackendError::RequestFailed(format!("Status: {status} {detail}")),
            });
        }

        let audio = response
            .bytes()
            .map(|b| b.to_vec())
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))?;

        if !audio.starts_with(b"RIFF") {
            return Err(BackendError::InvalidResponse(
                "Response is not a WAV file".to_string(),
            ));
        }

        Ok(audio)
    }
}
