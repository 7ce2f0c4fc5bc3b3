//! Last-resort backend that always produces a valid (silent) WAV file.

use super::Backend;
use super::types::{
    BackendError, DEFAULT_SAMPLE_RATE, HealthResponse, SynthesizeRequest, encode_wav,
    estimate_duration,
};

const MAX_DURATION_SECS: f32 = 10.0;

/// Placeholder synthesizer: keeps the service answering when no real model
/// can be used.
#[derive(Debug, Default, Clone)]
pub struct PlaceholderBackend;

impl PlaceholderBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Backend for PlaceholderBackend {
    fn health(&self) -> Result<HealthResponse, BackendError> {
        Ok(HealthResponse::local("placeholder"))
    }

    fn synthesize(&self, request: &SynthesizeRequest) -> Result<Vec<u8>, BackendError> {
        let duration = estimate_duration(&request.text, 1.0, MAX_DURATION_SECS);
        let num_samples = (DEFAULT_SAMPLE_RATE as f32 * duration) as usize;

        tracing::warn!(
            num_samples,
            "placeholder backend in use, output is silent audio"
        );

        encode_wav(&vec![0.0; num_samples], DEFAULT_SAMPLE_RATE)
    }
}
