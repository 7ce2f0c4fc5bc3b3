//! In-process fallback synthesizer.
//!
//! Renders a tonal signal instead of speech: the fundamental is derived from
//! the text, harmonics from the speaker id, and the sample rate follows the
//! voice reference. Good enough to exercise the whole pipeline without a
//! model server.

use std::f32::consts::PI;
use std::path::Path;

use super::Backend;
use super::types::{
    BackendError, DEFAULT_SAMPLE_RATE, HealthResponse, SynthesizeRequest, encode_wav,
    estimate_duration,
};

const MAX_DURATION_SECS: f32 = 20.0;

/// Lightweight synthesizer with no external dependencies.
#[derive(Debug, Default, Clone)]
pub struct StandaloneBackend;

impl StandaloneBackend {
    pub fn new() -> Self {
        Self
    }

    fn reference_sample_rate(path: &Path) -> Result<u32, BackendError> {
        let reader = hound::WavReader::open(path)
            .map_err(|e| BackendError::InvalidVoice(format!("{}: {e}", path.display())))?;
        Ok(reader.spec().sample_rate)
    }

    fn render(text: &str, speaker_id: u32, sample_rate: u32) -> Vec<f32> {
        let duration = estimate_duration(text, 0.5, MAX_DURATION_SECS);
        let num_samples = (sample_rate as f32 * duration) as usize;

        let text_hash: u32 = text.chars().map(|c| c as u32).fold(0, u32::wrapping_add);
        let frequency = 220.0 + (text_hash % 440) as f32;
        let second = 0.3 * ((speaker_id % 3 + 1) as f32) / 4.0;
        let third = 0.2 * ((speaker_id % 5 + 1) as f32) / 6.0;

        let mut samples: Vec<f32> = (0..num_samples)
            .map(|i| {
                let t = i as f32 / sample_rate as f32;
                let mut value = 0.5 * (2.0 * PI * frequency * t).sin();
                if speaker_id > 0 {
                    value += second * (2.0 * PI * frequency * 2.0 * t).sin();
                    value += third * (2.0 * PI * frequency * 3.0 * t).sin();
                }
                value
            })
            .collect();

        let peak = samples.iter().fold(0.0_f32, |acc, s| acc.max(s.abs()));
        if peak > 0.0 {
            for sample in &mut samples {
                *sample /= peak;
            }
        }

        samples
    }
}

impl Backend for StandaloneBackend {
    fn health(&self) -> Result<HealthResponse, BackendError> {
        Ok(HealthResponse::local("standalone"))
    }

    fn synthesize(&self, request: &SynthesizeRequest) -> Result<Vec<u8>, BackendError> {
        request.check_text()?;

        let sample_rate = match &request.voice_path {
            Some(path) => Self::reference_sample_rate(path)?,
            None => DEFAULT_SAMPLE_RATE,
        };

        tracing::debug!(
            speaker_id = request.speaker_id,
            sample_rate,
            device = request.device.as_str(),
            "rendering standalone audio"
        );

        let samples = Self::render(&request.text, request.speaker_id, sample_rate);
        encode_wav(&samples, sample_rate)
    }
}
