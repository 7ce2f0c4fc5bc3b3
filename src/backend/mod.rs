//! Speech synthesis backends.
//!
//! Provides the [`Backend`] trait, its three implementations (primary model
//! server, in-process standalone synthesizer, silent placeholder) and the
//! [`SynthesisChain`] that tries them in order.

mod chain;
mod client;
mod placeholder;
mod standalone;
mod types;

pub use chain::{ChainError, Model, Synthesis, SynthesisChain, TierKind, TierOutcome, TierStatus};
pub use client::{HttpBackend, prepare_text};
pub use placeholder::PlaceholderBackend;
pub use standalone::StandaloneBackend;
pub use types::{
    BackendError, DEFAULT_SAMPLE_RATE, HealthResponse, SynthesizeRequest, encode_wav,
    estimate_duration,
};

/// Trait for a text-to-speech implementation.
///
/// Implementations are synchronous; the task manager runs them on the
/// blocking thread pool.
#[cfg_attr(test, mockall::automock)]
pub trait Backend: Send + Sync {
    /// Check whether the backend can serve requests.
    ///
    /// Called once when the chain is built.
    fn health(&self) -> Result<HealthResponse, BackendError>;

    /// Synthesize speech from text.
    ///
    /// # Returns
    /// Raw WAV audio data
    fn synthesize(&self, request: &SynthesizeRequest) -> Result<Vec<u8>, BackendError>;
}
