//! Ordered backend tiers with graceful degradation.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::BackendsConfig;

use super::types::{BackendError, SynthesizeRequest};
use super::{Backend, HttpBackend, PlaceholderBackend, StandaloneBackend};

/// Model requested by the client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Model {
    /// Lightweight in-process synthesis.
    #[default]
    Simple,

    /// Full voice-cloning model on the model server.
    #[serde(alias = "csm")]
    Primary,
}

impl Model {
    pub fn as_str(&self) -> &'static str {
        match self {
            Model::Simple => "simple",
            Model::Primary => "primary",
        }
    }

    /// Human-readable model name.
    pub fn name(&self) -> &'static str {
        match self {
            Model::Simple => "Simple voice cloner",
            Model::Primary => "CSM voice-cloning model",
        }
    }

    /// First tier tried for this model; later tiers are fallbacks.
    pub fn first_tier(&self) -> TierKind {
        match self {
            Model::Simple => TierKind::Standalone,
            Model::Primary => TierKind::Primary,
        }
    }
}

impl FromStr for Model {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "simple" => Ok(Model::Simple),
            "primary" | "csm" => Ok(Model::Primary),
            other => Err(format!("Unknown model '{other}', expected 'simple' or 'primary'")),
        }
    }
}

/// Position of a backend in the fallback order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TierKind {
    Primary,
    Standalone,
    Placeholder,
}

impl TierKind {
    pub const ALL: [TierKind; 3] = [TierKind::Primary, TierKind::Standalone, TierKind::Placeholder];

    pub fn as_str(&self) -> &'static str {
        match self {
            TierKind::Primary => "primary",
            TierKind::Standalone => "standalone",
            TierKind::Placeholder => "placeholder",
        }
    }
}

impl fmt::Display for TierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of offering a request to a single tier.
#[derive(Debug)]
pub enum TierOutcome {
    /// The tier produced audio.
    Produced(Vec<u8>),
    /// The tier cannot serve this request; the next one may.
    Skipped(String),
    /// The request itself is bad; no tier will accept it.
    Rejected(BackendError),
}

/// Errors from running the whole chain.
#[derive(Error, Debug)]
pub enum ChainError {
    #[error("{tier} backend rejected the request: {source}")]
    Rejected {
        tier: TierKind,
        #[source]
        source: BackendError,
    },

    #[error("All backend tiers failed: {last}")]
    Exhausted { last: String },

    #[error("No backend tier is enabled for this model")]
    NoTiers,
}

/// Audio produced by the chain and where it came from.
#[derive(Debug)]
pub struct Synthesis {
    pub audio: Vec<u8>,
    pub tier: TierKind,
    /// `"<tier>: <reason>"` for every tier passed over.
    pub skipped: Vec<String>,
}

/// Availability of one tier, for diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct TierStatus {
    pub tier: TierKind,
    pub enabled: bool,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

struct Tier {
    kind: TierKind,
    backend: Box<dyn Backend>,
    unavailable: Option<String>,
}

impl Tier {
    fn attempt(&self, request: &SynthesizeRequest) -> TierOutcome {
        if let Some(reason) = &self.unavailable {
            return TierOutcome::Skipped(format!("unavailable: {reason}"));
        }

        match self.backend.synthesize(request) {
            Ok(audio) => TierOutcome::Produced(audio),
            Err(err) if err.is_recoverable() => TierOutcome::Skipped(err.to_string()),
            Err(err) => TierOutcome::Rejected(err),
        }
    }
}

/// Backend tiers in preference order.
pub struct SynthesisChain {
    tiers: Vec<Tier>,
}

impl SynthesisChain {
    /// Build a chain, checking each backend's availability once.
    pub fn new(backends: Vec<(TierKind, Box<dyn Backend>)>) -> Self {
        let mut tiers: Vec<Tier> = backends
            .into_iter()
            .map(|(kind, backend)| {
                let unavailable = match backend.health() {
                    Ok(health) => {
                        tracing::info!(tier = %kind, model = %health.model, device = %health.device, "backend tier available");
                        None
                    }
                    Err(err) => {
                        tracing::warn!(tier = %kind, error = %err, "backend tier unavailable");
                        Some(err.to_string())
                    }
                };
                Tier {
                    kind,
                    backend,
                    unavailable,
                }
            })
            .collect();

        tiers.sort_by_key(|tier| tier.kind);
        Self { tiers }
    }

    /// Build the chain described by configuration.
    ///
    /// Performs blocking I/O (primary health check); call it from a blocking
    /// context.
    pub fn from_config(config: &BackendsConfig) -> Self {
        let mut backends: Vec<(TierKind, Box<dyn Backend>)> = Vec::new();

        if config.primary.enabled {
            let timeout = Duration::from_secs(config.primary.timeout_secs);
            let health_timeout = Duration::from_secs(config.primary.health_timeout_secs);
            match HttpBackend::with_timeouts(&config.primary.url, timeout, health_timeout) {
                Ok(backend) => backends.push((TierKind::Primary, Box::new(backend))),
                Err(err) => {
                    tracing::warn!(url = %config.primary.url, error = %err, "primary backend could not be created");
                }
            }
        }
        if config.standalone.enabled {
            backends.push((TierKind::Standalone, Box::new(StandaloneBackend::new())));
        }
        if config.placeholder.enabled {
            backends.push((TierKind::Placeholder, Box::new(PlaceholderBackend::new())));
        }

        Self::new(backends)
    }

    /// Whether the given tier is configured and passed its start-up check.
    pub fn is_available(&self, kind: TierKind) -> bool {
        self.tiers
            .iter()
            .any(|tier| tier.kind == kind && tier.unavailable.is_none())
    }

    /// Availability report covering every tier kind.
    pub fn statuses(&self) -> Vec<TierStatus> {
        TierKind::ALL
            .iter()
            .map(|&kind| match self.tiers.iter().find(|tier| tier.kind == kind) {
                Some(tier) => TierStatus {
                    tier: kind,
                    enabled: true,
                    available: tier.unavailable.is_none(),
                    detail: tier.unavailable.clone(),
                },
                None => TierStatus {
                    tier: kind,
                    enabled: false,
                    available: false,
                    detail: Some("disabled".to_string()),
                },
            })
            .collect()
    }

    /// Try tiers in order, starting at the model's first tier.
    pub fn synthesize(
        &self,
        model: Model,
        request: &SynthesizeRequest,
    ) -> Result<Synthesis, ChainError> {
        let start = model.first_tier();
        let mut skipped = Vec::new();
        let mut last = None;

        for tier in self.tiers.iter().filter(|tier| tier.kind >= start) {
            match tier.attempt(request) {
                TierOutcome::Produced(audio) => {
                    tracing::debug!(tier = %tier.kind, bytes = audio.len(), "backend tier produced audio");
                    return Ok(Synthesis {
                        audio,
                        tier: tier.kind,
                        skipped,
                    });
                }
                TierOutcome::Skipped(reason) => {
                    tracing::warn!(tier = %tier.kind, %reason, "backend tier failed, trying next");
                    skipped.push(format!("{}: {reason}", tier.kind));
                    last = Some(reason);
                }
                TierOutcome::Rejected(source) => {
                    return Err(ChainError::Rejected {
                        tier: tier.kind,
                        source,
                    });
                }
            }
        }

        match last {
            Some(last) => Err(ChainError::Exhausted { last }),
            None => Err(ChainError::NoTiers),
        }
    }
}
