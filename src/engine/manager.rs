//! Asynchronous generation task manager.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::backend::{
    ChainError, Model, SynthesisChain, SynthesizeRequest, TierKind, TierStatus,
};
use crate::voice::{VoiceCatalog, VoiceError, VoiceReference};

use super::device::{Device, DeviceError, DevicePreference, DeviceResolver, GpuInfo};
use super::store::{TaskHandle, TaskStore};
use super::task::{Task, TaskErrorKind};

/// URL prefix under which generated files are served.
pub const AUDIO_ROUTE: &str = "/audio";

/// Texts shorter than this run on the CPU when the device is `auto`.
pub const DEFAULT_SHORT_TEXT_CPU_THRESHOLD: usize = 5;

/// Errors from validating or directly running a generation request.
///
/// [`TaskManager::submit`] only returns the validation variants; the rest
/// come from [`TaskManager::generate_to_file`].
#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("Text is required")]
    EmptyText,

    #[error(transparent)]
    Voice(#[from] VoiceError),

    #[error("Device unavailable: {0}")]
    Device(#[from] DeviceError),

    #[error(transparent)]
    Synthesis(#[from] ChainError),

    #[error("Failed to save audio: {0}")]
    Storage(#[from] std::io::Error),
}

impl GenerateError {
    /// Whether the request itself was invalid.
    pub fn is_validation(&self) -> bool {
        matches!(self, GenerateError::EmptyText | GenerateError::Voice(_))
    }
}

/// Result of a direct, in-process generation.
#[derive(Debug, Clone)]
pub struct GeneratedAudio {
    pub path: PathBuf,
    pub tier: TierKind,
    pub device: Device,
    pub fallback_reason: Option<String>,
    pub bytes: usize,
}

/// A validated-on-submit generation request.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub text: String,
    pub voice: String,
    pub device: DevicePreference,
    pub model: Model,
}

impl GenerationRequest {
    pub fn new(text: impl Into<String>, voice: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            voice: voice.into(),
            device: DevicePreference::Auto,
            model: Model::Simple,
        }
    }

    pub fn with_device(mut self, device: DevicePreference) -> Self {
        self.device = device;
        self
    }

    pub fn with_model(mut self, model: Model) -> Self {
        self.model = model;
        self
    }
}

/// Model availability as shown to clients.
#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub id: Model,
    pub name: &'static str,
    pub available: bool,
}

/// GPU section of the diagnostics report.
#[derive(Debug, Clone, Serialize)]
pub struct GpuStatus {
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<GpuInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Voice file counts.
#[derive(Debug, Clone, Serialize)]
pub struct VoiceCounts {
    pub catalog: usize,
    pub input_files: usize,
    pub output_files: usize,
}

/// Directory checks.
#[derive(Debug, Clone, Serialize)]
pub struct PathChecks {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub input_dir_exists: bool,
    pub output_dir_exists: bool,
}

/// Snapshot of service health for troubleshooting.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostics {
    pub gpu: GpuStatus,
    pub voices: VoiceCounts,
    pub paths: PathChecks,
    pub backends: Vec<TierStatus>,
    pub tasks: BTreeMap<&'static str, usize>,
}

fn count_wav_files(dir: &Path) -> usize {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "wav"))
                .count()
        })
        .unwrap_or(0)
}

/// Accepts generation requests and runs them in the background.
pub struct TaskManager {
    store: Arc<TaskStore>,
    catalog: Arc<VoiceCatalog>,
    resolver: DeviceResolver,
    chain: Arc<SynthesisChain>,
    output_dir: PathBuf,
    limiter: Option<Arc<Semaphore>>,
    short_text_cpu_threshold: usize,
}

impl TaskManager {
    /// Create a manager with unbounded concurrency.
    pub fn new(
        catalog: VoiceCatalog,
        resolver: DeviceResolver,
        chain: SynthesisChain,
        output_dir: PathBuf,
    ) -> Self {
        Self {
            store: Arc::new(TaskStore::new()),
            catalog: Arc::new(catalog),
            resolver,
            chain: Arc::new(chain),
            output_dir,
            limiter: None,
            short_text_cpu_threshold: DEFAULT_SHORT_TEXT_CPU_THRESHOLD,
        }
    }

    /// Run at most `limit` syntheses at once; others wait in `pending`.
    /// Zero means unbounded.
    pub fn with_max_concurrent(mut self, limit: usize) -> Self {
        self.limiter = (limit > 0).then(|| Arc::new(Semaphore::new(limit)));
        self
    }

    pub fn with_short_text_threshold(mut self, threshold: usize) -> Self {
        self.short_text_cpu_threshold = threshold;
        self
    }

    /// Validate a request, record a `pending` task and schedule it.
    ///
    /// Returns the task id without waiting for synthesis. Must be called
    /// from within a tokio runtime.
    pub fn submit(&self, request: GenerationRequest) -> Result<String, GenerateError> {
        let (text, voice, preference) = self.prepare(&request)?;

        let id = Uuid::new_v4().to_string();
        let handle = self.store.insert(Task::new(&id, text.chars().count()));

        tracing::info!(
            task_id = %id,
            voice = %voice.filename,
            device = ?preference,
            model = request.model.as_str(),
            "accepted generation request"
        );

        let job = GenerationJob {
            id: id.clone(),
            handle,
            text: text.to_string(),
            voice: voice.clone(),
            preference,
            model: request.model,
            resolver: self.resolver.clone(),
            chain: Arc::clone(&self.chain),
            output_dir: self.output_dir.clone(),
        };
        let limiter = self.limiter.clone();

        tokio::spawn(async move {
            let _permit = match limiter {
                Some(semaphore) => semaphore.acquire_owned().await.ok(),
                None => None,
            };
            job.execute().await;
        });

        Ok(id)
    }

    /// Run one request synchronously and write the audio to `output`, or to
    /// a timestamped file in the output directory. No task is recorded.
    ///
    /// Blocks for the whole synthesis; call it from a blocking context.
    pub fn generate_to_file(
        &self,
        request: &GenerationRequest,
        output: Option<&Path>,
    ) -> Result<GeneratedAudio, GenerateError> {
        let (text, voice, preference) = self.prepare(request)?;

        let resolution = self.resolver.resolve(preference)?;
        let prepared = synthesis_request(text, voice, resolution.device);
        let synthesis = self.chain.synthesize(request.model, &prepared)?;

        let path = match output {
            Some(path) => path.to_path_buf(),
            None => self.output_dir.join(format!(
                "generated_{}.wav",
                Utc::now().format("%Y%m%d_%H%M%S")
            )),
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, &synthesis.audio)?;

        tracing::info!(
            path = %path.display(),
            tier = %synthesis.tier,
            device = %resolution.device,
            "speech generated"
        );

        Ok(GeneratedAudio {
            path,
            tier: synthesis.tier,
            device: resolution.device,
            fallback_reason: resolution.fallback_reason,
            bytes: synthesis.audio.len(),
        })
    }

    /// Validate text and voice and pick the effective device preference.
    fn prepare<'a>(
        &self,
        request: &'a GenerationRequest,
    ) -> Result<(&'a str, &VoiceReference, DevicePreference), GenerateError> {
        let text = request.text.trim();
        if text.is_empty() {
            return Err(GenerateError::EmptyText);
        }
        let voice = self.catalog.validate(&request.voice)?;
        let preference = self.effective_preference(request.device, text);

        Ok((text, voice, preference))
    }

    fn effective_preference(&self, preference: DevicePreference, text: &str) -> DevicePreference {
        if preference == DevicePreference::Auto
            && text.chars().count() < self.short_text_cpu_threshold
        {
            tracing::debug!("short text, using CPU");
            return DevicePreference::Cpu;
        }
        preference
    }

    /// Current snapshot of a task.
    pub fn status(&self, id: &str) -> Option<Task> {
        self.store.get(id)
    }

    /// Number of tasks accepted so far.
    pub fn task_count(&self) -> usize {
        self.store.len()
    }

    pub fn voices(&self) -> &[VoiceReference] {
        self.catalog.list()
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Which models can currently be selected.
    pub fn models(&self) -> Vec<ModelInfo> {
        vec![
            ModelInfo {
                id: Model::Simple,
                name: Model::Simple.name(),
                available: self.chain.is_available(TierKind::Standalone)
                    || self.chain.is_available(TierKind::Placeholder),
            },
            ModelInfo {
                id: Model::Primary,
                name: Model::Primary.name(),
                available: self.chain.is_available(TierKind::Primary),
            },
        ]
    }

    /// Gather diagnostics. Runs the GPU probe, so call it from a blocking
    /// context.
    pub fn diagnostics(&self) -> Diagnostics {
        let gpu = match self.resolver.probe() {
            Ok(info) => GpuStatus {
                available: true,
                info: Some(info),
                reason: None,
            },
            Err(err) => GpuStatus {
                available: false,
                info: None,
                reason: Some(err.to_string()),
            },
        };

        let input_dir = self.catalog.input_dir().to_path_buf();
        let tasks = self
            .store
            .count_by_status()
            .into_iter()
            .map(|(status, count)| (status.as_str(), count))
            .collect();

        Diagnostics {
            gpu,
            voices: VoiceCounts {
                catalog: self.catalog.len(),
                input_files: count_wav_files(&input_dir),
                output_files: count_wav_files(&self.output_dir),
            },
            paths: PathChecks {
                input_dir_exists: input_dir.is_dir(),
                output_dir_exists: self.output_dir.is_dir(),
                input_dir,
                output_dir: self.output_dir.clone(),
            },
            backends: self.chain.statuses(),
            tasks,
        }
    }
}

fn synthesis_request(text: &str, voice: &VoiceReference, device: Device) -> SynthesizeRequest {
    SynthesizeRequest::new(text)
        .with_voice(voice.path.as_path())
        .with_speaker(voice.speaker_id)
        .with_sampling(voice.temperature, voice.topk)
        .with_device(device)
}

/// Everything one background execution needs.
struct GenerationJob {
    id: String,
    handle: TaskHandle,
    text: String,
    voice: VoiceReference,
    preference: DevicePreference,
    model: Model,
    resolver: DeviceResolver,
    chain: Arc<SynthesisChain>,
    output_dir: PathBuf,
}

impl GenerationJob {
    async fn execute(self) {
        let handle = self.handle.clone();
        let id = self.id.clone();

        if let Err(err) = tokio::task::spawn_blocking(move || self.run()).await {
            tracing::error!(task_id = %id, error = %err, "generation worker crashed");
            handle.update(|task| {
                task.fail(
                    TaskErrorKind::Internal,
                    format!("Generation worker crashed: {err}"),
                )
            });
        }
    }

    fn run(self) {
        if !self.handle.update(Task::start) {
            return;
        }
        self.handle.update(|task| task.advance(10));

        let resolution = match self.resolver.resolve(self.preference) {
            Ok(resolution) => resolution,
            Err(err) => {
                tracing::warn!(task_id = %self.id, error = %err, "requested device unavailable");
                self.handle.update(|task| {
                    task.fail(
                        TaskErrorKind::DeviceUnavailable,
                        format!("Device unavailable: {err}"),
                    )
                });
                return;
            }
        };

        self.handle.update(|task| {
            task.set_device(resolution.device, resolution.fallback_reason.clone());
            task.advance(20);
        });

        let request = synthesis_request(&self.text, &self.voice, resolution.device);

        self.handle.update(|task| task.advance(30));
        tracing::info!(task_id = %self.id, device = %resolution.device, model = self.model.as_str(), "generating speech");

        let synthesis = match self.chain.synthesize(self.model, &request) {
            Ok(synthesis) => synthesis,
            Err(err) => {
                tracing::error!(task_id = %self.id, error = %err, "speech generation failed");
                self.handle
                    .update(|task| task.fail(TaskErrorKind::Backend, err.to_string()));
                return;
            }
        };

        self.handle.update(|task| task.advance(90));

        match self.persist(&synthesis.audio) {
            Ok(file_name) => {
                tracing::info!(
                    task_id = %self.id,
                    tier = %synthesis.tier,
                    file = %file_name,
                    skipped = synthesis.skipped.len(),
                    "speech generated"
                );
                self.handle.update(|task| {
                    task.complete(format!("{AUDIO_ROUTE}/{file_name}"), synthesis.tier)
                });
            }
            Err(err) => {
                tracing::error!(task_id = %self.id, error = %err, "failed to save audio");
                self.handle.update(|task| {
                    task.fail(TaskErrorKind::Storage, format!("Failed to save audio: {err}"))
                });
            }
        }
    }

    fn persist(&self, audio: &[u8]) -> std::io::Result<String> {
        std::fs::create_dir_all(&self.output_dir)?;

        let short_id = self.id.split('-').next().unwrap_or(&self.id);
        let file_name = format!(
            "generated_{}_{short_id}.wav",
            Utc::now().format("%Y%m%d_%H%M%S")
        );
        std::fs::write(self.output_dir.join(&file_name), audio)?;

        Ok(file_name)
    }
}
