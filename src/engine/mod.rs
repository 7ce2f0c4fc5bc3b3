//! Generation engine: device resolution, task records and the background
//! task manager that ties the voice catalog to the synthesis chain.

mod device;
mod manager;
mod store;
mod task;

pub use device::{
    Device, DeviceError, DevicePreference, DeviceResolution, DeviceResolver, GpuInfo, GpuProbe,
    NoGpu, NvidiaSmiProbe, parse_nvidia_smi,
};
#[cfg(test)]
pub use device::MockGpuProbe;
pub use manager::{
    AUDIO_ROUTE, DEFAULT_SHORT_TEXT_CPU_THRESHOLD, Diagnostics, GenerateError, GeneratedAudio,
    GenerationRequest, GpuStatus, ModelInfo, PathChecks, TaskManager, VoiceCounts,
};
pub use store::{TaskHandle, TaskStore};
pub use task::{Task, TaskErrorKind, TaskStatus};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{
        Backend, BackendError, HealthResponse, MockBackend, Model, PlaceholderBackend,
        StandaloneBackend, SynthesisChain, SynthesizeRequest, TierKind, encode_wav,
    };
    use crate::test_support::write_wav;
    use crate::voice::{VoiceCatalog, VoiceError};
    use std::sync::{Arc, Condvar, Mutex};
    use std::time::Duration;
    use tempfile::TempDir;

    fn tier(kind: TierKind, backend: impl Backend + 'static) -> (TierKind, Box<dyn Backend>) {
        (kind, Box::new(backend))
    }

    fn gpu() -> GpuInfo {
        GpuInfo {
            name: "NVIDIA GeForce RTX 4090".to_string(),
            total_memory_mb: 24564,
            free_memory_mb: 20000,
        }
    }

    fn no_gpu_resolver() -> DeviceResolver {
        DeviceResolver::new(Arc::new(NoGpu))
    }

    fn local_chain() -> SynthesisChain {
        SynthesisChain::new(vec![
            tier(TierKind::Standalone, StandaloneBackend::new()),
            tier(TierKind::Placeholder, PlaceholderBackend::new()),
        ])
    }

    struct Fixture {
        _temp_dir: TempDir,
        output_dir: std::path::PathBuf,
        catalog: VoiceCatalog,
    }

    fn fixture() -> Fixture {
        let temp_dir = TempDir::new().unwrap();
        let input_dir = temp_dir.path().join("input");
        std::fs::create_dir_all(&input_dir).unwrap();
        write_wav(&input_dir.join("speaker_1_temp_0.9_topk_50_calm.wav"), 24_000);

        Fixture {
            output_dir: temp_dir.path().join("output"),
            catalog: VoiceCatalog::load(&input_dir).unwrap(),
            _temp_dir: temp_dir,
        }
    }

    fn manager_with(
        fixture: &Fixture,
        resolver: DeviceResolver,
        chain: SynthesisChain,
    ) -> TaskManager {
        TaskManager::new(
            fixture.catalog.clone(),
            resolver,
            chain,
            fixture.output_dir.clone(),
        )
    }

    async fn wait_for_terminal(manager: &TaskManager, id: &str) -> Task {
        for _ in 0..500 {
            let task = manager.status(id).unwrap();
            if task.status.is_terminal() {
                return task;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("task {id} did not finish");
    }

    const VOICE: &str = "input/speaker_1_temp_0.9_topk_50_calm.wav";

    // ===========================================
    // Task state machine
    // ===========================================

    #[test]
    fn test_new_task_is_pending() {
        let task = Task::new("abc", 12);

        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.progress, 0);
        assert!(task.output.is_none());
        assert!(task.error.is_none());
        assert_eq!(task.text_length, 12);
    }

    #[test]
    fn test_start_only_from_pending() {
        let mut task = Task::new("abc", 5);

        assert!(task.start());
        assert_eq!(task.status, TaskStatus::Running);
        assert!(!task.start());
    }

    #[test]
    fn test_progress_never_decreases() {
        let mut task = Task::new("abc", 5);
        task.start();

        task.advance(30);
        task.advance(20);
        assert_eq!(task.progress, 30);

        task.advance(250);
        assert_eq!(task.progress, 100);
    }

    #[test]
    fn test_complete_sets_output_and_backend() {
        let mut task = Task::new("abc", 5);
        task.start();
        task.advance(30);

        assert!(task.complete("/audio/a.wav".to_string(), TierKind::Standalone));

        assert_eq!(task.status, TaskStatus::Complete);
        assert_eq!(task.progress, 100);
        assert_eq!(task.output.as_deref(), Some("/audio/a.wav"));
        assert_eq!(task.backend, Some(TierKind::Standalone));
        assert!(task.generation_time_ms.is_some());
        assert!(task.error.is_none());
    }

    #[test]
    fn test_fail_keeps_progress() {
        let mut task = Task::new("abc", 5);
        task.start();
        task.advance(20);

        assert!(task.fail(TaskErrorKind::Backend, "boom"));

        assert_eq!(task.status, TaskStatus::Error);
        assert_eq!(task.progress, 20);
        assert_eq!(task.error.as_deref(), Some("boom"));
        assert_eq!(task.error_kind, Some(TaskErrorKind::Backend));
        assert!(task.output.is_none());
    }

    #[test]
    fn test_generation_time_excludes_queueing() {
        let mut task = Task::new("abc", 5);
        task.created_at -= chrono::Duration::seconds(60);
        assert!(task.started_at.is_none());

        task.start();
        assert!(task.started_at.is_some());
        task.complete("/audio/a.wav".to_string(), TierKind::Standalone);

        assert!(task.generation_time_ms.unwrap() < 30_000);
    }

    #[test]
    fn test_terminal_tasks_do_not_transition() {
        let mut task = Task::new("abc", 5);
        task.start();
        task.complete("/audio/a.wav".to_string(), TierKind::Placeholder);
        let done = task.clone();

        assert!(!task.fail(TaskErrorKind::Internal, "late"));
        assert!(!task.complete("/audio/b.wav".to_string(), TierKind::Primary));
        task.advance(10);
        task.set_device(Device::Cuda, None);

        assert_eq!(task, done);
    }

    #[test]
    fn test_task_json_omits_unset_fields() {
        let task = Task::new("abc", 5);
        let json = serde_json::to_value(&task).unwrap();

        assert_eq!(json["status"], "pending");
        assert_eq!(json["progress"], 0);
        assert!(json.get("output").is_none());
        assert!(json.get("error").is_none());
    }

    // ===========================================
    // TaskStore
    // ===========================================

    #[test]
    fn test_store_insert_and_get() {
        let store = TaskStore::new();
        let handle = store.insert(Task::new("abc", 5));

        handle.update(|task| {
            task.start();
            task.advance(10);
        });

        let snapshot = store.get("abc").unwrap();
        assert_eq!(snapshot.status, TaskStatus::Running);
        assert_eq!(snapshot.progress, 10);
        assert_eq!(handle.id(), "abc");
        assert!(store.get("missing").is_none());
    }

    #[test]
    fn test_store_counts_by_status() {
        let store = TaskStore::new();
        store.insert(Task::new("a", 1));
        store.insert(Task::new("b", 1)).update(Task::start);

        let counts = store.count_by_status();
        assert_eq!(store.len(), 2);
        assert_eq!(counts.get(&TaskStatus::Pending), Some(&1));
        assert_eq!(counts.get(&TaskStatus::Running), Some(&1));
    }

    // ===========================================
    // Device resolution
    // ===========================================

    #[test]
    fn test_cpu_never_probes() {
        let mut probe = MockGpuProbe::new();
        probe.expect_probe().times(0);
        let resolver = DeviceResolver::new(Arc::new(probe));

        let resolution = resolver.resolve(DevicePreference::Cpu).unwrap();

        assert_eq!(resolution.device, Device::Cpu);
        assert!(resolution.fallback_reason.is_none());
    }

    #[test]
    fn test_cuda_with_gpu() {
        let mut probe = MockGpuProbe::new();
        probe.expect_probe().times(1).returning(|| Ok(gpu()));
        let resolver = DeviceResolver::new(Arc::new(probe));

        let resolution = resolver.resolve(DevicePreference::Cuda).unwrap();
        assert_eq!(resolution.device, Device::Cuda);
    }

    #[test]
    fn test_cuda_without_gpu_is_error() {
        let mut probe = MockGpuProbe::new();
        probe
            .expect_probe()
            .times(1)
            .returning(|| Err(DeviceError::NoGpu("nvidia-smi not found".to_string())));
        let resolver = DeviceResolver::new(Arc::new(probe));

        let result = resolver.resolve(DevicePreference::Cuda);
        assert!(matches!(result, Err(DeviceError::NoGpu(_))));
    }

    #[test]
    fn test_auto_falls_back_to_cpu() {
        let mut probe = MockGpuProbe::new();
        probe.expect_probe().times(1).returning(|| {
            Err(DeviceError::InsufficientMemory {
                free_mb: 512,
                required_mb: 2000,
            })
        });
        let resolver = DeviceResolver::new(Arc::new(probe));

        let resolution = resolver.resolve(DevicePreference::Auto).unwrap();

        assert_eq!(resolution.device, Device::Cpu);
        assert!(resolution.fallback_reason.unwrap().contains("512 MB free"));
    }

    #[test]
    fn test_auto_prefers_gpu() {
        let mut probe = MockGpuProbe::new();
        probe.expect_probe().times(1).returning(|| Ok(gpu()));
        let resolver = DeviceResolver::new(Arc::new(probe));

        let resolution = resolver.resolve(DevicePreference::Auto).unwrap();
        assert_eq!(resolution.device, Device::Cuda);
    }

    #[test]
    fn test_device_preference_from_str() {
        assert_eq!("auto".parse(), Ok(DevicePreference::Auto));
        assert_eq!("CUDA".parse(), Ok(DevicePreference::Cuda));
        assert_eq!("gpu".parse(), Ok(DevicePreference::Cuda));
        assert_eq!("cpu".parse(), Ok(DevicePreference::Cpu));
        assert!("tpu".parse::<DevicePreference>().is_err());
    }

    #[test]
    fn test_parse_nvidia_smi() {
        let info = parse_nvidia_smi("NVIDIA GeForce RTX 3060, 12288, 2048\n").unwrap();

        assert_eq!(info.name, "NVIDIA GeForce RTX 3060");
        assert_eq!(info.total_memory_mb, 12288);
        assert_eq!(info.free_memory_mb, 10240);
    }

    #[test]
    fn test_parse_nvidia_smi_bad_output() {
        assert!(matches!(parse_nvidia_smi(""), Err(DeviceError::NoGpu(_))));
        assert!(matches!(
            parse_nvidia_smi("No devices were found, really"),
            Err(DeviceError::ProbeFailed(_))
        ));
        assert!(matches!(
            parse_nvidia_smi("GPU, lots, some"),
            Err(DeviceError::ProbeFailed(_))
        ));
    }

    // ===========================================
    // TaskManager
    // ===========================================

    #[tokio::test]
    async fn test_generate_completes() {
        let fixture = fixture();
        let manager = manager_with(&fixture, no_gpu_resolver(), local_chain());

        let id = manager
            .submit(GenerationRequest::new("Hello world.", VOICE))
            .unwrap();
        let task = wait_for_terminal(&manager, &id).await;

        assert_eq!(task.status, TaskStatus::Complete);
        assert_eq!(task.progress, 100);
        assert_eq!(task.device, Some(Device::Cpu));
        assert!(task.device_fallback.is_some());
        assert_eq!(task.backend, Some(TierKind::Standalone));
        assert!(task.error.is_none());

        let output = task.output.unwrap();
        assert!(output.starts_with("/audio/generated_"));
        let file_name = output.trim_start_matches("/audio/");
        assert!(file_name.ends_with(&format!("{}.wav", &id[..8])));
        assert!(fixture.output_dir.join(file_name).exists());
    }

    #[tokio::test]
    async fn test_generate_accepts_voice_stem() {
        let fixture = fixture();
        let manager = manager_with(&fixture, no_gpu_resolver(), local_chain());

        let id = manager
            .submit(GenerationRequest::new(
                "Hello world.",
                "speaker_1_temp_0.9_topk_50_calm",
            ))
            .unwrap();

        let task = wait_for_terminal(&manager, &id).await;
        assert_eq!(task.status, TaskStatus::Complete);
    }

    #[tokio::test]
    async fn test_unknown_voice_creates_no_task() {
        let fixture = fixture();
        let manager = manager_with(&fixture, no_gpu_resolver(), local_chain());

        let result = manager.submit(GenerationRequest::new("Hello world.", "/does/not/exist.wav"));

        assert!(matches!(
            result,
            Err(GenerateError::Voice(VoiceError::NotFound(_)))
        ));
        assert_eq!(manager.task_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_text_creates_no_task() {
        let fixture = fixture();
        let manager = manager_with(&fixture, no_gpu_resolver(), local_chain());

        let result = manager.submit(GenerationRequest::new("   ", VOICE));

        assert!(matches!(result, Err(GenerateError::EmptyText)));
        assert_eq!(manager.task_count(), 0);
    }

    #[tokio::test]
    async fn test_cuda_without_gpu_fails_task() {
        let fixture = fixture();
        let mut backend = MockBackend::new();
        backend
            .expect_health()
            .returning(|| Ok(HealthResponse::local("mock")));
        backend.expect_synthesize().times(0);
        let chain = SynthesisChain::new(vec![tier(TierKind::Standalone, backend)]);
        let manager = manager_with(&fixture, no_gpu_resolver(), chain);

        let id = manager
            .submit(
                GenerationRequest::new("Hello world.", VOICE).with_device(DevicePreference::Cuda),
            )
            .unwrap();
        let task = wait_for_terminal(&manager, &id).await;

        assert_eq!(task.status, TaskStatus::Error);
        assert_eq!(task.error_kind, Some(TaskErrorKind::DeviceUnavailable));
        assert!(task.error.unwrap().starts_with("Device unavailable"));
        assert!(task.output.is_none());
        assert_eq!(task.progress, 10);
    }

    #[tokio::test]
    async fn test_short_text_uses_cpu_without_probe() {
        let fixture = fixture();
        let mut probe = MockGpuProbe::new();
        probe.expect_probe().times(0);
        let resolver = DeviceResolver::new(Arc::new(probe));
        let manager = manager_with(&fixture, resolver, local_chain());

        let id = manager.submit(GenerationRequest::new("Hi!", VOICE)).unwrap();
        let task = wait_for_terminal(&manager, &id).await;

        assert_eq!(task.status, TaskStatus::Complete);
        assert_eq!(task.device, Some(Device::Cpu));
        assert!(task.device_fallback.is_none());
    }

    #[tokio::test]
    async fn test_resolved_device_reaches_backend() {
        let fixture = fixture();
        let mut probe = MockGpuProbe::new();
        probe.expect_probe().returning(|| Ok(gpu()));
        let mut backend = MockBackend::new();
        backend
            .expect_health()
            .returning(|| Ok(HealthResponse::local("mock")));
        backend
            .expect_synthesize()
            .withf(|request: &SynthesizeRequest| {
                request.device == Device::Cuda
                    && request.speaker_id == 1
                    && request.voice_path.is_some()
            })
            .times(1)
            .returning(|_| encode_wav(&[0.0; 64], 24_000));
        let chain = SynthesisChain::new(vec![tier(TierKind::Primary, backend)]);
        let manager = manager_with(&fixture, DeviceResolver::new(Arc::new(probe)), chain);

        let id = manager
            .submit(GenerationRequest::new("Hello world.", VOICE).with_model(Model::Primary))
            .unwrap();
        let task = wait_for_terminal(&manager, &id).await;

        assert_eq!(task.status, TaskStatus::Complete);
        assert_eq!(task.device, Some(Device::Cuda));
        assert_eq!(task.backend, Some(TierKind::Primary));
    }

    #[tokio::test]
    async fn test_primary_unavailable_falls_through() {
        let fixture = fixture();
        let mut primary = MockBackend::new();
        primary.expect_health().returning(|| {
            Err(BackendError::ConnectionFailed(
                "Connection refused".to_string(),
            ))
        });
        primary.expect_synthesize().times(0);
        let chain = SynthesisChain::new(vec![
            tier(TierKind::Primary, primary),
            tier(TierKind::Standalone, StandaloneBackend::new()),
            tier(TierKind::Placeholder, PlaceholderBackend::new()),
        ]);
        let manager = manager_with(&fixture, no_gpu_resolver(), chain);

        let id = manager
            .submit(GenerationRequest::new("Hello world.", VOICE).with_model(Model::Primary))
            .unwrap();
        let task = wait_for_terminal(&manager, &id).await;

        assert_eq!(task.status, TaskStatus::Complete);
        assert_eq!(task.backend, Some(TierKind::Standalone));
    }

    #[tokio::test]
    async fn test_rejected_input_fails_task() {
        let fixture = fixture();
        let manager = manager_with(&fixture, no_gpu_resolver(), local_chain());

        let id = manager
            .submit(GenerationRequest::new("... !!!", VOICE))
            .unwrap();
        let task = wait_for_terminal(&manager, &id).await;

        assert_eq!(task.status, TaskStatus::Error);
        assert_eq!(task.error_kind, Some(TaskErrorKind::Backend));
        assert_eq!(task.progress, 30);
        assert!(task.output.is_none());
    }

    #[tokio::test]
    async fn test_exhausted_chain_fails_task() {
        let fixture = fixture();
        let mut primary = MockBackend::new();
        primary
            .expect_health()
            .returning(|| Ok(HealthResponse::local("mock")));
        primary.expect_synthesize().times(1).returning(|_| {
            Err(BackendError::ConnectionFailed(
                "Connection reset".to_string(),
            ))
        });
        let mut standalone = MockBackend::new();
        standalone
            .expect_health()
            .returning(|| Ok(HealthResponse::local("mock")));
        standalone
            .expect_synthesize()
            .times(1)
            .returning(|_| Err(BackendError::LoadFailed("weights missing".to_string())));
        let chain = SynthesisChain::new(vec![
            tier(TierKind::Primary, primary),
            tier(TierKind::Standalone, standalone),
        ]);
        let manager = manager_with(&fixture, no_gpu_resolver(), chain);

        let id = manager
            .submit(GenerationRequest::new("Hello world.", VOICE).with_model(Model::Primary))
            .unwrap();
        let task = wait_for_terminal(&manager, &id).await;

        assert_eq!(task.status, TaskStatus::Error);
        assert_eq!(task.error_kind, Some(TaskErrorKind::Backend));
        assert!(task.error.unwrap().contains("weights missing"));
        assert_eq!(task.progress, 30);
        assert!(task.output.is_none());
    }

    #[tokio::test]
    async fn test_unwritable_output_is_storage_error() {
        let fixture = fixture();
        std::fs::write(&fixture.output_dir, "not a directory").unwrap();
        let manager = manager_with(&fixture, no_gpu_resolver(), local_chain());

        let id = manager
            .submit(GenerationRequest::new("Hello world.", VOICE))
            .unwrap();
        let task = wait_for_terminal(&manager, &id).await;

        assert_eq!(task.status, TaskStatus::Error);
        assert_eq!(task.error_kind, Some(TaskErrorKind::Storage));
        assert!(task.error.unwrap().starts_with("Failed to save audio"));
        assert_eq!(task.progress, 90);
    }

    #[tokio::test]
    async fn test_worker_panic_marks_internal_error() {
        let fixture = fixture();
        let mut backend = MockBackend::new();
        backend
            .expect_health()
            .returning(|| Ok(HealthResponse::local("mock")));
        backend
            .expect_synthesize()
            .returning(|_| panic!("model crashed"));
        let chain = SynthesisChain::new(vec![tier(TierKind::Standalone, backend)]);
        let manager = manager_with(&fixture, no_gpu_resolver(), chain);

        let id = manager
            .submit(GenerationRequest::new("Hello world.", VOICE))
            .unwrap();
        let task = wait_for_terminal(&manager, &id).await;

        assert_eq!(task.status, TaskStatus::Error);
        assert_eq!(task.error_kind, Some(TaskErrorKind::Internal));
    }

    #[tokio::test]
    async fn test_progress_is_monotonic_across_reads() {
        let fixture = fixture();
        let manager = manager_with(&fixture, no_gpu_resolver(), local_chain());

        let id = manager
            .submit(GenerationRequest::new(
                "A somewhat longer sentence for the generator.",
                VOICE,
            ))
            .unwrap();

        let mut last = 0;
        loop {
            let task = manager.status(&id).unwrap();
            assert!(task.progress >= last);
            last = task.progress;
            if task.status.is_terminal() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        assert_eq!(last, 100);
    }

    /// Backend that blocks until the test opens the gate.
    struct GatedBackend {
        gate: Arc<(Mutex<bool>, Condvar)>,
    }

    impl Backend for GatedBackend {
        fn health(&self) -> Result<HealthResponse, BackendError> {
            Ok(HealthResponse::local("gated"))
        }

        fn synthesize(&self, _request: &SynthesizeRequest) -> Result<Vec<u8>, BackendError> {
            let (open, signal) = &*self.gate;
            let mut open = open.lock().unwrap();
            while !*open {
                open = signal.wait(open).unwrap();
            }
            encode_wav(&[0.0; 64], 24_000)
        }
    }

    #[tokio::test]
    async fn test_max_concurrent_queues_tasks() {
        let fixture = fixture();
        let gate = Arc::new((Mutex::new(false), Condvar::new()));
        let chain = SynthesisChain::new(vec![tier(
            TierKind::Standalone,
            GatedBackend {
                gate: Arc::clone(&gate),
            },
        )]);
        let manager =
            manager_with(&fixture, no_gpu_resolver(), chain).with_max_concurrent(1);

        let first = manager
            .submit(GenerationRequest::new("Hello world.", VOICE))
            .unwrap();
        let second = manager
            .submit(GenerationRequest::new("Hello again.", VOICE))
            .unwrap();

        for _ in 0..500 {
            if manager.status(&first).unwrap().progress >= 30 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(manager.status(&first).unwrap().status, TaskStatus::Running);
        assert_eq!(manager.status(&second).unwrap().status, TaskStatus::Pending);

        {
            let (open, signal) = &*gate;
            *open.lock().unwrap() = true;
            signal.notify_all();
        }

        assert_eq!(
            wait_for_terminal(&manager, &first).await.status,
            TaskStatus::Complete
        );
        assert_eq!(
            wait_for_terminal(&manager, &second).await.status,
            TaskStatus::Complete
        );
    }

    // ===========================================
    // Direct generation
    // ===========================================

    #[test]
    fn test_generate_to_file_writes_wav() {
        let fixture = fixture();
        let manager = manager_with(&fixture, no_gpu_resolver(), local_chain());
        let output = fixture.output_dir.join("nested").join("line.wav");

        let generated = manager
            .generate_to_file(&GenerationRequest::new("Hello world.", VOICE), Some(&output))
            .unwrap();

        assert_eq!(generated.path, output);
        assert_eq!(generated.tier, TierKind::Standalone);
        assert_eq!(generated.device, Device::Cpu);
        assert!(generated.fallback_reason.is_some());
        assert_eq!(std::fs::read(&output).unwrap().len(), generated.bytes);
        assert_eq!(manager.task_count(), 0);
    }

    #[test]
    fn test_generate_to_file_defaults_to_output_dir() {
        let fixture = fixture();
        let manager = manager_with(&fixture, no_gpu_resolver(), local_chain());

        let generated = manager
            .generate_to_file(&GenerationRequest::new("Hello world.", VOICE), None)
            .unwrap();

        assert!(generated.path.starts_with(&fixture.output_dir));
        assert!(generated.path.exists());
    }

    #[test]
    fn test_generate_to_file_pinned_cuda_without_gpu() {
        let fixture = fixture();
        let manager = manager_with(&fixture, no_gpu_resolver(), local_chain());

        let result = manager.generate_to_file(
            &GenerationRequest::new("Hello world.", VOICE).with_device(DevicePreference::Cuda),
            None,
        );

        assert!(matches!(result, Err(GenerateError::Device(_))));
        assert!(!result.unwrap_err().is_validation());
    }

    #[test]
    fn test_generate_to_file_unknown_voice() {
        let fixture = fixture();
        let manager = manager_with(&fixture, no_gpu_resolver(), local_chain());

        let result = manager.generate_to_file(&GenerationRequest::new("Hello", "ghost"), None);

        assert!(result.unwrap_err().is_validation());
    }

    #[tokio::test]
    async fn test_models_report_availability() {
        let fixture = fixture();
        let manager = manager_with(&fixture, no_gpu_resolver(), local_chain());

        let models = manager.models();

        assert_eq!(models[0].id, Model::Simple);
        assert!(models[0].available);
        assert_eq!(models[1].id, Model::Primary);
        assert!(!models[1].available);
    }

    #[tokio::test]
    async fn test_diagnostics_report() {
        let fixture = fixture();
        let manager = manager_with(&fixture, no_gpu_resolver(), local_chain());
        let id = manager
            .submit(GenerationRequest::new("Hello world.", VOICE))
            .unwrap();
        wait_for_terminal(&manager, &id).await;

        let report = manager.diagnostics();

        assert!(!report.gpu.available);
        assert!(report.gpu.reason.is_some());
        assert_eq!(report.voices.catalog, 1);
        assert_eq!(report.voices.input_files, 1);
        assert_eq!(report.voices.output_files, 1);
        assert!(report.paths.input_dir_exists);
        assert!(report.paths.output_dir_exists);
        assert_eq!(report.tasks.get("complete"), Some(&1));
        assert_eq!(report.backends.len(), 3);
        assert!(!report.backends[0].enabled);
    }
}
