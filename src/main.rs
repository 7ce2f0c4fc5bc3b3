//! character-tts-rs server entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use character_tts_rs::backend::SynthesisChain;
use character_tts_rs::cli::Args;
use character_tts_rs::config::{self, Config};
use character_tts_rs::engine::{
    DeviceResolver, GenerationRequest, GpuProbe, NoGpu, NvidiaSmiProbe, TaskManager,
};
use character_tts_rs::server::{AppState, app};
use character_tts_rs::voice::VoiceCatalog;
use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = args.config_path();
    let mut config = config::load_config(Some(&config_path))
        .with_context(|| format!("Failed to load configuration from {}", config_path.display()))?;
    args.apply(&mut config);

    init_tracing(&config);
    match &config.source {
        Some(path) => tracing::info!(path = %path.display(), "loaded configuration"),
        None => {
            tracing::info!(path = %config_path.display(), "config file not found, using defaults")
        }
    }

    let catalog = VoiceCatalog::load(&config.paths.voices_dir).with_context(|| {
        format!(
            "Failed to load voices from {}",
            config.paths.voices_dir.display()
        )
    })?;

    if args.list_voices {
        list_voices(&catalog);
        return Ok(());
    }

    std::fs::create_dir_all(&config.paths.output_dir).with_context(|| {
        format!(
            "Failed to create output directory: {}",
            config.paths.output_dir.display()
        )
    })?;

    let backends = config.backends.clone();
    let chain = tokio::task::spawn_blocking(move || SynthesisChain::from_config(&backends))
        .await
        .context("Failed to initialise synthesis backends")?;

    let probe: Arc<dyn GpuProbe> = if config.gpu.enabled {
        Arc::new(NvidiaSmiProbe::new(config.gpu.min_free_memory_mb))
    } else {
        Arc::new(NoGpu)
    };

    let manager = TaskManager::new(
        catalog,
        DeviceResolver::new(probe),
        chain,
        config.paths.output_dir.clone(),
    )
    .with_max_concurrent(config.tasks.max_concurrent)
    .with_short_text_threshold(config.tasks.short_text_cpu_threshold);

    if let Some(text) = args.generate.clone() {
        return generate_speech(manager, &args, text).await;
    }

    let addr = SocketAddr::new(config.server.host, config.server.port);
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    tracing::info!(
        %addr,
        voices = manager.voices().len(),
        max_concurrent = config.tasks.max_concurrent,
        "starting character-tts-rs server"
    );

    axum::serve(listener, app(AppState::new(manager)))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("character-tts-rs server shut down");
    Ok(())
}

fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));

    if config.logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn list_voices(catalog: &VoiceCatalog) {
    if catalog.is_empty() {
        println!("No voices found in {}", catalog.input_dir().display());
        return;
    }

    println!("Available voices:");
    for voice in catalog.list() {
        println!("  {} ({})", voice.character_name, voice.file_path);
        println!("    Role: {}", voice.character_role);
        println!(
            "    Speaker: {}  Style: {}  Gender: {}",
            voice.speaker_id, voice.style, voice.gender
        );
        println!(
            "    Temperature: {:.2}  Top-k: {}",
            voice.temperature, voice.topk
        );
    }
}

/// Run one synthesis from the command line and write the WAV file.
async fn generate_speech(manager: TaskManager, args: &Args, text: String) -> Result<()> {
    let voice = match &args.voice {
        Some(voice) => voice.clone(),
        None => manager
            .voices()
            .first()
            .map(|voice| voice.file_path.clone())
            .context("No voices available")?,
    };

    println!("Generating speech...");
    println!("  Text: {text}");
    println!("  Voice: {voice}");

    let request = GenerationRequest::new(text, voice)
        .with_device(args.device)
        .with_model(args.model);
    let output = args.output.clone();

    let audio = tokio::task::spawn_blocking(move || {
        manager.generate_to_file(&request, output.as_deref())
    })
    .await
    .context("Generation worker failed")?
    .context("Failed to generate speech")?;

    println!("Audio saved to: {}", audio.path.display());
    println!("  Size: {} bytes", audio.bytes);
    println!("  Backend: {}", audio.tier);
    println!("  Device: {}", audio.device);
    if let Some(reason) = &audio.fallback_reason {
        println!("  Fallback: {reason}");
    }

    Ok(())
}

/// Waits for a SIGINT (Ctrl+C) or SIGTERM signal for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { tracing::info!("received SIGINT, initiating graceful shutdown"); }
        () = terminate => { tracing::info!("received SIGTERM, initiating graceful shutdown"); }
    }
}
