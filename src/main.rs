//! SiteRisk - LLM-powered construction site risk analyzer
//!
//! A CLI tool that analyzes construction-site camera images for safety
//! risks using Ollama: per-image risk descriptions, regulatory checks,
//! bounding-box annotated images, and a Markdown report combining camera
//! findings with weather data.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (connection, config, metadata failure, etc.)

mod camera;
mod cli;
mod config;
mod llm;
mod models;
mod orchestrator;
mod report;
mod weather;

use anyhow::{bail, Context, Result};
use camera::{AnalyzerSettings, CameraAnalyzer};
use cli::Args;
use config::Config;
use llm::{ModelSettings, OllamaClient, TextModel};
use models::CameraConfig;
use report::ReportInputs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args);

    info!("SiteRisk v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    // Run the pipeline
    match run_pipeline(args).await {
        Ok(message) => {
            println!("\n✅ {}", message);
            Ok(())
        }
        Err(e) => {
            error!("Analysis failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .siterisk.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(".siterisk.toml");

    if path.exists() {
        eprintln!("⚠️  .siterisk.toml already exists. Remove it first or edit it manually.");
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).context("Failed to write .siterisk.toml")?;

    println!("✅ Created .siterisk.toml with default settings.");
    println!("   Edit it to customize model, cameras, weather, and output paths.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Run the complete analysis pipeline. Returns the success message.
async fn run_pipeline(args: Args) -> Result<String> {
    // Load configuration
    let mut config = load_config(&args)?;
    let quiet = args.quiet;
    config.merge_with_args(&args);

    // Step 1: Load the camera list (fatal on failure)
    let cameras_file = PathBuf::from(&config.general.cameras_file);
    let cameras = models::load_cameras(&cameras_file)?;
    if cameras.is_empty() {
        bail!("No cameras configured in {}", cameras_file.display());
    }
    info!("Loaded {} cameras from {}", cameras.len(), cameras_file.display());

    // Handle --dry-run: list cameras and images, no model calls
    if args.dry_run {
        return handle_dry_run(&cameras);
    }

    // Step 2: Summarize the weather (hour lookup failures are fatal)
    println!("🌤️  Summarizing weather conditions...");
    let weather_summary = weather::summarize_weather(
        Path::new(&config.weather.file),
        &config.weather.location_id,
        config.weather.hour.as_deref(),
    )?;

    // Step 3: Initialize the model backend
    println!("🤖 Initializing model backend...");
    println!("   Model: {}", config.model.name);
    println!("   Ollama: {}", config.model.ollama_url);
    if config.model.multimodal {
        println!("   Mode: multimodal (images sent with risk calls)");
    }
    println!("   Timeout: {}s", config.model.timeout_seconds);

    let model: Arc<dyn TextModel> = Arc::new(OllamaClient::new(ModelSettings {
        ollama_url: config.model.ollama_url.clone(),
        model_name: config.model.name.clone(),
        temperature: config.model.temperature,
        timeout_seconds: config.model.timeout_seconds,
    })?);

    // Step 4: Analyze all cameras concurrently
    println!("\n🔬 Analyzing {} camera(s)...\n", cameras.len());

    let analyzer = Arc::new(CameraAnalyzer::new(
        Arc::clone(&model),
        AnalyzerSettings {
            annotated_dir: PathBuf::from(&config.report.annotated_dir),
            concurrency: config.general.concurrency,
            multimodal: config.model.multimodal,
            show_progress: !quiet,
        },
    ));

    let outcomes = orchestrator::analyze_cameras(analyzer, &cameras).await;

    for (name, outcome) in &outcomes {
        if outcome.is_error() {
            warn!("Camera {} degraded to placeholder", name);
        }
    }

    // Step 5: Synthesize and write the report
    println!("\n📝 Generating report...");

    // The first configured camera is the primary (middle) one; the
    // second, when present, is the entry camera.
    let middle_name = &cameras[0].name;
    let entry_name = cameras.get(1).map(|c| c.name.as_str());

    let middle_summary = outcomes
        .get(middle_name)
        .map(models::CameraOutcome::text)
        .unwrap_or_default();
    let entry_summary = entry_name
        .and_then(|name| outcomes.get(name))
        .map(models::CameraOutcome::text);

    let inputs = ReportInputs {
        middle_camera_summary: middle_summary,
        entry_camera_summary: entry_summary,
        weather_summary: &weather_summary,
        cameras: &outcomes,
    };

    report::generate_final_report(
        model.as_ref(),
        &inputs,
        Path::new(&config.report.annotated_dir),
        Path::new(&config.report.output),
    )
    .await
}

/// Handle --dry-run: list cameras, image counts, and metadata presence.
fn handle_dry_run(cameras: &[CameraConfig]) -> Result<String> {
    println!("\n🔍 Dry run: listing cameras (no model call)...\n");

    for camera in cameras {
        let image_count = std::fs::read_dir(&camera.image_dir)
            .map(|entries| {
                entries
                    .flatten()
                    .filter(|e| {
                        e.file_name()
                            .to_string_lossy()
                            .to_lowercase()
                            .ends_with(".jpg")
                    })
                    .count()
            })
            .unwrap_or(0);
        let has_metadata = camera.detections_json.exists();

        println!(
            "   📷 {} — {} image(s), detections file {}",
            camera.name,
            image_count,
            if has_metadata { "present" } else { "MISSING" }
        );
    }

    Ok("Dry run complete. No model calls were made.".to_string())
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from .siterisk.toml");
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
