//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use std::path::PathBuf;

/// SiteRisk - LLM-powered construction site risk analyzer
///
/// Analyze construction-site camera images for safety risks using local
/// AI: per-image risk descriptions, regulatory compliance checks,
/// annotated images, and a Markdown report combining camera findings
/// with weather data.
///
/// Examples:
///   siterisk --cameras cameras.json --weather weather.json
///   siterisk --cameras cameras.json --weather weather.json --hour 2024-05-01T09:00
///   siterisk --cameras cameras.json --weather weather.json --multimodal --model llava:13b
///   siterisk --cameras cameras.json --dry-run
///   siterisk --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Path to the camera list JSON file
    ///
    /// A JSON array of objects {name, image_dir, detections_json}.
    /// Defaults to cameras.json or the config file setting.
    #[arg(short, long, value_name = "FILE")]
    pub cameras: Option<PathBuf>,

    /// Path to the weather/air-quality JSON file
    #[arg(short, long, value_name = "FILE")]
    pub weather: Option<PathBuf>,

    /// Hour to summarize weather for (ISO 8601, e.g. 2024-05-01T09:00)
    ///
    /// Must be present in the forecast time series. Uses the most recent
    /// available hour when omitted.
    #[arg(long, value_name = "HOUR")]
    pub hour: Option<String>,

    /// Location id keying the weather file
    #[arg(long, value_name = "ID")]
    pub location: Option<String>,

    /// Ollama model to use for analysis
    ///
    /// Can also be set via SITERISK_MODEL env var or .siterisk.toml config.
    /// Use a multimodal model (e.g. llava:13b) together with --multimodal.
    #[arg(short, long, default_value = "llama3:8b", env = "SITERISK_MODEL")]
    pub model: String,

    /// Ollama API endpoint URL
    #[arg(long, default_value = "http://localhost:11434", env = "OLLAMA_URL")]
    pub ollama_url: String,

    /// Temperature for LLM responses (0.0 - 1.0)
    ///
    /// Lower values produce more consistent/deterministic output
    #[arg(long, default_value = "0.2")]
    pub temperature: f32,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Send the images themselves (base64) with the risk calls
    ///
    /// Requires a multimodal model. Overrides the config file setting.
    #[arg(long)]
    pub multimodal: bool,

    /// Output file path for the report
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Root folder for annotated image copies
    #[arg(long, value_name = "DIR")]
    pub annotated_dir: Option<PathBuf>,

    /// Number of concurrent per-image analyses within a camera
    #[arg(long, default_value = "4", value_name = "NUM")]
    pub concurrency: usize,

    /// Path to configuration file
    ///
    /// If not specified, looks for .siterisk.toml in the current directory
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output, no progress bars)
    #[arg(short, long)]
    pub quiet: bool,

    /// Dry run: list cameras and images without calling the LLM
    #[arg(long)]
    pub dry_run: bool,

    /// Generate a default .siterisk.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        // Validate Ollama URL format (not needed for dry-run)
        if !self.dry_run
            && !self.ollama_url.starts_with("http://")
            && !self.ollama_url.starts_with("https://")
        {
            return Err("Ollama URL must start with 'http://' or 'https://'".to_string());
        }

        // Validate temperature range
        if !(0.0..=1.0).contains(&self.temperature) {
            return Err("Temperature must be between 0.0 and 1.0".to_string());
        }

        // Validate concurrency
        if self.concurrency == 0 {
            return Err("Concurrency must be at least 1".to_string());
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        // Validate timeout if provided
        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        // Validate camera file if provided
        if let Some(ref cameras) = self.cameras {
            if !cameras.exists() {
                return Err(format!("Cameras file does not exist: {}", cameras.display()));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
