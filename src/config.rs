//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.siterisk.toml` files. The camera list itself stays a separate JSON
//! file (see [`crate::models::load_cameras`]).

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Model settings.
    #[serde(default)]
    pub model: ModelConfig,

    /// Weather input settings.
    #[serde(default)]
    pub weather: WeatherConfig,

    /// Report output settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Path to the camera list JSON file.
    #[serde(default = "default_cameras_file")]
    pub cameras_file: String,

    /// Number of concurrent per-image analyses within a camera.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            cameras_file: default_cameras_file(),
            concurrency: default_concurrency(),
            verbose: false,
        }
    }
}

fn default_cameras_file() -> String {
    "cameras.json".to_string()
}

fn default_concurrency() -> usize {
    4
}

/// LLM model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Default model name.
    #[serde(default = "default_model")]
    pub name: String,

    /// Ollama API URL.
    #[serde(default = "default_ollama_url")]
    pub ollama_url: String,

    /// Temperature for generation.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Send the base64-encoded image with the per-image risk call
    /// instead of the detection bullet list only. Requires a multimodal
    /// model.
    #[serde(default)]
    pub multimodal: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: default_model(),
            ollama_url: default_ollama_url(),
            temperature: default_temperature(),
            timeout_seconds: default_timeout(),
            multimodal: false,
        }
    }
}

fn default_model() -> String {
    "llama3:8b".to_string()
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_temperature() -> f32 {
    0.2
}

fn default_timeout() -> u64 {
    300
}

/// Weather input settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    /// Path to the weather/air-quality JSON file.
    #[serde(default = "default_weather_file")]
    pub file: String,

    /// Location id keying the weather file.
    #[serde(default = "default_location_id")]
    pub location_id: String,

    /// Hour to summarize (ISO 8601); latest available when unset.
    #[serde(default)]
    pub hour: Option<String>,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            file: default_weather_file(),
            location_id: default_location_id(),
            hour: None,
        }
    }
}

fn default_weather_file() -> String {
    "weather.json".to_string()
}

fn default_location_id() -> String {
    "1374225".to_string()
}

/// Report output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Output file path for the Markdown report.
    #[serde(default = "default_output")]
    pub output: String,

    /// Root folder for annotated image copies.
    #[serde(default = "default_annotated_dir")]
    pub annotated_dir: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            annotated_dir: default_annotated_dir(),
        }
    }
}

fn default_output() -> String {
    "risk_report.md".to_string()
}

fn default_annotated_dir() -> String {
    "annotated_images".to_string()
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(".siterisk.toml");

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// This method only overrides config when CLI provides explicit values.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        // Model settings - always override since they have defaults in CLI
        self.model.name = args.model.clone();
        self.model.ollama_url = args.ollama_url.clone();
        self.model.temperature = args.temperature;

        if let Some(timeout) = args.timeout {
            self.model.timeout_seconds = timeout;
        }
        if args.multimodal {
            self.model.multimodal = true;
        }

        // Optional paths - only override if provided
        if let Some(ref cameras) = args.cameras {
            self.general.cameras_file = cameras.to_string_lossy().to_string();
        }
        if let Some(ref weather) = args.weather {
            self.weather.file = weather.to_string_lossy().to_string();
        }
        if let Some(ref location) = args.location {
            self.weather.location_id = location.clone();
        }
        if let Some(ref hour) = args.hour {
            self.weather.hour = Some(hour.clone());
        }
        if let Some(ref output) = args.output {
            self.report.output = output.to_string_lossy().to_string();
        }
        if let Some(ref annotated_dir) = args.annotated_dir {
            self.report.annotated_dir = annotated_dir.to_string_lossy().to_string();
        }

        // General settings
        self.general.concurrency = args.concurrency;

        // Flags always override
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.model.name, "llama3:8b");
        assert_eq!(config.general.concurrency, 4);
        assert_eq!(config.weather.location_id, "1374225");
        assert_eq!(config.report.output, "risk_report.md");
        assert!(!config.model.multimodal);
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
cameras_file = "site_cameras.json"
concurrency = 8

[model]
name = "llava:13b"
temperature = 0.3
multimodal = true

[weather]
file = "data/weather.json"
location_id = "42"
hour = "2024-05-01T09:00"

[report]
output = "site_report.md"
annotated_dir = "out/annotated"
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.general.cameras_file, "site_cameras.json");
        assert_eq!(config.general.concurrency, 8);
        assert_eq!(config.model.name, "llava:13b");
        assert_eq!(config.model.temperature, 0.3);
        assert!(config.model.multimodal);
        assert_eq!(config.weather.location_id, "42");
        assert_eq!(config.weather.hour.as_deref(), Some("2024-05-01T09:00"));
        assert_eq!(config.report.annotated_dir, "out/annotated");
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(!toml_str.is_empty());
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[model]"));
        assert!(toml_str.contains("[weather]"));
        assert!(toml_str.contains("[report]"));
    }
}
