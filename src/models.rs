//! Data models for the risk analysis pipeline.
//!
//! This module contains the core data structures shared across
//! the pipeline: detector output, camera configuration, and the
//! per-camera analysis outcomes collected by the orchestrator.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// One object-recognition result produced by the external detector.
///
/// Bounding box coordinates are normalized to `[0, 1]` relative to the
/// source image dimensions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub bounding_box_start_x: f64,
    pub bounding_box_start_y: f64,
    pub bounding_box_end_x: f64,
    pub bounding_box_end_y: f64,
    /// Object class label (e.g., "person").
    pub label: String,
    /// Detector confidence score.
    pub score: f64,
    /// Risk label stamped on by risk association, if any.
    /// The field name matches the detector's wire format.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risque: Option<String>,
}

impl Detection {
    /// Renders this detection as a single bullet line for model prompts.
    pub fn bullet_line(&self) -> String {
        let mut line = format!("- {} (score: {:.2})", self.label, self.score);
        if let Some(ref risk) = self.risque {
            line.push_str(&format!(" [Risque: {}]", risk));
        }
        line
    }
}

/// Auxiliary risk-context metadata attached to an image ("other" in the
/// detections file).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskContext {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
}

impl RiskContext {
    /// Returns the risk label to stamp onto person detections, if this
    /// context actually carries one (category "Risque" with a non-empty
    /// label).
    pub fn risk_label(&self) -> Option<&str> {
        if self.category.as_deref() != Some("Risque") {
            return None;
        }
        self.label.as_deref().filter(|label| !label.is_empty())
    }
}

/// Per-image entry in the detections file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImageEntry {
    #[serde(default)]
    pub detections: Vec<Detection>,
    #[serde(default)]
    pub other: Option<RiskContext>,
}

/// Detection metadata for one camera, keyed by exact image filename.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetectionMetadata {
    #[serde(default)]
    pub images: HashMap<String, ImageEntry>,
}

impl DetectionMetadata {
    /// Load detection metadata from a JSON file.
    ///
    /// A missing or malformed file is fatal for the camera that owns it.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read detections file: {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse detections file: {}", path.display()))
    }
}

/// Static configuration for one camera.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    /// Camera name, used as the result key and annotated subfolder name.
    pub name: String,
    /// Directory containing the camera's `.jpg` images.
    pub image_dir: PathBuf,
    /// Path to the detections JSON file for this camera.
    pub detections_json: PathBuf,
}

/// Load the camera list from a JSON configuration file.
pub fn load_cameras(path: &Path) -> Result<Vec<CameraConfig>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read cameras file: {}", path.display()))?;

    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse cameras file: {}", path.display()))
}

/// Outcome of analyzing one camera.
///
/// Failures are downgraded to a placeholder at the orchestrator boundary
/// so one camera never aborts its siblings.
#[derive(Debug, Clone, PartialEq)]
pub enum CameraOutcome {
    /// The concatenated per-image risk/regulatory text for the camera.
    Summary(String),
    /// A short error placeholder naming the camera.
    Failed(String),
}

impl CameraOutcome {
    /// The text embedded into the final report for this camera.
    pub fn text(&self) -> &str {
        match self {
            CameraOutcome::Summary(text) => text,
            CameraOutcome::Failed(placeholder) => placeholder,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, CameraOutcome::Failed(_))
    }
}

/// Structured response contract for the synthesis model call.
///
/// The prompt instructs the model to answer with this shape; the caller
/// validates it instead of trusting free text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisResponse {
    pub risk_detected: bool,
    pub narrative: String,
}
