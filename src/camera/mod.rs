//! Per-camera risk analysis.
//!
//! For one camera this module loads the detection metadata, fans out over
//! the camera's images with a bounded worker pool, runs the risk and
//! regulatory model calls per image, annotates the images, and rolls the
//! per-image text blocks up into a camera summary.

pub mod annotate;

use crate::llm::{prompts, TextModel};
use crate::models::{CameraConfig, Detection, DetectionMetadata, RiskContext};
use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Settings shared by all camera analyses in one run.
#[derive(Debug, Clone)]
pub struct AnalyzerSettings {
    /// Root folder for annotated copies; each camera writes to its own
    /// subfolder named after it.
    pub annotated_dir: PathBuf,
    /// Bound on concurrent per-image work within one camera.
    pub concurrency: usize,
    /// Send the image itself (base64) with the risk-description call.
    pub multimodal: bool,
    /// Show a per-camera progress bar.
    pub show_progress: bool,
}

/// Analyzes all images of one camera.
pub struct CameraAnalyzer {
    model: Arc<dyn TextModel>,
    settings: AnalyzerSettings,
}

impl CameraAnalyzer {
    pub fn new(model: Arc<dyn TextModel>, settings: AnalyzerSettings) -> Self {
        Self { model, settings }
    }

    /// Analyze one camera and return its summary text.
    ///
    /// Metadata load failures are fatal for this camera and propagate to
    /// the orchestrator, which downgrades them to a placeholder. Failures
    /// of a single image degrade to an inline error line only.
    pub async fn analyze(&self, camera: &CameraConfig) -> Result<String> {
        info!("Analyzing camera {}", camera.name);

        let metadata = Arc::new(DetectionMetadata::load(&camera.detections_json)?);
        let image_names = list_images(&camera.image_dir)?;
        debug!("Camera {}: {} candidate images", camera.name, image_names.len());

        let annotated_folder = self.settings.annotated_dir.join(&camera.name);
        let semaphore = Arc::new(Semaphore::new(self.settings.concurrency.max(1)));
        let progress = make_progress(&camera.name, image_names.len(), self.settings.show_progress);

        let mut tasks: JoinSet<(usize, String)> = JoinSet::new();
        for (idx, image_name) in image_names.iter().enumerate() {
            let job = ImageJob {
                model: Arc::clone(&self.model),
                metadata: Arc::clone(&metadata),
                camera_name: camera.name.clone(),
                image_dir: camera.image_dir.clone(),
                image_name: image_name.clone(),
                annotated_folder: annotated_folder.clone(),
                multimodal: self.settings.multimodal,
            };
            let semaphore = Arc::clone(&semaphore);
            let progress = progress.clone();

            tasks.spawn(async move {
                // Closing the semaphore is never done, so acquisition only
                // fails if the runtime is shutting down.
                let _permit = semaphore.acquire_owned().await;
                let image_name = job.image_name.clone();
                let line = match job.run().await {
                    Ok(line) => line,
                    Err(e) => {
                        warn!("Image {} failed: {:#}", image_name, e);
                        format!("[{}] Analysis failed: {:#}", image_name, e)
                    }
                };
                progress.inc(1);
                (idx, line)
            });
        }

        // Pre-fill so every candidate image appears even if its task was
        // aborted, then restore the original sorted order.
        let mut lines: Vec<String> = image_names
            .iter()
            .map(|name| format!("[{}] Analysis failed: task aborted", name))
            .collect();

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((idx, line)) => lines[idx] = line,
                Err(e) => warn!("Camera {}: image task panicked: {}", camera.name, e),
            }
        }

        progress.finish_and_clear();

        Ok(format!(
            "\n=== Summary {} ===\n{}",
            camera.name,
            lines.join("\n")
        ))
    }
}

/// One image's unit of work.
struct ImageJob {
    model: Arc<dyn TextModel>,
    metadata: Arc<DetectionMetadata>,
    camera_name: String,
    image_dir: PathBuf,
    image_name: String,
    annotated_folder: PathBuf,
    multimodal: bool,
}

impl ImageJob {
    async fn run(self) -> Result<String> {
        let entry = self.metadata.images.get(&self.image_name);

        // No risk-context metadata: short-circuit without any model call.
        let Some(other) = entry.and_then(|e| e.other.as_ref()) else {
            return Ok(format!(
                "[{}] No risk detected (no 'other' information).",
                self.image_name
            ));
        };

        let mut detections = entry
            .map(|e| e.detections.clone())
            .unwrap_or_default();
        associate_risks(&mut detections, Some(other));

        let objects_text = format_detections(&detections);
        let image_path = self.image_dir.join(&self.image_name);

        let risk_request = if self.multimodal {
            let bytes = std::fs::read(&image_path)
                .with_context(|| format!("Failed to read image: {}", image_path.display()))?;
            prompts::risk_description_multimodal(
                &self.camera_name,
                &self.image_name,
                BASE64.encode(bytes),
            )
        } else {
            prompts::risk_description(&self.camera_name, &objects_text)
        };

        let risk_text = self.model.complete(risk_request).await?;

        let regulatory_text = self
            .model
            .complete(prompts::regulatory_advice(
                &self.camera_name,
                &self.image_name,
                &objects_text,
                &risk_text,
            ))
            .await?;

        // Image decoding and drawing are CPU-bound.
        let annotated_folder = self.annotated_folder.clone();
        let annotation_detections = detections.clone();
        tokio::task::spawn_blocking(move || {
            annotate::annotate_image(&image_path, &annotation_detections, &annotated_folder)
        })
        .await
        .context("Annotation task aborted")??;

        Ok(format!(
            "[{}]\n{}\nRegulatory check: {}\n",
            self.image_name, risk_text, regulatory_text
        ))
    }
}

/// Stamp the risk label from `other` onto every person detection.
///
/// Only augments `person`-labeled detections when the context's category
/// is "Risque" with a non-empty label; everything else passes through
/// unchanged.
pub fn associate_risks(detections: &mut [Detection], other: Option<&RiskContext>) {
    let Some(label) = other.and_then(RiskContext::risk_label) else {
        return;
    };

    for detection in detections.iter_mut() {
        if detection.label == "person" {
            detection.risque = Some(label.to_string());
        }
    }
}

/// Render the detections as the bullet list fed to the model.
pub fn format_detections(detections: &[Detection]) -> String {
    if detections.is_empty() {
        return "No objects detected.".to_string();
    }

    detections
        .iter()
        .map(Detection::bullet_line)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Build the candidate image list: `.jpg` files sorted lexicographically
/// for reproducibility.
fn list_images(image_dir: &Path) -> Result<Vec<String>> {
    let entries = std::fs::read_dir(image_dir)
        .with_context(|| format!("Failed to read image directory: {}", image_dir.display()))?;

    let mut names: Vec<String> = entries
        .flatten()
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().to_string();
            name.to_lowercase().ends_with(".jpg").then_some(name)
        })
        .collect();

    names.sort();
    Ok(names)
}

fn make_progress(camera_name: &str, total: usize, show: bool) -> ProgressBar {
    if !show {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg} [{bar:30.cyan/blue}] {pos}/{len}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb.set_message(format!("📷 {}", camera_name));
    pb
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::CompletionRequest;
    use async_trait::async_trait;
    use image::RgbImage;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Stub backend that counts calls and returns a fixed response.
    struct CountingModel {
        calls: AtomicUsize,
    }

    impl CountingModel {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TextModel for CountingModel {
        async fn complete(&self, _request: CompletionRequest) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok("model-response".to_string())
        }
    }

    fn person(score: f64) -> Detection {
        Detection {
            bounding_box_start_x: 0.1,
            bounding_box_start_y: 0.1,
            bounding_box_end_x: 0.5,
            bounding_box_end_y: 0.5,
            label: "person".to_string(),
            score,
            risque: None,
        }
    }

    fn truck() -> Detection {
        Detection {
            label: "truck".to_string(),
            ..person(0.8)
        }
    }

    #[test]
    fn test_associate_risks_without_context_is_identity() {
        let original = vec![person(0.9), truck()];

        let mut detections = original.clone();
        associate_risks(&mut detections, None);
        assert_eq!(detections, original);

        let mut detections = original.clone();
        associate_risks(&mut detections, Some(&RiskContext::default()));
        assert_eq!(detections, original);
    }

    #[test]
    fn test_associate_risks_stamps_persons_only() {
        let mut detections = vec![person(0.9), truck(), person(0.4)];
        let other = RiskContext {
            category: Some("Risque".to_string()),
            label: Some("chute".to_string()),
        };

        associate_risks(&mut detections, Some(&other));

        assert_eq!(detections[0].risque.as_deref(), Some("chute"));
        assert_eq!(detections[1].risque, None);
        assert_eq!(detections[2].risque.as_deref(), Some("chute"));
    }

    #[test]
    fn test_format_detections_empty_sentence() {
        assert_eq!(format_detections(&[]), "No objects detected.");
    }

    #[test]
    fn test_format_detections_bullets() {
        let mut risky = person(0.9);
        risky.risque = Some("chute".to_string());
        let text = format_detections(&[risky, truck()]);
        assert_eq!(
            text,
            "- person (score: 0.90) [Risque: chute]\n- truck (score: 0.80)"
        );
    }

    fn camera_fixture(dir: &TempDir, metadata: &str, image_names: &[&str]) -> CameraConfig {
        let image_dir = dir.path().join("images");
        std::fs::create_dir_all(&image_dir).unwrap();
        for name in image_names {
            RgbImage::new(32, 16).save(image_dir.join(name)).unwrap();
        }

        let detections_json = dir.path().join("detections.json");
        std::fs::write(&detections_json, metadata).unwrap();

        CameraConfig {
            name: "Camera_Milieu".to_string(),
            image_dir,
            detections_json,
        }
    }

    fn analyzer(dir: &TempDir, model: Arc<dyn TextModel>) -> CameraAnalyzer {
        CameraAnalyzer::new(
            model,
            AnalyzerSettings {
                annotated_dir: dir.path().join("annotated"),
                concurrency: 2,
                multimodal: false,
                show_progress: false,
            },
        )
    }

    #[tokio::test]
    async fn test_image_without_other_short_circuits_without_model_calls() {
        let dir = TempDir::new().unwrap();
        let metadata = r#"{"images": {"img_001.jpg": {"detections": [], "other": null}}}"#;
        let camera = camera_fixture(&dir, metadata, &["img_001.jpg"]);

        let model = Arc::new(CountingModel::new());
        let summary = analyzer(&dir, model.clone()).analyze(&camera).await.unwrap();

        assert!(summary.contains("=== Summary Camera_Milieu ==="));
        assert!(summary.contains("[img_001.jpg] No risk detected (no 'other' information)."));
        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test]
    async fn test_risky_image_produces_block_and_annotation() {
        let dir = TempDir::new().unwrap();
        let metadata = r#"{
            "images": {
                "img_001.jpg": {
                    "detections": [{
                        "bounding_box_start_x": 0.1,
                        "bounding_box_start_y": 0.1,
                        "bounding_box_end_x": 0.5,
                        "bounding_box_end_y": 0.5,
                        "label": "person",
                        "score": 0.9
                    }],
                    "other": {"category": "Risque", "label": "chute"}
                }
            }
        }"#;
        let camera = camera_fixture(&dir, metadata, &["img_001.jpg"]);

        let model = Arc::new(CountingModel::new());
        let summary = analyzer(&dir, model.clone()).analyze(&camera).await.unwrap();

        assert!(summary.contains("[img_001.jpg]"));
        assert!(summary.contains("model-response"));
        assert!(summary.contains("Regulatory check: model-response"));
        // One risk-description call plus one regulatory call
        assert_eq!(model.call_count(), 2);

        let annotated = dir
            .path()
            .join("annotated")
            .join("Camera_Milieu")
            .join("img_001.jpg");
        assert!(annotated.exists());
    }

    #[tokio::test]
    async fn test_summary_preserves_sorted_filename_order() {
        let dir = TempDir::new().unwrap();
        let metadata = r#"{"images": {}}"#;
        let camera = camera_fixture(&dir, metadata, &["img_002.jpg", "img_001.jpg", "img_003.jpg"]);

        let model = Arc::new(CountingModel::new());
        let summary = analyzer(&dir, model).analyze(&camera).await.unwrap();

        let first = summary.find("img_001.jpg").unwrap();
        let second = summary.find("img_002.jpg").unwrap();
        let third = summary.find("img_003.jpg").unwrap();
        assert!(first < second && second < third);
    }

    #[tokio::test]
    async fn test_missing_metadata_file_is_fatal_for_camera() {
        let dir = TempDir::new().unwrap();
        let camera = CameraConfig {
            name: "Camera_Milieu".to_string(),
            image_dir: dir.path().to_path_buf(),
            detections_json: dir.path().join("missing.json"),
        };

        let model = Arc::new(CountingModel::new());
        let result = analyzer(&dir, model).analyze(&camera).await;
        assert!(result.is_err());
    }
}
