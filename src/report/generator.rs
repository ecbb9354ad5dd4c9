//! Markdown report generation.
//!
//! Builds the synthesis prompt (one- or two-camera variant), validates
//! the model's structured answer, collects the annotated-image gallery,
//! and writes the fixed-template Markdown document.

use crate::llm::{prompts, TextModel};
use crate::models::{CameraOutcome, SynthesisResponse};
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Sentence closing a synthesis in which no risk was found.
pub const NO_RISK_SENTENCE: &str =
    "No risk detected for now, continued monitoring recommended.";

/// Fixed sentence used when the gallery is empty.
pub const NO_ILLUSTRATION_SENTENCE: &str = "No illustration available.";

/// Everything the synthesizer needs for one run.
pub struct ReportInputs<'a> {
    /// Summary of the middle (primary) camera. Required.
    pub middle_camera_summary: &'a str,
    /// Summary of the entry camera, when configured.
    pub entry_camera_summary: Option<&'a str>,
    /// Formatted weather summary block.
    pub weather_summary: &'a str,
    /// All per-camera outcomes, embedded raw in the report.
    pub cameras: &'a BTreeMap<String, CameraOutcome>,
}

/// Produce the global risk synthesis.
///
/// The model is instructed to answer with a structured JSON object; the
/// reassurance sentence for risk-free syntheses is enforced here rather
/// than trusted to the model's free text.
pub async fn generate_synthesis(
    model: &dyn TextModel,
    inputs: &ReportInputs<'_>,
) -> Result<SynthesisResponse> {
    let request = prompts::synthesis(
        inputs.middle_camera_summary,
        inputs.entry_camera_summary,
        inputs.weather_summary,
    );

    let raw = model.complete(request).await?;
    let mut synthesis = parse_synthesis(&raw);

    if !synthesis.risk_detected && !synthesis.narrative.trim_end().ends_with(NO_RISK_SENTENCE) {
        if !synthesis.narrative.is_empty() && !synthesis.narrative.ends_with('\n') {
            synthesis.narrative.push(' ');
        }
        synthesis.narrative.push_str(NO_RISK_SENTENCE);
    }

    Ok(synthesis)
}

/// Parse the structured synthesis answer, tolerating code fences and
/// surrounding prose. An unparseable answer degrades to a narrative with
/// `risk_detected` assumed true, never silencing a possible risk.
fn parse_synthesis(raw: &str) -> SynthesisResponse {
    let trimmed = raw.trim();

    let candidate = match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => &trimmed[start..=end],
        _ => "",
    };

    if let Ok(parsed) = serde_json::from_str::<SynthesisResponse>(candidate) {
        return parsed;
    }

    warn!("Synthesis response was not valid JSON; keeping raw text");
    SynthesisResponse {
        risk_detected: true,
        narrative: trimmed.to_string(),
    }
}

/// Enumerate every `.jpg` under the annotated-images tree, sorted for a
/// stable gallery order.
pub fn collect_annotated_images(annotated_dir: &Path) -> Vec<String> {
    let mut images: Vec<String> = WalkDir::new(annotated_dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .file_name()
                .to_string_lossy()
                .to_lowercase()
                .ends_with(".jpg")
        })
        .map(|entry| entry.path().to_string_lossy().to_string())
        .collect();

    images.sort();
    debug!("Found {} annotated images", images.len());
    images
}

/// Render the fixed-template Markdown document.
fn render_report(
    synthesis: &SynthesisResponse,
    gallery: &[String],
    inputs: &ReportInputs<'_>,
) -> String {
    let mut output = String::new();

    output.push_str("# Workplace Risk Analysis Report\n\n");
    output.push_str(&format!(
        "*Generated: {}*\n\n",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    ));

    output.push_str("## Introduction\n");
    output.push_str(
        "This report presents an analysis of the risks detected on the workplace from \
         multi-modal data (images, detections, weather, regulations).\n\n",
    );

    output.push_str("## Data Used\n");
    output.push_str("- HD panoramic images\n");
    output.push_str("- Person detections\n");
    output.push_str("- Risk indications\n");
    output.push_str("- Weather\n");
    output.push_str("- Regulatory framework\n\n");

    output.push_str("## Risk Synthesis\n");
    output.push_str(&synthesis.narrative);
    output.push_str("\n\n");

    output.push_str("## Illustrations\n");
    if gallery.is_empty() {
        output.push_str(NO_ILLUSTRATION_SENTENCE);
        output.push('\n');
    } else {
        for image in gallery {
            output.push_str(&format!("- ![]({})\n", image));
        }
    }
    output.push('\n');

    output.push_str("## Recommendations\n");
    output.push_str(
        "Based on the detections and the regulatory framework, the flagged zones should be \
         examined closely, in particular those showing risky behavior. Increased vigilance \
         is also recommended under unfavorable weather conditions.\n\n",
    );

    output.push_str("## Weather Conditions\n");
    output.push_str(inputs.weather_summary);
    output.push_str("\n\n");

    output.push_str("## Camera Summaries\n");
    for (name, outcome) in inputs.cameras {
        output.push_str(&format!("### {}\n", name));
        output.push_str(outcome.text());
        output.push_str("\n\n");
    }

    output.push_str("## Conclusion\n");
    output.push_str(
        "This report highlights the potential risks detected automatically. A human \
         evaluation is advised to complement this analysis.\n\n",
    );

    output.push_str("---\n");
    output.push_str(
        "*This report was generated automatically by the multi-agent risk analysis system.*\n",
    );

    output
}

/// Generate the final Markdown report and write it to `output_path`,
/// overwriting any prior run's report.
///
/// Returns a success string containing the output path.
pub async fn generate_final_report(
    model: &dyn TextModel,
    inputs: &ReportInputs<'_>,
    annotated_dir: &Path,
    output_path: &Path,
) -> Result<String> {
    let synthesis = generate_synthesis(model, inputs).await?;
    let gallery = collect_annotated_images(annotated_dir);
    let document = render_report(&synthesis, &gallery, inputs);

    std::fs::write(output_path, &document)
        .with_context(|| format!("Failed to write report to {}", output_path.display()))?;

    info!("Report written to {}", output_path.display());
    Ok(format!("Final report generated: {}", output_path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::CompletionRequest;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Stub backend returning a queued response.
    struct ScriptedModel {
        response: Mutex<String>,
    }

    impl ScriptedModel {
        fn new(response: &str) -> Self {
            Self {
                response: Mutex::new(response.to_string()),
            }
        }
    }

    #[async_trait]
    impl TextModel for ScriptedModel {
        async fn complete(&self, _request: CompletionRequest) -> Result<String> {
            Ok(self.response.lock().unwrap().clone())
        }
    }

    fn inputs<'a>(cameras: &'a BTreeMap<String, CameraOutcome>) -> ReportInputs<'a> {
        ReportInputs {
            middle_camera_summary: "middle summary",
            entry_camera_summary: Some("entry summary"),
            weather_summary: "Weather conditions at 2024-05-01T10:00:",
            cameras,
        }
    }

    fn camera_map() -> BTreeMap<String, CameraOutcome> {
        let mut map = BTreeMap::new();
        map.insert(
            "Camera_Milieu".to_string(),
            CameraOutcome::Summary("middle summary".to_string()),
        );
        map.insert(
            "Camera_Entree".to_string(),
            CameraOutcome::Failed("Analysis failed for camera Camera_Entree".to_string()),
        );
        map
    }

    #[test]
    fn test_parse_synthesis_valid_json() {
        let parsed =
            parse_synthesis(r#"{"risk_detected": false, "narrative": "All calm on site."}"#);
        assert!(!parsed.risk_detected);
        assert_eq!(parsed.narrative, "All calm on site.");
    }

    #[test]
    fn test_parse_synthesis_with_code_fence() {
        let raw = "```json\n{\"risk_detected\": true, \"narrative\": \"Edge work unsecured.\"}\n```";
        let parsed = parse_synthesis(raw);
        assert!(parsed.risk_detected);
        assert_eq!(parsed.narrative, "Edge work unsecured.");
    }

    #[test]
    fn test_parse_synthesis_free_text_degrades_conservatively() {
        let parsed = parse_synthesis("There might be a risk near the crane.");
        assert!(parsed.risk_detected);
        assert!(parsed.narrative.contains("crane"));
    }

    #[tokio::test]
    async fn test_no_risk_synthesis_gets_reassurance_sentence() {
        let model =
            ScriptedModel::new(r#"{"risk_detected": false, "narrative": "Nothing to report."}"#);
        let cameras = camera_map();

        let synthesis = generate_synthesis(&model, &inputs(&cameras)).await.unwrap();
        assert!(!synthesis.risk_detected);
        assert!(synthesis.narrative.ends_with(NO_RISK_SENTENCE));
    }

    #[tokio::test]
    async fn test_reassurance_sentence_not_duplicated() {
        let response = format!(
            r#"{{"risk_detected": false, "narrative": "{}"}}"#,
            NO_RISK_SENTENCE
        );
        let model = ScriptedModel::new(&response);
        let cameras = camera_map();

        let synthesis = generate_synthesis(&model, &inputs(&cameras)).await.unwrap();
        assert_eq!(synthesis.narrative.matches(NO_RISK_SENTENCE).count(), 1);
    }

    #[tokio::test]
    async fn test_report_with_zero_images_has_fixed_sentence() {
        let dir = TempDir::new().unwrap();
        let annotated_dir = dir.path().join("annotated"); // never created
        let output = dir.path().join("risk_report.md");

        let model = ScriptedModel::new(r#"{"risk_detected": true, "narrative": "Risky."}"#);
        let cameras = camera_map();

        let message = generate_final_report(&model, &inputs(&cameras), &annotated_dir, &output)
            .await
            .unwrap();
        assert!(message.contains("risk_report.md"));

        let document = std::fs::read_to_string(&output).unwrap();
        assert!(document.contains("## Illustrations"));
        assert!(document.contains(NO_ILLUSTRATION_SENTENCE));
        assert!(document.contains("# Workplace Risk Analysis Report"));
        assert!(document.contains("*Generated: "));
        assert!(document.contains("## Risk Synthesis"));
        assert!(document.contains("### Camera_Milieu"));
        assert!(document.contains("### Camera_Entree"));
        assert!(document.contains("## Conclusion"));
    }

    #[tokio::test]
    async fn test_report_gallery_lists_annotated_images() {
        let dir = TempDir::new().unwrap();
        let annotated_dir = dir.path().join("annotated");
        let camera_dir = annotated_dir.join("Camera_Milieu");
        std::fs::create_dir_all(&camera_dir).unwrap();
        std::fs::write(camera_dir.join("img_002.jpg"), b"jpg").unwrap();
        std::fs::write(camera_dir.join("img_001.jpg"), b"jpg").unwrap();
        std::fs::write(camera_dir.join("notes.txt"), b"skip me").unwrap();

        let output = dir.path().join("risk_report.md");
        let model = ScriptedModel::new(r#"{"risk_detected": true, "narrative": "Risky."}"#);
        let cameras = camera_map();

        generate_final_report(&model, &inputs(&cameras), &annotated_dir, &output)
            .await
            .unwrap();

        let document = std::fs::read_to_string(&output).unwrap();
        assert!(document.contains("img_001.jpg)"));
        assert!(document.contains("img_002.jpg)"));
        assert!(!document.contains("notes.txt"));

        // Sorted gallery order
        let first = document.find("img_001.jpg").unwrap();
        let second = document.find("img_002.jpg").unwrap();
        assert!(first < second);
    }
}
