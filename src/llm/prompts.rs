//! Prompt templates for the pipeline's model calls.
//!
//! Three classes of calls: per-image risk description, per-image
//! regulatory check, and the final cross-camera synthesis.

use crate::llm::CompletionRequest;

/// System prompt for the per-image risk description call.
pub const SAFETY_OFFICER_SYSTEM: &str = "You are a construction site safety officer. \
You review object detections from site cameras and state whether a visible risk is present. \
Be brief and concise. Do not greet.";

/// System prompt for the regulatory compliance call.
pub const REGULATORY_ADVISOR_SYSTEM: &str = "You are an expert in construction site safety, \
specialized in regulatory compliance (labor code, INRS, OPPBTP). \
Given an observed situation, state whether a safety rule is violated and cite the relevant \
articles or standards when possible. Ignore anything unrelated to safety. \
Be brief and concise. Do not greet.";

/// System prompt for the final synthesis call.
pub const SYNTHESIS_SYSTEM: &str = "You are a construction site risk analyst. \
You combine per-camera findings and weather conditions into one global risk synthesis. \
Answer ONLY with a JSON object of the form \
{\"risk_detected\": true|false, \"narrative\": \"...\"}. No other text.";

/// Build the risk-description request for one image.
pub fn risk_description(camera_name: &str, objects_text: &str) -> CompletionRequest {
    CompletionRequest::new(
        SAFETY_OFFICER_SYSTEM,
        format!(
            "Images coming from: {}\nDetected objects:\n{}\nState whether a visible risk is present.",
            camera_name, objects_text
        ),
    )
}

/// Build the multimodal risk-description request for one image.
///
/// The base64-encoded JPEG travels in the chat message's `images` field.
pub fn risk_description_multimodal(
    camera_name: &str,
    image_name: &str,
    image_base64: String,
) -> CompletionRequest {
    CompletionRequest::new(
        SAFETY_OFFICER_SYSTEM,
        format!(
            "Describe the visible risks on the construction site in this image: {} (camera {}).",
            image_name, camera_name
        ),
    )
    .with_images(vec![image_base64])
}

/// Build the regulatory-advice request for one image.
pub fn regulatory_advice(
    camera_name: &str,
    image_name: &str,
    objects_text: &str,
    initial_analysis: &str,
) -> CompletionRequest {
    CompletionRequest::new(
        REGULATORY_ADVISOR_SYSTEM,
        format!(
            "Camera: {}\nImage: {}\n{}\nInitial analysis: {}",
            camera_name, image_name, objects_text, initial_analysis
        ),
    )
}

/// Build the synthesis request, in its one- or two-camera variant.
pub fn synthesis(
    middle_camera_summary: &str,
    entry_camera_summary: Option<&str>,
    weather_summary: &str,
) -> CompletionRequest {
    let prompt = match entry_camera_summary {
        None => format!(
            "Here are the image analyses from a construction site camera.\n\
             === Middle camera ===\n{}\n\n\
             === Weather conditions ===\n{}\n\n\
             Produce a global synthesis of the detected risks, also taking the weather \
             into account where it can worsen a risk or create a new one.",
            middle_camera_summary, weather_summary
        ),
        Some(entry) => format!(
            "Here are the image analyses from two construction site cameras.\n\
             === Middle camera ===\n{}\n\n\
             === Entry camera ===\n{}\n\n\
             === Weather conditions ===\n{}\n\n\
             Produce a global synthesis of the detected risks, also taking the weather \
             into account where it can worsen a risk or create a new one.",
            middle_camera_summary, entry, weather_summary
        ),
    };

    CompletionRequest::new(SYNTHESIS_SYSTEM, prompt)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_description_includes_context() {
        let request = risk_description("Camera_Milieu", "- person (score: 0.90)");
        assert!(request.prompt.contains("Camera_Milieu"));
        assert!(request.prompt.contains("- person (score: 0.90)"));
        assert!(request.images.is_empty());
    }

    #[test]
    fn test_multimodal_request_carries_image() {
        let request =
            risk_description_multimodal("Camera_Milieu", "img_001.jpg", "aGVsbG8=".to_string());
        assert!(request.prompt.contains("img_001.jpg"));
        assert_eq!(request.images, vec!["aGVsbG8=".to_string()]);
    }

    #[test]
    fn test_synthesis_variants() {
        let one = synthesis("middle", None, "weather");
        assert!(one.prompt.contains("=== Middle camera ==="));
        assert!(!one.prompt.contains("=== Entry camera ==="));

        let two = synthesis("middle", Some("entry"), "weather");
        assert!(two.prompt.contains("=== Entry camera ==="));
        assert!(two.prompt.contains("=== Weather conditions ==="));
    }
}
