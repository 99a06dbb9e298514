//! Prompt and response parsing for clothing photo analysis.
//!
//! The vision model itself sits behind [`concierge_core::ImageAnalyzer`];
//! adapters send [`VISION_PROMPT`] with the image and hand the raw reply to
//! [`parse_image_analysis`].

use serde_json::Value;

use concierge_core::domain::vision::{ClothingAttributes, ImageAnalysis};

pub const VISION_PROMPT: &str = "Analyze this image and determine if it shows clothing/fashion items.

If this IS a clothing item, return a JSON object with:
{
    \"garment_type\": \"type of clothing (dress, shirt, pants, etc.)\",
    \"colors\": [\"list\", \"of\", \"colors\"],
    \"patterns\": [\"list\", \"of\", \"patterns like floral, striped, solid\"],
    \"style_keywords\": [\"descriptive\", \"style\", \"words\"]
}

If this is NOT a clothing item (food, landscape, person without focus on clothes, blurry, etc.), return:
{
    \"is_clothing\": false,
    \"reason\": \"brief explanation why this cannot be analyzed as clothing\"
}

Return ONLY valid JSON, no other text.";

const UNREADABLE_REASON: &str = "Failed to analyze image properly";
const NOT_CLOTHING_REASON: &str = "Not a clothing image";
const REQUIRED_KEYS: [&str; 4] = ["garment_type", "colors", "patterns", "style_keywords"];

/// Turns the model's reply into an analysis. Anything that is not a complete
/// clothing description, including malformed JSON, counts as not clothing.
pub fn parse_image_analysis(raw: &str) -> ImageAnalysis {
    let Ok(value) = serde_json::from_str::<Value>(strip_code_fence(raw)) else {
        return not_clothing(UNREADABLE_REASON);
    };

    if value.get("is_clothing").and_then(Value::as_bool) == Some(false) {
        let reason = value
            .get("reason")
            .and_then(Value::as_str)
            .filter(|reason| !reason.trim().is_empty())
            .unwrap_or(NOT_CLOTHING_REASON);
        return not_clothing(reason);
    }

    if !REQUIRED_KEYS.iter().all(|key| value.get(key).is_some()) {
        return not_clothing(UNREADABLE_REASON);
    }

    match serde_json::from_value::<ClothingAttributes>(value) {
        Ok(attributes) if !attributes.garment_type.trim().is_empty() => {
            ImageAnalysis::Clothing(attributes)
        }
        _ => not_clothing(UNREADABLE_REASON),
    }
}

fn not_clothing(reason: &str) -> ImageAnalysis {
    ImageAnalysis::NotClothing { reason: reason.to_owned() }
}

/// Models often wrap JSON in a markdown fence; keep only the fenced body.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or_default();
    match body.find("```") {
        Some(end) => body[..end].trim(),
        None => body.trim(),
    }
}
