//! Layout detection through a vision LLM.
//!
//! The model is asked for a JSON array of regions on a 0–1000 normalised
//! grid (see [`crate::prompts::LAYOUT_SYSTEM_PROMPT`]). Parsing is separate
//! from the call so the reply handling is testable without a provider.

use super::vlm::VlmClient;
use super::{BoundingBox, Region, RegionCategory, RegionDetector};
use crate::error::ModelError;
use crate::pipeline::{encode, postprocess};
use crate::prompts::LAYOUT_SYSTEM_PROMPT;
use edgequake_llm::ChatMessage;
use image::DynamicImage;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

/// Side of the normalised coordinate grid the model answers in.
const GRID: f32 = 1000.0;

/// [`RegionDetector`] that asks a vision model for layout regions.
pub struct VlmRegionDetector {
    client: Arc<VlmClient>,
    min_score: f32,
}

impl VlmRegionDetector {
    pub fn new(client: Arc<VlmClient>, min_score: f32) -> Self {
        Self { client, min_score }
    }
}

impl RegionDetector for VlmRegionDetector {
    fn detect(&self, image: &DynamicImage) -> Result<Vec<Region>, ModelError> {
        let image_data =
            encode::encode_image(image).map_err(|e| ModelError::ImageEncoding(e.to_string()))?;

        let messages = vec![
            ChatMessage::system(LAYOUT_SYSTEM_PROMPT),
            ChatMessage::user_with_images("Detect the layout regions.", vec![image_data]),
        ];

        let reply = self.client.chat(&messages)?;
        let regions = parse_regions(&reply, image.width(), image.height(), self.min_score)?;
        debug!("Detector returned {} regions", regions.len());
        Ok(regions)
    }
}

#[derive(Debug, Deserialize)]
struct RawRegion {
    category: String,
    #[serde(rename = "box")]
    bbox: [f32; 4],
    #[serde(default = "default_score")]
    score: f32,
}

fn default_score() -> f32 {
    1.0
}

/// Parse a layout reply into pixel-space regions of a `width × height` image.
///
/// Regions scoring under `min_score` are dropped; reply order is kept.
pub fn parse_regions(
    reply: &str,
    width: u32,
    height: u32,
    min_score: f32,
) -> Result<Vec<Region>, ModelError> {
    let json = postprocess::json_array_slice(reply)
        .ok_or_else(|| ModelError::MalformedResponse(format!("no JSON array in: {reply:.80}")))?;
    let raw: Vec<RawRegion> =
        serde_json::from_str(&json).map_err(|e| ModelError::MalformedResponse(e.to_string()))?;

    let sx = width as f32 / GRID;
    let sy = height as f32 / GRID;

    Ok(raw
        .into_iter()
        .filter(|r| r.score >= min_score)
        .map(|r| {
            let [x1, y1, x2, y2] = r.bbox;
            Region {
                category: RegionCategory::from_label(&r.category),
                bbox: BoundingBox::new(x1 * sx, y1 * sy, x2 * sx, y2 * sy),
                score: r.score,
            }
        })
        .collect())
}
