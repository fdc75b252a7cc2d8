//! Model collaborators: region detection, captioning, entity extraction.
//!
//! Each capability is a trait so stages can run against mocks in tests and
//! against any backend in production. Every call returns
//! `Result<_, ModelError>`; the stages, not the adapters, decide how a
//! failure degrades (see [`crate::pipeline::StageContext::degrade`]).
//!
//! The bundled backends route through an edgequake-llm provider:
//!
//! | Trait | Backend | Module |
//! |-------|---------|--------|
//! | [`RegionDetector`]  | [`detect::VlmRegionDetector`]      | vision model → JSON regions |
//! | [`Captioner`]       | [`caption::VlmCaptioner`]          | vision model → one sentence |
//! | [`EntityExtractor`] | [`entities::RegexEntityExtractor`] | offline patterns |
//! | [`EntityExtractor`] | [`entities::LlmEntityExtractor`]   | text model → JSON array |

pub mod caption;
pub mod detect;
pub mod entities;
pub mod vlm;

use crate::error::ModelError;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Layout category assigned by a region detector.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionCategory {
    Text,
    Title,
    List,
    Table,
    Figure,
    Other(String),
}

impl RegionCategory {
    /// Parse a detector label, case-insensitively. Unknown labels are kept.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "text" | "paragraph" => RegionCategory::Text,
            "title" | "heading" => RegionCategory::Title,
            "list" => RegionCategory::List,
            "table" => RegionCategory::Table,
            "figure" | "image" | "chart" | "diagram" | "plot" => RegionCategory::Figure,
            other => RegionCategory::Other(other.to_string()),
        }
    }
}

impl fmt::Display for RegionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegionCategory::Text => f.write_str("text"),
            RegionCategory::Title => f.write_str("title"),
            RegionCategory::List => f.write_str("list"),
            RegionCategory::Table => f.write_str("table"),
            RegionCategory::Figure => f.write_str("figure"),
            RegionCategory::Other(s) => f.write_str(s),
        }
    }
}

/// Box in pixel space of the image handed to the detector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Integer pixel bounds `(x, y, width, height)` clamped to a
    /// `width × height` image. Coordinates are truncated toward zero.
    /// Returns `None` when nothing of the box lies inside the image.
    pub fn to_pixel_bounds(&self, width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
        let clamp = |v: f32, max: u32| -> u32 {
            if v.is_nan() || v <= 0.0 {
                0
            } else {
                (v as u32).min(max)
            }
        };
        let x1 = clamp(self.x1, width);
        let y1 = clamp(self.y1, height);
        let x2 = clamp(self.x2, width);
        let y2 = clamp(self.y2, height);
        if x2 <= x1 || y2 <= y1 {
            return None;
        }
        Some((x1, y1, x2 - x1, y2 - y1))
    }
}

/// One detected layout region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub category: RegionCategory,
    pub bbox: BoundingBox,
    pub score: f32,
}

/// One entity span found in a piece of text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    /// Surface text exactly as it appears in the input.
    pub text: String,
    /// Backend-specific label (e.g. `ORG`, `PERCENT`), if any.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub label: Option<String>,
}

/// Object/layout detector over a rendered page.
pub trait RegionDetector: Send + Sync {
    /// Regions in detector order.
    fn detect(&self, image: &DynamicImage) -> Result<Vec<Region>, ModelError>;
}

/// Image captioner.
pub trait Captioner: Send + Sync {
    fn caption(&self, image: &DynamicImage) -> Result<String, ModelError>;
}

/// Named-entity extractor.
pub trait EntityExtractor: Send + Sync {
    /// Entities in the order the backend returns them. Duplicates and
    /// overlapping spans are kept.
    fn extract(&self, text: &str) -> Result<Vec<Entity>, ModelError>;
}

/// The model handles one run uses, loaded once and passed to every stage.
#[derive(Clone)]
pub struct Models {
    pub detector: Arc<dyn RegionDetector>,
    pub captioner: Arc<dyn Captioner>,
    pub entities: Arc<dyn EntityExtractor>,
}

impl Models {
    pub fn new(
        detector: Arc<dyn RegionDetector>,
        captioner: Arc<dyn Captioner>,
        entities: Arc<dyn EntityExtractor>,
    ) -> Self {
        Self {
            detector,
            captioner,
            entities,
        }
    }
}

impl fmt::Debug for Models {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Models")
            .field("detector", &"<dyn RegionDetector>")
            .field("captioner", &"<dyn Captioner>")
            .field("entities", &"<dyn EntityExtractor>")
            .finish()
    }
}
