//! The unified output record.
//!
//! Three extraction strategies feed one collection, so the record is an
//! enum: each kind carries exactly the fields that apply to it and nothing
//! else. The kind of a record cannot change after construction, and a field
//! that does not apply to a kind cannot be populated by accident.
//!
//! Serialised shape (one object per record, `type` first):
//!
//! ```json
//! { "type": "figure",         "page": 1, "image_path": "…", "image_caption": "…", "keywords": […] }
//! { "type": "embedded_image", "page": 2, "image_path": "…", "caption_raw": "…", "image_caption": "…" }
//! { "type": "algorithm",      "page": 5, "id": "Algorithm 1", "caption": "Algorithm 1: ADA …" }
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// The kind tag of an [`ExtractedRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Figure,
    EmbeddedImage,
    Algorithm,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RecordKind::Figure => "figure",
            RecordKind::EmbeddedImage => "embedded_image",
            RecordKind::Algorithm => "algorithm",
        };
        f.write_str(s)
    }
}

/// One detected visual or textual unit of the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExtractedRecord {
    /// A region the detector classified as a figure, cropped from the
    /// rendered page.
    Figure {
        page: usize,
        image_path: PathBuf,
        image_caption: String,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        keywords: Option<Vec<String>>,
    },

    /// A raster image stored inside the PDF.
    ///
    /// `image_path` is `None` only when the document source could not hand
    /// over the image bytes, in which case nothing was written.
    EmbeddedImage {
        page: usize,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        image_path: Option<PathBuf>,
        caption_raw: String,
        image_caption: String,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        keywords: Option<Vec<String>>,
    },

    /// An algorithm heading line found in the page text.
    Algorithm {
        page: usize,
        id: String,
        caption: String,
    },
}

/// Captions are stored trimmed so a blank model reply reads as no caption.
fn normalise_caption(caption: String) -> String {
    let trimmed = caption.trim();
    if trimmed.len() == caption.len() {
        caption
    } else {
        trimmed.to_string()
    }
}

impl ExtractedRecord {
    pub fn figure(page: usize, image_path: PathBuf, image_caption: String) -> Self {
        ExtractedRecord::Figure {
            page,
            image_path,
            image_caption: normalise_caption(image_caption),
            keywords: None,
        }
    }

    pub fn embedded_image(
        page: usize,
        image_path: Option<PathBuf>,
        caption_raw: String,
        image_caption: String,
    ) -> Self {
        ExtractedRecord::EmbeddedImage {
            page,
            image_path,
            caption_raw: normalise_caption(caption_raw),
            image_caption: normalise_caption(image_caption),
            keywords: None,
        }
    }

    pub fn algorithm(page: usize, id: String, caption: String) -> Self {
        ExtractedRecord::Algorithm { page, id, caption }
    }

    pub fn kind(&self) -> RecordKind {
        match self {
            ExtractedRecord::Figure { .. } => RecordKind::Figure,
            ExtractedRecord::EmbeddedImage { .. } => RecordKind::EmbeddedImage,
            ExtractedRecord::Algorithm { .. } => RecordKind::Algorithm,
        }
    }

    /// 1-indexed page the record was found on.
    pub fn page(&self) -> usize {
        match self {
            ExtractedRecord::Figure { page, .. }
            | ExtractedRecord::EmbeddedImage { page, .. }
            | ExtractedRecord::Algorithm { page, .. } => *page,
        }
    }

    pub fn image_path(&self) -> Option<&Path> {
        match self {
            ExtractedRecord::Figure { image_path, .. } => Some(image_path),
            ExtractedRecord::EmbeddedImage { image_path, .. } => image_path.as_deref(),
            ExtractedRecord::Algorithm { .. } => None,
        }
    }

    /// Captioner output, if this kind is captioned at all.
    pub fn image_caption(&self) -> Option<&str> {
        match self {
            ExtractedRecord::Figure { image_caption, .. }
            | ExtractedRecord::EmbeddedImage { image_caption, .. } => Some(image_caption),
            ExtractedRecord::Algorithm { .. } => None,
        }
    }

    pub fn keywords(&self) -> Option<&[String]> {
        match self {
            ExtractedRecord::Figure { keywords, .. }
            | ExtractedRecord::EmbeddedImage { keywords, .. } => keywords.as_deref(),
            ExtractedRecord::Algorithm { .. } => None,
        }
    }

    /// Text the keyword pass runs entity extraction over.
    ///
    /// Embedded images prefer the caption printed under them in the PDF and
    /// fall back to the generated one. Algorithms have no caption source.
    /// An empty string means "nothing to enrich".
    pub fn caption_source(&self) -> &str {
        match self {
            ExtractedRecord::Figure { image_caption, .. } => image_caption,
            ExtractedRecord::EmbeddedImage {
                caption_raw,
                image_caption,
                ..
            } => {
                if caption_raw.is_empty() {
                    image_caption
                } else {
                    caption_raw
                }
            }
            ExtractedRecord::Algorithm { .. } => "",
        }
    }

    /// Attach keywords. Returns `false` (and changes nothing) for kinds that
    /// do not carry keywords.
    pub fn set_keywords(&mut self, words: Vec<String>) -> bool {
        match self {
            ExtractedRecord::Figure { keywords, .. }
            | ExtractedRecord::EmbeddedImage { keywords, .. } => {
                *keywords = Some(words);
                true
            }
            ExtractedRecord::Algorithm { .. } => false,
        }
    }
}
