//! Document Source: the page-level view of a PDF the pipeline consumes.
//!
//! The pipeline never touches pdfium directly. It talks to a
//! [`DocumentSource`], which keeps the three extraction stages testable with
//! an in-memory document and lets the rendering backend change without
//! touching stage logic. [`pdfium::PdfiumSource`] is the production backend.
//!
//! ## Coordinates
//!
//! Two coordinate systems meet in this crate:
//!
//! * **Page space** ([`Rect`]): PDF points, origin at the *top-left* of the
//!   page, y growing downwards. Backends convert from PDF's native
//!   bottom-left origin before handing rectangles out.
//! * **Pixel space** ([`crate::models::BoundingBox`]): pixels of a rendered
//!   bitmap, produced by the region detector.
//!
//! Page indices passed to a source are 0-based; records and messages use
//! 1-based page numbers.

pub mod pdfium;

use crate::error::SourceError;
use image::DynamicImage;
use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in page space (points, top-left origin).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl Rect {
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    pub fn is_empty(&self) -> bool {
        self.width() <= 0.0 || self.height() <= 0.0
    }

    /// The strip directly below `self`, spanning the same horizontal extent,
    /// `height` points tall, clipped to the bottom edge of `page`.
    pub fn strip_below(&self, page: &Rect, height: f32) -> Rect {
        Rect {
            x0: self.x0,
            y0: self.y1,
            x1: self.x1,
            y1: page.y1.min(self.y1 + height),
        }
    }
}

/// Opaque handle to one embedded image on a page, in enumeration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageRef(pub usize);

/// Bytes of an embedded image as stored in the document, or a lossless PNG
/// when the stored encoding is not a standalone image format.
#[derive(Debug, Clone)]
pub struct RawImage {
    pub bytes: Vec<u8>,
    /// File extension without the dot, e.g. `png`, `jpeg`.
    pub extension: String,
}

/// Read access to an open document.
///
/// Every per-page query is fallible on its own: one bad page or one
/// unreadable image never poisons the handle.
pub trait DocumentSource {
    fn page_count(&self) -> usize;

    /// Page bounding rectangle in page space.
    fn page_bounds(&self, page: usize) -> Result<Rect, SourceError>;

    /// Rasterise a page, scaling its point size by `scale`.
    fn render_page(&self, page: usize, scale: f32) -> Result<DynamicImage, SourceError>;

    /// Plain text of the whole page.
    fn page_text(&self, page: usize) -> Result<String, SourceError>;

    /// Distinct embedded raster images on the page, in the order they are
    /// first drawn. An image drawn twice is listed once.
    fn embedded_images(&self, page: usize) -> Result<Vec<ImageRef>, SourceError>;

    fn extract_image(&self, page: usize, image: ImageRef) -> Result<RawImage, SourceError>;

    /// Every rectangle the image is drawn at, first drawing first. May be
    /// empty.
    fn placement_rects(&self, page: usize, image: ImageRef) -> Result<Vec<Rect>, SourceError>;

    /// Text inside `rect` on the page.
    fn text_in_rect(&self, page: usize, rect: Rect) -> Result<String, SourceError>;
}
