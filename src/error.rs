//! Error types for the edgequake-pdfsampler library.
//!
//! Three layers of failure, from widest to narrowest blast radius:
//!
//! * [`SamplerError`] is **fatal**. The run cannot proceed at all (input
//!   missing, PDF unreadable, output directory not writable). Returned as
//!   `Err(SamplerError)` from the top-level `extract*` functions.
//!
//! * [`SourceError`] and [`ModelError`] are **per call**. One Document Source
//!   query or one model invocation failed. Stages never propagate these;
//!   they downgrade them to an empty field and keep going.
//!
//! * [`ItemIssue`] is the serialisable trace left behind by every downgrade,
//!   returned in [`crate::output::ExtractionOutput::issues`] so callers can
//!   audit which captions, decodes or entity runs came back empty and why.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-pdfsampler library.
#[derive(Debug, Error)]
pub enum SamplerError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// The page selection matched no page of the document.
    #[error("Page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: usize, total: usize },

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium, place the library next to the\n\
binary, or install it system-wide.\n"
    )]
    PdfiumBindingFailed(String),

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create a directory or write a crop, image or JSON file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A failed query against a [`crate::source::DocumentSource`].
///
/// Page numbers are 1-indexed in messages.
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    #[error("page {page}: not available: {detail}")]
    Page { page: usize, detail: String },

    #[error("page {page}: rasterisation failed: {detail}")]
    Render { page: usize, detail: String },

    #[error("page {page}: text extraction failed: {detail}")]
    Text { page: usize, detail: String },

    #[error("page {page}: embedded image {index} unavailable: {detail}")]
    Image {
        page: usize,
        index: usize,
        detail: String,
    },

    #[error("page {page}: placement geometry unavailable: {detail}")]
    Geometry { page: usize, detail: String },
}

/// A failed invocation of one of the model collaborators.
#[derive(Debug, Clone, Error)]
pub enum ModelError {
    /// The provider call itself failed (after any retries).
    #[error("model call failed after {retries} retries: {detail}")]
    Api { retries: u32, detail: String },

    /// The model answered, but not in the shape we asked for.
    #[error("malformed model response: {0}")]
    MalformedResponse(String),

    /// The input image could not be prepared for the model.
    #[error("image encoding failed: {0}")]
    ImageEncoding(String),

    /// Backend-specific failure (mock collaborators, local models).
    #[error("{0}")]
    Other(String),
}

/// Which pipeline stage an [`ItemIssue`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Figures,
    EmbeddedImages,
    Algorithms,
    Keywords,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Figures => "figures",
            Stage::EmbeddedImages => "embedded images",
            Stage::Algorithms => "algorithms",
            Stage::Keywords => "keywords",
        };
        f.write_str(s)
    }
}

/// What kind of downgrade an [`ItemIssue`] records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// Page could not be rendered; no figures for that page.
    RenderFailed,
    /// Region detector failed; no figures for that page.
    DetectionFailed,
    /// Captioner failed; caption left empty.
    CaptionFailed,
    /// Embedded image bytes could not be decoded; caption left empty.
    DecodeFailed,
    /// Embedded image bytes could not be extracted; no file written.
    ImageUnavailable,
    /// Placement rectangles could not be queried; raw caption left empty.
    GeometryUnavailable,
    /// Page or rectangle text could not be read.
    TextUnavailable,
    /// Entity extractor failed; keywords left empty.
    EntityFailed,
}

/// A non-fatal failure that was downgraded to an empty field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemIssue {
    pub stage: Stage,
    pub kind: IssueKind,
    /// 1-indexed page number.
    pub page: usize,
    /// 1-indexed position of the item within its page, when item-scoped.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub item: Option<usize>,
    pub detail: String,
}

impl fmt::Display for ItemIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.item {
            Some(item) => write!(
                f,
                "[{}] page {} item {}: {:?}: {}",
                self.stage, self.page, item, self.kind, self.detail
            ),
            None => write!(
                f,
                "[{}] page {}: {:?}: {}",
                self.stage, self.page, self.kind, self.detail
            ),
        }
    }
}
