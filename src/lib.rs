//! # edgequake-pdfsampler
//!
//! Pull the figures, embedded images and algorithm headings out of a
//! scientific PDF into one ordered, keyword-enriched JSON document.
//!
//! ## Why this crate?
//!
//! Papers hide their most useful content in visuals: plots rendered as
//! vector graphics, photos embedded as rasters, and pseudo-code blocks.
//! Text extractors skip all three. This crate combines a layout detector
//! over rendered pages, the raster images stored in the file, and a heading
//! scan of the page text, then captions every visual with a vision model and
//! tags every caption with named entities.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input       resolve local file or download from URL
//!  ├─ 2. Figures     render → detect → crop → auto-contrast → caption
//!  ├─ 3. Images      embedded bytes → text below placement → caption
//!  ├─ 4. Algorithms  heading pattern + relevance markers over page text
//!  ├─ 5. Keywords    entity extraction on each record's caption
//!  └─ 6. Output      structured_output.json + figures/ + images/
//! ```
//!
//! Stages run sequentially over one open document. A failed caption,
//! decode or entity run empties that field and is reported in
//! [`ExtractionOutput::issues`]; only an unreadable input or an unwritable
//! output directory aborts the run.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdfsampler::{extract, ExtractionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let config = ExtractionConfig::default();
//!     let output = extract("paper.pdf", "paper_extracted", &config).await?;
//!     println!("Extraction complete! {} items found.", output.records.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Custom collaborators
//!
//! Every model sits behind a trait ([`RegionDetector`], [`Captioner`],
//! [`EntityExtractor`]) and the document behind [`DocumentSource`], so
//! [`extract_document`] runs with local models or test doubles.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdfsampler` binary (clap + indicatif + anyhow + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod extract;
pub mod models;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod record;
pub mod source;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{EntityBackend, ExtractionConfig, ExtractionConfigBuilder, PageSelection};
pub use error::{IssueKind, ItemIssue, ModelError, SamplerError, SourceError, Stage};
pub use extract::{
    default_models, extract, extract_document, extract_sync, extract_with_models, inspect,
};
pub use models::{
    BoundingBox, Captioner, Entity, EntityExtractor, Models, Region, RegionCategory,
    RegionDetector,
};
pub use output::{DocumentMetadata, ExtractionOutput, ExtractionStats, OutputLayout};
pub use pipeline::algorithms::HeadingMatcher;
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use record::{ExtractedRecord, RecordKind};
pub use source::{DocumentSource, ImageRef, RawImage, Rect};
