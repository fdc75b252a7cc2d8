//! Progress-callback trait for per-stage, per-page extraction events.
//!
//! Inject an [`Arc<dyn ExtractionProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to receive
//! events as the pipeline walks the document.
//!
//! The pipeline visits every selected page once per stage (figures, then
//! embedded images, then algorithms), so a full run reports
//! `3 × selected_pages` page completions. Events arrive in document order;
//! the pipeline is sequential.
//!
//! # Example
//!
//! ```rust
//! use edgequake_pdfsampler::{ExtractionConfig, ExtractionProgressCallback, Stage};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     records: AtomicUsize,
//! }
//!
//! impl ExtractionProgressCallback for CountingCallback {
//!     fn on_page_complete(&self, _stage: Stage, _page_num: usize, records: usize) {
//!         self.records.fetch_add(records, Ordering::SeqCst);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { records: AtomicUsize::new(0) });
//!
//! let config = ExtractionConfig::builder()
//!     .progress_callback(counter as Arc<dyn ExtractionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::error::{ItemIssue, Stage};
use std::sync::Arc;

/// Called by the extraction pipeline as it processes each page.
///
/// Implementations must be `Send + Sync`: the pipeline runs on a blocking
/// worker thread, not on the caller's thread. All methods have default
/// no-op implementations so callers only override what they care about.
pub trait ExtractionProgressCallback: Send + Sync {
    /// Called once, after the document is open and pages are selected.
    fn on_extraction_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called when a stage begins walking the selected pages.
    fn on_stage_start(&self, stage: Stage, total_pages: usize) {
        let _ = (stage, total_pages);
    }

    /// Called when a stage finishes one page.
    ///
    /// # Arguments
    /// * `page_num`: 1-indexed page number
    /// * `records`: records the stage emitted for this page
    fn on_page_complete(&self, stage: Stage, page_num: usize, records: usize) {
        let _ = (stage, page_num, records);
    }

    /// Called whenever a per-item failure is downgraded to an empty field.
    fn on_item_issue(&self, issue: &ItemIssue) {
        let _ = issue;
    }

    /// Called once after enrichment, before the JSON is written.
    fn on_extraction_complete(&self, total_records: usize) {
        let _ = total_records;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ExtractionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn ExtractionProgressCallback>;
