//! Pipeline stages for figure, image and algorithm extraction.
//!
//! Each extraction stage walks the selected pages once, in order, over the
//! same [`DocumentSource`] handle. No stage reads another stage's output.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ figures ──▶ embedded ──▶ algorithms ──▶ enrich ──▶ JSON
//! (URL/path) (render,    (bytes,      (page text,    (entities)
//!            detect,     placement,   headings)
//!            crop)       caption)
//! ```
//!
//! 1. [`input`]: canonicalise the user-supplied path or URL to a local file
//! 2. [`figures`]: render, detect figure regions, crop, auto-contrast,
//!    save, caption
//! 3. [`embedded`]: save embedded rasters verbatim, harvest the text below
//!    each placement, caption the decoded image
//! 4. [`algorithms`]: match algorithm headings in page text
//! 5. [`enrich`]: attach entity keywords to every record with caption text
//!
//! [`encode`], [`contrast`] and [`postprocess`] are helpers shared by the
//! stages and the model adapters.
//!
//! Every per-page or per-item failure goes through [`StageContext::degrade`]:
//! it is logged, recorded as an [`ItemIssue`], and replaced by the empty
//! default so the record is still emitted.

pub mod algorithms;
pub mod contrast;
pub mod embedded;
pub mod encode;
pub mod enrich;
pub mod figures;
pub mod input;
pub mod postprocess;

use crate::config::ExtractionConfig;
use crate::error::{IssueKind, ItemIssue, SamplerError, Stage};
use crate::models::Models;
use crate::output::OutputLayout;
use crate::record::ExtractedRecord;
use crate::source::DocumentSource;
use std::fmt::Display;
use tracing::{info, warn};

/// Everything a stage needs for one run, plus the issues it accumulates.
pub struct StageContext<'a> {
    pub source: &'a dyn DocumentSource,
    pub models: &'a Models,
    pub layout: &'a OutputLayout,
    pub config: &'a ExtractionConfig,
    /// 0-indexed pages every stage visits.
    pub pages: &'a [usize],
    issues: Vec<ItemIssue>,
}

impl<'a> StageContext<'a> {
    pub fn new(
        source: &'a dyn DocumentSource,
        models: &'a Models,
        layout: &'a OutputLayout,
        config: &'a ExtractionConfig,
        pages: &'a [usize],
    ) -> Self {
        Self {
            source,
            models,
            layout,
            config,
            pages,
            issues: Vec::new(),
        }
    }

    /// Unwrap `result`, or record the failure and fall back to `T::default()`.
    ///
    /// `page` is 1-indexed; `item` is the 1-indexed position on the page for
    /// item-scoped failures.
    pub fn degrade<T: Default, E: Display>(
        &mut self,
        result: Result<T, E>,
        stage: Stage,
        kind: IssueKind,
        page: usize,
        item: Option<usize>,
    ) -> T {
        match result {
            Ok(value) => value,
            Err(e) => {
                self.record_issue(ItemIssue {
                    stage,
                    kind,
                    page,
                    item,
                    detail: e.to_string(),
                });
                T::default()
            }
        }
    }

    pub fn record_issue(&mut self, issue: ItemIssue) {
        warn!("{}", issue);
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_item_issue(&issue);
        }
        self.issues.push(issue);
    }

    pub fn into_issues(self) -> Vec<ItemIssue> {
        self.issues
    }

    /// Run `per_page` over every selected page and concatenate the records.
    ///
    /// Only fatal errors (output writes) stop the walk.
    pub fn run_stage<F>(
        &mut self,
        stage: Stage,
        mut per_page: F,
    ) -> Result<Vec<ExtractedRecord>, SamplerError>
    where
        F: FnMut(&mut Self, usize) -> Result<Vec<ExtractedRecord>, SamplerError>,
    {
        let pages = self.pages;
        info!("Stage {}: {} pages", stage, pages.len());
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_stage_start(stage, pages.len());
        }

        let mut records = Vec::new();
        for &page in pages {
            let found = per_page(self, page)?;
            if let Some(ref cb) = self.config.progress_callback {
                cb.on_page_complete(stage, page + 1, found.len());
            }
            records.extend(found);
        }

        info!("Stage {}: {} records", stage, records.len());
        Ok(records)
    }
}
