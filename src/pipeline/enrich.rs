//! Keyword enrichment: a post-pass attaching entity strings to records.
//!
//! The caption source is the figure caption for figures, and the raw page
//! caption (falling back to the generated one) for embedded images.
//! Algorithm records are never enriched. Records with an empty source keep
//! `keywords` unset; an extractor failure sets it to an empty list. Captions
//! are trimmed when the record is built, so "empty" here means exactly that.

use super::StageContext;
use crate::error::{IssueKind, Stage};
use crate::record::ExtractedRecord;
use tracing::{debug, info};

/// Enrich `records` in place. Order is untouched.
pub fn enrich_records(ctx: &mut StageContext<'_>, records: &mut [ExtractedRecord]) {
    let mut enriched = 0usize;
    // Item numbers follow the record's position within its page and kind.
    let mut last_key = None;
    let mut item = 0usize;

    for record in records.iter_mut() {
        let key = (record.kind(), record.page());
        if last_key != Some(key) {
            last_key = Some(key);
            item = 0;
        }
        item += 1;

        let source = record.caption_source();
        if source.is_empty() {
            continue;
        }

        let extracted = ctx.models.entities.extract(source);
        let entities = ctx.degrade(
            extracted,
            Stage::Keywords,
            IssueKind::EntityFailed,
            record.page(),
            Some(item),
        );
        let words: Vec<String> = entities.into_iter().map(|e| e.text).collect();
        debug!(
            "Page {} {} {}: {} keywords",
            record.page(),
            record.kind(),
            item,
            words.len()
        );
        if record.set_keywords(words) {
            enriched += 1;
        }
    }

    info!("Stage {}: {} records enriched", Stage::Keywords, enriched);
}
