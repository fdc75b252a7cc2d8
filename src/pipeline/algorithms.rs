//! Algorithm stage: find algorithm headings in page text.
//!
//! A heading is kept only when it mentions one of the relevance markers, so
//! the output lists the algorithms of the method under study rather than
//! every baseline listing in the paper.

use super::StageContext;
use crate::error::{IssueKind, SamplerError, Stage};
use crate::record::ExtractedRecord;
use regex::Regex;
use tracing::debug;

/// Heading pattern used when none is configured.
pub const DEFAULT_HEADING_PATTERN: &str = r"Algorithm\s*\d+[:\s\-]+[^\n]+";

/// Relevance markers used when none are configured.
pub const DEFAULT_MARKERS: [&str; 2] = ["ADA", "Adaptive"];

/// Heading pattern plus the case-sensitive substrings a match must contain.
///
/// If the pattern has a named group `id`, that group is the identifier;
/// otherwise the identifier is the match up to its first `:`.
#[derive(Debug, Clone)]
pub struct HeadingMatcher {
    pattern: Regex,
    markers: Vec<String>,
}

impl Default for HeadingMatcher {
    fn default() -> Self {
        Self {
            pattern: Regex::new(DEFAULT_HEADING_PATTERN).expect("default heading pattern compiles"),
            markers: DEFAULT_MARKERS.iter().map(|m| m.to_string()).collect(),
        }
    }
}

impl HeadingMatcher {
    /// Compile `pattern` with the default markers.
    pub fn new(pattern: &str) -> Result<Self, SamplerError> {
        let pattern = Regex::new(pattern)
            .map_err(|e| SamplerError::InvalidConfig(format!("heading pattern: {e}")))?;
        Ok(Self {
            pattern,
            ..Self::default()
        })
    }

    /// Replace the relevance markers. An empty list keeps every match.
    pub fn with_markers<I, S>(mut self, markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.markers = markers.into_iter().map(Into::into).collect();
        self
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn markers(&self) -> &[String] {
        &self.markers
    }

    fn is_relevant(&self, heading: &str) -> bool {
        self.markers.is_empty() || self.markers.iter().any(|m| heading.contains(m.as_str()))
    }

    /// `(id, caption)` for every relevant heading in `text`, in match order.
    pub fn find_headings(&self, text: &str) -> Vec<(String, String)> {
        self.pattern
            .captures_iter(text)
            .filter_map(|caps| {
                let whole = caps.get(0)?.as_str();
                if !self.is_relevant(whole) {
                    return None;
                }
                let id = match caps.name("id") {
                    Some(m) => m.as_str(),
                    None => whole.split(':').next().unwrap_or(whole),
                };
                Some((id.trim().to_string(), whole.trim().to_string()))
            })
            .collect()
    }
}

pub fn extract_algorithms(ctx: &mut StageContext<'_>) -> Result<Vec<ExtractedRecord>, SamplerError> {
    ctx.run_stage(Stage::Algorithms, |ctx, page| {
        let page_num = page + 1;
        let text = ctx.source.page_text(page);
        let text = ctx.degrade(text, Stage::Algorithms, IssueKind::TextUnavailable, page_num, None);

        let records: Vec<ExtractedRecord> = ctx
            .config
            .heading_matcher
            .find_headings(&text)
            .into_iter()
            .map(|(id, caption)| ExtractedRecord::algorithm(page_num, id, caption))
            .collect();
        if !records.is_empty() {
            debug!("Page {}: {} algorithm headings", page_num, records.len());
        }
        Ok(records)
    })
}
