//! Output types and on-disk layout.
//!
//! ```text
//! <out_dir>/
//!  ├─ figures/page{P}_fig{I}.png      detected figure crops
//!  ├─ images/page{P}_img{I}.{ext}     embedded images, bytes as extracted
//!  └─ structured_output.json          the record array
//! ```
//!
//! `P` is the 1-based page number and `I` the 1-based sequence number of the
//! item within its page, so two items can never share a path.

use crate::error::{IssueKind, ItemIssue, SamplerError};
use crate::record::{ExtractedRecord, RecordKind};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Name of the JSON file written at the output root.
pub const STRUCTURED_OUTPUT_FILE: &str = "structured_output.json";

/// Paths of everything one run writes.
#[derive(Debug, Clone)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn figures_dir(&self) -> PathBuf {
        self.root.join("figures")
    }

    pub fn images_dir(&self) -> PathBuf {
        self.root.join("images")
    }

    pub fn json_path(&self) -> PathBuf {
        self.root.join(STRUCTURED_OUTPUT_FILE)
    }

    /// `figures/page{page}_fig{index}.png`
    pub fn figure_path(&self, page: usize, index: usize) -> PathBuf {
        self.figures_dir().join(format!("page{page}_fig{index}.png"))
    }

    /// `images/page{page}_img{index}.{ext}`
    pub fn image_path(&self, page: usize, index: usize, extension: &str) -> PathBuf {
        self.images_dir()
            .join(format!("page{page}_img{index}.{extension}"))
    }

    /// Create the root, `figures/` and `images/`.
    pub fn create_dirs(&self) -> Result<(), SamplerError> {
        for dir in [self.root.clone(), self.figures_dir(), self.images_dir()] {
            std::fs::create_dir_all(&dir).map_err(|e| SamplerError::OutputWriteFailed {
                path: dir.clone(),
                source: e,
            })?;
        }
        debug!("Output directories ready under {}", self.root.display());
        Ok(())
    }

    /// Write `bytes` to `path` unchanged.
    pub fn write_bytes(&self, path: &Path, bytes: &[u8]) -> Result<(), SamplerError> {
        std::fs::write(path, bytes).map_err(|e| SamplerError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

/// Document-level metadata extracted from the PDF info dictionary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub creation_date: Option<String>,
    pub page_count: usize,
    pub pdf_version: String,
}

/// Counts and timings for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionStats {
    /// Pages in the document.
    pub total_pages: usize,
    /// Pages each stage visited.
    pub selected_pages: usize,
    pub figures: usize,
    pub embedded_images: usize,
    pub algorithms: usize,
    /// Records whose keywords were attached.
    pub enriched: usize,
    pub caption_failures: usize,
    pub decode_failures: usize,
    pub entity_failures: usize,
    pub total_duration_ms: u64,
}

impl ExtractionStats {
    /// Tally records and issues into a stats block.
    pub fn tally(
        total_pages: usize,
        selected_pages: usize,
        records: &[ExtractedRecord],
        issues: &[ItemIssue],
    ) -> Self {
        let count_kind = |kind: RecordKind| records.iter().filter(|r| r.kind() == kind).count();
        let count_issue = |kind: IssueKind| issues.iter().filter(|i| i.kind == kind).count();

        Self {
            total_pages,
            selected_pages,
            figures: count_kind(RecordKind::Figure),
            embedded_images: count_kind(RecordKind::EmbeddedImage),
            algorithms: count_kind(RecordKind::Algorithm),
            enriched: records.iter().filter(|r| r.keywords().is_some()).count(),
            caption_failures: count_issue(IssueKind::CaptionFailed),
            decode_failures: count_issue(IssueKind::DecodeFailed),
            entity_failures: count_issue(IssueKind::EntityFailed),
            total_duration_ms: 0,
        }
    }
}

/// Everything one extraction run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionOutput {
    /// Records in stage order: figures, embedded images, algorithms.
    pub records: Vec<ExtractedRecord>,
    pub stats: ExtractionStats,
    /// Every failure that was downgraded to an empty field.
    pub issues: Vec<ItemIssue>,
    /// Where `structured_output.json` was written, if it was.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub json_path: Option<PathBuf>,
}

impl ExtractionOutput {
    /// Serialise the record array exactly as it is persisted.
    pub fn records_json(&self) -> Result<String, SamplerError> {
        records_to_json(&self.records)
    }
}

/// Pretty-print records as a JSON array with 2-space indentation.
pub fn records_to_json(records: &[ExtractedRecord]) -> Result<String, SamplerError> {
    serde_json::to_string_pretty(records)
        .map_err(|e| SamplerError::Internal(format!("Failed to serialise records: {e}")))
}

/// Write the record array to `path` atomically (temp file + rename).
pub fn write_records(path: &Path, records: &[ExtractedRecord]) -> Result<(), SamplerError> {
    let json = records_to_json(records)?;
    let write_err = |e: std::io::Error| SamplerError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, json.as_bytes()).map_err(write_err)?;
    std::fs::rename(&tmp_path, path).map_err(write_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Stage;

    #[test]
    fn layout_paths_encode_page_and_index() {
        let layout = OutputLayout::new("out");
        assert_eq!(layout.figure_path(2, 3), PathBuf::from("out/figures/page2_fig3.png"));
        assert_eq!(
            layout.image_path(1, 4, "jpeg"),
            PathBuf::from("out/images/page1_img4.jpeg")
        );
        assert_eq!(layout.json_path(), PathBuf::from("out/structured_output.json"));
    }

    #[test]
    fn tally_counts_kinds_and_issues() {
        let mut fig = ExtractedRecord::figure(1, PathBuf::from("f.png"), "x".into());
        fig.set_keywords(vec![]);
        let records = vec![
            fig,
            ExtractedRecord::embedded_image(1, None, String::new(), String::new()),
            ExtractedRecord::algorithm(2, "Algorithm 1".into(), "Algorithm 1: ADA".into()),
        ];
        let issues = vec![ItemIssue {
            stage: Stage::EmbeddedImages,
            kind: IssueKind::DecodeFailed,
            page: 1,
            item: Some(1),
            detail: "bad".into(),
        }];
        let stats = ExtractionStats::tally(2, 2, &records, &issues);
        assert_eq!(stats.figures, 1);
        assert_eq!(stats.embedded_images, 1);
        assert_eq!(stats.algorithms, 1);
        assert_eq!(stats.enriched, 1);
        assert_eq!(stats.decode_failures, 1);
        assert_eq!(stats.caption_failures, 0);
    }

    #[test]
    fn records_json_uses_two_space_indent() {
        let records = vec![ExtractedRecord::algorithm(1, "Algorithm 1".into(), "Algorithm 1: ADA".into())];
        let json = records_to_json(&records).unwrap();
        assert!(json.starts_with("[\n  {\n    \"type\": \"algorithm\""), "got: {json}");
    }

    #[test]
    fn write_records_is_atomic_and_leaves_no_tmp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(STRUCTURED_OUTPUT_FILE);
        write_records(&path, &[]).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[]");
        assert!(!path.with_extension("json.tmp").exists());
    }
}
