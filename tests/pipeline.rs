//! Pipeline integration tests over an in-memory document.
//!
//! No pdfium, no network: `MemoryDocument` implements `DocumentSource`, and
//! the detector, captioner and entity extractor are deterministic doubles.

use edgequake_pdfsampler::models::entities::RegexEntityExtractor;
use edgequake_pdfsampler::{
    extract_document, BoundingBox, Captioner, DocumentSource, Entity, EntityExtractor,
    ExtractedRecord, ExtractionConfig, ExtractionProgressCallback, ImageRef, IssueKind, ItemIssue,
    ModelError, Models, OutputLayout, PageSelection, RawImage, Rect, Region, RegionCategory,
    RegionDetector, RecordKind, SamplerError, SourceError, Stage,
};
use image::{DynamicImage, Rgb, RgbImage};
use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;
use std::sync::{Arc, Mutex};

// ── In-memory document ───────────────────────────────────────────────────────

const LETTER: Rect = Rect {
    x0: 0.0,
    y0: 0.0,
    x1: 612.0,
    y1: 792.0,
};

struct MemoryImage {
    raw: Option<RawImage>,
    placements: Vec<Rect>,
}

struct MemoryPage {
    /// `None` makes rendering fail.
    bitmap: Option<DynamicImage>,
    text: String,
    images: Vec<MemoryImage>,
    /// Text blocks and where they sit on the page.
    blocks: Vec<(Rect, String)>,
}

impl MemoryPage {
    fn blank(width: u32) -> Self {
        Self {
            bitmap: Some(page_bitmap(width, 300)),
            text: String::new(),
            images: Vec::new(),
            blocks: Vec::new(),
        }
    }
}

struct MemoryDocument {
    pages: Vec<MemoryPage>,
    rect_queries: RefCell<Vec<(usize, Rect)>>,
}

impl MemoryDocument {
    fn new(pages: Vec<MemoryPage>) -> Self {
        Self {
            pages,
            rect_queries: RefCell::new(Vec::new()),
        }
    }

    fn page(&self, page: usize) -> Result<&MemoryPage, SourceError> {
        self.pages.get(page).ok_or(SourceError::Page {
            page: page + 1,
            detail: "no such page".into(),
        })
    }

    fn image(&self, page: usize, image: ImageRef) -> Result<&MemoryImage, SourceError> {
        self.page(page)?.images.get(image.0).ok_or(SourceError::Image {
            page: page + 1,
            index: image.0 + 1,
            detail: "no such image".into(),
        })
    }
}

fn intersects(a: &Rect, b: &Rect) -> bool {
    a.x0 < b.x1 && b.x0 < a.x1 && a.y0 < b.y1 && b.y0 < a.y1
}

impl DocumentSource for MemoryDocument {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_bounds(&self, page: usize) -> Result<Rect, SourceError> {
        self.page(page).map(|_| LETTER)
    }

    fn render_page(&self, page: usize, _scale: f32) -> Result<DynamicImage, SourceError> {
        self.page(page)?.bitmap.clone().ok_or(SourceError::Render {
            page: page + 1,
            detail: "broken content stream".into(),
        })
    }

    fn page_text(&self, page: usize) -> Result<String, SourceError> {
        Ok(self.page(page)?.text.clone())
    }

    fn embedded_images(&self, page: usize) -> Result<Vec<ImageRef>, SourceError> {
        Ok((0..self.page(page)?.images.len()).map(ImageRef).collect())
    }

    fn extract_image(&self, page: usize, image: ImageRef) -> Result<RawImage, SourceError> {
        self.image(page, image)?.raw.clone().ok_or(SourceError::Image {
            page: page + 1,
            index: image.0 + 1,
            detail: "unsupported filter".into(),
        })
    }

    fn placement_rects(&self, page: usize, image: ImageRef) -> Result<Vec<Rect>, SourceError> {
        Ok(self.image(page, image)?.placements.clone())
    }

    fn text_in_rect(&self, page: usize, rect: Rect) -> Result<String, SourceError> {
        self.rect_queries.borrow_mut().push((page, rect));
        let texts: Vec<&str> = self
            .page(page)?
            .blocks
            .iter()
            .filter(|(r, _)| intersects(r, &rect))
            .map(|(_, t)| t.as_str())
            .collect();
        Ok(texts.join("\n"))
    }
}

// ── Test doubles ─────────────────────────────────────────────────────────────

/// Regions keyed by bitmap width, so each page can answer differently.
#[derive(Default)]
struct WidthKeyedDetector {
    by_width: HashMap<u32, Result<Vec<Region>, ModelError>>,
}

impl RegionDetector for WidthKeyedDetector {
    fn detect(&self, image: &DynamicImage) -> Result<Vec<Region>, ModelError> {
        self.by_width
            .get(&image.width())
            .cloned()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

/// "Adaptive plot, {w}x{h}"; fails for crops of width `fail_width` and
/// answers with whitespace only for crops of width `blank_width`.
#[derive(Default)]
struct SizeCaptioner {
    fail_width: Option<u32>,
    blank_width: Option<u32>,
}

impl Captioner for SizeCaptioner {
    fn caption(&self, image: &DynamicImage) -> Result<String, ModelError> {
        if Some(image.width()) == self.fail_width {
            return Err(ModelError::Api {
                retries: 2,
                detail: "HTTP 503".into(),
            });
        }
        if Some(image.width()) == self.blank_width {
            return Ok(" \n  ".to_string());
        }
        Ok(format!("Adaptive plot, {}x{}", image.width(), image.height()))
    }
}

struct FailingExtractor;

impl EntityExtractor for FailingExtractor {
    fn extract(&self, _text: &str) -> Result<Vec<Entity>, ModelError> {
        Err(ModelError::Other("model not loaded".into()))
    }
}

fn models(detector: WidthKeyedDetector, captioner: SizeCaptioner) -> Models {
    Models::new(
        Arc::new(detector),
        Arc::new(captioner),
        Arc::new(RegexEntityExtractor::new()),
    )
}

// ── Fixtures ─────────────────────────────────────────────────────────────────

fn page_bitmap(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 200) as u8 + 20, (y % 200) as u8 + 20, 120])
    }))
}

fn png_image(width: u32, height: u32) -> RawImage {
    let mut bytes = Vec::new();
    page_bitmap(width, height)
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    RawImage {
        bytes,
        extension: "png".into(),
    }
}

fn region(category: RegionCategory, x1: f32, y1: f32, x2: f32, y2: f32) -> Region {
    Region {
        category,
        bbox: BoundingBox::new(x1, y1, x2, y2),
        score: 0.9,
    }
}

/// Page 1 of a typical paper: two figures, a table, one embedded image
/// with a caption below it, and two algorithm headings.
fn rich_page() -> (MemoryPage, Vec<Region>) {
    let regions = vec![
        region(RegionCategory::Figure, 10.0, 10.0, 110.0, 60.0),
        region(RegionCategory::Table, 0.0, 0.0, 50.0, 50.0),
        region(RegionCategory::Figure, 200.0, 100.0, 380.0, 250.0),
        // Entirely outside the 400 px bitmap.
        region(RegionCategory::Figure, 450.0, 10.0, 500.0, 20.0),
    ];
    let page = MemoryPage {
        bitmap: Some(page_bitmap(400, 300)),
        text: "Intro\nAlgorithm 1: ADA Sampling\nbody\nAlgorithm 2: Baseline Method\n".into(),
        images: vec![MemoryImage {
            raw: Some(png_image(30, 20)),
            placements: vec![Rect::new(100.0, 200.0, 300.0, 350.0)],
        }],
        blocks: vec![
            (Rect::new(100.0, 360.0, 300.0, 380.0), "  Figure 2: Accuracy on Ego4D  ".into()),
            (Rect::new(400.0, 360.0, 600.0, 380.0), "sidebar".into()),
        ],
    };
    (page, regions)
}

fn run(
    doc: &MemoryDocument,
    models: &Models,
    dir: &Path,
    config: &ExtractionConfig,
) -> Result<edgequake_pdfsampler::ExtractionOutput, SamplerError> {
    let layout = OutputLayout::new(dir);
    layout.create_dirs()?;
    extract_document(doc, models, &layout, config)
}

fn kinds(records: &[ExtractedRecord]) -> Vec<RecordKind> {
    records.iter().map(|r| r.kind()).collect()
}

// ── Ordering and counts ──────────────────────────────────────────────────────

#[test]
fn records_come_in_stage_order() {
    let (page1, regions) = rich_page();
    let doc = MemoryDocument::new(vec![page1, MemoryPage::blank(401)]);
    let detector = WidthKeyedDetector {
        by_width: HashMap::from([(400, Ok(regions))]),
    };
    let dir = tempfile::tempdir().unwrap();

    let out = run(&doc, &models(detector, SizeCaptioner::default()), dir.path(), &ExtractionConfig::default())
        .unwrap();

    // 2 figures (table and off-page box dropped) + 1 image + 1 algorithm.
    assert_eq!(
        kinds(&out.records),
        vec![
            RecordKind::Figure,
            RecordKind::Figure,
            RecordKind::EmbeddedImage,
            RecordKind::Algorithm
        ]
    );
    assert!(out.records.iter().all(|r| r.page() == 1));
    assert_eq!(out.stats.figures, 2);
    assert_eq!(out.stats.embedded_images, 1);
    assert_eq!(out.stats.algorithms, 1);
    assert_eq!(out.stats.total_pages, 2);
    assert!(out.issues.is_empty(), "issues: {:?}", out.issues);

    let json_path = out.json_path.clone().unwrap();
    let persisted: Vec<ExtractedRecord> =
        serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
    assert_eq!(persisted, out.records);
}

#[test]
fn figure_crops_are_numbered_per_page_and_captioned() {
    let (page1, regions) = rich_page();
    let doc = MemoryDocument::new(vec![page1]);
    let detector = WidthKeyedDetector {
        by_width: HashMap::from([(400, Ok(regions))]),
    };
    let dir = tempfile::tempdir().unwrap();

    let out = run(&doc, &models(detector, SizeCaptioner::default()), dir.path(), &ExtractionConfig::default())
        .unwrap();

    let figures: Vec<&ExtractedRecord> = out
        .records
        .iter()
        .filter(|r| r.kind() == RecordKind::Figure)
        .collect();
    assert_eq!(figures[0].image_path().unwrap(), dir.path().join("figures/page1_fig1.png"));
    assert_eq!(figures[1].image_path().unwrap(), dir.path().join("figures/page1_fig2.png"));
    assert_eq!(figures[0].image_caption(), Some("Adaptive plot, 100x50"));
    assert_eq!(figures[1].image_caption(), Some("Adaptive plot, 180x150"));

    let crop = image::open(dir.path().join("figures/page1_fig2.png")).unwrap();
    assert_eq!((crop.width(), crop.height()), (180, 150));
}

#[test]
fn page_with_nothing_contributes_nothing() {
    let doc = MemoryDocument::new(vec![MemoryPage::blank(400)]);
    let dir = tempfile::tempdir().unwrap();

    let out = run(
        &doc,
        &models(WidthKeyedDetector::default(), SizeCaptioner::default()),
        dir.path(),
        &ExtractionConfig::default(),
    )
    .unwrap();

    assert!(out.records.is_empty());
    assert!(out.issues.is_empty());
    assert_eq!(std::fs::read_to_string(dir.path().join("structured_output.json")).unwrap(), "[]");
}

// ── Embedded images ──────────────────────────────────────────────────────────

#[test]
fn embedded_image_is_written_verbatim() {
    let (page1, _) = rich_page();
    let expected = page1.images[0].raw.as_ref().unwrap().bytes.clone();
    let doc = MemoryDocument::new(vec![page1]);
    let dir = tempfile::tempdir().unwrap();

    let out = run(
        &doc,
        &models(WidthKeyedDetector::default(), SizeCaptioner::default()),
        dir.path(),
        &ExtractionConfig::default(),
    )
    .unwrap();

    let path = dir.path().join("images/page1_img1.png");
    let image = out
        .records
        .iter()
        .find(|r| r.kind() == RecordKind::EmbeddedImage)
        .unwrap();
    assert_eq!(image.image_path(), Some(path.as_path()));
    let written = std::fs::read(&path).unwrap();
    assert_eq!(written.len(), expected.len());
    assert_eq!(written, expected);
}

#[test]
fn raw_caption_comes_from_strip_below_placement() {
    let (page1, _) = rich_page();
    let doc = MemoryDocument::new(vec![page1]);
    let dir = tempfile::tempdir().unwrap();

    let out = run(
        &doc,
        &models(WidthKeyedDetector::default(), SizeCaptioner::default()),
        dir.path(),
        &ExtractionConfig::default(),
    )
    .unwrap();

    assert_eq!(
        doc.rect_queries.borrow().as_slice(),
        &[(0, Rect::new(100.0, 350.0, 300.0, 650.0))]
    );
    match &out.records[0] {
        ExtractedRecord::EmbeddedImage {
            caption_raw,
            image_caption,
            keywords,
            ..
        } => {
            assert_eq!(caption_raw, "Figure 2: Accuracy on Ego4D");
            assert_eq!(image_caption, "Adaptive plot, 30x20");
            // Raw caption wins over the generated one.
            assert_eq!(keywords.as_deref(), Some(&["Ego4D".to_string()][..]));
        }
        other => panic!("expected an embedded image, got {other:?}"),
    }
}

#[test]
fn image_drawn_twice_uses_first_placement() {
    let mut page = MemoryPage::blank(400);
    page.images.push(MemoryImage {
        raw: Some(png_image(12, 12)),
        placements: vec![
            Rect::new(100.0, 100.0, 200.0, 150.0),
            Rect::new(300.0, 500.0, 400.0, 550.0),
        ],
    });
    page.blocks
        .push((Rect::new(100.0, 160.0, 200.0, 175.0), "Figure 1: ADA pipeline".into()));
    page.blocks
        .push((Rect::new(300.0, 560.0, 400.0, 575.0), "Figure 9: unrelated".into()));
    let doc = MemoryDocument::new(vec![page]);
    let dir = tempfile::tempdir().unwrap();

    let out = run(
        &doc,
        &models(WidthKeyedDetector::default(), SizeCaptioner::default()),
        dir.path(),
        &ExtractionConfig::default(),
    )
    .unwrap();

    assert_eq!(out.records.len(), 1);
    assert_eq!(
        doc.rect_queries.borrow().as_slice(),
        &[(0, Rect::new(100.0, 150.0, 200.0, 450.0))]
    );
    assert_eq!(out.records[0].caption_source(), "Figure 1: ADA pipeline");
}

#[test]
fn caption_search_height_is_configurable_and_clipped() {
    let mut page = MemoryPage::blank(400);
    page.images.push(MemoryImage {
        raw: Some(png_image(8, 8)),
        placements: vec![Rect::new(50.0, 700.0, 250.0, 760.0)],
    });
    let doc = MemoryDocument::new(vec![page]);
    let dir = tempfile::tempdir().unwrap();
    let config = ExtractionConfig::builder()
        .caption_search_height(80.0)
        .build()
        .unwrap();

    run(
        &doc,
        &models(WidthKeyedDetector::default(), SizeCaptioner::default()),
        dir.path(),
        &config,
    )
    .unwrap();

    assert_eq!(
        doc.rect_queries.borrow().as_slice(),
        &[(0, Rect::new(50.0, 760.0, 250.0, 792.0))]
    );
}

#[test]
fn single_image_without_placement() {
    let mut page = MemoryPage::blank(400);
    page.images.push(MemoryImage {
        raw: Some(png_image(64, 48)),
        placements: Vec::new(),
    });
    let doc = MemoryDocument::new(vec![page]);
    let dir = tempfile::tempdir().unwrap();

    let out = run(
        &doc,
        &models(WidthKeyedDetector::default(), SizeCaptioner::default()),
        dir.path(),
        &ExtractionConfig::default(),
    )
    .unwrap();

    assert_eq!(out.records.len(), 1);
    match &out.records[0] {
        ExtractedRecord::EmbeddedImage {
            page,
            caption_raw,
            image_caption,
            keywords,
            ..
        } => {
            assert_eq!(*page, 1);
            assert_eq!(caption_raw, "");
            assert_eq!(image_caption, "Adaptive plot, 64x48");
            // Generated caption is the source; a lone capitalised word is
            // not an entity, so the list is present but empty.
            assert_eq!(keywords.as_deref(), Some(&[][..]));
        }
        other => panic!("expected an embedded image, got {other:?}"),
    }
    assert!(doc.rect_queries.borrow().is_empty());
}

#[test]
fn undecodable_image_keeps_record_with_empty_caption() {
    let mut page = MemoryPage::blank(400);
    page.images.push(MemoryImage {
        raw: Some(RawImage {
            bytes: b"\xff\xd8 not really a jpeg".to_vec(),
            extension: "jpeg".into(),
        }),
        placements: Vec::new(),
    });
    let doc = MemoryDocument::new(vec![page]);
    let dir = tempfile::tempdir().unwrap();

    let out = run(
        &doc,
        &models(WidthKeyedDetector::default(), SizeCaptioner::default()),
        dir.path(),
        &ExtractionConfig::default(),
    )
    .unwrap();

    assert_eq!(out.records.len(), 1);
    let record = &out.records[0];
    assert_eq!(record.image_caption(), Some(""));
    // Both caption sources empty: no keywords at all.
    assert_eq!(record.keywords(), None);
    // The file is still there, byte for byte.
    assert!(dir.path().join("images/page1_img1.jpeg").exists());
    assert_eq!(out.stats.decode_failures, 1);
    assert_eq!(out.issues[0].kind, IssueKind::DecodeFailed);
    assert_eq!(out.issues[0].item, Some(1));
}

#[test]
fn unavailable_image_bytes_still_yield_a_record() {
    let mut page = MemoryPage::blank(400);
    page.images.push(MemoryImage {
        raw: None,
        placements: vec![Rect::new(100.0, 100.0, 200.0, 200.0)],
    });
    page.blocks.push((Rect::new(100.0, 210.0, 200.0, 230.0), "Figure 1: GPT-4 outputs".into()));
    let doc = MemoryDocument::new(vec![page]);
    let dir = tempfile::tempdir().unwrap();

    let out = run(
        &doc,
        &models(WidthKeyedDetector::default(), SizeCaptioner::default()),
        dir.path(),
        &ExtractionConfig::default(),
    )
    .unwrap();

    assert_eq!(out.records.len(), 1);
    let record = &out.records[0];
    assert_eq!(record.image_path(), None);
    assert_eq!(record.caption_source(), "Figure 1: GPT-4 outputs");
    assert_eq!(record.keywords(), Some(&["GPT-4".to_string()][..]));
    assert_eq!(out.issues[0].kind, IssueKind::ImageUnavailable);
}

// ── Algorithms ───────────────────────────────────────────────────────────────

#[test]
fn algorithm_headings_need_a_marker() {
    let mut page = MemoryPage::blank(400);
    page.text = "Algorithm 3: Adaptive Sampling\nAlgorithm 2: Baseline Method".into();
    let doc = MemoryDocument::new(vec![MemoryPage::blank(401), page]);
    let dir = tempfile::tempdir().unwrap();

    let out = run(
        &doc,
        &models(WidthKeyedDetector::default(), SizeCaptioner::default()),
        dir.path(),
        &ExtractionConfig::default(),
    )
    .unwrap();

    assert_eq!(
        out.records,
        vec![ExtractedRecord::algorithm(
            2,
            "Algorithm 3".into(),
            "Algorithm 3: Adaptive Sampling".into()
        )]
    );
    assert_eq!(out.records[0].keywords(), None);

    let json = out.records_json().unwrap();
    assert!(!json.contains("image_path"));
    assert!(!json.contains("keywords"));
}

// ── Degradation ──────────────────────────────────────────────────────────────

#[test]
fn failed_caption_empties_only_that_record() {
    let (page1, regions) = rich_page();
    let doc = MemoryDocument::new(vec![page1]);
    let detector = WidthKeyedDetector {
        by_width: HashMap::from([(400, Ok(regions))]),
    };
    let captioner = SizeCaptioner {
        fail_width: Some(100),
        ..Default::default()
    };
    let dir = tempfile::tempdir().unwrap();

    let out = run(&doc, &models(detector, captioner), dir.path(), &ExtractionConfig::default()).unwrap();

    assert_eq!(out.records[0].image_caption(), Some(""));
    assert_eq!(out.records[0].keywords(), None);
    assert!(out.records[0].image_path().unwrap().exists());
    assert_eq!(out.records[1].image_caption(), Some("Adaptive plot, 180x150"));
    assert_eq!(out.records[1].keywords(), Some(&[][..]));

    assert_eq!(out.stats.caption_failures, 1);
    assert_eq!(
        out.issues,
        vec![ItemIssue {
            stage: Stage::Figures,
            kind: IssueKind::CaptionFailed,
            page: 1,
            item: Some(1),
            detail: "model call failed after 2 retries: HTTP 503".into(),
        }]
    );
}

#[test]
fn failed_render_skips_figures_but_not_other_stages() {
    let (mut page1, _) = rich_page();
    page1.bitmap = None;
    let doc = MemoryDocument::new(vec![page1]);
    let dir = tempfile::tempdir().unwrap();

    let out = run(
        &doc,
        &models(WidthKeyedDetector::default(), SizeCaptioner::default()),
        dir.path(),
        &ExtractionConfig::default(),
    )
    .unwrap();

    assert_eq!(kinds(&out.records), vec![RecordKind::EmbeddedImage, RecordKind::Algorithm]);
    assert_eq!(out.issues.len(), 1);
    assert_eq!(out.issues[0].kind, IssueKind::RenderFailed);
    assert_eq!(out.issues[0].stage, Stage::Figures);
}

#[test]
fn failed_detection_is_recorded() {
    let doc = MemoryDocument::new(vec![MemoryPage::blank(400)]);
    let detector = WidthKeyedDetector {
        by_width: HashMap::from([(400, Err(ModelError::MalformedResponse("prose".into())))]),
    };
    let dir = tempfile::tempdir().unwrap();

    let out = run(&doc, &models(detector, SizeCaptioner::default()), dir.path(), &ExtractionConfig::default())
        .unwrap();

    assert!(out.records.is_empty());
    assert_eq!(out.issues[0].kind, IssueKind::DetectionFailed);
}

#[test]
fn failed_entity_extraction_leaves_empty_keywords() {
    let (page1, regions) = rich_page();
    let doc = MemoryDocument::new(vec![page1]);
    let detector = WidthKeyedDetector {
        by_width: HashMap::from([(400, Ok(regions))]),
    };
    let models = Models::new(
        Arc::new(detector),
        Arc::new(SizeCaptioner::default()),
        Arc::new(FailingExtractor),
    );
    let dir = tempfile::tempdir().unwrap();

    let out = run(&doc, &models, dir.path(), &ExtractionConfig::default()).unwrap();

    for record in out.records.iter().filter(|r| r.kind() != RecordKind::Algorithm) {
        assert_eq!(record.keywords(), Some(&[][..]));
    }
    assert_eq!(out.stats.entity_failures, 3);
    assert!(out.issues.iter().all(|i| i.stage == Stage::Keywords));
}

// ── Keywords ─────────────────────────────────────────────────────────────────

#[test]
fn keywords_follow_caption_source() {
    let (page1, regions) = rich_page();
    let doc = MemoryDocument::new(vec![page1]);
    let detector = WidthKeyedDetector {
        by_width: HashMap::from([(400, Ok(regions))]),
    };
    let captioner = SizeCaptioner {
        blank_width: Some(180),
        ..Default::default()
    };
    let dir = tempfile::tempdir().unwrap();

    let out = run(&doc, &models(detector, captioner), dir.path(), &ExtractionConfig::default()).unwrap();

    for record in &out.records {
        let has_source = !record.caption_source().is_empty();
        match record.kind() {
            RecordKind::Algorithm => assert_eq!(record.keywords(), None),
            _ => assert_eq!(record.keywords().is_some(), has_source, "{record:?}"),
        }
    }
    // A whitespace-only reply is no caption at all.
    assert_eq!(out.records[1].image_caption(), Some(""));
    assert_eq!(out.records[1].keywords(), None);
}

// ── Run-level behaviour ──────────────────────────────────────────────────────

#[test]
fn repeated_runs_write_identical_json() {
    let dir = tempfile::tempdir().unwrap();
    let json_path = dir.path().join("structured_output.json");

    let mut outputs = Vec::new();
    for _ in 0..2 {
        let (page1, regions) = rich_page();
        let doc = MemoryDocument::new(vec![page1, MemoryPage::blank(401)]);
        let detector = WidthKeyedDetector {
            by_width: HashMap::from([(400, Ok(regions))]),
        };
        run(&doc, &models(detector, SizeCaptioner::default()), dir.path(), &ExtractionConfig::default())
            .unwrap();
        outputs.push(std::fs::read(&json_path).unwrap());
    }

    assert_eq!(outputs[0], outputs[1]);
}

#[test]
fn page_selection_limits_every_stage() {
    let (page1, regions) = rich_page();
    let mut page2 = MemoryPage::blank(401);
    page2.text = "Algorithm 7: ADA refinement".into();
    let doc = MemoryDocument::new(vec![page1, page2]);
    let detector = WidthKeyedDetector {
        by_width: HashMap::from([(400, Ok(regions))]),
    };
    let config = ExtractionConfig::builder()
        .pages(PageSelection::Single(2))
        .build()
        .unwrap();
    let dir = tempfile::tempdir().unwrap();

    let out = run(&doc, &models(detector, SizeCaptioner::default()), dir.path(), &config).unwrap();

    assert_eq!(out.records.len(), 1);
    assert_eq!(out.records[0].page(), 2);
    assert_eq!(out.stats.selected_pages, 1);
}

#[test]
fn selection_past_the_end_is_fatal() {
    let doc = MemoryDocument::new(vec![MemoryPage::blank(400)]);
    let config = ExtractionConfig::builder()
        .pages(PageSelection::Single(5))
        .build()
        .unwrap();
    let dir = tempfile::tempdir().unwrap();

    let err = run(
        &doc,
        &models(WidthKeyedDetector::default(), SizeCaptioner::default()),
        dir.path(),
        &config,
    )
    .unwrap_err();

    assert!(matches!(err, SamplerError::PageOutOfRange { page: 5, total: 1 }));
    assert!(!dir.path().join("structured_output.json").exists());
}

#[test]
fn missing_output_directory_is_fatal() {
    let (page1, regions) = rich_page();
    let doc = MemoryDocument::new(vec![page1]);
    let detector = WidthKeyedDetector {
        by_width: HashMap::from([(400, Ok(regions))]),
    };
    let dir = tempfile::tempdir().unwrap();
    // Directories deliberately not created.
    let layout = OutputLayout::new(dir.path().join("missing"));

    let err = extract_document(
        &doc,
        &models(detector, SizeCaptioner::default()),
        &layout,
        &ExtractionConfig::default(),
    )
    .unwrap_err();

    assert!(matches!(err, SamplerError::OutputWriteFailed { .. }));
}

#[derive(Default)]
struct RecordingCallback {
    events: Mutex<Vec<String>>,
}

impl ExtractionProgressCallback for RecordingCallback {
    fn on_extraction_start(&self, total_pages: usize) {
        self.events.lock().unwrap().push(format!("start {total_pages}"));
    }

    fn on_stage_start(&self, stage: Stage, _total_pages: usize) {
        self.events.lock().unwrap().push(format!("stage {stage}"));
    }

    fn on_page_complete(&self, stage: Stage, page_num: usize, records: usize) {
        self.events
            .lock()
            .unwrap()
            .push(format!("{stage} p{page_num} {records}"));
    }

    fn on_item_issue(&self, issue: &ItemIssue) {
        self.events.lock().unwrap().push(format!("issue {:?}", issue.kind));
    }

    fn on_extraction_complete(&self, total_records: usize) {
        self.events.lock().unwrap().push(format!("done {total_records}"));
    }
}

#[test]
fn progress_callback_sees_every_stage_and_page() {
    let (page1, regions) = rich_page();
    let doc = MemoryDocument::new(vec![page1, MemoryPage::blank(401)]);
    let detector = WidthKeyedDetector {
        by_width: HashMap::from([(400, Ok(regions))]),
    };
    let callback = Arc::new(RecordingCallback::default());
    let config = ExtractionConfig::builder()
        .progress_callback(callback.clone())
        .build()
        .unwrap();
    let dir = tempfile::tempdir().unwrap();

    run(&doc, &models(detector, SizeCaptioner::default()), dir.path(), &config).unwrap();

    let events = callback.events.lock().unwrap().clone();
    assert_eq!(
        events,
        vec![
            "start 2",
            "stage figures",
            "figures p1 2",
            "figures p2 0",
            "stage embedded images",
            "embedded images p1 1",
            "embedded images p2 0",
            "stage algorithms",
            "algorithms p1 1",
            "algorithms p2 0",
            "done 4",
        ]
    );
}
