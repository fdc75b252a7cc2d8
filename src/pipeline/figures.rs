//! Figure stage: render each page, keep the detector's figure regions,
//! crop, auto-contrast, save as PNG and caption.
//!
//! Crops are numbered per page in detector order among the *retained*
//! regions, so `page3_fig2.png` is the second figure kept on page 3.

use super::{contrast, encode, StageContext};
use crate::error::{IssueKind, SamplerError, Stage};
use crate::models::RegionCategory;
use crate::record::ExtractedRecord;
use tracing::debug;

pub fn extract_figures(ctx: &mut StageContext<'_>) -> Result<Vec<ExtractedRecord>, SamplerError> {
    ctx.run_stage(Stage::Figures, figures_on_page)
}

fn figures_on_page(
    ctx: &mut StageContext<'_>,
    page: usize,
) -> Result<Vec<ExtractedRecord>, SamplerError> {
    let page_num = page + 1;

    let rendered = ctx.source.render_page(page, ctx.config.render_scale).map(Some);
    let Some(bitmap) = ctx.degrade(rendered, Stage::Figures, IssueKind::RenderFailed, page_num, None)
    else {
        return Ok(Vec::new());
    };

    let detected = ctx.models.detector.detect(&bitmap);
    let regions = ctx.degrade(detected, Stage::Figures, IssueKind::DetectionFailed, page_num, None);
    debug!("Page {}: {} regions detected", page_num, regions.len());

    let (width, height) = (bitmap.width(), bitmap.height());
    let mut records = Vec::new();

    for region in regions.iter().filter(|r| r.category == RegionCategory::Figure) {
        let Some((x, y, w, h)) = region.bbox.to_pixel_bounds(width, height) else {
            debug!("Page {}: skipping degenerate box {:?}", page_num, region.bbox);
            continue;
        };
        let index = records.len() + 1;

        let crop = contrast::autocontrast(&bitmap.crop_imm(x, y, w, h));
        let path = ctx.layout.figure_path(page_num, index);
        let png = encode::png_bytes(&crop)
            .map_err(|e| SamplerError::Internal(format!("PNG encoding of {}: {e}", path.display())))?;
        ctx.layout.write_bytes(&path, &png)?;
        debug!("Page {}: saved {} ({}x{})", page_num, path.display(), w, h);

        let captioned = ctx.models.captioner.caption(&crop);
        let caption = ctx.degrade(
            captioned,
            Stage::Figures,
            IssueKind::CaptionFailed,
            page_num,
            Some(index),
        );

        records.push(ExtractedRecord::figure(page_num, path, caption));
    }

    Ok(records)
}
