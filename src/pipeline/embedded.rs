//! Embedded image stage: every raster image placed on a page yields exactly
//! one record.
//!
//! Per image: save the bytes as extracted, read the text in a strip below
//! the first placement as the raw caption, decode to RGB and caption.
//! Missing bytes, geometry or text only empty the affected field.

use super::StageContext;
use crate::error::{IssueKind, SamplerError, SourceError, Stage};
use crate::record::ExtractedRecord;
use crate::source::{ImageRef, Rect};
use image::DynamicImage;
use std::path::PathBuf;
use tracing::debug;

pub fn extract_embedded_images(
    ctx: &mut StageContext<'_>,
) -> Result<Vec<ExtractedRecord>, SamplerError> {
    ctx.run_stage(Stage::EmbeddedImages, images_on_page)
}

fn images_on_page(
    ctx: &mut StageContext<'_>,
    page: usize,
) -> Result<Vec<ExtractedRecord>, SamplerError> {
    let page_num = page + 1;

    let listed = ctx.source.embedded_images(page);
    let images = ctx.degrade(
        listed,
        Stage::EmbeddedImages,
        IssueKind::ImageUnavailable,
        page_num,
        None,
    );
    debug!("Page {}: {} embedded images", page_num, images.len());

    let mut records = Vec::with_capacity(images.len());
    for (i, image) in images.into_iter().enumerate() {
        records.push(one_image(ctx, page, i + 1, image)?);
    }
    Ok(records)
}

fn one_image(
    ctx: &mut StageContext<'_>,
    page: usize,
    index: usize,
    image: ImageRef,
) -> Result<ExtractedRecord, SamplerError> {
    let page_num = page + 1;
    let item = Some(index);

    // Bytes: written verbatim before the record exists.
    let extracted = ctx.source.extract_image(page, image).map(Some);
    let raw = ctx.degrade(
        extracted,
        Stage::EmbeddedImages,
        IssueKind::ImageUnavailable,
        page_num,
        item,
    );
    let image_path: Option<PathBuf> = match &raw {
        Some(raw) => {
            let path = ctx.layout.image_path(page_num, index, &raw.extension);
            ctx.layout.write_bytes(&path, &raw.bytes)?;
            debug!("Page {}: saved {} ({} bytes)", page_num, path.display(), raw.bytes.len());
            Some(path)
        }
        None => None,
    };

    let caption_raw = raw_caption(ctx, page, index, image);

    let image_caption = match &raw {
        Some(raw) => {
            let decoded = image::load_from_memory(&raw.bytes)
                .map(|img| Some(DynamicImage::ImageRgb8(img.to_rgb8())));
            match ctx.degrade(decoded, Stage::EmbeddedImages, IssueKind::DecodeFailed, page_num, item) {
                Some(rgb) => {
                    let captioned = ctx.models.captioner.caption(&rgb);
                    ctx.degrade(
                        captioned,
                        Stage::EmbeddedImages,
                        IssueKind::CaptionFailed,
                        page_num,
                        item,
                    )
                }
                None => String::new(),
            }
        }
        None => String::new(),
    };

    Ok(ExtractedRecord::embedded_image(
        page_num,
        image_path,
        caption_raw,
        image_caption,
    ))
}

/// Text in the strip below the image's first placement, trimmed.
fn raw_caption(ctx: &mut StageContext<'_>, page: usize, index: usize, image: ImageRef) -> String {
    let page_num = page + 1;
    let item = Some(index);

    let placements = ctx.source.placement_rects(page, image);
    let placements = ctx.degrade(
        placements,
        Stage::EmbeddedImages,
        IssueKind::GeometryUnavailable,
        page_num,
        item,
    );
    let Some(placement) = placements.first().copied() else {
        debug!("Page {}: image {} has no placement", page_num, index);
        return String::new();
    };

    let bounds = ctx.source.page_bounds(page).map(Some);
    let Some(bounds) = ctx.degrade(
        bounds,
        Stage::EmbeddedImages,
        IssueKind::GeometryUnavailable,
        page_num,
        item,
    ) else {
        return String::new();
    };

    let strip: Rect = placement.strip_below(&bounds, ctx.config.caption_search_height);
    if strip.is_empty() {
        return String::new();
    }

    let text: Result<String, SourceError> = ctx.source.text_in_rect(page, strip);
    ctx.degrade(
        text,
        Stage::EmbeddedImages,
        IssueKind::TextUnavailable,
        page_num,
        item,
    )
    .trim()
    .to_string()
}
