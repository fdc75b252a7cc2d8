//! `DocumentSource` backed by pdfium via `pdfium-render`.
//!
//! pdfium keeps thread-local state and is not async-safe, so everything in
//! this module is blocking; the async entry points in [`crate::extract`]
//! call it from `tokio::task::spawn_blocking`.
//!
//! ## Embedded images
//!
//! Images are collected from the whole page object tree, including the
//! children of form XObjects. One image drawn several times is one
//! [`ImageRef`] with several placements, identified by its stored stream.
//!
//! A stream with a single `DCTDecode` or `JPXDecode` filter is a complete
//! JPEG or JPEG 2000 file and is handed over as stored (`jpeg` / `jpx`).
//! Any other encoding has no standalone file format, so its decoded raster
//! is encoded to PNG once.

use super::{DocumentSource, ImageRef, RawImage, Rect};
use crate::error::{SamplerError, SourceError};
use crate::output::DocumentMetadata;
use crate::pipeline::encode;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

/// Bind to a pdfium shared library.
///
/// Resolution order: `PDFIUM_LIB_PATH`, a library next to the working
/// directory, then the system library search path.
pub fn bind_pdfium() -> Result<Pdfium, SamplerError> {
    let bindings = match std::env::var("PDFIUM_LIB_PATH") {
        Ok(path) if !path.is_empty() => Pdfium::bind_to_library(&path)
            .map_err(|e| SamplerError::PdfiumBindingFailed(format!("{path}: {e:?}")))?,
        _ => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library())
            .map_err(|e| SamplerError::PdfiumBindingFailed(format!("{e:?}")))?,
    };
    Ok(Pdfium::new(bindings))
}

/// Open a PDF, mapping pdfium's error into the fatal taxonomy.
pub fn open_document<'a>(
    pdfium: &'a Pdfium,
    pdf_path: &Path,
    password: Option<&'a str>,
) -> Result<PdfDocument<'a>, SamplerError> {
    pdfium.load_pdf_from_file(pdf_path, password).map_err(|e| {
        let err_str = format!("{:?}", e);
        if err_str.contains("Password") || err_str.contains("password") {
            if password.is_some() {
                SamplerError::WrongPassword {
                    path: pdf_path.to_path_buf(),
                }
            } else {
                SamplerError::PasswordRequired {
                    path: pdf_path.to_path_buf(),
                }
            }
        } else {
            SamplerError::CorruptPdf {
                path: pdf_path.to_path_buf(),
                detail: err_str,
            }
        }
    })
}

/// An open pdfium document.
pub struct PdfiumSource<'a> {
    document: PdfDocument<'a>,
}

impl<'a> PdfiumSource<'a> {
    pub fn new(document: PdfDocument<'a>) -> Self {
        info!("PDF loaded: {} pages", document.pages().len());
        Self { document }
    }

    fn page(&self, page: usize) -> Result<PdfPage<'a>, SourceError> {
        self.document
            .pages()
            .get(page as u16)
            .map_err(|e| SourceError::Page {
                page: page + 1,
                detail: format!("{:?}", e),
            })
    }

    fn catalogue(&self, page: usize) -> Result<ImageCatalogue, SourceError> {
        let p = self.page(page)?;
        let page_height = p.height().value;
        let mut catalogue = ImageCatalogue::default();
        visit_images(
            p.objects().iter(),
            &mut Vec::new(),
            &mut |image: &PdfPageImageObject<'_>, bounds: Option<PdfRect>| {
                let stored = image.get_raw_image_data().unwrap_or_default();
                catalogue.add(stored, bounds.map(|b| to_page_space(&b, page_height)));
            },
        );
        debug!("Page {}: {} distinct images", page + 1, catalogue.len());
        Ok(catalogue)
    }
}

/// Convert a pdfium rectangle (bottom-left origin) into page space.
fn to_page_space(rect: &PdfRect, page_height: f32) -> Rect {
    Rect {
        x0: rect.left().value,
        y0: page_height - rect.top().value,
        x1: rect.right().value,
        y1: page_height - rect.bottom().value,
    }
}

fn from_page_space(rect: &Rect, page_height: f32) -> PdfRect {
    PdfRect::new_from_values(
        page_height - rect.y1,
        rect.x0,
        page_height - rect.y0,
        rect.x1,
    )
}

/// Map a rectangle from the innermost form space to page coordinates.
///
/// `forms` lists the enclosing form matrices, outermost first.
fn to_page_coordinates(rect: PdfRect, forms: &[PdfMatrix]) -> PdfRect {
    if forms.is_empty() {
        return rect;
    }
    let corners = [
        (rect.left(), rect.bottom()),
        (rect.left(), rect.top()),
        (rect.right(), rect.bottom()),
        (rect.right(), rect.top()),
    ]
    .map(|(x, y)| {
        forms
            .iter()
            .rev()
            .fold((x, y), |(x, y), matrix| matrix.apply_to_points(x, y))
    });

    let xs = corners.map(|(x, _)| x.value);
    let ys = corners.map(|(_, y)| y.value);
    let min = |v: [f32; 4]| v.into_iter().fold(f32::INFINITY, f32::min);
    let max = |v: [f32; 4]| v.into_iter().fold(f32::NEG_INFINITY, f32::max);
    PdfRect::new_from_values(min(ys), min(xs), max(ys), max(xs))
}

/// Walk a page object tree depth-first, calling `visit` for every image
/// object with its bounds in page coordinates.
fn visit_images<'b, I>(
    objects: I,
    forms: &mut Vec<PdfMatrix>,
    visit: &mut dyn FnMut(&PdfPageImageObject<'_>, Option<PdfRect>),
) where
    I: Iterator<Item = PdfPageObject<'b>>,
{
    for object in objects {
        if let Some(image) = object.as_image_object() {
            let bounds = object
                .bounds()
                .ok()
                .map(|quad| to_page_coordinates(quad.to_rect(), forms));
            visit(image, bounds);
        } else if let Some(form) = object.as_x_object_form_object() {
            match object.matrix() {
                Ok(matrix) => {
                    forms.push(matrix);
                    visit_images(form.iter(), forms, visit);
                    forms.pop();
                }
                Err(e) => debug!("Skipping form object without a matrix: {:?}", e),
            }
        }
    }
}

/// Distinct images of one page in first-drawn order.
#[derive(Debug, Default)]
struct ImageCatalogue {
    entries: Vec<CatalogueEntry>,
    by_stream: HashMap<Vec<u8>, usize>,
    visited: usize,
}

#[derive(Debug, Clone, PartialEq)]
struct CatalogueEntry {
    /// Position of the first drawing among all image objects visited.
    first_visit: usize,
    placements: Vec<Rect>,
}

impl ImageCatalogue {
    /// Record one drawn image object. An empty stream cannot be matched
    /// against anything and always starts a new entry.
    fn add(&mut self, stored: Vec<u8>, placement: Option<Rect>) {
        let known = if stored.is_empty() {
            None
        } else {
            self.by_stream.get(&stored).copied()
        };

        match known {
            Some(index) => self.entries[index].placements.extend(placement),
            None => {
                if !stored.is_empty() {
                    self.by_stream.insert(stored, self.entries.len());
                }
                self.entries.push(CatalogueEntry {
                    first_visit: self.visited,
                    placements: placement.into_iter().collect(),
                });
            }
        }
        self.visited += 1;
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn get(&self, image: ImageRef) -> Option<&CatalogueEntry> {
        self.entries.get(image.0)
    }
}

/// File extension for streams that are already a standalone image file.
fn passthrough_extension<S: AsRef<str>>(filters: &[S]) -> Option<&'static str> {
    match filters {
        [only] => match only.as_ref() {
            "DCTDecode" => Some("jpeg"),
            "JPXDecode" => Some("jpx"),
            _ => None,
        },
        _ => None,
    }
}

fn stored_image(image: &PdfPageImageObject<'_>) -> Result<RawImage, String> {
    let filters: Vec<String> = image
        .filters()
        .iter()
        .map(|filter| filter.name().to_string())
        .collect();

    if let Some(extension) = passthrough_extension(filters.as_slice()) {
        let bytes = image.get_raw_image_data().map_err(|e| format!("{:?}", e))?;
        if !bytes.is_empty() {
            return Ok(RawImage {
                bytes,
                extension: extension.to_string(),
            });
        }
    }

    let raster = image.get_raw_image().map_err(|e| format!("{:?}", e))?;
    let bytes = encode::png_bytes(&raster).map_err(|e| e.to_string())?;
    Ok(RawImage {
        bytes,
        extension: "png".to_string(),
    })
}

impl DocumentSource for PdfiumSource<'_> {
    fn page_count(&self) -> usize {
        self.document.pages().len() as usize
    }

    fn page_bounds(&self, page: usize) -> Result<Rect, SourceError> {
        let p = self.page(page)?;
        Ok(Rect::new(0.0, 0.0, p.width().value, p.height().value))
    }

    fn render_page(&self, page: usize, scale: f32) -> Result<DynamicImage, SourceError> {
        let p = self.page(page)?;
        let render_config = PdfRenderConfig::new().scale_page_by_factor(scale);
        let bitmap = p
            .render_with_config(&render_config)
            .map_err(|e| SourceError::Render {
                page: page + 1,
                detail: format!("{:?}", e),
            })?;
        let image = bitmap.as_image();
        debug!(
            "Rendered page {} → {}x{} px",
            page + 1,
            image.width(),
            image.height()
        );
        Ok(image)
    }

    fn page_text(&self, page: usize) -> Result<String, SourceError> {
        let p = self.page(page)?;
        let text = p.text().map_err(|e| SourceError::Text {
            page: page + 1,
            detail: format!("{:?}", e),
        })?;
        Ok(text.all())
    }

    fn embedded_images(&self, page: usize) -> Result<Vec<ImageRef>, SourceError> {
        Ok((0..self.catalogue(page)?.len()).map(ImageRef).collect())
    }

    fn extract_image(&self, page: usize, image: ImageRef) -> Result<RawImage, SourceError> {
        let image_err = |detail: String| SourceError::Image {
            page: page + 1,
            index: image.0 + 1,
            detail,
        };

        let catalogue = self.catalogue(page)?;
        let wanted = catalogue
            .get(image)
            .ok_or_else(|| image_err("no such image".into()))?
            .first_visit;

        let p = self.page(page)?;
        let mut visited = 0usize;
        let mut extracted = None;
        visit_images(
            p.objects().iter(),
            &mut Vec::new(),
            &mut |object: &PdfPageImageObject<'_>, _: Option<PdfRect>| {
                if visited == wanted {
                    extracted = Some(stored_image(object));
                }
                visited += 1;
            },
        );

        let raw = extracted
            .ok_or_else(|| image_err("image object disappeared".into()))?
            .map_err(image_err)?;
        debug!(
            "Page {}: image {} is {} bytes of {}",
            page + 1,
            image.0 + 1,
            raw.bytes.len(),
            raw.extension
        );
        Ok(raw)
    }

    fn placement_rects(&self, page: usize, image: ImageRef) -> Result<Vec<Rect>, SourceError> {
        let catalogue = self.catalogue(page)?;
        let entry = catalogue.get(image).ok_or_else(|| SourceError::Geometry {
            page: page + 1,
            detail: format!("no image {}", image.0 + 1),
        })?;
        Ok(entry.placements.clone())
    }

    fn text_in_rect(&self, page: usize, rect: Rect) -> Result<String, SourceError> {
        let p = self.page(page)?;
        let page_height = p.height().value;
        let text = p.text().map_err(|e| SourceError::Text {
            page: page + 1,
            detail: format!("{:?}", e),
        })?;
        Ok(text.inside_rect(from_page_space(&rect, page_height)))
    }
}

/// Extract document metadata without touching page content.
pub fn read_metadata(document: &PdfDocument<'_>) -> DocumentMetadata {
    let metadata = document.metadata();

    let get_meta = |tag: PdfDocumentMetadataTagType| -> Option<String> {
        metadata.get(tag).and_then(|t| {
            let v = t.value().to_string();
            if v.is_empty() {
                None
            } else {
                Some(v)
            }
        })
    };

    DocumentMetadata {
        title: get_meta(PdfDocumentMetadataTagType::Title),
        author: get_meta(PdfDocumentMetadataTagType::Author),
        subject: get_meta(PdfDocumentMetadataTagType::Subject),
        creator: get_meta(PdfDocumentMetadataTagType::Creator),
        producer: get_meta(PdfDocumentMetadataTagType::Producer),
        creation_date: get_meta(PdfDocumentMetadataTagType::CreationDate),
        page_count: document.pages().len() as usize,
        pdf_version: format!("{:?}", document.version()),
    }
}
