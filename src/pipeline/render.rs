//! PDF rasterisation: render pages to `DynamicImage` via pdfium, lazily.
//!
//! [`Rasterizer::rasterize`] opens the document up front (so an unreadable PDF
//! fails before any recognition call) and returns an iterator that renders
//! one page per `next()`. Only the page currently being recognised is held
//! in memory; the iterator cannot be restarted.
//!
//! ## Pixel cap
//!
//! Page sizes vary wildly: an A3 questionnaire at 200 DPI is already
//! 2340 × 3300 px. `max_rendered_pixels` caps the longest edge regardless of
//! physical size, keeping memory and upload size bounded.
//!
//! ## Blocking
//!
//! pdfium renders synchronously inside `next()`. When the iterator is driven
//! from an async stream, as the orchestrator does, each page render blocks
//! the runtime worker thread for its duration. The open `PdfDocument` is not
//! `Send`, so the work cannot move to `spawn_blocking`.

use crate::config::TranscriptionConfig;
use crate::error::{HandscriptError, PageError};
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::Path;
use tracing::{debug, info};

/// One rendered page.
pub struct Page {
    /// 1-based page number.
    pub page_num: usize,
    pub image: DynamicImage,
}

/// Lazy page sequence returned by [`Rasterizer::rasterize`].
pub type PageIter<'a> = Box<dyn Iterator<Item = Result<Page, PageError>> + 'a>;

/// Turns PDF bytes into page bitmaps.
///
/// The seam exists so the orchestrator can run against a fake in tests and
/// against pdfium in production.
pub trait Rasterizer {
    /// Open `pdf` and return its pages in document order.
    ///
    /// Fails with [`HandscriptError::UnreadablePdf`] when the bytes are not a
    /// PDF. A zero-page document yields an empty iterator. A page that fails
    /// to render yields an `Err` item and the sequence continues.
    fn rasterize<'a>(&'a self, name: &str, pdf: &'a [u8]) -> Result<PageIter<'a>, HandscriptError>;
}

/// Render settings shared by every page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderSettings {
    pub dpi: u32,
    pub max_rendered_pixels: u32,
}

impl RenderSettings {
    pub fn from_config(config: &TranscriptionConfig) -> Self {
        Self {
            dpi: config.dpi,
            max_rendered_pixels: config.max_rendered_pixels,
        }
    }

    /// PDF user space is 72 units per inch.
    pub fn scale(&self) -> f32 {
        self.dpi as f32 / 72.0
    }

    fn render_config(&self) -> PdfRenderConfig {
        PdfRenderConfig::new()
            .scale_page_by_factor(self.scale())
            .set_maximum_width(self.max_rendered_pixels as i32)
            .set_maximum_height(self.max_rendered_pixels as i32)
    }
}

/// [`Rasterizer`] backed by the pdfium C library.
pub struct PdfiumRasterizer {
    pdfium: Pdfium,
    settings: RenderSettings,
}

impl PdfiumRasterizer {
    /// Bind pdfium from `library_path` (a file or the directory holding it),
    /// or from the system library search path when `None`.
    pub fn bind(
        library_path: Option<&Path>,
        settings: RenderSettings,
    ) -> Result<Self, HandscriptError> {
        let bindings = match library_path {
            Some(path) if path.is_dir() => {
                Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(path))
            }
            Some(path) => Pdfium::bind_to_library(path),
            None => Pdfium::bind_to_system_library(),
        }
        .map_err(|e| HandscriptError::PdfiumBindingFailed(format!("{:?}", e)))?;

        debug!("Bound pdfium library (dpi={})", settings.dpi);
        Ok(Self {
            pdfium: Pdfium::new(bindings),
            settings,
        })
    }

    pub fn from_config(config: &TranscriptionConfig) -> Result<Self, HandscriptError> {
        Self::bind(
            config.pdfium_library_path.as_deref(),
            RenderSettings::from_config(config),
        )
    }
}

impl Rasterizer for PdfiumRasterizer {
    fn rasterize<'a>(&'a self, name: &str, pdf: &'a [u8]) -> Result<PageIter<'a>, HandscriptError> {
        if pdf.is_empty() {
            return Err(HandscriptError::UnreadablePdf {
                name: name.to_string(),
                detail: "file is empty".into(),
            });
        }

        let document = self
            .pdfium
            .load_pdf_from_byte_slice(pdf, None)
            .map_err(|e| HandscriptError::UnreadablePdf {
                name: name.to_string(),
                detail: format!("{:?}", e),
            })?;

        let total = document.pages().len();
        info!("{}: PDF loaded, {} pages", name, total);

        Ok(Box::new(PdfiumPages {
            document,
            render_config: self.settings.render_config(),
            next: 0,
            total,
        }))
    }
}

/// Renders one page per `next()` from an open document.
///
/// Each call blocks the calling thread until pdfium finishes the page.
struct PdfiumPages<'a> {
    document: PdfDocument<'a>,
    render_config: PdfRenderConfig,
    next: u16,
    total: u16,
}

impl Iterator for PdfiumPages<'_> {
    type Item = Result<Page, PageError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.total {
            return None;
        }
        let idx = self.next;
        self.next += 1;
        let page_num = idx as usize + 1;

        let rendered = self
            .document
            .pages()
            .get(idx)
            .and_then(|page| {
                page.render_with_config(&self.render_config)
                    .map(|bitmap| bitmap.as_image())
            })
            .map_err(|e| PageError::RenderFailed {
                page: page_num,
                detail: format!("{:?}", e),
            });

        Some(rendered.map(|image| {
            debug!(
                "Rendered page {} → {}x{} px",
                page_num,
                image.width(),
                image.height()
            );
            Page { page_num, image }
        }))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = (self.total - self.next) as usize;
        (left, Some(left))
    }
}

/// Decode an image upload as a one-page sequence.
pub fn image_pages(name: &str, bytes: &[u8]) -> Result<PageIter<'static>, HandscriptError> {
    let image = image::load_from_memory(bytes).map_err(|e| HandscriptError::UnreadableImage {
        name: name.to_string(),
        detail: e.to_string(),
    })?;
    debug!("{}: decoded image {}x{} px", name, image.width(), image.height());
    Ok(Box::new(std::iter::once(Ok(Page { page_num: 1, image }))))
}
