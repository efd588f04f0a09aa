//! PDF rasterization and re-assembly.
//!
//! The workflow consumes [`PdfRasterizer`] and [`PdfAssembler`]; both are
//! implemented by [`PdfiumBackend`].
//!
//! # Dependencies
//!
//! [`PdfiumBackend`] uses the `pdfium-render` crate, which requires the
//! PDFium library at runtime (bundled next to the binary or installed
//! system-wide). When neither can be bound, calls fail with
//! [`PdfError::Unavailable`].

use std::sync::Arc;

use image::{DynamicImage, RgbImage};
use pdfium_render::prelude::*;
use tracing::{debug, info, warn};

use super::error::PdfError;
use crate::session::PdfMetadata;
use crate::utils::config::PdfConfig;
use crate::utils::image_utils::blank_page;

/// Page images of a rasterized document, in page order.
#[derive(Debug, Clone)]
pub struct RasterizedPdf {
    pub pages: Vec<RgbImage>,
    pub metadata: PdfMetadata,
}

pub trait PdfRasterizer: Send + Sync {
    fn rasterize(&self, bytes: &[u8]) -> Result<RasterizedPdf, PdfError>;
}

pub trait PdfAssembler: Send + Sync {
    fn assemble(&self, pages: &[Arc<RgbImage>]) -> Result<Vec<u8>, PdfError>;
}

/// PDFium-backed rasterizer and assembler.
#[derive(Debug, Clone, Default)]
pub struct PdfiumBackend {
    config: PdfConfig,
}

/// A4 at `dpi`, in pixels.
fn a4_pixels(dpi: f32) -> (u32, u32) {
    let width = (210.0 / 25.4 * dpi).round().max(1.0) as u32;
    let height = (297.0 / 25.4 * dpi).round().max(1.0) as u32;
    (width, height)
}

/// PDFium renders BGRA; drop alpha and swap channels.
fn bgra_to_rgb(width: u32, height: u32, raw_bytes: &[u8]) -> Option<RgbImage> {
    let stride = width as usize * 4;
    let mut rgb_data = Vec::with_capacity((width * height * 3) as usize);

    for y in 0..height as usize {
        for x in 0..width as usize {
            let i = y * stride + x * 4;
            let pixel = raw_bytes.get(i..i + 3)?;
            rgb_data.extend_from_slice(&[pixel[2], pixel[1], pixel[0]]);
        }
    }

    RgbImage::from_raw(width, height, rgb_data)
}

impl PdfiumBackend {
    pub fn new(config: PdfConfig) -> Self {
        Self { config }
    }

    fn bind() -> Result<Pdfium, PdfError> {
        let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name())
            .or_else(|_| Pdfium::bind_to_system_library())
            .map_err(|e| PdfError::Unavailable {
                message: e.to_string(),
            })?;
        Ok(Pdfium::new(bindings))
    }

    fn render_page(
        document: &PdfDocument,
        index: usize,
        render_config: &PdfRenderConfig,
    ) -> Result<RgbImage, PdfError> {
        let page = document
            .pages()
            .get(index as u16)
            .map_err(|source| PdfError::Load { source })?;
        let bitmap = page
            .render_with_config(render_config)
            .map_err(|source| PdfError::Load { source })?;

        let width = bitmap.width() as u32;
        let height = bitmap.height() as u32;
        bgra_to_rgb(width, height, &bitmap.as_raw_bytes()).ok_or_else(|| PdfError::Render {
            page: index + 1,
            message: "bitmap shorter than its dimensions".to_string(),
        })
    }

    fn metadata_value(document: &PdfDocument, tag: PdfDocumentMetadataTagType) -> Option<String> {
        document
            .metadata()
            .get(tag)
            .map(|t| t.value().trim().to_string())
            .filter(|v| !v.is_empty())
    }
}

impl PdfRasterizer for PdfiumBackend {
    fn rasterize(&self, bytes: &[u8]) -> Result<RasterizedPdf, PdfError> {
        let pdfium = Self::bind()?;
        let document = pdfium
            .load_pdf_from_byte_slice(bytes, None)
            .map_err(|source| PdfError::Load { source })?;

        let page_count = document.pages().len() as usize;
        if page_count == 0 {
            return Err(PdfError::Empty);
        }
        if page_count > self.config.max_pages {
            return Err(PdfError::TooManyPages {
                count: page_count,
                max: self.config.max_pages,
            });
        }

        let dpi = self.config.render_dpi;
        let render_config = PdfRenderConfig::new().scale_page_by_factor(dpi / 72.0);
        let (blank_w, blank_h) = a4_pixels(dpi);

        let mut pages = Vec::with_capacity(page_count);
        for index in 0..page_count {
            match Self::render_page(&document, index, &render_config) {
                Ok(image) => {
                    debug!(page = index + 1, width = image.width(), height = image.height(), "Rendered page");
                    pages.push(image);
                }
                Err(e) => {
                    warn!(page = index + 1, error = %e, "Page failed to render, using a blank page");
                    pages.push(blank_page(blank_w, blank_h));
                }
            }
        }

        let metadata = PdfMetadata {
            page_count,
            title: Self::metadata_value(&document, PdfDocumentMetadataTagType::Title),
            author: Self::metadata_value(&document, PdfDocumentMetadataTagType::Author),
        };

        info!(page_count, dpi, "Rasterized PDF");
        Ok(RasterizedPdf { pages, metadata })
    }
}

impl PdfAssembler for PdfiumBackend {
    fn assemble(&self, pages: &[Arc<RgbImage>]) -> Result<Vec<u8>, PdfError> {
        if pages.is_empty() {
            return Err(PdfError::Empty);
        }

        let pdfium = Self::bind()?;
        let mut document = pdfium
            .create_new_pdf()
            .map_err(|source| PdfError::Load { source })?;

        let points_per_pixel = 72.0 / self.config.render_dpi;
        for (index, image) in pages.iter().enumerate() {
            let width = PdfPoints::new(image.width() as f32 * points_per_pixel);
            let height = PdfPoints::new(image.height() as f32 * points_per_pixel);

            let mut page = document
                .pages_mut()
                .create_page_at_end(PdfPagePaperSize::from_points(width, height))
                .map_err(|source| PdfError::Load { source })?;

            let dynamic = DynamicImage::ImageRgb8(image.as_ref().clone());
            page.objects_mut()
                .create_image_object(PdfPoints::ZERO, PdfPoints::ZERO, &dynamic, Some(width), Some(height))
                .map_err(|source| PdfError::Load { source })?;

            debug!(page = index + 1, "Added page to assembled PDF");
        }

        let bytes = document
            .save_to_bytes()
            .map_err(|source| PdfError::Load { source })?;
        info!(pages = pages.len(), size = bytes.len(), "Assembled PDF");
        Ok(bytes)
    }
}
