//! PDF rasterisation: render every page to a PNG file via pdfium.
//!
//! ## Why spawn_blocking?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which uses
//! thread-local state internally and is not safe to call from async
//! contexts. `tokio::task::spawn_blocking` moves the work onto the blocking
//! thread pool so Tokio worker threads never stall during CPU-heavy
//! rendering.
//!
//! ## Why PNG?
//!
//! Lossless compression preserves text crispness. JPEG artefacts on rendered
//! slide text measurably degrade downstream OCR accuracy.

use crate::error::PipelineError;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Points per inch in PDF coordinate space.
const POINTS_PER_INCH: f32 = 72.0;

/// Rasterise every page of `pdf_path` into `out_dir` at the given DPI.
///
/// Page images are named `page_001.png`, `page_002.png`, … so the returned
/// ordering matches both page order and lexicographic filename order.
///
/// # Errors
/// * [`PipelineError::CorruptPdf`] — pdfium cannot open the file
/// * [`PipelineError::EmptyDocument`] — the PDF has zero pages (hard failure)
/// * [`PipelineError::RasterisationFailed`] — a page failed to render or
///   encode; fatal for the whole document at this stage
pub async fn rasterize_pdf(
    pdf_path: &Path,
    out_dir: &Path,
    dpi: u32,
) -> Result<Vec<PathBuf>, PipelineError> {
    let pdf = pdf_path.to_path_buf();
    let dir = out_dir.to_path_buf();

    tokio::task::spawn_blocking(move || rasterize_blocking(&pdf, &dir, dpi))
        .await
        .map_err(|e| PipelineError::Internal(format!("render task panicked: {e}")))?
}

fn rasterize_blocking(
    pdf_path: &Path,
    out_dir: &Path,
    dpi: u32,
) -> Result<Vec<PathBuf>, PipelineError> {
    std::fs::create_dir_all(out_dir).map_err(|e| PipelineError::Io {
        path: out_dir.to_path_buf(),
        source: e,
    })?;

    let pdfium = Pdfium::default();
    let document =
        pdfium
            .load_pdf_from_file(pdf_path, None)
            .map_err(|e| PipelineError::CorruptPdf {
                path: pdf_path.to_path_buf(),
                detail: format!("{e:?}"),
            })?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    if total_pages == 0 {
        return Err(PipelineError::EmptyDocument {
            path: pdf_path.to_path_buf(),
        });
    }
    info!(pages = total_pages, dpi, "rasterising PDF");

    let mut outputs = Vec::with_capacity(total_pages);

    for (idx, page) in pages.iter().enumerate() {
        let page_num = idx + 1;

        // Pixel width for the requested DPI; pdfium scales height to match.
        let target_width = (page.width().value * dpi as f32 / POINTS_PER_INCH).round() as i32;
        let render_config = PdfRenderConfig::new().set_target_width(target_width.max(1));

        let bitmap =
            page.render_with_config(&render_config)
                .map_err(|e| PipelineError::RasterisationFailed {
                    page: page_num,
                    detail: format!("{e:?}"),
                })?;

        let image = bitmap.as_image();
        let path = out_dir.join(page_image_name(page_num));
        image
            .save(&path)
            .map_err(|e| PipelineError::RasterisationFailed {
                page: page_num,
                detail: format!("PNG encoding failed: {e}"),
            })?;

        debug!(
            page = page_num,
            width = image.width(),
            height = image.height(),
            "rendered page"
        );
        outputs.push(path);
    }

    Ok(outputs)
}

/// Zero-padded page image filename, 1-based.
fn page_image_name(page_num: usize) -> String {
    format!("page_{page_num:03}.png")
}
