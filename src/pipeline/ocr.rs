//! Text extraction from slide images via the Tesseract binary.
//!
//! One subprocess per image, output captured from stdout:
//!
//! ```text
//! tesseract <image> stdout
//! ```
//!
//! OCR failures are slide-local: a corrupt image or a missing Tesseract
//! installation yields [`SlideError::OcrFailed`], which the orchestrator
//! converts into an inline placeholder for that slide rather than aborting
//! the job. An empty extraction is not an error — blank slides exist.

use crate::error::SlideError;
use crate::pipeline::convert::find_executable;
use std::path::Path;
use tokio::process::Command;
use tracing::debug;

const TESSERACT: &str = "tesseract";

/// Run OCR over a single slide image, returning the extracted plain text
/// (possibly empty).
pub async fn extract_text(slide: usize, image: &Path) -> Result<String, SlideError> {
    let binary = find_executable(TESSERACT).ok_or_else(|| SlideError::OcrFailed {
        slide,
        detail: "'tesseract' was not found on PATH. Install it (e.g. apt-get install \
                 tesseract-ocr)."
            .to_string(),
    })?;

    let output = Command::new(&binary)
        .arg(image)
        .arg("stdout")
        .output()
        .await
        .map_err(|e| SlideError::OcrFailed {
            slide,
            detail: format!("failed to run tesseract: {e}"),
        })?;

    if !output.status.success() {
        return Err(SlideError::OcrFailed {
            slide,
            detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    let text = parse_ocr_output(&output.stdout);
    debug!(slide, chars = text.len(), "OCR extracted text");
    Ok(text)
}

/// Decode tesseract stdout, trimming the trailing form feed and whitespace
/// it appends after the last block.
fn parse_ocr_output(stdout: &[u8]) -> String {
    String::from_utf8_lossy(stdout)
        .trim_end_matches(['\u{c}', '\n', ' ', '\t', '\r'])
        .to_string()
}
