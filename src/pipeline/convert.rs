//! Document-to-PDF conversion via LibreOffice.
//!
//! LibreOffice's `soffice` binary is driven in headless mode:
//!
//! ```text
//! soffice --headless --convert-to pdf --outdir <out_dir> <input>
//! ```
//!
//! The binary's presence is verified up front so a missing installation
//! surfaces as [`PipelineError::MissingDependency`] instead of a generic
//! spawn failure. `soffice` signals some failures only through its exit
//! code and others by exiting zero without producing a file, so the output
//! PDF's existence is checked explicitly before returning.

use crate::error::PipelineError;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info};

const SOFFICE: &str = "soffice";

/// Convert an office document to PDF inside `out_dir` (created if missing).
///
/// Returns the path to the produced PDF, named after the input file's stem.
/// No retry on failure; the caller treats conversion errors as fatal.
pub async fn convert_document(input: &Path, out_dir: &Path) -> Result<PathBuf, PipelineError> {
    let binary = find_executable(SOFFICE).ok_or_else(|| PipelineError::MissingDependency {
        binary: SOFFICE.to_string(),
        hint: "Install LibreOffice (e.g. apt-get install libreoffice).".to_string(),
    })?;

    tokio::fs::create_dir_all(out_dir)
        .await
        .map_err(|e| PipelineError::Io {
            path: out_dir.to_path_buf(),
            source: e,
        })?;

    info!(input = %input.display(), out_dir = %out_dir.display(), "converting document to PDF");

    let output = Command::new(&binary)
        .arg("--headless")
        .arg("--convert-to")
        .arg("pdf")
        .arg("--outdir")
        .arg(out_dir)
        .arg(input)
        .output()
        .await
        .map_err(|e| PipelineError::Io {
            path: binary.clone(),
            source: e,
        })?;

    if !output.status.success() {
        return Err(PipelineError::ConversionFailed {
            path: input.to_path_buf(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    let pdf_path = converted_pdf_path(input, out_dir);
    if !pdf_path.exists() {
        return Err(PipelineError::OutputMissing { path: pdf_path });
    }

    debug!(pdf = %pdf_path.display(), "conversion produced PDF");
    Ok(pdf_path)
}

/// The PDF path LibreOffice will produce for `input` inside `out_dir`:
/// the input stem with a `.pdf` extension.
pub fn converted_pdf_path(input: &Path, out_dir: &Path) -> PathBuf {
    let stem = input.file_stem().unwrap_or_else(|| OsStr::new("output"));
    out_dir.join(stem).with_extension("pdf")
}

/// Locate an executable by name on the `PATH` environment variable.
pub fn find_executable(name: &str) -> Option<PathBuf> {
    find_executable_in(std::env::var_os("PATH")?.as_os_str(), name)
}

fn find_executable_in(path_var: &OsStr, name: &str) -> Option<PathBuf> {
    std::env::split_paths(path_var)
        .map(|dir| dir.join(name))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
