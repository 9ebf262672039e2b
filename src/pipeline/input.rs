//! Input and output path validation.
//!
//! pdfium reports a missing file, a permission problem and a non-PDF file
//! with the same opaque "format error", so we check those cases ourselves
//! before handing the path over. The `%PDF` magic check turns an
//! accidental `.docx` into a readable error instead of a codec failure.

use crate::error::UnmarkError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Validate that `path` exists, is readable and starts with `%PDF`.
pub fn resolve_input(path: impl AsRef<Path>) -> Result<PathBuf, UnmarkError> {
    let path = path.as_ref().to_path_buf();

    if path.as_os_str().is_empty() {
        return Err(UnmarkError::InvalidConfig("input path is empty".into()));
    }
    if !path.is_file() {
        return Err(UnmarkError::FileNotFound { path });
    }

    match std::fs::File::open(&path) {
        Ok(mut f) => {
            let mut magic = [0u8; 4];
            if f.read_exact(&mut magic).is_ok() && &magic != b"%PDF" {
                return Err(UnmarkError::NotAPdf { path, magic });
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(UnmarkError::PermissionDenied { path });
        }
        Err(_) => return Err(UnmarkError::FileNotFound { path }),
    }

    debug!("Resolved input PDF: {}", path.display());
    Ok(path)
}

/// Ensure `dir` exists (creating it if needed) and return the final output
/// path for `file_name` inside it.
pub fn prepare_output(dir: impl AsRef<Path>, file_name: &str) -> Result<PathBuf, UnmarkError> {
    let dir = dir.as_ref();
    if dir.as_os_str().is_empty() {
        return Err(UnmarkError::InvalidConfig("output directory is empty".into()));
    }
    let target = dir.join(file_name);

    std::fs::create_dir_all(dir).map_err(|source| UnmarkError::OutputWriteFailed {
        path: target.clone(),
        source,
    })?;
    if !dir.is_dir() {
        return Err(UnmarkError::OutputWriteFailed {
            path: target,
            source: std::io::Error::new(
                std::io::ErrorKind::NotADirectory,
                "output location is not a directory",
            ),
        });
    }

    Ok(target)
}
