//! Holding area for masked pages between the two phases.
//!
//! [`ScratchMode::Memory`] keeps the buffers as they are. [`ScratchMode::Disk`]
//! encodes each page as a lossless PNG named `page_{n}.png` inside a
//! [`tempfile::TempDir`] and decodes it again when the composer asks for it,
//! so only one decoded page is alive at a time. The directory lives as long
//! as the store (or its [`Drain`]) and is removed on drop, including on
//! error and cancellation paths.

use crate::config::ScratchMode;
use crate::error::UnmarkError;
use crate::page::RasterPage;
use image::ImageError;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;

/// Masked pages in source order.
#[derive(Debug)]
pub enum PageStore {
    Memory(Vec<RasterPage>),
    Disk { dir: TempDir, indices: Vec<usize> },
}

impl PageStore {
    pub fn new(mode: ScratchMode) -> Result<Self, UnmarkError> {
        match mode {
            ScratchMode::Memory => Ok(Self::Memory(Vec::new())),
            ScratchMode::Disk => {
                let dir = tempfile::Builder::new()
                    .prefix("pdf-unmark-")
                    .tempdir()
                    .map_err(|source| UnmarkError::OutputWriteFailed {
                        path: std::env::temp_dir(),
                        source,
                    })?;
                debug!("Scratch directory: {}", dir.path().display());
                Ok(Self::Disk {
                    dir,
                    indices: Vec::new(),
                })
            }
        }
    }

    /// Append `page`. Pages must arrive in increasing index order.
    pub fn push(&mut self, page: RasterPage) -> Result<(), UnmarkError> {
        match self {
            Self::Memory(pages) => pages.push(page),
            Self::Disk { dir, indices } => {
                let path = page_path(dir.path(), page.index);
                page.image.save(&path).map_err(|e| UnmarkError::OutputWriteFailed {
                    path: path.clone(),
                    source: into_io(e),
                })?;
                indices.push(page.index);
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Memory(pages) => pages.len(),
            Self::Disk { indices, .. } => indices.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The scratch directory, for disk-backed stores.
    pub fn dir(&self) -> Option<&Path> {
        match self {
            Self::Memory(_) => None,
            Self::Disk { dir, .. } => Some(dir.path()),
        }
    }

    /// Consume the store, yielding pages in the order they were pushed.
    pub fn drain(self) -> Drain {
        match self {
            Self::Memory(pages) => Drain::Memory(pages.into_iter()),
            Self::Disk { dir, indices } => Drain::Disk {
                dir,
                indices: indices.into_iter(),
            },
        }
    }
}

/// Iterator returned by [`PageStore::drain`].
#[derive(Debug)]
pub enum Drain {
    Memory(std::vec::IntoIter<RasterPage>),
    Disk {
        dir: TempDir,
        indices: std::vec::IntoIter<usize>,
    },
}

impl Iterator for Drain {
    type Item = Result<RasterPage, UnmarkError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Self::Memory(pages) => pages.next().map(Ok),
            Self::Disk { dir, indices } => {
                let index = indices.next()?;
                let path = page_path(dir.path(), index);
                let page = image::open(&path)
                    .map(|img| RasterPage::new(index, img.to_rgb8()))
                    .map_err(|e| UnmarkError::ComposeFailed {
                        page: index,
                        detail: format!("cannot reload {}: {}", path.display(), e),
                    });
                // The PNG is no longer needed once decoded.
                let _ = std::fs::remove_file(&path);
                Some(page)
            }
        }
    }
}

fn page_path(dir: &Path, index: usize) -> PathBuf {
    dir.join(format!("page_{index}.png"))
}

fn into_io(e: ImageError) -> std::io::Error {
    match e {
        ImageError::IoError(io) => io,
        other => std::io::Error::other(other),
    }
}
