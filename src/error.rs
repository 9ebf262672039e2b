//! Error types for the edgequake-pdf-unmark library.
//!
//! Every failure is fatal for the invocation: the pipeline has no notion of a
//! partially cleaned document, so there is a single error type,
//! [`UnmarkError`]. Its variants are fine-grained for good messages;
//! [`UnmarkError::kind`] folds them into the handful of categories callers
//! usually branch on.

use std::path::PathBuf;
use thiserror::Error;

/// Coarse classification of an [`UnmarkError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum ErrorKind {
    /// Bad DPI, color range, page size, missing path or empty document.
    InvalidParameter,
    /// The input PDF could not be opened or parsed.
    DocumentOpen,
    /// A specific page failed to rasterise.
    PageRender,
    /// The cleaned document could not be assembled or persisted.
    OutputWrite,
    /// The caller cancelled the run.
    Cancelled,
    /// The pdfium library could not be loaded.
    Engine,
    Internal,
}

/// All errors returned by the edgequake-pdf-unmark library.
#[derive(Debug, Error)]
pub enum UnmarkError {
    // ── Parameter errors ──────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The source document has no pages; there is nothing to compose.
    #[error("PDF '{path}' has no pages")]
    EmptyDocument { path: PathBuf },

    // ── Input errors ──────────────────────────────────────────────────────
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── PDF errors ────────────────────────────────────────────────────────
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// pdfium failed on a specific page (1-indexed).
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    // ── Output errors ─────────────────────────────────────────────────────
    /// pdfium failed while building the output document.
    #[error("Failed to compose output page {page}: {detail}")]
    ComposeFailed { page: usize, detail: String },

    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Control ───────────────────────────────────────────────────────────
    /// Cancellation was observed between pages during `phase`.
    #[error("Cancelled during {phase} after {completed} page(s)")]
    Cancelled {
        phase: crate::progress::Phase,
        completed: usize,
    },

    // ── Pdfium binding errors ─────────────────────────────────────────────
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
PDFium is normally downloaded automatically on first run.\n\
If the auto-download failed, you can:\n\
  • Check your internet connection and try again.\n\
  • Set PDFIUM_LIB_PATH=/path/to/libpdfium to use an existing copy.\n"
    )]
    EngineUnavailable(String),

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl UnmarkError {
    /// The coarse category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidConfig(_) | Self::EmptyDocument { .. } => ErrorKind::InvalidParameter,
            Self::FileNotFound { .. }
            | Self::PermissionDenied { .. }
            | Self::NotAPdf { .. }
            | Self::CorruptPdf { .. }
            | Self::PasswordRequired { .. }
            | Self::WrongPassword { .. } => ErrorKind::DocumentOpen,
            Self::RasterisationFailed { .. } => ErrorKind::PageRender,
            Self::ComposeFailed { .. } | Self::OutputWriteFailed { .. } => ErrorKind::OutputWrite,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
            Self::EngineUnavailable(_) => ErrorKind::Engine,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }
}

/// A specialized `Result` type for this crate.
pub type Result<T> = std::result::Result<T, UnmarkError>;
