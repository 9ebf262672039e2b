//! # edgequake-pdf-unmark
//!
//! Remove light-colored watermarks from PDF documents.
//!
//! ## How it works
//!
//! Overlay watermarks (grey stamps, faint diagonal "CONFIDENTIAL" text) are
//! usually much lighter than the content under them. This crate rasterises
//! every page, flattens every pixel inside a configured light color range to
//! pure white, and rebuilds a new PDF from the cleaned images, one image per
//! fixed-size page.
//!
//! The result is an image-only PDF: text is no longer selectable, and light
//! content that falls inside the color range is removed along with the mark.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input     validate path, `%PDF` magic, output directory
//!  ├─ 2. Render    rasterise page n via pdfium at `dpi`
//!  ├─ 3. Mask      pixels in [lower, upper] → white     (repeat 2–3 per page)
//!  ├─ 4. Compose   fit each image to A4 (or any size), no upscaling
//!  └─ 5. Output    atomic write of output_file.pdf + stats
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdf_unmark::{remove_watermark, ColorRange, UnmarkConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = UnmarkConfig::builder()
//!         .dpi(200.0)
//!         .color_range(ColorRange::new([160, 160, 160], [255, 255, 255]))
//!         .build()?;
//!     let output = remove_watermark("scan.pdf", "out", &config).await?;
//!     eprintln!(
//!         "{} pages, {} pixels whitened",
//!         output.stats.total_pages, output.stats.masked_pixels
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf-unmark` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-pdf-unmark = { version = "0.1", default-features = false }
//! ```
//!
//! ## PDFium
//!
//! Rendering and composition use the pdfium shared library. It is looked up
//! via `PDFIUM_LIB_PATH`, then in a per-user cache, and downloaded into that
//! cache on first use.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod engine;
pub mod error;
pub mod output;
pub mod page;
pub mod pipeline;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    CancelFlag, PageSize, Placement, ScratchMode, UnmarkConfig, UnmarkConfigBuilder, DEFAULT_DPI,
    DEFAULT_OUTPUT_FILE_NAME,
};
pub use convert::{
    inspect, inspect_with_password, remove_watermark, remove_watermark_from_bytes,
    remove_watermark_sync,
};
pub use error::{ErrorKind, UnmarkError};
pub use output::{DocumentInfo, PageDimensions, UnmarkOutput, UnmarkStats};
pub use page::RasterPage;
pub use pipeline::compose::{OutputDocument, PlacedPage};
pub use pipeline::mask::ColorRange;
pub use progress::{
    ChannelProgress, NoopProgressCallback, Phase, ProgressCallback, ProgressEvent,
    UnmarkProgressCallback,
};
