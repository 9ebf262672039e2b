//! Result types returned by the top-level entry points.
//!
//! Everything here derives `Serialize` so the CLI can emit it with `--json`.

use crate::pipeline::compose::PlacedPage;
use serde::Serialize;
use std::path::PathBuf;

/// Intrinsic size of one source page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PageDimensions {
    pub width_pt: f32,
    pub height_pt: f32,
}

/// Read-only description of the source document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentInfo {
    pub path: PathBuf,
    pub page_count: usize,
    /// One entry per page, in document order.
    pub page_sizes: Vec<PageDimensions>,
    pub pdf_version: String,
}

/// Counters and timings for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UnmarkStats {
    pub total_pages: usize,
    /// Pixels rewritten to white across all pages.
    pub masked_pixels: u64,
    pub render_duration_ms: u64,
    pub compose_duration_ms: u64,
    pub total_duration_ms: u64,
    pub output_path: PathBuf,
    pub output_bytes: u64,
}

/// Everything a successful run produced.
#[derive(Debug, Clone, Serialize)]
pub struct UnmarkOutput {
    pub source: DocumentInfo,
    /// Layout of each output page, in order.
    pub pages: Vec<PlacedPage>,
    pub stats: UnmarkStats,
}
