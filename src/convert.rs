//! End-to-end entry points.
//!
//! A run is two phases over a single pdfium binding:
//!
//! 1. **rasterizing+masking**: each page is rendered, masked immediately and
//!    handed to the scratch store before the next page is rendered.
//! 2. **composing**: the stored pages are fitted onto fixed-size pages, the
//!    document is serialized and written atomically.
//!
//! Everything pdfium touches runs on one `spawn_blocking` thread, so the
//! caller's runtime stays free to drain progress events or flip the cancel
//! flag.

use crate::config::UnmarkConfig;
use crate::engine;
use crate::error::UnmarkError;
use crate::output::{DocumentInfo, UnmarkOutput, UnmarkStats};
use crate::pipeline::scratch::PageStore;
use crate::pipeline::{compose, input, mask, render};
use crate::progress::{Phase, PhaseReporter};
use pdfium_render::prelude::Pdfium;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

/// Remove the watermark from `input_path`, writing the cleaned PDF into
/// `output_dir` as [`UnmarkConfig::output_file_name`].
///
/// # Errors
///
/// Any failure aborts the whole run. Nothing is written at the destination
/// unless the run succeeds; an existing file there is left untouched.
///
/// # Example
/// ```rust,no_run
/// use edgequake_pdf_unmark::{remove_watermark, UnmarkConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let output = remove_watermark("scan.pdf", "out", &UnmarkConfig::default()).await?;
/// println!("{} pages → {}", output.stats.total_pages, output.stats.output_path.display());
/// # Ok(())
/// # }
/// ```
pub async fn remove_watermark(
    input_path: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    config: &UnmarkConfig,
) -> Result<UnmarkOutput, UnmarkError> {
    let total_start = Instant::now();
    config.validate()?;

    let pdf_path = input::resolve_input(input_path)?;
    let target = input::prepare_output(output_dir, &config.output_file_name)?;
    info!(
        "Removing watermark: {} → {}",
        pdf_path.display(),
        target.display()
    );

    let config = config.clone();
    tokio::task::spawn_blocking(move || {
        let pdfium = engine::bind()?;
        run_blocking(&pdfium, &pdf_path, &target, &config, total_start)
    })
    .await
    .map_err(|e| UnmarkError::Internal(format!("Pipeline task panicked: {}", e)))?
}

/// Synchronous wrapper around [`remove_watermark`].
///
/// Creates a temporary tokio runtime internally; do not call from inside one.
pub fn remove_watermark_sync(
    input_path: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    config: &UnmarkConfig,
) -> Result<UnmarkOutput, UnmarkError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| UnmarkError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(remove_watermark(input_path, output_dir, config))
}

/// Remove the watermark from PDF bytes held in memory.
///
/// The bytes are spooled to a managed [`tempfile`] that is deleted when this
/// function returns.
pub async fn remove_watermark_from_bytes(
    bytes: &[u8],
    output_dir: impl AsRef<Path>,
    config: &UnmarkConfig,
) -> Result<UnmarkOutput, UnmarkError> {
    let mut tmp = tempfile::NamedTempFile::new()
        .map_err(|e| UnmarkError::Internal(format!("tempfile: {e}")))?;
    tmp.write_all(bytes)
        .map_err(|e| UnmarkError::Internal(format!("tempfile write: {e}")))?;
    remove_watermark(tmp.path(), output_dir, config).await
}

/// Describe a PDF (page count, page sizes, version) without rendering it.
pub async fn inspect(input_path: impl AsRef<Path>) -> Result<DocumentInfo, UnmarkError> {
    inspect_with_password(input_path, None).await
}

/// [`inspect`] for encrypted documents.
pub async fn inspect_with_password(
    input_path: impl AsRef<Path>,
    password: Option<&str>,
) -> Result<DocumentInfo, UnmarkError> {
    let pdf_path = input::resolve_input(input_path)?;
    let password = password.map(str::to_string);

    tokio::task::spawn_blocking(move || {
        let pdfium = engine::bind()?;
        render::read_info(&pdfium, &pdf_path, password.as_deref())
    })
    .await
    .map_err(|e| UnmarkError::Internal(format!("Inspect task panicked: {}", e)))?
}

// ── Internal helpers ─────────────────────────────────────────────────────

fn check_cancelled(config: &UnmarkConfig, phase: Phase, completed: usize) -> Result<(), UnmarkError> {
    if config.is_cancelled() {
        info!("Cancelled during {} after {} page(s)", phase, completed);
        return Err(UnmarkError::Cancelled { phase, completed });
    }
    Ok(())
}

fn run_blocking(
    pdfium: &Pdfium,
    pdf_path: &Path,
    target: &Path,
    config: &UnmarkConfig,
    total_start: Instant,
) -> Result<UnmarkOutput, UnmarkError> {
    let callback = config.progress_callback.as_deref();

    // ── Phase 1: rasterize + mask ────────────────────────────────────────
    check_cancelled(config, Phase::RasterizingMasking, 0)?;
    let render_start = Instant::now();
    let mut store = PageStore::new(config.scratch)?;
    let mut masked_pixels = 0u64;
    let mut reporter: Option<PhaseReporter<'_>> = None;

    let source = render::render_each(
        pdfium,
        pdf_path,
        config.dpi,
        config.password.as_deref(),
        |mut page, info| {
            let reporter = reporter.get_or_insert_with(|| {
                PhaseReporter::start(callback, Phase::RasterizingMasking, info.page_count)
            });

            let changed = mask::mask_page(&mut page, &config.color_range);
            debug!("Masked page {}: {} pixels whitened", page.index, changed);
            masked_pixels += changed;
            store.push(page)?;

            reporter.page_done();
            check_cancelled(config, Phase::RasterizingMasking, reporter.completed())
        },
    )?;

    let Some(reporter) = reporter else {
        return Err(UnmarkError::EmptyDocument {
            path: pdf_path.to_path_buf(),
        });
    };
    reporter.finish();

    if store.len() != source.page_count {
        return Err(UnmarkError::Internal(format!(
            "rendered {} of {} pages",
            store.len(),
            source.page_count
        )));
    }
    let render_duration_ms = render_start.elapsed().as_millis() as u64;
    info!(
        "Rasterized and masked {} pages in {}ms ({} pixels whitened)",
        source.page_count, render_duration_ms, masked_pixels
    );

    // ── Phase 2: compose ─────────────────────────────────────────────────
    let compose_start = Instant::now();
    let mut reporter = PhaseReporter::start(callback, Phase::Composing, store.len());
    let document = compose::compose_each(
        pdfium,
        store.drain(),
        config.page_size,
        config.dpi,
        config.placement,
        |_| {
            reporter.page_done();
            check_cancelled(config, Phase::Composing, reporter.completed())
        },
    )?;

    if document.page_count() != source.page_count {
        return Err(UnmarkError::Internal(format!(
            "composed {} pages from {} source pages",
            document.page_count(),
            source.page_count
        )));
    }
    check_cancelled(config, Phase::Composing, document.page_count())?;

    let output_bytes = document.write_to(target)?;
    reporter.finish();
    let compose_duration_ms = compose_start.elapsed().as_millis() as u64;
    let total_duration_ms = total_start.elapsed().as_millis() as u64;

    info!(
        "Wrote {} ({} pages, {} bytes) in {}ms",
        target.display(),
        document.page_count(),
        output_bytes,
        total_duration_ms
    );

    Ok(UnmarkOutput {
        stats: UnmarkStats {
            total_pages: source.page_count,
            masked_pixels,
            render_duration_ms,
            compose_duration_ms,
            total_duration_ms,
            output_path: PathBuf::from(target),
            output_bytes,
        },
        source,
        pages: document.pages,
    })
}
