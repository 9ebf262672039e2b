//! Integration tests for edgequake-pdf-unmark.
//!
//! Source PDFs are generated on the fly with the crate's own composer: a
//! 595×842 px image placed at 72 DPI fills an A4 page exactly, so test pages
//! are drawn pixel-for-point.
//!
//! Tests that need the pdfium shared library skip themselves when it is not
//! available (set `PDFIUM_LIB_PATH`, or run the CLI once to populate the
//! cache).
//!
//! Run with:
//!   cargo test --test pipeline -- --nocapture

use edgequake_pdf_unmark::pipeline::compose::{compose, fit_ratio};
use edgequake_pdf_unmark::pipeline::mask::mask_page;
use edgequake_pdf_unmark::pipeline::render::{pixel_dimensions, rasterize};
use edgequake_pdf_unmark::{
    engine, inspect, remove_watermark, CancelFlag, ChannelProgress, ColorRange, ErrorKind,
    PageSize, Phase, Placement, ProgressCallback, ProgressEvent, RasterPage, ScratchMode,
    UnmarkConfig, UnmarkError, UnmarkProgressCallback,
};
use image::{Rgb, RgbImage};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing_subscriber::EnvFilter;

// ── Test helpers ─────────────────────────────────────────────────────────────

/// pdfium keeps process-global state; one bound instance at a time.
static PDFIUM_LOCK: Mutex<()> = Mutex::new(());

fn pdfium_lock() -> MutexGuard<'static, ()> {
    PDFIUM_LOCK.lock().unwrap_or_else(|e| e.into_inner())
}

/// Route library logs through the test harness; `RUST_LOG` selects the level.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// Skip this test when pdfium cannot be bound without a download.
macro_rules! skip_unless_pdfium {
    () => {{
        init_tracing();
        if !engine::is_available() {
            println!("SKIP — pdfium not available (set PDFIUM_LIB_PATH)");
            return;
        }
        pdfium_lock()
    }};
}

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const WATERMARK_GREY: Rgb<u8> = Rgb([200, 200, 200]);
const INK: Rgb<u8> = Rgb([20, 20, 20]);

/// Vertical position of the ink block on page `index`; distinct per page so
/// page order is visible in the output.
fn ink_top(index: usize) -> u32 {
    40 * index as u32
}

/// A4 page at 72 DPI: white, a grey watermark band across the middle and an
/// ink block whose position encodes the page index.
fn source_page(index: usize) -> RasterPage {
    let mut img = RgbImage::from_pixel(595, 842, WHITE);
    for y in 400..440 {
        for x in 0..595 {
            img.put_pixel(x, y, WATERMARK_GREY);
        }
    }
    let top = ink_top(index);
    for y in top..top + 30 {
        for x in 50..150 {
            img.put_pixel(x, y, INK);
        }
    }
    RasterPage::new(index, img)
}

fn write_source_pdf(path: &Path, page_count: usize) {
    let pdfium = engine::bind().expect("bind pdfium");
    let pages: Vec<_> = (1..=page_count).map(source_page).collect();
    let doc = compose(&pdfium, &pages, PageSize::A4, 72.0, Placement::TopLeft)
        .expect("compose source pdf");
    std::fs::write(path, doc.as_bytes()).expect("write source pdf");
}

fn is_dark(px: &Rgb<u8>) -> bool {
    px.0.iter().all(|&c| c < 100)
}

fn is_white(px: &Rgb<u8>) -> bool {
    px.0.iter().all(|&c| c >= 250)
}

/// Scratch directories currently present under the system temp dir.
fn scratch_dirs() -> HashSet<PathBuf> {
    std::fs::read_dir(std::env::temp_dir())
        .map(|rd| {
            rd.filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| {
                    p.is_dir()
                        && p.file_name()
                            .is_some_and(|n| n.to_string_lossy().starts_with("pdf-unmark-"))
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Flips the cancel flag once `after` pages of `phase` are done.
struct CancelAfter {
    flag: CancelFlag,
    phase: Phase,
    after: usize,
}

impl UnmarkProgressCallback for CancelAfter {
    fn on_progress(&self, event: ProgressEvent) {
        if event.phase == self.phase && event.completed >= self.after {
            self.flag.cancel();
        }
    }
}

fn tmp_files_in(dir: &Path) -> Vec<PathBuf> {
    std::fs::read_dir(dir)
        .map(|rd| {
            rd.filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.extension().is_some_and(|ext| ext == "tmp"))
                .collect()
        })
        .unwrap_or_default()
}

// ── Pure properties (no pdfium) ──────────────────────────────────────────────

#[test]
fn literal_masking_case() {
    let img = RgbImage::from_raw(2, 1, vec![200, 200, 200, 100, 50, 10]).unwrap();
    let mut page = RasterPage::new(1, img);
    assert_eq!(mask_page(&mut page, &ColorRange::default()), 1);
    assert_eq!(page.image.into_raw(), vec![255, 255, 255, 100, 50, 10]);
}

#[test]
fn fitted_images_never_exceed_the_page() {
    let targets = [PageSize::A4, PageSize::LETTER, PageSize::new(300.0, 300.0)];
    let sources = [(595.0, 842.0), (842.0, 595.0), (1224.0, 1584.0), (100.0, 50.0)];
    for dpi in [72.0, 150.0, 200.0, 300.0] {
        for &(w_pt, h_pt) in &sources {
            let (w, h) = pixel_dimensions(w_pt, h_pt, dpi);
            for target in targets {
                let ratio = fit_ratio(w, h, dpi, target);
                assert!(ratio > 0.0 && ratio <= 1.0);
                let placed_w = f64::from(w) * 72.0 / f64::from(dpi) * ratio;
                let placed_h = f64::from(h) * 72.0 / f64::from(dpi) * ratio;
                assert!(placed_w <= f64::from(target.width) + 1e-6);
                assert!(placed_h <= f64::from(target.height) + 1e-6);
                if ratio < 1.0 {
                    let touches = (placed_w - f64::from(target.width)).abs() < 1e-3
                        || (placed_h - f64::from(target.height)).abs() < 1e-3;
                    assert!(touches, "{w_pt}×{h_pt}@{dpi} on {target:?}");
                }
            }
        }
    }
}

// ── pdfium-backed end-to-end tests ───────────────────────────────────────────

#[tokio::test]
async fn end_to_end_a4_at_200_dpi() {
    let _guard = skip_unless_pdfium!();
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("source.pdf");
    write_source_pdf(&src, 3);

    let rendered = rasterize(&src, 200.0, None).await.unwrap();
    assert_eq!(rendered.len(), 3);
    for (i, page) in rendered.iter().enumerate() {
        assert_eq!(page.index, i + 1);
        assert_eq!((page.width(), page.height()), (1653, 2339));
    }

    let out_dir = dir.path().join("out");
    let output = remove_watermark(&src, &out_dir, &UnmarkConfig::default())
        .await
        .unwrap();

    let target = out_dir.join("output_file.pdf");
    assert_eq!(output.stats.output_path, target);
    assert!(target.is_file());
    assert_eq!(output.stats.total_pages, 3);
    assert!(output.stats.masked_pixels > 0);
    assert_eq!(
        output.pages.iter().map(|p| p.source_index).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
    for placed in &output.pages {
        assert!(placed.ratio <= 1.0);
        assert!(placed.width_pt <= 595.0 && placed.height_pt <= 842.0);
    }

    let info = inspect(&target).await.unwrap();
    assert_eq!(info.page_count, 3);
    for size in &info.page_sizes {
        assert!((size.width_pt - 595.0).abs() < 0.5);
        assert!((size.height_pt - 842.0).abs() < 0.5);
    }

    // Render the result back at 72 DPI: one output point per pixel.
    let cleaned = rasterize(&target, 72.0, None).await.unwrap();
    assert_eq!(cleaned.len(), 3);
    for page in &cleaned {
        let ink_y = ink_top(page.index) + 15;
        assert!(
            is_dark(page.image.get_pixel(100, ink_y)),
            "page {} lost its ink block",
            page.index
        );
        assert!(
            is_white(page.image.get_pixel(300, 420)),
            "page {} still has its watermark: {:?}",
            page.index,
            page.image.get_pixel(300, 420)
        );
    }
}

#[tokio::test]
async fn disk_scratch_matches_memory_scratch() {
    let _guard = skip_unless_pdfium!();
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("source.pdf");
    write_source_pdf(&src, 2);

    let mem = remove_watermark(&src, dir.path().join("mem"), &UnmarkConfig::default())
        .await
        .unwrap();
    let disk_config = UnmarkConfig::builder()
        .scratch(ScratchMode::Disk)
        .build()
        .unwrap();
    let disk = remove_watermark(&src, dir.path().join("disk"), &disk_config)
        .await
        .unwrap();

    assert_eq!(mem.pages, disk.pages);
    assert_eq!(mem.stats.masked_pixels, disk.stats.masked_pixels);

    let a = rasterize(&mem.stats.output_path, 72.0, None).await.unwrap();
    let b = rasterize(&disk.stats.output_path, 72.0, None).await.unwrap();
    assert_eq!(a, b);
}

#[tokio::test]
async fn progress_phases_are_ordered_and_monotonic() {
    let _guard = skip_unless_pdfium!();
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("source.pdf");
    write_source_pdf(&src, 3);

    let (progress, mut rx) = ChannelProgress::new();
    let config = UnmarkConfig::builder()
        .progress_callback(Arc::new(progress) as ProgressCallback)
        .build()
        .unwrap();
    remove_watermark(&src, dir.path(), &config).await.unwrap();
    drop(config);

    let mut events = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        events.push(ev);
    }

    let split = events
        .iter()
        .position(|e| e.phase == Phase::Composing)
        .expect("composing events");
    let (raster, composing) = events.split_at(split);
    assert!(raster.iter().all(|e| e.phase == Phase::RasterizingMasking));
    assert!(composing.iter().all(|e| e.phase == Phase::Composing));

    for phase in [raster, composing] {
        assert_eq!(phase.first().map(|e| e.percent()), Some(0.0));
        assert_eq!(phase.last().map(|e| e.percent()), Some(100.0));
        assert!(phase.windows(2).all(|w| w[0].completed <= w[1].completed));
        assert!(phase.iter().all(|e| e.total == 3));
    }
}

#[tokio::test]
async fn failed_run_leaves_existing_output_untouched() {
    let _guard = skip_unless_pdfium!();
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("output_file.pdf");
    std::fs::write(&target, b"previous run").unwrap();

    let src = dir.path().join("broken.pdf");
    std::fs::write(&src, b"%PDF-1.7\nthis is not a real document\n").unwrap();

    let err = remove_watermark(&src, dir.path(), &UnmarkConfig::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DocumentOpen);
    assert_eq!(std::fs::read(&target).unwrap(), b"previous run");
    assert!(tmp_files_in(dir.path()).is_empty());
}

#[tokio::test]
async fn cancelled_run_writes_nothing() {
    let _guard = skip_unless_pdfium!();
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("source.pdf");
    write_source_pdf(&src, 2);

    let flag = CancelFlag::new();
    flag.cancel();
    let config = UnmarkConfig::builder()
        .cancel_flag(flag)
        .scratch(ScratchMode::Disk)
        .build()
        .unwrap();
    let out_dir = dir.path().join("out");
    let err = remove_watermark(&src, &out_dir, &config).await.unwrap_err();

    assert!(matches!(
        err,
        UnmarkError::Cancelled {
            phase: Phase::RasterizingMasking,
            completed: 0
        }
    ));
    assert!(!out_dir.join("output_file.pdf").exists());
}

#[tokio::test]
async fn abort_mid_run_leaves_no_output_or_scratch() {
    let _guard = skip_unless_pdfium!();
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("source.pdf");
    write_source_pdf(&src, 3);

    for phase in [Phase::RasterizingMasking, Phase::Composing] {
        let out_dir = dir.path().join(format!("out-{phase}"));
        let flag = CancelFlag::new();
        let config = UnmarkConfig::builder()
            .cancel_flag(flag.clone())
            .progress_callback(Arc::new(CancelAfter {
                flag,
                phase,
                after: 1,
            }) as ProgressCallback)
            .scratch(ScratchMode::Disk)
            .build()
            .unwrap();

        let before = scratch_dirs();
        let err = remove_watermark(&src, &out_dir, &config).await.unwrap_err();

        match err {
            UnmarkError::Cancelled {
                phase: stopped,
                completed,
            } => {
                assert_eq!(stopped, phase);
                assert_eq!(completed, 1, "stopped after page 1 of 3 in {phase}");
            }
            other => panic!("expected cancellation in {phase}, got {other}"),
        }
        assert!(!out_dir.join("output_file.pdf").exists(), "{phase}");
        assert!(tmp_files_in(&out_dir).is_empty(), "{phase}");
        let leaked: Vec<_> = scratch_dirs().difference(&before).cloned().collect();
        assert!(leaked.is_empty(), "scratch dirs left after {phase}: {leaked:?}");
    }
}

#[tokio::test]
async fn zero_page_document_is_rejected() {
    let _guard = skip_unless_pdfium!();
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("empty.pdf");
    {
        let pdfium = engine::bind().unwrap();
        let bytes = pdfium.create_new_pdf().unwrap().save_to_bytes().unwrap();
        std::fs::write(&src, bytes).unwrap();
    }

    let err = remove_watermark(&src, dir.path(), &UnmarkConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(err, UnmarkError::EmptyDocument { .. }));
    assert_eq!(err.kind(), ErrorKind::InvalidParameter);
    assert!(!dir.path().join("output_file.pdf").exists());
}

#[tokio::test]
async fn small_pages_are_not_upscaled() {
    let _guard = skip_unless_pdfium!();
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("small.pdf");
    {
        let pdfium = engine::bind().unwrap();
        let page = RasterPage::new(1, RgbImage::from_pixel(200, 100, INK));
        let doc = compose(&pdfium, &[page], PageSize::new(200.0, 100.0), 72.0, Placement::TopLeft)
            .unwrap();
        std::fs::write(&src, doc.as_bytes()).unwrap();
    }

    let output = remove_watermark(&src, dir.path(), &UnmarkConfig::default())
        .await
        .unwrap();
    let placed = output.pages[0];
    assert_eq!(placed.ratio, 1.0);
    // ceil() at 200 DPI adds at most one pixel, i.e. 0.36 pt.
    assert!((placed.width_pt - 200.0).abs() < 0.5);
    assert!((placed.height_pt - 100.0).abs() < 0.5);
    assert_eq!((placed.x_pt, placed.y_pt), (0.0, 0.0));

    // Top-left anchored: ink at the top-left, blank below and to the right.
    let cleaned = rasterize(&output.stats.output_path, 72.0, None).await.unwrap();
    let img = &cleaned[0].image;
    assert!(is_dark(img.get_pixel(100, 50)));
    assert!(is_white(img.get_pixel(400, 50)));
    assert!(is_white(img.get_pixel(100, 500)));
}
