//! Page composition: fit each masked page onto a fixed-size output page.
//!
//! ## Fit-to-page
//!
//! A buffer of `w × h` pixels rendered at `dpi` covers `w·72/dpi ×
//! h·72/dpi` points. The fit ratio is the largest uniform scale that keeps
//! both axes inside the target page, capped at 1 so small pages are never
//! enlarged. The pixels are resampled by the same ratio, so the effective
//! resolution of the placed image stays at `dpi`.
//!
//! ## Coordinates
//!
//! [`PlacedPage`] offsets are measured from the page's top-left corner, the
//! way a reader looks at a page. PDF user space grows upwards from the
//! bottom-left corner; the conversion happens only when the image object is
//! created.

use crate::config::{PageSize, Placement};
use crate::error::UnmarkError;
use crate::page::RasterPage;
use image::imageops::{self, FilterType};
use image::DynamicImage;
use pdfium_render::prelude::*;
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use tracing::{debug, info};

/// Resampling filter used when shrinking pages. Bilinear and deterministic.
pub const RESIZE_FILTER: FilterType = FilterType::Triangle;

/// Largest uniform scale, at most 1, that fits a `pixel_width × pixel_height`
/// buffer rendered at `dpi` inside `page`.
pub fn fit_ratio(pixel_width: u32, pixel_height: u32, dpi: f32, page: PageSize) -> f64 {
    let to_pt = 72.0 / f64::from(dpi);
    let width_pt = f64::from(pixel_width.max(1)) * to_pt;
    let height_pt = f64::from(pixel_height.max(1)) * to_pt;
    let ratio = (f64::from(page.width) / width_pt).min(f64::from(page.height) / height_pt);
    ratio.min(1.0)
}

/// Where and how large one page image lands on its output page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PlacedPage {
    /// 1-based index of the source page.
    pub source_index: usize,
    pub ratio: f64,
    /// Pixel size after resampling.
    pub pixel_width: u32,
    pub pixel_height: u32,
    /// Offset of the image's top-left corner from the page's top-left corner.
    pub x_pt: f32,
    pub y_pt: f32,
    pub width_pt: f32,
    pub height_pt: f32,
}

/// Compute the placement of `page` on an output page of `page_size`.
pub fn layout(page: &RasterPage, dpi: f32, page_size: PageSize, placement: Placement) -> PlacedPage {
    let ratio = fit_ratio(page.width(), page.height(), dpi, page_size);
    let (width_pt, height_pt) = page.size_in_points(dpi);

    let scaled = |px: u32| ((f64::from(px) * ratio).floor() as u32).max(1);
    let (pixel_width, pixel_height) = (scaled(page.width()), scaled(page.height()));

    // The limiting axis keeps its exact fitted length; the other axis follows
    // the resampled pixel aspect so the image is drawn undistorted.
    let fit_w = ((width_pt * ratio) as f32).min(page_size.width);
    let fit_h = ((height_pt * ratio) as f32).min(page_size.height);
    let (width_pt, height_pt) = if fit_w / page_size.width >= fit_h / page_size.height {
        let h = f64::from(fit_w) * f64::from(pixel_height) / f64::from(pixel_width);
        (fit_w, (h as f32).min(page_size.height))
    } else {
        let w = f64::from(fit_h) * f64::from(pixel_width) / f64::from(pixel_height);
        ((w as f32).min(page_size.width), fit_h)
    };

    let (x_pt, y_pt) = match placement {
        Placement::TopLeft => (0.0, 0.0),
        Placement::Center => (
            (page_size.width - width_pt) / 2.0,
            (page_size.height - height_pt) / 2.0,
        ),
    };

    PlacedPage {
        source_index: page.index,
        ratio,
        pixel_width,
        pixel_height,
        x_pt,
        y_pt,
        width_pt,
        height_pt,
    }
}

/// The composed PDF, serialized but not yet persisted.
#[derive(Debug, Clone)]
pub struct OutputDocument {
    pub page_size: PageSize,
    /// One entry per output page, in order.
    pub pages: Vec<PlacedPage>,
    bytes: Vec<u8>,
}

impl OutputDocument {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// The serialized PDF.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Persist the document at `target`, atomically.
    ///
    /// The bytes go to a temporary file next to `target` which is renamed
    /// into place only after a successful flush. On any failure the
    /// temporary file is removed and `target` is left untouched.
    pub fn write_to(&self, target: &Path) -> Result<u64, UnmarkError> {
        write_atomically(target, &self.bytes)?;
        Ok(self.bytes.len() as u64)
    }
}

pub(crate) fn write_atomically(target: &Path, bytes: &[u8]) -> Result<(), UnmarkError> {
    let write_failed = |source: std::io::Error| UnmarkError::OutputWriteFailed {
        path: target.to_path_buf(),
        source,
    };
    let dir = match target.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut builder = tempfile::Builder::new();
    builder.prefix(".pdf-unmark-").suffix(".tmp");
    // Same mode as a plain `fs::write` (0o666 minus umask), not tempfile's 0o600.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(std::fs::Permissions::from_mode(0o666));
    }
    let mut tmp = builder.tempfile_in(dir).map_err(write_failed)?;
    if let Ok(existing) = std::fs::metadata(target) {
        tmp.as_file()
            .set_permissions(existing.permissions())
            .map_err(write_failed)?;
    }
    tmp.write_all(bytes).map_err(write_failed)?;
    tmp.as_file().sync_all().map_err(write_failed)?;
    tmp.persist(target).map_err(|e| write_failed(e.error))?;

    debug!("Wrote {} bytes to {}", bytes.len(), target.display());
    Ok(())
}

/// Compose `pages` (already in output order) into a new PDF.
///
/// `after_page` runs after each page has been placed; an error from it
/// aborts composition. Zero pages is rejected.
pub fn compose_each<I, F>(
    pdfium: &Pdfium,
    pages: I,
    page_size: PageSize,
    dpi: f32,
    placement: Placement,
    mut after_page: F,
) -> Result<OutputDocument, UnmarkError>
where
    I: IntoIterator<Item = Result<RasterPage, UnmarkError>>,
    F: FnMut(&PlacedPage) -> Result<(), UnmarkError>,
{
    let mut document = pdfium
        .create_new_pdf()
        .map_err(|e| UnmarkError::ComposeFailed {
            page: 0,
            detail: format!("{:?}", e),
        })?;

    let mut placed = Vec::new();
    for page in pages {
        let page = page?;
        let spot = layout(&page, dpi, page_size, placement);
        let fail = |e: PdfiumError| UnmarkError::ComposeFailed {
            page: spot.source_index,
            detail: format!("{:?}", e),
        };

        let image = if (spot.pixel_width, spot.pixel_height) == page.image.dimensions() {
            DynamicImage::ImageRgb8(page.image)
        } else {
            DynamicImage::ImageRgb8(imageops::resize(
                &page.image,
                spot.pixel_width,
                spot.pixel_height,
                RESIZE_FILTER,
            ))
        };

        let paper = PdfPagePaperSize::Custom(
            PdfPoints::new(page_size.width),
            PdfPoints::new(page_size.height),
        );
        let mut pdf_page = document.pages_mut().create_page_at_end(paper).map_err(fail)?;
        let bottom = page_size.height - spot.y_pt - spot.height_pt;
        pdf_page
            .objects_mut()
            .create_image_object(
                PdfPoints::new(spot.x_pt),
                PdfPoints::new(bottom),
                &image,
                Some(PdfPoints::new(spot.width_pt)),
                Some(PdfPoints::new(spot.height_pt)),
            )
            .map_err(fail)?;

        debug!(
            "Placed page {} at ratio {:.4}: {}x{} px in {:.1}×{:.1} pt",
            spot.source_index,
            spot.ratio,
            spot.pixel_width,
            spot.pixel_height,
            spot.width_pt,
            spot.height_pt
        );
        after_page(&spot)?;
        placed.push(spot);
    }

    if placed.is_empty() {
        return Err(UnmarkError::InvalidConfig(
            "no pages to compose; refusing to write an empty document".into(),
        ));
    }

    let bytes = document.save_to_bytes().map_err(|e| UnmarkError::ComposeFailed {
        page: placed.len(),
        detail: format!("serialisation failed: {:?}", e),
    })?;
    info!("Composed {} pages ({} bytes)", placed.len(), bytes.len());

    Ok(OutputDocument {
        page_size,
        pages: placed,
        bytes,
    })
}

/// Compose in-memory pages into a new PDF, ordered by source page index.
pub fn compose(
    pdfium: &Pdfium,
    pages: &[RasterPage],
    page_size: PageSize,
    dpi: f32,
    placement: Placement,
) -> Result<OutputDocument, UnmarkError> {
    let mut ordered: Vec<&RasterPage> = pages.iter().collect();
    ordered.sort_by_key(|p| p.index);
    compose_each(
        pdfium,
        ordered.into_iter().map(|p| Ok(p.clone())),
        page_size,
        dpi,
        placement,
        |_| Ok(()),
    )
}
