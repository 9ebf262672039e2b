//! PDF rasterisation: render every page to an RGB buffer via pdfium.
//!
//! ## Resolution
//!
//! PDF user space is measured in points (1/72 inch), so rendering at `dpi`
//! means scaling each page by `dpi / 72`. The target pixel size is computed
//! here with `ceil` and handed to pdfium explicitly, so the buffer size does
//! not depend on pdfium's own rounding.
//!
//! ## Why a per-page hook?
//!
//! [`render_each`] calls back after every page instead of returning a vector.
//! The pipeline masks and stores each page before the next one is rendered,
//! which keeps at most one unmasked buffer alive and gives cancellation a
//! clean checkpoint at every page boundary.

use crate::config::validate_dpi;
use crate::engine;
use crate::error::UnmarkError;
use crate::output::{DocumentInfo, PageDimensions};
use crate::page::RasterPage;
use pdfium_render::prelude::*;
use std::path::Path;
use tracing::{debug, info};

/// PDF points per inch.
pub const POINTS_PER_INCH: f32 = 72.0;

/// Uniform render scale for `dpi`.
pub fn render_scale(dpi: f32) -> f32 {
    dpi / POINTS_PER_INCH
}

/// Pixel size of a `width_pt × height_pt` page rendered at `dpi`:
/// `ceil(size * dpi / 72)` on each axis, never below 1.
pub fn pixel_dimensions(width_pt: f32, height_pt: f32, dpi: f32) -> (u32, u32) {
    let axis = |pt: f32| {
        let px = f64::from(pt) * f64::from(dpi) / f64::from(POINTS_PER_INCH);
        (px.ceil() as u32).max(1)
    };
    (axis(width_pt), axis(height_pt))
}

/// Open `pdf_path` with pdfium, mapping failures onto input errors.
pub(crate) fn open_document<'a>(
    pdfium: &'a Pdfium,
    pdf_path: &Path,
    password: Option<&'a str>,
) -> Result<PdfDocument<'a>, UnmarkError> {
    pdfium.load_pdf_from_file(pdf_path, password).map_err(|e| {
        let err_str = format!("{:?}", e);
        if err_str.contains("Password") || err_str.contains("password") {
            if password.is_some() {
                UnmarkError::WrongPassword {
                    path: pdf_path.to_path_buf(),
                }
            } else {
                UnmarkError::PasswordRequired {
                    path: pdf_path.to_path_buf(),
                }
            }
        } else {
            UnmarkError::CorruptPdf {
                path: pdf_path.to_path_buf(),
                detail: err_str,
            }
        }
    })
}

/// Page count and per-page sizes of an opened document.
pub(crate) fn describe(document: &PdfDocument<'_>, pdf_path: &Path) -> DocumentInfo {
    let pages = document.pages();
    let page_sizes = pages
        .iter()
        .map(|page| PageDimensions {
            width_pt: page.width().value,
            height_pt: page.height().value,
        })
        .collect::<Vec<_>>();

    DocumentInfo {
        path: pdf_path.to_path_buf(),
        page_count: page_sizes.len(),
        page_sizes,
        pdf_version: format!("{:?}", document.version()),
    }
}

/// Render every page of `pdf_path` at `dpi`, in order, passing each buffer to
/// `on_page` before the next page is rendered.
///
/// Any render failure, or an error returned by `on_page`, aborts the loop.
/// Returns the source document's description.
pub fn render_each<F>(
    pdfium: &Pdfium,
    pdf_path: &Path,
    dpi: f32,
    password: Option<&str>,
    mut on_page: F,
) -> Result<DocumentInfo, UnmarkError>
where
    F: FnMut(RasterPage, &DocumentInfo) -> Result<(), UnmarkError>,
{
    validate_dpi(dpi)?;

    let document = open_document(pdfium, pdf_path, password)?;
    let info = describe(&document, pdf_path);
    info!("PDF loaded: {} pages", info.page_count);

    let pages = document.pages();
    for (idx, size) in info.page_sizes.iter().enumerate() {
        let page_num = idx + 1;
        let render_failed = |e: PdfiumError| UnmarkError::RasterisationFailed {
            page: page_num,
            detail: format!("{:?}", e),
        };

        let index = u16::try_from(idx).map_err(|_| UnmarkError::RasterisationFailed {
            page: page_num,
            detail: "page index exceeds pdfium limits".into(),
        })?;
        let page = pages.get(index).map_err(render_failed)?;

        let (width_px, height_px) = pixel_dimensions(size.width_pt, size.height_pt, dpi);
        let render_config = PdfRenderConfig::new().set_target_size(width_px as i32, height_px as i32);
        let bitmap = page.render_with_config(&render_config).map_err(render_failed)?;
        let image = bitmap.as_image().to_rgb8();

        debug!(
            "Rendered page {} ({:.1}×{:.1} pt) → {}x{} px",
            page_num,
            size.width_pt,
            size.height_pt,
            image.width(),
            image.height()
        );

        on_page(RasterPage::new(page_num, image), &info)?;
    }

    Ok(info)
}

/// Render every page of `pdf_path` at `dpi` into memory.
pub fn render_document(
    pdfium: &Pdfium,
    pdf_path: &Path,
    dpi: f32,
    password: Option<&str>,
) -> Result<Vec<RasterPage>, UnmarkError> {
    let mut pages = Vec::new();
    render_each(pdfium, pdf_path, dpi, password, |page, _| {
        pages.push(page);
        Ok(())
    })?;
    Ok(pages)
}

/// Rasterise every page of a PDF without masking.
///
/// Runs inside `spawn_blocking`; pdfium calls are CPU-bound and must not
/// stall the async executor.
pub async fn rasterize(
    pdf_path: &Path,
    dpi: f32,
    password: Option<&str>,
) -> Result<Vec<RasterPage>, UnmarkError> {
    validate_dpi(dpi)?;
    let path = crate::pipeline::input::resolve_input(pdf_path)?;
    let password = password.map(str::to_string);

    tokio::task::spawn_blocking(move || {
        let pdfium = engine::bind()?;
        render_document(&pdfium, &path, dpi, password.as_deref())
    })
    .await
    .map_err(|e| UnmarkError::Internal(format!("Render task panicked: {}", e)))?
}

/// Open a PDF and describe it without rendering.
pub(crate) fn read_info(
    pdfium: &Pdfium,
    pdf_path: &Path,
    password: Option<&str>,
) -> Result<DocumentInfo, UnmarkError> {
    let document = open_document(pdfium, pdf_path, password)?;
    Ok(describe(&document, pdf_path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a4_at_200_dpi() {
        // 595 × 200/72 = 1652.7…, 842 × 200/72 = 2338.8…
        assert_eq!(pixel_dimensions(595.0, 842.0, 200.0), (1653, 2339));
    }

    #[test]
    fn native_resolution_is_identity() {
        assert_eq!(pixel_dimensions(612.0, 792.0, 72.0), (612, 792));
        assert_eq!(render_scale(72.0), 1.0);
    }

    #[test]
    fn fractional_sizes_round_up() {
        assert_eq!(pixel_dimensions(10.1, 0.2, 72.0), (11, 1));
        assert_eq!(pixel_dimensions(1.0, 1.0, 144.0), (2, 2));
    }

    #[test]
    fn whole_inches_do_not_gain_a_pixel() {
        assert_eq!(pixel_dimensions(72.0, 144.0, 200.0), (200, 400));
    }

    #[test]
    fn never_zero_pixels() {
        assert_eq!(pixel_dimensions(0.0, 0.0, 300.0), (1, 1));
    }
}
