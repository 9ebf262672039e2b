//! The per-page pixel buffer that flows through the pipeline.

use image::RgbImage;

/// One rendered page: an 8-bit RGB buffer plus its 1-based position in the
/// source document.
///
/// Created by the rasterizer, mutated in place by the masker, read by the
/// composer.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterPage {
    /// 1-based page index in the source document.
    pub index: usize,
    pub image: RgbImage,
}

impl RasterPage {
    pub fn new(index: usize, image: RgbImage) -> Self {
        Self { index, image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Size in PDF points when the buffer was rendered at `dpi`.
    pub fn size_in_points(&self, dpi: f32) -> (f64, f64) {
        let per_pixel = 72.0 / f64::from(dpi);
        (
            f64::from(self.width()) * per_pixel,
            f64::from(self.height()) * per_pixel,
        )
    }
}
