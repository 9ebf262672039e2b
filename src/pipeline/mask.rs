//! Color-range watermark masking.
//!
//! Light overlay marks (grey stamps, faint diagonal text) render as pixels
//! that are bright on every channel. Flattening everything inside a
//! configured [`ColorRange`] to white removes them along with any other
//! near-white residue. The range is plain data; the masker knows nothing
//! about where it came from.

use crate::page::RasterPage;
use image::{Rgb, RgbImage};
use serde::{Deserialize, Serialize};

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

/// Inclusive per-channel bounds selecting watermark pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorRange {
    pub lower: [u8; 3],
    pub upper: [u8; 3],
}

impl ColorRange {
    pub const fn new(lower: [u8; 3], upper: [u8; 3]) -> Self {
        Self { lower, upper }
    }

    /// True when every channel of `px` lies in `[lower, upper]`.
    #[inline]
    pub fn contains(&self, px: [u8; 3]) -> bool {
        (0..3).all(|c| self.lower[c] <= px[c] && px[c] <= self.upper[c])
    }

    /// A range with `lower > upper` on some channel matches nothing.
    pub fn is_valid(&self) -> bool {
        (0..3).all(|c| self.lower[c] <= self.upper[c])
    }
}

impl Default for ColorRange {
    /// Light grey to white.
    fn default() -> Self {
        Self::new([160, 160, 160], [255, 255, 255])
    }
}

/// Flatten every pixel inside `range` to white, in place.
///
/// Returns how many pixels actually changed; pixels that match but are
/// already white are left alone and not counted. Idempotent for any range.
pub fn mask_image(image: &mut RgbImage, range: &ColorRange) -> u64 {
    let mut changed = 0;
    for px in image.pixels_mut() {
        if *px != WHITE && range.contains(px.0) {
            *px = WHITE;
            changed += 1;
        }
    }
    changed
}

/// [`mask_image`] applied to a page's buffer.
pub fn mask_page(page: &mut RasterPage, range: &ColorRange) -> u64 {
    mask_image(&mut page.image, range)
}
