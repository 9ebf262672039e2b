//! Configuration types for watermark removal.
//!
//! All pipeline behaviour is controlled through [`UnmarkConfig`], built via
//! its [`UnmarkConfigBuilder`]. The builder clamps nothing silently except
//! where noted; `build()` rejects values the pipeline cannot honour with
//! [`UnmarkError::InvalidConfig`].

use crate::error::UnmarkError;
use crate::pipeline::mask::ColorRange;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Default rendering resolution.
pub const DEFAULT_DPI: f32 = 200.0;

/// Upper bound accepted by the builder. A 2400-DPI A4 page is already
/// ~20 000 × 28 000 px.
pub const MAX_DPI: f32 = 2400.0;

/// Default output file name inside the output directory.
pub const DEFAULT_OUTPUT_FILE_NAME: &str = "output_file.pdf";

/// Configuration for one watermark-removal run.
///
/// Built via [`UnmarkConfig::builder()`] or [`UnmarkConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_pdf_unmark::{ColorRange, PageSize, UnmarkConfig};
///
/// let config = UnmarkConfig::builder()
///     .dpi(300.0)
///     .color_range(ColorRange::new([200, 200, 200], [255, 255, 255]))
///     .page_size(PageSize::LETTER)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct UnmarkConfig {
    /// Rendering DPI. Must be positive. Default: 200.
    ///
    /// The same value converts pixels back to points when composing, so the
    /// output keeps the physical size of the source page (before fitting).
    pub dpi: f32,

    /// Pixels inside this range are flattened to white.
    /// Default: (160,160,160)–(255,255,255).
    pub color_range: ColorRange,

    /// Size of every output page. Default: A4 (595 × 842 pt).
    pub page_size: PageSize,

    /// Where the fitted image sits on the output page. Default: top-left.
    pub placement: Placement,

    /// Where masked pages wait between the two phases. Default: memory.
    pub scratch: ScratchMode,

    /// File name written inside the output directory. Default: `output_file.pdf`.
    pub output_file_name: String,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Receives per-phase progress events.
    pub progress_callback: Option<ProgressCallback>,

    /// Checked between pages; when set the run stops with
    /// [`UnmarkError::Cancelled`].
    pub cancel: Option<CancelFlag>,
}

impl Default for UnmarkConfig {
    fn default() -> Self {
        Self {
            dpi: DEFAULT_DPI,
            color_range: ColorRange::default(),
            page_size: PageSize::default(),
            placement: Placement::default(),
            scratch: ScratchMode::default(),
            output_file_name: DEFAULT_OUTPUT_FILE_NAME.to_string(),
            password: None,
            progress_callback: None,
            cancel: None,
        }
    }
}

impl fmt::Debug for UnmarkConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnmarkConfig")
            .field("dpi", &self.dpi)
            .field("color_range", &self.color_range)
            .field("page_size", &self.page_size)
            .field("placement", &self.placement)
            .field("scratch", &self.scratch)
            .field("output_file_name", &self.output_file_name)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn UnmarkProgressCallback>"),
            )
            .field("cancel", &self.cancel)
            .finish()
    }
}

impl UnmarkConfig {
    /// Create a new builder for `UnmarkConfig`.
    pub fn builder() -> UnmarkConfigBuilder {
        UnmarkConfigBuilder {
            config: Self::default(),
        }
    }

    /// Re-run the builder's checks, for configs assembled by hand.
    pub fn validate(&self) -> Result<(), UnmarkError> {
        validate_dpi(self.dpi)?;
        if !self.color_range.is_valid() {
            return Err(UnmarkError::InvalidConfig(format!(
                "color range lower bound {:?} exceeds upper bound {:?}",
                self.color_range.lower, self.color_range.upper
            )));
        }
        if !self.page_size.is_valid() {
            return Err(UnmarkError::InvalidConfig(format!(
                "page size must be positive, got {}×{} pt",
                self.page_size.width, self.page_size.height
            )));
        }
        let name = self.output_file_name.trim();
        let bare = std::path::Path::new(name).file_name() == Some(std::ffi::OsStr::new(name));
        if !bare || name.contains(['/', '\\']) {
            return Err(UnmarkError::InvalidConfig(format!(
                "output file name must be a bare file name, got {:?}",
                self.output_file_name
            )));
        }
        Ok(())
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelFlag::is_cancelled)
    }
}

pub(crate) fn validate_dpi(dpi: f32) -> Result<(), UnmarkError> {
    if !dpi.is_finite() || dpi <= 0.0 || dpi > MAX_DPI {
        return Err(UnmarkError::InvalidConfig(format!(
            "DPI must be in (0, {MAX_DPI}], got {dpi}"
        )));
    }
    Ok(())
}

/// Builder for [`UnmarkConfig`].
#[derive(Debug)]
pub struct UnmarkConfigBuilder {
    config: UnmarkConfig,
}

impl UnmarkConfigBuilder {
    pub fn dpi(mut self, dpi: f32) -> Self {
        self.config.dpi = dpi;
        self
    }

    pub fn color_range(mut self, range: ColorRange) -> Self {
        self.config.color_range = range;
        self
    }

    pub fn page_size(mut self, size: PageSize) -> Self {
        self.config.page_size = size;
        self
    }

    pub fn placement(mut self, placement: Placement) -> Self {
        self.config.placement = placement;
        self
    }

    pub fn scratch(mut self, mode: ScratchMode) -> Self {
        self.config.scratch = mode;
        self
    }

    pub fn output_file_name(mut self, name: impl Into<String>) -> Self {
        self.config.output_file_name = name.into();
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    pub fn cancel_flag(mut self, flag: CancelFlag) -> Self {
        self.config.cancel = Some(flag);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<UnmarkConfig, UnmarkError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

// ── Value types ──────────────────────────────────────────────────────────

/// Output page size in PDF points (1/72 inch).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

impl PageSize {
    /// ISO A4 portrait, rounded to whole points.
    pub const A4: PageSize = PageSize {
        width: 595.0,
        height: 842.0,
    };

    /// US Letter portrait.
    pub const LETTER: PageSize = PageSize {
        width: 612.0,
        height: 792.0,
    };

    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    fn is_valid(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}

impl Default for PageSize {
    fn default() -> Self {
        Self::A4
    }
}

/// Position of the fitted page image on its output page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Placement {
    /// Image's top-left corner on the page's top-left corner. (default)
    #[default]
    TopLeft,
    /// Image centred on the page.
    Center,
}

/// Storage for masked pages between the rasterize and compose phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ScratchMode {
    /// Keep decoded pages in memory. (default)
    #[default]
    Memory,
    /// Write each page as a PNG into a temporary directory that is removed
    /// when the run ends, whatever the outcome.
    Disk,
}

/// Shared cancellation flag, checked between pages.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
