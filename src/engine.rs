//! Binding to the pdfium shared library.
//!
//! Both the rasterizer and the composer need a live [`Pdfium`]. The library
//! file is located (or downloaded once per process) by `pdfium-auto`; this
//! module only translates its errors into [`UnmarkError`].

use crate::error::UnmarkError;
use pdfium_render::prelude::Pdfium;
use tracing::debug;

/// Bind to pdfium, downloading the library on first use if necessary.
///
/// Blocking: call from `spawn_blocking` or a plain thread.
pub fn bind() -> Result<Pdfium, UnmarkError> {
    let pdfium = pdfium_auto::bind(None).map_err(|e| UnmarkError::EngineUnavailable(e.to_string()))?;
    debug!("Bound pdfium library");
    Ok(pdfium)
}

/// Whether pdfium can be bound without touching the network.
pub fn is_available() -> bool {
    pdfium_auto::is_available()
}
