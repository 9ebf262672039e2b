//! Pipeline stages for watermark removal.
//!
//! Each submodule implements exactly one step and can be used on its own.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ mask ──▶ scratch ──▶ compose
//! (paths)   (pdfium)   (RGB)    (mem/disk)  (pdfium)
//! ```
//!
//! 1. [`input`]: validate the source PDF and prepare the output directory
//! 2. [`render`]: rasterise every page at the requested DPI, one at a time
//! 3. [`mask`]: flatten pixels inside the color range to white, in place
//! 4. [`scratch`]: hold masked pages until composition starts
//! 5. [`compose`]: fit each page onto a fixed-size page and serialize the PDF

pub mod compose;
pub mod input;
pub mod mask;
pub mod render;
pub mod scratch;
