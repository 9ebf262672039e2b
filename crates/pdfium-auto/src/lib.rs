//! # pdfium-auto
//!
//! Locate, download and cache the [PDFium](https://pdfium.googlesource.com/pdfium/)
//! shared library so that `pdf-unmark` works without a manual install.
//!
//! ## Resolution order
//!
//! 1. `PDFIUM_LIB_PATH`: an existing library file, used as-is.
//! 2. The per-version cache directory (see [`cache_dir`]).
//! 3. A download of the platform archive from
//!    [bblanchon/pdfium-binaries](https://github.com/bblanchon/pdfium-binaries),
//!    extracted into the cache directory.
//!
//! Steps 1 and 2 never touch the network; [`locate`] performs only those.
//!
//! ```rust,no_run
//! let path = pdfium_auto::fetch(Some(&|done, total| {
//!     if let Some(t) = total {
//!         eprint!("\rPDFium: {done}/{t} bytes");
//!     }
//! }))
//! .expect("download failed");
//! let pdfium = pdfium_auto::bind_at(&path).expect("bind failed");
//! ```
//!
//! ## Environment variables
//!
//! - `PDFIUM_LIB_PATH`: path to an existing pdfium library; skips download.
//! - `PDFIUM_AUTO_CACHE_DIR`: override the cache root.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use pdfium_render::prelude::Pdfium;
use thiserror::Error;

/// The pdfium-binaries release tag used for downloads.
pub const PDFIUM_VERSION: &str = "7690";

/// Application directory name under the platform cache root.
const CACHE_APP_DIR: &str = "pdf-unmark";

const RELEASE_BASE_URL: &str = "https://github.com/bblanchon/pdfium-binaries/releases/download";

/// Callback receiving `(bytes_downloaded, total_bytes)` while fetching.
pub type DownloadProgress<'a> = &'a dyn Fn(u64, Option<u64>);

/// Errors returned while locating, fetching or binding pdfium.
#[derive(Error, Debug)]
pub enum PdfiumAutoError {
    /// No prebuilt pdfium exists for this OS/architecture pair.
    #[error("Unsupported platform: {os}/{arch}")]
    UnsupportedPlatform { os: String, arch: String },

    #[error("Cache directory error at '{path}': {source}")]
    CacheDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Download of '{url}' failed: {reason}")]
    Download { url: String, reason: String },

    #[error("Archive extraction failed: {0}")]
    Extract(String),

    /// `pdfium-render` could not load the library.
    #[error("Failed to bind PDFium from '{path}': {reason}")]
    Bind { path: PathBuf, reason: String },
}

/// A prebuilt pdfium artifact for one platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Platform {
    /// Release asset name, e.g. `pdfium-linux-x64.tgz`.
    pub archive: &'static str,
    /// Library path inside the archive.
    pub member: &'static str,
    /// File name written to the cache directory.
    pub file_name: &'static str,
}

const fn artifact(archive: &'static str, file_name: &'static str, member: &'static str) -> Platform {
    Platform {
        archive,
        member,
        file_name,
    }
}

const PLATFORMS: &[(&str, &str, Platform)] = &[
    ("macos", "aarch64", artifact("pdfium-mac-arm64.tgz", "libpdfium.dylib", "lib/libpdfium.dylib")),
    ("macos", "x86_64", artifact("pdfium-mac-x64.tgz", "libpdfium.dylib", "lib/libpdfium.dylib")),
    ("linux", "x86_64", artifact("pdfium-linux-x64.tgz", "libpdfium.so", "lib/libpdfium.so")),
    ("linux", "aarch64", artifact("pdfium-linux-arm64.tgz", "libpdfium.so", "lib/libpdfium.so")),
    ("windows", "x86_64", artifact("pdfium-win-x64.tgz", "pdfium.dll", "bin/pdfium.dll")),
    ("windows", "aarch64", artifact("pdfium-win-arm64.tgz", "pdfium.dll", "bin/pdfium.dll")),
    ("windows", "x86", artifact("pdfium-win-x86.tgz", "pdfium.dll", "bin/pdfium.dll")),
];

impl Platform {
    /// Look up the artifact for an explicit OS/architecture pair.
    pub fn lookup(os: &str, arch: &str) -> Result<Self, PdfiumAutoError> {
        PLATFORMS
            .iter()
            .find(|(o, a, _)| *o == os && *a == arch)
            .map(|(_, _, p)| *p)
            .ok_or_else(|| PdfiumAutoError::UnsupportedPlatform {
                os: os.to_string(),
                arch: arch.to_string(),
            })
    }

    /// The artifact for the platform this binary was compiled for.
    pub fn current() -> Result<Self, PdfiumAutoError> {
        Self::lookup(std::env::consts::OS, std::env::consts::ARCH)
    }

    /// Download URL of this artifact's release archive.
    pub fn download_url(&self) -> String {
        format!(
            "{RELEASE_BASE_URL}/chromium%2F{PDFIUM_VERSION}/{}",
            self.archive
        )
    }
}

/// Per-version cache directory for the pdfium library.
///
/// - **macOS**: `~/Library/Caches/pdf-unmark/pdfium-{VERSION}/`
/// - **Linux**: `~/.cache/pdf-unmark/pdfium-{VERSION}/`
/// - **Windows**: `%LOCALAPPDATA%\pdf-unmark\pdfium-{VERSION}\`
///
/// `PDFIUM_AUTO_CACHE_DIR` replaces the `<cache>/pdf-unmark` prefix.
pub fn cache_dir() -> PathBuf {
    let root = match std::env::var_os("PDFIUM_AUTO_CACHE_DIR") {
        Some(dir) => PathBuf::from(dir),
        None => dirs::cache_dir()
            .or_else(|| dirs::home_dir().map(|h| h.join(".cache")))
            .unwrap_or_else(std::env::temp_dir)
            .join(CACHE_APP_DIR),
    };
    root.join(format!("pdfium-{PDFIUM_VERSION}"))
}

static FETCHED: OnceLock<PathBuf> = OnceLock::new();

/// Find an already-available library without any network access.
pub fn locate() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os("PDFIUM_LIB_PATH").map(PathBuf::from) {
        if path.is_file() {
            return Some(path);
        }
    }
    let platform = Platform::current().ok()?;
    let cached = cache_dir().join(platform.file_name);
    cached.is_file().then_some(cached)
}

/// Whether [`fetch`] would return immediately.
pub fn is_available() -> bool {
    locate().is_some()
}

/// Return the library path, downloading it into the cache on first use.
///
/// The download happens at most once per process.
pub fn fetch(on_progress: Option<DownloadProgress<'_>>) -> Result<PathBuf, PdfiumAutoError> {
    if let Some(path) = FETCHED.get() {
        return Ok(path.clone());
    }
    let path = match locate() {
        Some(path) => path,
        None => download_into_cache(on_progress)?,
    };
    let _ = FETCHED.set(path.clone());
    Ok(path)
}

/// Bind to pdfium, fetching the library first if needed.
pub fn bind(on_progress: Option<DownloadProgress<'_>>) -> Result<Pdfium, PdfiumAutoError> {
    let path = fetch(on_progress)?;
    bind_at(&path)
}

/// Bind to the pdfium library at `path`.
pub fn bind_at(path: &Path) -> Result<Pdfium, PdfiumAutoError> {
    Pdfium::bind_to_library(path)
        .map(Pdfium::new)
        .map_err(|e| PdfiumAutoError::Bind {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}

fn download_into_cache(
    on_progress: Option<DownloadProgress<'_>>,
) -> Result<PathBuf, PdfiumAutoError> {
    if let Some(path) = std::env::var_os("PDFIUM_LIB_PATH") {
        eprintln!(
            "pdfium-auto: PDFIUM_LIB_PATH '{}' not found; downloading …",
            Path::new(&path).display()
        );
    }

    let platform = Platform::current()?;
    let dir = cache_dir();
    std::fs::create_dir_all(&dir).map_err(|source| PdfiumAutoError::CacheDir {
        path: dir.clone(),
        source,
    })?;

    let archive = download(&platform.download_url(), on_progress)?;
    let dest = dir.join(platform.file_name);
    unpack_member(&archive, platform.member, &dest)?;
    Ok(dest)
}

fn download(
    url: &str,
    on_progress: Option<DownloadProgress<'_>>,
) -> Result<Vec<u8>, PdfiumAutoError> {
    let fail = |reason: String| PdfiumAutoError::Download {
        url: url.to_string(),
        reason,
    };

    let client = reqwest::blocking::Client::builder()
        .user_agent(concat!("pdfium-auto/", env!("CARGO_PKG_VERSION")))
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()
        .map_err(|e| fail(e.to_string()))?;

    let mut response = client.get(url).send().map_err(|e| fail(e.to_string()))?;
    if !response.status().is_success() {
        return Err(fail(format!("HTTP {}", response.status())));
    }

    let total = response.content_length();
    let mut body = Vec::with_capacity(total.unwrap_or(32 * 1024 * 1024) as usize);
    let mut chunk = vec![0u8; 64 * 1024];
    loop {
        match response.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                body.extend_from_slice(&chunk[..n]);
                if let Some(cb) = on_progress {
                    cb(body.len() as u64, total);
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(fail(format!("read error: {e}"))),
        }
    }
    Ok(body)
}

/// Extract the single archive member `member` into `dest`.
fn unpack_member(archive: &[u8], member: &str, dest: &Path) -> Result<(), PdfiumAutoError> {
    use flate2::read::GzDecoder;

    let extract = |e: std::io::Error| PdfiumAutoError::Extract(e.to_string());
    let mut tarball = tar::Archive::new(GzDecoder::new(archive));

    for entry in tarball.entries().map_err(extract)? {
        let mut entry = entry.map_err(extract)?;
        if entry.path().map_err(extract)?.to_string_lossy() == member {
            entry.unpack(dest).map_err(extract)?;
            return Ok(());
        }
    }

    Err(PdfiumAutoError::Extract(format!(
        "'{member}' not found in archive"
    )))
}
