//! CLI binary for edgequake-pdf-unmark.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `UnmarkConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_pdf_unmark::{
    inspect_with_password, remove_watermark, CancelFlag, ColorRange, ErrorKind, PageSize, Phase,
    Placement, ProgressCallback, ProgressEvent, ScratchMode, UnmarkConfig, UnmarkProgressCallback,
    DEFAULT_OUTPUT_FILE_NAME,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// One bar reused for both phases; the prefix names the running phase.
struct CliProgressCallback {
    bar: ProgressBar,
    phase_started: std::sync::Mutex<Option<Instant>>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(TICKS),
        );
        bar.set_prefix("Preparing");
        bar.set_message("Opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            phase_started: std::sync::Mutex::new(None),
        })
    }

    fn prefix(phase: Phase) -> &'static str {
        match phase {
            Phase::RasterizingMasking => "Cleaning ",
            Phase::Composing => "Composing",
        }
    }
}

impl UnmarkProgressCallback for CliProgressCallback {
    fn on_phase_start(&self, phase: Phase, total_pages: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_style(style);
        self.bar.set_length(total_pages as u64);
        self.bar.set_position(0);
        self.bar.set_prefix(Self::prefix(phase));
        self.bar.reset_eta();
        if let Ok(mut started) = self.phase_started.lock() {
            *started = Some(Instant::now());
        }
    }

    fn on_progress(&self, event: ProgressEvent) {
        self.bar.set_position(event.completed as u64);
        self.bar.set_message(format!("{:.0}%", event.percent()));
    }

    fn on_phase_complete(&self, phase: Phase, total_pages: usize) {
        let elapsed = self
            .phase_started
            .lock()
            .ok()
            .and_then(|mut s| s.take())
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        self.bar.println(format!(
            "  {} {:<20} {:>3} pages  {}",
            green("✓"),
            phase.label(),
            total_pages,
            dim(&format!("{elapsed:.1}s")),
        ));
        if phase == Phase::Composing {
            self.bar.finish_and_clear();
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Clean a scan, writing ./output_file.pdf
  pdf-unmark scan.pdf

  # Choose the output directory and file name
  pdf-unmark scan.pdf -o cleaned/ --output-name contract.pdf

  # Sharper output for small print
  pdf-unmark --dpi 300 scan.pdf

  # Only flatten very light grey (keeps mid-grey content)
  pdf-unmark --lower 200,200,200 --upper 255,255,255 scan.pdf

  # US Letter pages, image centred
  pdf-unmark --page-size letter --center scan.pdf

  # Bound memory on very long documents
  pdf-unmark --scratch-disk book.pdf

  # Page count and sizes only
  pdf-unmark --inspect-only scan.pdf

HOW IT WORKS:
  Every page is rendered to an image at --dpi. Pixels whose red, green and
  blue values all lie within [--lower, --upper] become white. Each cleaned
  image is then shrunk (never enlarged) to fit the output page and placed
  at its top-left corner. The output contains images only; text is no
  longer selectable.

ENVIRONMENT VARIABLES:
  PDF_UNMARK_*            Every flag, e.g. PDF_UNMARK_DPI=300
  RUST_LOG                Override log filter (e.g. edgequake_pdf_unmark=debug)
  PDFIUM_LIB_PATH         Path to an existing libpdfium — skips auto-download
  PDFIUM_AUTO_CACHE_DIR   Override the default pdfium cache directory

SETUP:
  PDFium (~30 MB) is downloaded automatically on first run and cached in
  ~/.cache/pdf-unmark/pdfium-7690/. No manual library setup is required.
"#;

/// Remove light-colored watermarks from PDF files.
#[derive(Parser, Debug)]
#[command(
    name = "pdf-unmark",
    version,
    about = "Remove light-colored watermarks from PDF files",
    long_about = "Remove light-colored watermarks from PDF files by rendering each page, \
flattening pixels inside a color range to white, and rebuilding the document from the \
cleaned page images.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path.
    input: PathBuf,

    /// Directory for the cleaned PDF (created if missing).
    #[arg(short, long, env = "PDF_UNMARK_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,

    /// File name of the cleaned PDF inside the output directory.
    #[arg(long, env = "PDF_UNMARK_OUTPUT_NAME", default_value = DEFAULT_OUTPUT_FILE_NAME)]
    output_name: String,

    /// Rendering DPI.
    #[arg(long, env = "PDF_UNMARK_DPI", default_value_t = 200.0)]
    dpi: f32,

    /// Lower bound of the watermark color range, as R,G,B.
    #[arg(long, env = "PDF_UNMARK_LOWER", default_value = "160,160,160", value_parser = parse_rgb)]
    lower: [u8; 3],

    /// Upper bound of the watermark color range, as R,G,B.
    #[arg(long, env = "PDF_UNMARK_UPPER", default_value = "255,255,255", value_parser = parse_rgb)]
    upper: [u8; 3],

    /// Output page size: a4, letter, or WxH in points (e.g. 612x1008).
    #[arg(long, env = "PDF_UNMARK_PAGE_SIZE", default_value = "a4", value_parser = parse_page_size)]
    page_size: PageSize,

    /// Centre each image on its page instead of anchoring it top-left.
    #[arg(long, env = "PDF_UNMARK_CENTER")]
    center: bool,

    /// Keep masked pages as PNG files in a temp directory instead of memory.
    #[arg(long, env = "PDF_UNMARK_SCRATCH_DISK")]
    scratch_disk: bool,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDF_UNMARK_PASSWORD")]
    password: Option<String>,

    /// Print the run summary (or inspect result) as JSON on stdout.
    #[arg(long, env = "PDF_UNMARK_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDF_UNMARK_NO_PROGRESS")]
    no_progress: bool,

    /// Print page count and page sizes only, write nothing.
    #[arg(long, env = "PDF_UNMARK_INSPECT_ONLY")]
    inspect_only: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF_UNMARK_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDF_UNMARK_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level logs unless --verbose is given.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.inspect_only;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    ensure_engine(cli.quiet)?;

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let info = inspect_with_password(&cli.input, cli.password.as_deref())
            .await
            .context("Failed to inspect PDF")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&info).context("Failed to serialize document info")?
            );
        } else {
            println!("File:         {}", info.path.display());
            println!("Pages:        {}", info.page_count);
            println!("PDF Version:  {}", info.pdf_version);
            for (i, size) in info.page_sizes.iter().enumerate() {
                println!(
                    "  page {:>4}:  {:.1} × {:.1} pt",
                    i + 1,
                    size.width_pt,
                    size.height_pt
                );
            }
        }
        return Ok(());
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as ProgressCallback)
    } else {
        None
    };
    let cancel = CancelFlag::new();
    let config = build_config(&cli, progress_cb, cancel.clone())?;

    // Ctrl-C stops the run at the next page boundary; no output is written.
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });

    // ── Run ──────────────────────────────────────────────────────────────
    let output = match remove_watermark(&cli.input, &cli.output_dir, &config).await {
        Ok(output) => output,
        Err(e) if e.kind() == ErrorKind::Cancelled => {
            if !cli.quiet {
                eprintln!("{} {}", red("✘"), e);
            }
            std::process::exit(130);
        }
        Err(e) => return Err(e).context("Watermark removal failed"),
    };

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else if !cli.quiet {
        let stats = &output.stats;
        eprintln!(
            "{}  {} pages  {}ms  →  {}",
            green("✔"),
            stats.total_pages,
            stats.total_duration_ms,
            bold(&stats.output_path.display().to_string()),
        );
        eprintln!(
            "   {} pixels whitened  /  {} written",
            dim(&stats.masked_pixels.to_string()),
            dim(&format_bytes(stats.output_bytes)),
        );
    }

    Ok(())
}

/// Make sure the pdfium library is on disk, showing a download bar on the
/// very first run.
fn ensure_engine(quiet: bool) -> Result<()> {
    if pdfium_auto::is_available() {
        return Ok(());
    }
    if quiet {
        tokio::task::block_in_place(|| pdfium_auto::fetch(None))
            .context("Failed to download PDFium engine")?;
        return Ok(());
    }

    let dl_bar = ProgressBar::new(0);
    dl_bar.set_style(
        ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {bytes}/{total_bytes}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS),
    );
    dl_bar.set_prefix("PDF engine");
    dl_bar.set_message("Connecting…");
    dl_bar.enable_steady_tick(Duration::from_millis(80));

    let bar = dl_bar.clone();
    tokio::task::block_in_place(|| {
        pdfium_auto::fetch(Some(&|downloaded, total| {
            if let Some(t) = total {
                if bar.length().unwrap_or(0) != t {
                    bar.set_length(t);
                }
            }
            bar.set_position(downloaded);
        }))
    })
    .context("Failed to download PDFium engine")?;

    dl_bar.finish_with_message("ready ✓");
    eprintln!("{} PDF engine installed", cyan("◆"));
    Ok(())
}

/// Map CLI args to `UnmarkConfig`.
fn build_config(
    cli: &Cli,
    progress: Option<ProgressCallback>,
    cancel: CancelFlag,
) -> Result<UnmarkConfig> {
    let mut builder = UnmarkConfig::builder()
        .dpi(cli.dpi)
        .color_range(ColorRange::new(cli.lower, cli.upper))
        .page_size(cli.page_size)
        .placement(if cli.center {
            Placement::Center
        } else {
            Placement::TopLeft
        })
        .scratch(if cli.scratch_disk {
            ScratchMode::Disk
        } else {
            ScratchMode::Memory
        })
        .output_file_name(cli.output_name.clone())
        .cancel_flag(cancel);

    if let Some(ref pwd) = cli.password {
        builder = builder.password(pwd.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Parse `R,G,B` into a channel triple.
fn parse_rgb(s: &str) -> std::result::Result<[u8; 3], String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    let [r, g, b] = parts.as_slice() else {
        return Err(format!("expected R,G,B, got '{s}'"));
    };
    let channel = |c: &str| {
        c.parse::<u8>()
            .map_err(|_| format!("channel '{c}' is not an integer in 0..=255"))
    };
    Ok([channel(r)?, channel(g)?, channel(b)?])
}

/// Parse `a4`, `letter` or `WxH` (points).
fn parse_page_size(s: &str) -> std::result::Result<PageSize, String> {
    match s.trim().to_lowercase().as_str() {
        "a4" => Ok(PageSize::A4),
        "letter" => Ok(PageSize::LETTER),
        custom => {
            let (w, h) = custom
                .split_once('x')
                .ok_or_else(|| format!("expected a4, letter or WxH, got '{s}'"))?;
            let dim = |v: &str| {
                v.trim()
                    .parse::<f32>()
                    .ok()
                    .filter(|p| p.is_finite() && *p > 0.0)
                    .ok_or_else(|| format!("invalid page dimension '{v}'"))
            };
            Ok(PageSize::new(dim(w)?, dim(h)?))
        }
    }
}

fn format_bytes(n: u64) -> String {
    const MIB: f64 = 1024.0 * 1024.0;
    if n as f64 >= MIB {
        format!("{:.1} MiB", n as f64 / MIB)
    } else {
        format!("{:.1} KiB", n as f64 / 1024.0)
    }
}
