//! CLI binary for pdf2png.
//!
//! A thin shim over the library crate: maps CLI flags onto a [`Pipeline`],
//! renders progress from observer events, and writes the page files.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pdf2png::{
    write_outputs, ExportedPage, OverallStatus, PageRecord, PageStatus, PdfiumRasterizer,
    Pipeline, PipelineConfig, PipelineObserver, RunSummary, Snapshot, TesseractConfig,
    TesseractExtractor, VisionConfig, VisionExtractor, DEFAULT_SCALE,
};
use serde::Serialize;
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::warn;
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

// ── Progress observer using indicatif ────────────────────────────────────────

/// Terminal observer: a spinner while the PDF is read and rendered, then a
/// bar that ticks once per finished page with one ✓/✗ line per page.
struct CliProgress {
    bar: ProgressBar,
    /// Per-page wall-clock start times for elapsed reporting.
    start_times: Mutex<HashMap<usize, Instant>>,
    /// Extraction enabled; otherwise pages finish silently as `skipped`.
    ocr: bool,
}

impl CliProgress {
    fn new(ocr: bool) -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            ocr,
        })
    }

    /// Switch to the full progress-bar style once the page count is known.
    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Extracting");
        self.bar.reset_eta();
    }

    fn elapsed(&self, page_num: usize) -> f64 {
        self.start_times
            .lock()
            .unwrap()
            .remove(&page_num)
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl PipelineObserver for CliProgress {
    fn on_status_changed(&self, status: &OverallStatus) {
        match status {
            OverallStatus::Reading | OverallStatus::Converting => {
                self.bar.set_message(status.to_string());
            }
            OverallStatus::Complete { .. } | OverallStatus::Cancelled { .. } => {
                self.bar.finish_and_clear();
            }
            OverallStatus::Error { .. } => self.bar.abandon(),
            _ => {}
        }
    }

    fn on_pages_created(&self, records: &[PageRecord]) {
        if !self.ocr {
            self.bar.println(format!(
                "{} {}",
                cyan("◆"),
                bold(&format!("Rendered {} pages", records.len()))
            ));
            return;
        }
        self.activate_bar(records.len());
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Rendered {} pages, extracting text…", records.len()))
        ));
    }

    fn on_page_updated(&self, _index: usize, record: &PageRecord) {
        let page_num = record.page_num();
        let total = self.bar.length().unwrap_or(0);
        match record.status {
            PageStatus::Processing => {
                self.start_times
                    .lock()
                    .unwrap()
                    .insert(page_num, Instant::now());
                self.bar.set_message(format!("page {page_num}"));
            }
            PageStatus::Complete => {
                let chars = record.text.as_deref().map_or(0, str::len);
                self.bar.println(format!(
                    "  {} Page {:>3}/{:<3}  {:<8}  {}",
                    green("✓"),
                    page_num,
                    total,
                    dim(&format!("{chars:>5} chars")),
                    dim(&format!("{:.1}s", self.elapsed(page_num))),
                ));
                self.bar.inc(1);
            }
            PageStatus::Error => {
                let error = record.error.clone().unwrap_or_default();
                // Truncate very long error messages to keep output tidy.
                let msg = match error.char_indices().nth(79) {
                    Some((cut, _)) => format!("{}\u{2026}", &error[..cut]),
                    None => error,
                };
                self.bar.println(format!(
                    "  {} Page {:>3}/{:<3}  {}  {}",
                    red("✗"),
                    page_num,
                    total,
                    red(&msg),
                    dim(&format!("{:.1}s", self.elapsed(page_num))),
                ));
                self.bar.inc(1);
            }
            PageStatus::Cancelled => self.bar.inc(1),
            PageStatus::Pending | PageStatus::Skipped => {}
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Render every page to PNG and OCR it with tesseract
  pdf2png report.pdf -o out/

  # Images only, at 2× magnification
  pdf2png --ocr none --scale 2 report.pdf

  # Vision-model OCR, four pages at a time
  pdf2png --ocr vision --provider openai --model gpt-4.1-mini --concurrency 4 scan.pdf

  # French + English tesseract models
  pdf2png --lang fra+eng brochure.pdf

  # From a URL, JSON report on stdout
  pdf2png --json https://arxiv.org/pdf/1706.03762 -o attention/

OUTPUT:
  <name>_page_<n>.png   one per page (always)
  <name>_page_<n>.txt   recognised text, for pages whose extraction succeeded

ENVIRONMENT VARIABLES:
  PDFIUM_LIB_PATH         libpdfium file, or the directory containing it
  OPENAI_API_KEY          OpenAI API key (vision OCR)
  ANTHROPIC_API_KEY       Anthropic API key (vision OCR)
  GEMINI_API_KEY          Google Gemini API key (vision OCR)
  EDGEQUAKE_LLM_PROVIDER  Override vision provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override vision model ID
  RUST_LOG                Override log filter (e.g. pdf2png=debug)

Press Ctrl-C to cancel: pages already being read finish, the rest are marked
cancelled, and every rendered PNG is still written. Press it again to exit
immediately.
"#;

/// Convert PDF pages to PNG images and extract their text.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2png",
    version,
    about = "Convert PDF pages to PNG images and extract their text with OCR",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path or HTTP/HTTPS URL.
    input: String,

    /// Directory for the page images and text files.
    #[arg(short, long, env = "PDF2PNG_OUTPUT", default_value = ".")]
    output: PathBuf,

    /// Magnification factor (0.1–10). 1.5 renders an A4 page at 893×1263 px.
    #[arg(long, env = "PDF2PNG_SCALE", default_value_t = DEFAULT_SCALE)]
    scale: f32,

    /// Text extraction engine.
    #[arg(long, env = "PDF2PNG_OCR", value_enum, default_value = "tesseract")]
    ocr: OcrArg,

    /// Tesseract language model(s), e.g. eng or eng+fra.
    #[arg(long, env = "PDF2PNG_LANG", default_value = "eng")]
    lang: String,

    /// Tesseract executable.
    #[arg(long, env = "PDF2PNG_TESSERACT_BIN", default_value = "tesseract")]
    tesseract_bin: PathBuf,

    /// Directory holding *.traineddata files.
    #[arg(long, env = "TESSDATA_PREFIX")]
    tessdata: Option<PathBuf>,

    /// Vision provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Vision model ID (default: gpt-4.1-nano).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// Pages whose text is extracted at the same time.
    #[arg(short, long, env = "PDF2PNG_CONCURRENCY", default_value_t = 1)]
    concurrency: usize,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDF2PNG_PASSWORD")]
    password: Option<String>,

    /// Print a JSON report (final state + written files) on stdout.
    #[arg(long, env = "PDF2PNG_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDF2PNG_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2PNG_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDF2PNG_QUIET")]
    quiet: bool,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "PDF2PNG_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Per-page OCR timeout in seconds.
    #[arg(long, env = "PDF2PNG_OCR_TIMEOUT", default_value_t = 120)]
    ocr_timeout: u64,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OcrArg {
    Tesseract,
    Vision,
    None,
}

/// What `--json` prints.
#[derive(Serialize)]
struct Report<'a> {
    #[serde(flatten)]
    snapshot: &'a Snapshot,
    summary: &'a RunSummary,
    files: &'a [ExportedPage],
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
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

    // ── Build pipeline ───────────────────────────────────────────────────
    let config = PipelineConfig::builder()
        .scale(cli.scale)
        .concurrency(cli.concurrency);
    let config = match cli.password {
        Some(ref pwd) => config.password(pwd.clone()),
        None => config,
    }
    .build()
    .context("Invalid configuration")?;

    let mut builder = Pipeline::builder()
        .rasterizer(Arc::new(PdfiumRasterizer::new()))
        .config(config)
        .download_timeout_secs(cli.download_timeout);

    match cli.ocr {
        OcrArg::Tesseract => {
            builder = builder.extractor(Arc::new(TesseractExtractor::new(TesseractConfig {
                binary: cli.tesseract_bin.clone(),
                language: cli.lang.clone(),
                tessdata_dir: cli.tessdata.clone(),
                timeout_secs: cli.ocr_timeout,
            })));
        }
        OcrArg::Vision => {
            let extractor = VisionExtractor::from_config(VisionConfig {
                model: cli.model.clone(),
                provider_name: cli.provider.clone(),
                api_timeout_secs: cli.ocr_timeout,
                ..Default::default()
            })
            .context("Failed to set up vision OCR")?;
            builder = builder.extractor(Arc::new(extractor));
        }
        OcrArg::None => {}
    }

    if show_progress {
        builder = builder.observer(CliProgress::new(cli.ocr != OcrArg::None));
    }

    let mut pipeline = builder.build();

    // ── Ctrl-C → cancel, again → exit ────────────────────────────────────
    let cancel = pipeline.cancel_handle();
    tokio::spawn(async move {
        let mut presses = 0;
        while tokio::signal::ctrl_c().await.is_ok() {
            presses += 1;
            match on_interrupt(presses) {
                Interrupt::Cancel => {
                    warn!("Interrupted; finishing pages in progress (Ctrl-C again to exit)");
                    cancel.cancel();
                }
                Interrupt::Exit => {
                    eprintln!("{}", red("Interrupted"));
                    std::process::exit(130);
                }
            }
        }
    });

    // ── Run ──────────────────────────────────────────────────────────────
    let summary = pipeline
        .process_input(&cli.input)
        .await
        .context("Conversion failed")?;

    let files = write_outputs(pipeline.records(), &cli.output)
        .await
        .context("Failed to write page files")?;

    let snapshot = pipeline.snapshot();
    if cli.json {
        let report = Report {
            snapshot: &snapshot,
            summary: &summary,
            files: &files,
        };
        let json = serde_json::to_string_pretty(&report).context("Failed to serialise report")?;
        println!("{json}");
    } else if !cli.quiet {
        print_summary(&summary, &snapshot, &cli.output);
    }

    if summary.cancelled > 0 {
        std::process::exit(130);
    }
    Ok(())
}

/// What the `n`-th Ctrl-C (1-based) does.
#[derive(Debug, PartialEq, Eq)]
enum Interrupt {
    /// Stop starting new pages; let the run wind down.
    Cancel,
    /// Rendering or an OCR call may not return soon; leave now.
    Exit,
}

fn on_interrupt(presses: usize) -> Interrupt {
    if presses <= 1 {
        Interrupt::Cancel
    } else {
        Interrupt::Exit
    }
}

fn print_summary(summary: &RunSummary, snapshot: &Snapshot, output: &std::path::Path) {
    let mark = if summary.failed == 0 && summary.cancelled == 0 {
        green("✔")
    } else if summary.completed == 0 && summary.skipped == 0 {
        red("✘")
    } else {
        cyan("⚠")
    };
    eprintln!(
        "{}  {}  {}ms  →  {}",
        mark,
        snapshot.message,
        summary.total_duration_ms,
        bold(&output.display().to_string()),
    );
    eprintln!(
        "   {}",
        dim(&format!(
            "render {}ms  /  extract {}ms",
            summary.render_duration_ms, summary.extract_duration_ms
        )),
    );
}
