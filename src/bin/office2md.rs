//! CLI binary for edgequake-office2md.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConversionConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_office2md::{
    convert_batch, BatchProgressCallback, ConversionConfig, ConversionOutput, Converter,
    DocxBackend,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
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

// ── Batch progress bar using indicatif ───────────────────────────────────────

/// Terminal progress for `--batch`: one bar, one log line per file.
struct CliBatchProgress {
    bar: ProgressBar,
}

impl CliBatchProgress {
    fn new() -> Self {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(spinner_style);
        bar.set_prefix("Scanning");
        bar.enable_steady_tick(Duration::from_millis(80));
        Self { bar }
    }
}

impl BatchProgressCallback for CliBatchProgress {
    fn on_batch_start(&self, total: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} files  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        self.bar.set_length(total as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Converting");
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Found {total} files to convert"))
        ));
    }

    fn on_file_start(&self, _index: usize, _total: usize, input: &Path) {
        self.bar.set_message(input.display().to_string());
    }

    fn on_file_complete(&self, index: usize, total: usize, input: &Path, output: &Path) {
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}  {}",
            green("✓"),
            index,
            total,
            input.display(),
            dim(&format!("→ {}", output.display())),
        ));
        self.bar.inc(1);
    }

    fn on_file_error(&self, index: usize, total: usize, input: &Path, error: &str) {
        // First line only; backend errors carry multi-line hints.
        let first = error.lines().next().unwrap_or(error);
        let msg: String = if first.chars().count() > 80 {
            format!("{}\u{2026}", first.chars().take(79).collect::<String>())
        } else {
            first.to_string()
        };
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}  {}",
            red("✗"),
            index,
            total,
            input.display(),
            red(&msg),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, succeeded: usize, failed: usize) {
        self.bar.finish_and_clear();
        if failed == 0 {
            eprintln!(
                "{} {} files converted successfully",
                green("✔"),
                bold(&succeeded.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} files converted  ({} failed)",
                if succeeded == 0 { red("✘") } else { cyan("⚠") },
                bold(&succeeded.to_string()),
                succeeded + failed,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert one document (writes report.md and report_images/)
  office2md report.docx

  # Choose the output file
  office2md report.docx -o out/report.md

  # Embed images as data URIs, or drop them
  office2md --embed-images report.docx
  office2md --skip-images deck.pptx

  # Force a DOCX backend
  office2md --pandoc report.docx
  office2md --native report.docx

  # Convert a directory tree into a mirror tree
  office2md --batch -r ./docs -o ./markdown

  # Only the active worksheet, JSON report on stdout
  office2md --first-sheet-only --json budget.xlsx

DOCX BACKENDS:
  pandoc    external pandoc binary (preferred when installed)
  markup    built-in HTML route (fallback)
  native    built-in direct translation (--native / --no-mammoth)

PDF:
  PDF pages are rendered with pdfium and transcribed by a vision LLM.
  Needs the pdfium shared library and an API key.

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key (PDF only)
  ANTHROPIC_API_KEY       Anthropic API key (PDF only)
  GEMINI_API_KEY          Google Gemini API key (PDF only)
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Path to libpdfium
  RUST_LOG                Log filter, overrides -v / -q
"#;

/// Convert Office documents and PDFs to Markdown.
#[derive(Parser, Debug)]
#[command(
    name = "office2md",
    version,
    about = "Convert Office documents (DOCX, XLSX, PPTX) and PDFs to Markdown",
    long_about = "Convert Office documents (DOCX, XLSX, PPTX) and PDFs to clean Markdown. \
DOCX goes through pandoc when it is installed and a built-in converter otherwise; images \
are extracted next to the Markdown, embedded, or skipped.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Input file, or directory with --batch.
    input: PathBuf,

    /// Output file, or directory with --batch. Default: next to the input.
    #[arg(short, long, env = "OFFICE2MD_OUTPUT")]
    output: Option<PathBuf>,

    /// Convert every supported file in the input directory.
    #[arg(short, long)]
    batch: bool,

    /// With --batch, descend into subdirectories.
    #[arg(short, long, requires = "batch")]
    recursive: bool,

    /// Print the Markdown to stdout instead of writing a file.
    #[arg(long, conflicts_with_all = ["batch", "json"])]
    stdout: bool,

    // ── Images ───────────────────────────────────────────────────────────
    /// Write images to files next to the Markdown (default).
    #[arg(long, env = "OFFICE2MD_EXTRACT_IMAGES")]
    extract_images: bool,

    /// Embed images as base64 data URIs.
    #[arg(long, env = "OFFICE2MD_EMBED_IMAGES")]
    embed_images: bool,

    /// Drop all images. Wins over the other image flags.
    #[arg(long, env = "OFFICE2MD_SKIP_IMAGES")]
    skip_images: bool,

    /// Directory for extracted images. Default: {output_stem}_images/.
    #[arg(long, env = "OFFICE2MD_IMAGES_DIR")]
    images_dir: Option<PathBuf>,

    // ── DOCX backend ─────────────────────────────────────────────────────
    /// Use pandoc for DOCX (fails if it is not installed).
    #[arg(long)]
    pandoc: bool,

    /// Use the built-in HTML route for DOCX.
    #[arg(long, visible_alias = "mammoth")]
    markup: bool,

    /// Use the built-in direct translation for DOCX.
    #[arg(long, visible_alias = "no-mammoth")]
    native: bool,

    /// pandoc executable.
    #[arg(long, env = "OFFICE2MD_PANDOC_PATH", default_value = "pandoc")]
    pandoc_path: PathBuf,

    /// Seconds before a pandoc run is killed.
    #[arg(long, env = "OFFICE2MD_PANDOC_TIMEOUT", default_value_t = 120)]
    pandoc_timeout: u64,

    // ── XLSX / PPTX ──────────────────────────────────────────────────────
    /// Only convert the active worksheet of XLSX files.
    #[arg(long, env = "OFFICE2MD_FIRST_SHEET_ONLY")]
    first_sheet_only: bool,

    /// Leave out PPTX speaker notes.
    #[arg(long, env = "OFFICE2MD_NO_NOTES")]
    no_notes: bool,

    // ── PDF (vision LLM) ─────────────────────────────────────────────────
    /// LLM model ID for PDF pages (e.g. gpt-4.1-nano).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Number of concurrent VLM page calls.
    #[arg(short, long, env = "OFFICE2MD_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Max LLM output tokens per page.
    #[arg(long, env = "OFFICE2MD_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "OFFICE2MD_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Retries per page on LLM failure.
    #[arg(long, env = "OFFICE2MD_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Per-page LLM call timeout in seconds.
    #[arg(long, env = "OFFICE2MD_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// Path to a text file containing a custom system prompt.
    #[arg(long, env = "OFFICE2MD_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    // ── Output / logging ─────────────────────────────────────────────────
    /// Print a JSON report (ConversionOutput, or the batch summary) on stdout.
    #[arg(long, env = "OFFICE2MD_JSON")]
    json: bool,

    /// Disable the batch progress bar.
    #[arg(long, env = "OFFICE2MD_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "OFFICE2MD_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "OFFICE2MD_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level library logs in batch mode.
    let show_progress = cli.batch && !cli.quiet && !cli.no_progress && !cli.json;
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

    let config = build_config(&cli).await?;
    let converter = Converter::probe(config).await;

    if cli.batch {
        return run_batch(&cli, &converter, show_progress).await;
    }

    let output = if cli.stdout {
        converter
            .convert(&cli.input, cli.output.as_deref())
            .await
            .context("Conversion failed")?
    } else {
        converter
            .convert_to_file(&cli.input, cli.output.as_deref())
            .await
            .context("Conversion failed")?
    };

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else if cli.stdout {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(output.markdown.as_bytes())
            .context("Failed to write to stdout")?;
    }

    if !cli.quiet {
        print_summary(&output, !cli.stdout);
    }
    Ok(())
}

async fn run_batch(cli: &Cli, converter: &Converter, show_progress: bool) -> Result<()> {
    let progress = show_progress.then(CliBatchProgress::new);
    let summary = convert_batch(
        converter,
        &cli.input,
        cli.output.as_deref(),
        cli.recursive,
        progress.as_ref().map(|p| p as &dyn BatchProgressCallback),
    )
    .await
    .with_context(|| format!("Batch conversion of {} failed", cli.input.display()))?;

    if cli.json {
        let json = serde_json::to_string_pretty(&summary).context("Failed to serialise summary")?;
        println!("{json}");
    } else if !cli.quiet && !show_progress {
        eprintln!(
            "Converted {}/{} files",
            summary.success_count(),
            summary.success_count() + summary.failure_count()
        );
        for (path, err) in &summary.failures {
            eprintln!("  {} {}: {}", red("✗"), path.display(), err);
        }
    }

    if !summary.is_clean() {
        anyhow::bail!("{} file(s) failed to convert", summary.failure_count());
    }
    Ok(())
}

fn print_summary(output: &ConversionOutput, wrote_file: bool) {
    let stats = &output.stats;
    let target = if wrote_file {
        format!("  →  {}", bold(&output.output_path.display().to_string()))
    } else {
        String::new()
    };
    eprintln!(
        "{}  {} via {}  {}ms{}",
        if stats.images_failed == 0 {
            green("✔")
        } else {
            cyan("⚠")
        },
        dim(&format!("{} images", stats.images_emitted)),
        output.backend,
        stats.duration_ms,
        target,
    );
    if stats.images_failed > 0 {
        eprintln!("   {} images could not be converted", red(&stats.images_failed.to_string()));
    }
    if stats.input_tokens > 0 {
        eprintln!(
            "   {} tokens in  /  {} tokens out",
            dim(&stats.input_tokens.to_string()),
            dim(&stats.output_tokens.to_string()),
        );
    }
}

/// Map CLI args to `ConversionConfig`.
async fn build_config(cli: &Cli) -> Result<ConversionConfig> {
    let system_prompt = if let Some(ref path) = cli.system_prompt {
        Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read system prompt from {:?}", path))?,
        )
    } else {
        None
    };

    let mut builder = ConversionConfig::builder()
        .extract_images(cli.extract_images || !(cli.embed_images || cli.skip_images))
        .embed_images(cli.embed_images)
        .skip_images(cli.skip_images)
        .docx_backend(DocxBackend::from_flags(cli.pandoc, cli.markup, cli.native))
        .include_all_sheets(!cli.first_sheet_only)
        .include_notes(!cli.no_notes)
        .pandoc_path(&cli.pandoc_path)
        .pandoc_timeout_secs(cli.pandoc_timeout)
        .concurrency(cli.concurrency)
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .max_retries(cli.max_retries)
        .api_timeout_secs(cli.api_timeout);

    if let Some(ref dir) = cli.images_dir {
        builder = builder.images_dir(dir);
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(prompt) = system_prompt {
        builder = builder.system_prompt(prompt);
    }

    builder.build().context("Invalid configuration")
}
