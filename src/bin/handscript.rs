//! CLI binary for handscript.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `TranscriptionConfig`, runs one batch and writes the Word document(s).

use anyhow::{Context, Result};
use clap::Parser;
use handscript::config::DEFAULT_MODEL;
use handscript::pipeline::input::transcription_paths;
use handscript::{
    transcribe_paths, write_document, BatchOutput, BatchProgressCallback, DocumentOptions,
    DocumentWriter, GeminiClient, PageFailurePolicy, ProgressCallback, ProviderRecognizer,
    Recognizer, TranscriptionConfig,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
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

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress: one bar over the files of the batch plus a log line
/// per page and per file.
struct CliProgressCallback {
    bar: ProgressBar,
    page_errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} files  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        bar.set_style(style);
        bar.set_prefix("Transcribing");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            page_errors: AtomicUsize::new(0),
        })
    }
}

impl BatchProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_files: usize) {
        self.bar.set_length(total_files as u64);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Transcribing {total_files} file(s)…"))
        ));
    }

    fn on_file_start(&self, _file_index: usize, name: &str) {
        self.bar.set_message(name.to_string());
    }

    fn on_page_complete(&self, _file_index: usize, page_num: usize, text_len: usize) {
        self.bar.println(format!(
            "    {} page {:>3}  {}",
            green("✓"),
            page_num,
            dim(&format!("{text_len:>5} bytes")),
        ));
    }

    fn on_page_error(&self, _file_index: usize, page_num: usize, error: &str) {
        self.page_errors.fetch_add(1, Ordering::SeqCst);
        self.bar.println(format!(
            "    {} page {:>3}  {}",
            red("✗"),
            page_num,
            red(&truncate(error, 80)),
        ));
    }

    fn on_file_complete(&self, _file_index: usize, name: &str, pages: usize) {
        self.bar.println(format!("  {} {}  {}", green("✔"), name, dim(&format!("{pages} pages"))));
        self.bar.inc(1);
    }

    fn on_file_error(&self, _file_index: usize, name: &str, error: &str) {
        self.bar
            .println(format!("  {} {}  {}", red("✘"), name, red(&truncate(error, 100))));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total_files: usize, succeeded: usize) {
        self.bar.finish_and_clear();
        let failed = total_files.saturating_sub(succeeded);
        let page_errors = self.page_errors.load(Ordering::SeqCst);
        if failed == 0 && page_errors == 0 {
            eprintln!(
                "{} {} file(s) transcribed",
                green("✔"),
                bold(&succeeded.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} files transcribed  ({} failed, {} page errors)",
                if succeeded == 0 { red("✘") } else { cyan("⚠") },
                bold(&succeeded.to_string()),
                total_files,
                red(&failed.to_string()),
                page_errors,
            );
        }
    }
}

/// Shorten a message to `max` characters, marking the cut with an ellipsis.
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{cut}\u{2026}")
    } else {
        s.to_string()
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # All questionnaires into one document
  handscript survey_*.pdf -o results.docx

  # One document per questionnaire
  handscript survey_*.pdf --per-file --out-dir transcripts/

  # Fail a whole file if any of its pages cannot be read
  handscript --on-page-error abort survey.pdf

  # Use another vision provider through edgequake-llm
  handscript --backend provider --provider openai --model gpt-4.1-mini survey.pdf

  # Print the batch report as JSON
  handscript --json survey_*.pdf -o results.docx > report.json

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY      Google Gemini API key (required for the gemini backend)
  HANDSCRIPT_MODEL    Override the model ID
  PDFIUM_LIB_PATH     Path to libpdfium (file or directory)
  RUST_LOG            Log filter, e.g. handscript=debug
"#;

/// Transcribe handwritten questionnaire PDFs into a Word document.
#[derive(Parser, Debug)]
#[command(
    name = "handscript",
    version,
    about = "Transcribe handwritten questionnaire PDFs into a Word document",
    long_about = "Transcribe scanned handwritten questionnaires (PDF or image files) into a \
single Word document. Each page is rasterised and read by a multimodal AI service \
(Google Gemini by default, or any vision provider supported by edgequake-llm).",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// PDF or image files, in the order they should appear in the document.
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Output document for the whole batch.
    #[arg(short, long, env = "HANDSCRIPT_OUTPUT", default_value = "transcription.docx")]
    output: PathBuf,

    /// Write one `{stem}_transcription.docx` per input file instead.
    #[arg(long)]
    per_file: bool,

    /// Directory for `--per-file` output.
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    /// Recognition backend.
    #[arg(long, value_enum, default_value = "gemini")]
    backend: BackendArg,

    /// edgequake-llm provider name for `--backend provider` (openai, anthropic, ollama, …).
    #[arg(long, env = "EDGEQUAKE_PROVIDER", default_value = "openai")]
    provider: String,

    /// Gemini API key.
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Model ID.
    #[arg(long, env = "HANDSCRIPT_MODEL", default_value = DEFAULT_MODEL)]
    model: String,

    /// Rendering DPI (72–600).
    #[arg(long, env = "HANDSCRIPT_DPI", default_value_t = 200,
          value_parser = clap::value_parser!(u32).range(72..=600))]
    dpi: u32,

    /// Pages recognised concurrently within a file.
    #[arg(short, long, env = "HANDSCRIPT_CONCURRENCY", default_value_t = 1)]
    concurrency: usize,

    /// What to do when a page cannot be recognised.
    #[arg(long, value_enum, default_value = "placeholder")]
    on_page_error: PageErrorArg,

    /// Body text for pages that could not be recognised.
    #[arg(long, default_value = handscript::config::DEFAULT_PLACEHOLDER)]
    placeholder: String,

    /// Path to a text file containing a custom instruction prompt.
    #[arg(long, env = "HANDSCRIPT_PROMPT_FILE")]
    prompt_file: Option<PathBuf>,

    /// Retries per page on recognition failure.
    #[arg(long, env = "HANDSCRIPT_MAX_RETRIES", default_value_t = 0)]
    max_retries: u32,

    /// Per-call recognition timeout in seconds.
    #[arg(long, env = "HANDSCRIPT_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// Document title; pass an empty string to omit it.
    #[arg(long)]
    title: Option<String>,

    /// Add a processing timestamp under each file heading.
    #[arg(long)]
    timestamp: bool,

    /// Leave out the machine-recognition notice at the end.
    #[arg(long)]
    no_notice: bool,

    /// Font family for the whole document.
    #[arg(long, default_value = "MS Gothic")]
    font: String,

    /// Path to libpdfium (file or directory holding it).
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// Print the batch report as JSON on stdout.
    #[arg(long)]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "HANDSCRIPT_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "HANDSCRIPT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "HANDSCRIPT_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum BackendArg {
    Gemini,
    Provider,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum PageErrorArg {
    Placeholder,
    Abort,
}

impl From<PageErrorArg> for PageFailurePolicy {
    fn from(v: PageErrorArg) -> Self {
        match v {
            PageErrorArg::Placeholder => PageFailurePolicy::Placeholder,
            PageErrorArg::Abort => PageFailurePolicy::AbortFile,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar covers what INFO logs would say; keep them quiet
    // unless -v asks for everything.
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

    // ── Build config and backend ─────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn BatchProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb).await?;

    let recognizer: Arc<dyn Recognizer> = match cli.backend {
        BackendArg::Gemini => Arc::new(
            GeminiClient::new(&config).context("Cannot create the Gemini client")?,
        ),
        BackendArg::Provider => Arc::new(
            ProviderRecognizer::from_name(&cli.provider, &config)
                .with_context(|| format!("Cannot create provider '{}'", cli.provider))?,
        ),
    };

    // ── Run batch ────────────────────────────────────────────────────────
    let output = transcribe_paths(&cli.files, recognizer, &config)
        .await
        .context("Transcription failed")?;

    let written = write_outputs(&cli, &config, &output).await?;

    if cli.json {
        let json =
            serde_json::to_string_pretty(&output.report).context("Failed to serialise report")?;
        println!("{json}");
    }

    if !cli.quiet {
        for path in &written {
            eprintln!("   →  {}", bold(&path.display().to_string()));
        }
        eprintln!(
            "   {} tokens in  /  {} tokens out  ·  {}ms total",
            dim(&output.report.total_input_tokens.to_string()),
            dim(&output.report.total_output_tokens.to_string()),
            output.report.total_duration_ms,
        );
        if !show_progress && output.report.failed() > 0 {
            eprintln!(
                "{} {} of {} file(s) skipped:",
                red("✘"),
                output.report.failed(),
                output.report.files.len()
            );
            for file in output.report.files.iter().filter(|f| !f.succeeded()) {
                eprintln!("     {}", file.filename);
            }
        }
    }

    Ok(())
}

/// Write the combined document, or one document per section.
async fn write_outputs(
    cli: &Cli,
    config: &TranscriptionConfig,
    output: &BatchOutput,
) -> Result<Vec<PathBuf>> {
    if !cli.per_file {
        write_document(&output.document, &cli.output)
            .await
            .context("Failed to write document")?;
        return Ok(vec![cli.output.clone()]);
    }

    let writer = DocumentWriter::new(config.document.clone());
    let paths = transcription_paths(
        &cli.out_dir,
        output.sections.iter().map(|s| s.filename.as_str()),
    );
    let mut written = Vec::with_capacity(output.sections.len());
    for (section, path) in output.sections.iter().zip(paths) {
        let bytes = writer
            .render(std::slice::from_ref(section))
            .with_context(|| format!("Failed to assemble document for {}", section.filename))?;
        write_document(&bytes, &path)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        written.push(path);
    }
    Ok(written)
}

/// Map CLI args to `TranscriptionConfig`.
async fn build_config(
    cli: &Cli,
    progress: Option<ProgressCallback>,
) -> Result<TranscriptionConfig> {
    let defaults = DocumentOptions::default();
    let document = DocumentOptions {
        title: match cli.title.as_deref() {
            Some("") => None,
            Some(t) => Some(t.to_string()),
            None => defaults.title,
        },
        include_timestamp: cli.timestamp,
        include_notice: !cli.no_notice,
        font_family: cli.font.clone(),
        font_size_pt: defaults.font_size_pt,
    };

    let mut builder = TranscriptionConfig::builder()
        .model(&cli.model)
        .dpi(cli.dpi)
        .concurrency(cli.concurrency)
        .page_failure_policy(cli.on_page_error.into())
        .placeholder(&cli.placeholder)
        .max_retries(cli.max_retries)
        .api_timeout_secs(cli.api_timeout)
        .document(document);

    if let Some(ref key) = cli.api_key {
        builder = builder.api_key(key);
    }
    if let Some(ref path) = cli.prompt_file {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read prompt from {:?}", path))?;
        builder = builder.prompt(prompt);
    }
    if let Some(ref lib) = cli.pdfium_lib {
        builder = builder.pdfium_library_path(lib);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
