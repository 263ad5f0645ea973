//! CLI binary for verge-review.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ReviewConfig`, runs one use case, and prints the result.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use verge_review::prompts::all_templates;
use verge_review::{
    render_result, ModelStatus, PdfPages, ProgressCallback, ReviewConfig, ReviewError,
    ReviewOutput, ReviewProgressCallback, Reviewer, SafetyMode, ScratchStore, SessionId,
    UseCase, Upload,
};

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

/// Spinner on stderr that follows the request through each stage.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let cb = Self::with_bar(ProgressBar::new_spinner());
        cb.bar.enable_steady_tick(Duration::from_millis(80));
        cb
    }

    fn with_bar(bar: ProgressBar) -> Arc<Self> {
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(TICKS),
        );
        bar.set_prefix("Preparing");
        Arc::new(Self { bar })
    }

    /// Remove the spinner line. Safe to call more than once.
    fn clear(&self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }
}

impl ReviewProgressCallback for CliProgressCallback {
    fn on_acquire_start(&self, _use_case: UseCase, files: usize) {
        self.bar.set_prefix("Reading");
        self.bar.set_message(format!("{files} file(s)…"));
    }

    fn on_media_ready(&self, images: usize) {
        self.bar.println(format!(
            "  {} {} image(s) ready",
            green("✓"),
            bold(&images.to_string())
        ));
    }

    fn on_request_start(&self, use_case: UseCase, images: usize) {
        self.bar.set_prefix("Thinking");
        self.bar
            .set_message(format!("{use_case} with {images} image(s)…"));
    }

    fn on_retry(&self, attempt: u32, backoff_ms: u64) {
        self.bar.println(format!(
            "  {} retry {attempt} in {:.1}s",
            cyan("↻"),
            backoff_ms as f64 / 1000.0
        ));
    }

    fn on_response(&self, text_len: usize) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} response received  {}",
            green("✔"),
            dim(&format!("{text_len} chars"))
        );
    }

    fn on_error(&self, _error: &str) {
        self.clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Full profile review from screenshots
  verge review shot1.jpg shot2.jpg shot3.png

  # Rating only, capped at 8 images, relaxed safety filters
  verge rate --max-images 8 --safety relaxed shots/*.jpg

  # Reply suggestions for a chat screenshot
  verge reply chat.png

  # Résumé → interview questions, across two invocations
  verge resume cv.pdf --session alice
  verge interview --session alice --job-file job.txt

  # Use another provider through edgequake-llm
  verge --provider openai --model gpt-4.1-mini review shot1.jpg

  # List the prompt templates and their versions
  verge prompts

ENVIRONMENT VARIABLES:
  GOOGLE_API_KEY          Google AI Studio key for the native Gemini backend
  GEMINI_API_KEY          Fallback for GOOGLE_API_KEY
  EDGEQUAKE_LLM_PROVIDER  Provider used when no Google key is set
  EDGEQUAKE_MODEL         Model for EDGEQUAKE_LLM_PROVIDER
  VERGE_*                 Defaults for the flags below (e.g. VERGE_MAX_IMAGES=8)
  PDFIUM_LIB_PATH         Path to an existing libpdfium; skips auto-download
  RUST_LOG                Overrides the log filter

  A .env file in the working directory is loaded first.
"#;

/// Review dating profiles, chat screenshots and résumés with multimodal LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "verge",
    version,
    about = "Review dating profiles, chat screenshots and résumés with multimodal LLMs",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Model ID (default: gemini-2.0-flash for the Gemini backend).
    #[arg(long, global = true, env = "VERGE_MODEL")]
    model: Option<String>,

    /// edgequake-llm provider: openai, anthropic, gemini, ollama, azure, …
    #[arg(long, global = true, env = "VERGE_PROVIDER")]
    provider: Option<String>,

    /// Reject requests with more images than this.
    #[arg(long, global = true, env = "VERGE_MAX_IMAGES",
          value_parser = clap::value_parser!(u64).range(1..))]
    max_images: Option<u64>,

    /// Rasterise only the first page of a PDF.
    #[arg(long, global = true, env = "VERGE_FIRST_PAGE_ONLY")]
    first_page_only: bool,

    /// Gemini safety filters: default, or relaxed (BLOCK_NONE on four categories).
    #[arg(long, global = true, env = "VERGE_SAFETY", value_enum, default_value = "default")]
    safety: SafetyArg,

    /// Sampling temperature (0.0–2.0).
    #[arg(long, global = true, env = "VERGE_TEMPERATURE", default_value_t = 0.4)]
    temperature: f32,

    /// Max output tokens.
    #[arg(long, global = true, env = "VERGE_MAX_TOKENS", default_value_t = 2048)]
    max_tokens: usize,

    /// Retries on transient model failures.
    #[arg(long, global = true, env = "VERGE_MAX_RETRIES", default_value_t = 0)]
    max_retries: u32,

    /// Model call timeout in seconds.
    #[arg(long, global = true, env = "VERGE_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// Directory for per-session files (default: $TMPDIR/verge-review).
    #[arg(long, global = true, env = "VERGE_SCRATCH_DIR")]
    scratch_dir: Option<PathBuf>,

    /// Text file whose contents replace the prompt template.
    #[arg(long, global = true, env = "VERGE_PROMPT_FILE")]
    prompt_file: Option<PathBuf>,

    /// Output structured JSON instead of text.
    #[arg(long, global = true, env = "VERGE_JSON")]
    json: bool,

    /// Disable the progress spinner.
    #[arg(long, global = true, env = "VERGE_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "VERGE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except results and errors.
    #[arg(short, long, global = true, env = "VERGE_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Full dating-profile review.
    Review {
        /// Profile screenshots (jpg, jpeg, png) or one PDF.
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Rate a profile 1–10 with a short explanation.
    Rate {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Suggest a reply to the last message in a chat screenshot.
    Reply { image: PathBuf },
    /// Extract résumé text and store it for `interview`.
    Resume {
        /// One PDF or image.
        file: PathBuf,
        /// Session id to store under (default: a new random id).
        #[arg(long)]
        session: Option<String>,
    },
    /// Interview questions from a stored résumé and a job description.
    Interview {
        #[arg(long)]
        session: String,
        #[arg(long, conflicts_with = "job_file", required_unless_present = "job_file")]
        job_description: Option<String>,
        #[arg(long)]
        job_file: Option<PathBuf>,
    },
    /// List prompt templates and their versions.
    Prompts,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum SafetyArg {
    Default,
    Relaxed,
}

impl From<SafetyArg> for SafetyMode {
    fn from(v: SafetyArg) -> Self {
        match v {
            SafetyArg::Default => SafetyMode::ProviderDefault,
            SafetyArg::Relaxed => SafetyMode::Relaxed,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env first so clap's env fallbacks see it.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner gives all the feedback that matters; keep library INFO
    // logs out of its way.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.quiet || show_progress {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };
    let filter = if cli.verbose { "debug" } else { filter };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    if let Command::Prompts = cli.command {
        return list_prompts(cli.json);
    }

    // ── Ensure PDFium engine is available ────────────────────────────────
    if input_has_pdf(&cli.command) {
        ensure_pdfium(cli.quiet)?;
    }

    // ── Build config ─────────────────────────────────────────────────────
    let spinner = show_progress.then(CliProgressCallback::new);
    let progress_cb: Option<ProgressCallback> = spinner
        .clone()
        .map(|cb| cb as Arc<dyn ReviewProgressCallback>);
    let config = match build_config(&cli, progress_cb).await {
        Ok(config) => config,
        Err(e) => return Err(clear_on_error(spinner.as_deref(), e)),
    };
    let reviewer = Reviewer::new(config);

    if let ModelStatus::Unavailable { ref hint, .. } = reviewer.status() {
        if !cli.quiet {
            eprintln!("{} {}", cyan("⚠"), hint);
        }
    }

    let store = ScratchStore::new(
        cli.scratch_dir
            .clone()
            .unwrap_or_else(ScratchStore::default_dir),
    );

    // ── Run ──────────────────────────────────────────────────────────────
    let run = async {
        let mut session_note: Option<(SessionId, PathBuf)> = None;
        let result = match &cli.command {
            Command::Review { files } => match load_uploads(files).await {
                Ok(uploads) => reviewer.review_profile(uploads).await,
                Err(e) => Err(e),
            },
            Command::Rate { files } => match load_uploads(files).await {
                Ok(uploads) => reviewer.rate_profile(uploads).await,
                Err(e) => Err(e),
            },
            Command::Reply { image } => match Upload::from_path(image).await {
                Ok(upload) => reviewer.generate_reply(upload).await,
                Err(e) => Err(e),
            },
            Command::Resume { file, session } => {
                let id = match session {
                    Some(raw) => SessionId::parse(raw)?,
                    None => SessionId::generate(),
                };
                match run_resume(&reviewer, &store, file, &id).await {
                    Ok((out, path)) => {
                        session_note = Some((id, path));
                        Ok(out)
                    }
                    Err(e) => Err(e),
                }
            }
            Command::Interview {
                session,
                job_description,
                job_file,
            } => {
                let id = SessionId::parse(session)?;
                let job = match (job_description, job_file) {
                    (Some(text), _) => text.clone(),
                    (None, Some(path)) => tokio::fs::read_to_string(path)
                        .await
                        .with_context(|| format!("Failed to read job description from {path:?}"))?,
                    (None, None) => anyhow::bail!("--job-description or --job-file is required"),
                };
                run_interview(&reviewer, &store, &id, job).await
            }
            Command::Prompts => unreachable!("handled above"),
        };
        anyhow::Ok((result, session_note))
    };
    let (result, session_note) = match run.await {
        Ok(done) => done,
        Err(e) => return Err(clear_on_error(spinner.as_deref(), e)),
    };
    // Upload errors fail before the reviewer reports progress.
    if result.is_err() {
        if let Some(ref cb) = spinner {
            cb.clear();
        }
    }

    // ── Print ────────────────────────────────────────────────────────────
    let rendered = render_result(&result);
    if cli.json {
        let json = match (&result, &session_note) {
            (Ok(out), Some((id, _))) => serde_json::json!({ "session_id": id, "output": out }),
            (Ok(out), None) => serde_json::to_value(out).context("Failed to serialise output")?,
            (Err(_), _) => serde_json::to_value(&rendered).context("Failed to serialise error")?,
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&json).context("Failed to serialise output")?
        );
    } else {
        if rendered.error.is_none() {
            println!("{}\n", bold(&rendered.heading));
        }
        println!("{}", rendered.body);
        if let Some(ref msg) = rendered.error {
            eprintln!("{} {}", red("✘"), msg);
        }
    }

    if let Some((ref id, ref path)) = session_note {
        if !cli.quiet {
            eprintln!(
                "{} session {}  {}",
                green("✔"),
                bold(id.as_str()),
                dim(&path.display().to_string())
            );
        }
    }

    if let Ok(ref out) = result {
        if !cli.quiet && !cli.json {
            eprintln!(
                "   {} tokens in  /  {} tokens out  ·  {}ms  ·  {}",
                dim(&out.stats.input_tokens.to_string()),
                dim(&out.stats.output_tokens.to_string()),
                out.stats.duration_ms,
                dim(&format!("{} ({})", out.model, out.prompt_id)),
            );
        }
    }

    if result.is_err() {
        std::process::exit(1);
    }
    Ok(())
}

async fn load_uploads(files: &[PathBuf]) -> Result<Vec<Upload>, ReviewError> {
    let mut uploads = Vec::with_capacity(files.len());
    for path in files {
        uploads.push(Upload::from_path(path).await?);
    }
    Ok(uploads)
}

/// Clear the spinner before an error propagates out of `main`.
fn clear_on_error(spinner: Option<&CliProgressCallback>, error: anyhow::Error) -> anyhow::Error {
    if let Some(cb) = spinner {
        cb.clear();
    }
    error
}

/// Parse the résumé and store it in the session.
async fn run_resume(
    reviewer: &Reviewer,
    store: &ScratchStore,
    file: &Path,
    id: &SessionId,
) -> Result<(ReviewOutput, PathBuf), ReviewError> {
    let upload = Upload::from_path(file).await?;
    let out = reviewer.parse_resume(upload).await?;
    let resume = out.resume.clone().ok_or_else(|| {
        ReviewError::Internal("résumé parsing returned no profile".to_string())
    })?;
    let context = store.load_or_new(id).await?.with_resume(resume);
    let path = store.save(&context).await?;
    Ok((out, path))
}

/// Load the session, record the job description, and ask for questions.
async fn run_interview(
    reviewer: &Reviewer,
    store: &ScratchStore,
    id: &SessionId,
    job: String,
) -> Result<ReviewOutput, ReviewError> {
    let context = store.load(id).await?.with_job_description(job);
    store.save(&context).await?;
    reviewer.interview_prep(&context).await
}

fn input_has_pdf(command: &Command) -> bool {
    let is_pdf = |p: &PathBuf| {
        p.extension()
            .map(|e| e.eq_ignore_ascii_case("pdf"))
            .unwrap_or(false)
    };
    match command {
        Command::Review { files } | Command::Rate { files } => files.iter().any(is_pdf),
        Command::Resume { file, .. } => is_pdf(file),
        _ => false,
    }
}

/// Download pdfium on first use, with a progress bar unless quiet.
fn ensure_pdfium(quiet: bool) -> Result<()> {
    if pdfium_auto::is_pdfium_cached() {
        return Ok(());
    }

    if quiet {
        tokio::task::block_in_place(|| pdfium_auto::ensure_pdfium_library(None))
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
    dl_bar.enable_steady_tick(Duration::from_millis(80));

    let bar = dl_bar.clone();
    tokio::task::block_in_place(|| {
        pdfium_auto::ensure_pdfium_library(Some(&|downloaded, total| {
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
    Ok(())
}

fn list_prompts(json: bool) -> Result<()> {
    if json {
        let rows: Vec<_> = all_templates()
            .iter()
            .map(|t| {
                serde_json::json!({
                    "id": t.id(),
                    "use_case": t.use_case,
                    "version": t.version,
                    "placeholders": t.placeholders(),
                })
            })
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&rows).context("Failed to serialise prompts")?
        );
        return Ok(());
    }

    for t in all_templates() {
        let placeholders = t.placeholders();
        println!(
            "{:<22} v{}  {}",
            bold(t.use_case.as_str()),
            t.version,
            if placeholders.is_empty() {
                dim("(images)")
            } else {
                dim(&format!("{{{}}}", placeholders.join("}, {")))
            }
        );
    }
    Ok(())
}

/// Map CLI args to `ReviewConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ReviewConfig> {
    let mut builder = ReviewConfig::builder()
        .temperature(cli.temperature)
        .max_tokens(cli.max_tokens)
        .max_retries(cli.max_retries)
        .api_timeout_secs(cli.api_timeout)
        .safety(cli.safety.clone().into())
        .pdf_pages(if cli.first_page_only {
            PdfPages::FirstOnly
        } else {
            PdfPages::All
        });

    if let Some(n) = cli.max_images {
        builder = builder.max_images(n as usize);
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(ref path) = cli.prompt_file {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read prompt from {path:?}"))?;
        builder = builder.prompt_override(text);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn early_error_clears_spinner() {
        let cb = CliProgressCallback::with_bar(ProgressBar::hidden());
        let err = clear_on_error(Some(&cb), anyhow::anyhow!("bad session id"));
        assert!(cb.bar.is_finished());
        assert_eq!(err.to_string(), "bad session id");
    }

    #[test]
    fn clear_is_idempotent() {
        let cb = CliProgressCallback::with_bar(ProgressBar::hidden());
        cb.on_error("timeout");
        cb.clear();
        assert!(cb.bar.is_finished());
    }

    #[test]
    fn no_spinner_passes_error_through() {
        let err = clear_on_error(None, anyhow::anyhow!("missing file"));
        assert_eq!(err.to_string(), "missing file");
    }
}
