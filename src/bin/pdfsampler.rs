//! CLI binary for edgequake-pdfsampler.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ExtractionConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_pdfsampler::extract::default_out_dir;
use edgequake_pdfsampler::{
    extract, inspect, EntityBackend, ExtractionConfig, ExtractionProgressCallback, HeadingMatcher,
    ItemIssue, PageSelection, ProgressCallback, Stage,
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
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const SPINNER: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// One bar over `stages × pages` steps, with a line per downgraded item.
struct CliProgressCallback {
    bar: ProgressBar,
    issues: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(SPINNER);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            issues: AtomicUsize::new(0),
        })
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_extraction_start(&self, total_pages: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold:>15}  [{bar:42.green/238}] {pos:>4}/{len}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(SPINNER);

        // Three page walks: figures, embedded images, algorithms.
        self.bar.set_length((total_pages * 3) as u64);
        self.bar.set_style(style);
        self.bar.reset_eta();
    }

    fn on_stage_start(&self, stage: Stage, _total_pages: usize) {
        self.bar.set_prefix(stage.to_string());
    }

    fn on_page_complete(&self, _stage: Stage, page_num: usize, records: usize) {
        self.bar
            .set_message(format!("page {page_num}: {records} found"));
        self.bar.inc(1);
    }

    fn on_item_issue(&self, issue: &ItemIssue) {
        self.issues.fetch_add(1, Ordering::SeqCst);
        let mut line = issue.to_string();
        if line.chars().count() > 100 {
            line = line.chars().take(99).collect::<String>() + "\u{2026}";
        }
        self.bar.println(format!("  {} {}", yellow("⚠"), dim(&line)));
    }

    fn on_extraction_complete(&self, total_records: usize) {
        self.bar.finish_and_clear();
        let issues = self.issues.load(Ordering::SeqCst);
        if issues == 0 {
            eprintln!("{} {} records extracted", green("✔"), bold(&total_records.to_string()));
        } else {
            eprintln!(
                "{} {} records extracted  ({} fields left empty)",
                yellow("⚠"),
                bold(&total_records.to_string()),
                issues
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract into ./paper_extracted/
  pdfsampler paper.pdf

  # Choose the output directory and a page range
  pdfsampler --pages 1-8 paper.pdf -o out/

  # Use a specific vision model
  pdfsampler --model gpt-4.1 --provider openai paper.pdf

  # Entity extraction through the LLM instead of the offline patterns
  pdfsampler --entities llm paper.pdf

  # Look for other algorithm headings
  pdfsampler --markers "Keyframe,Sampling" paper.pdf

  # Extract from a URL, print the records to stdout
  pdfsampler --json https://arxiv.org/pdf/1706.03762

  # Inspect PDF metadata (no API key needed)
  pdfsampler --inspect-only paper.pdf

OUTPUT LAYOUT:
  <out-dir>/structured_output.json   records: figures, embedded images, algorithms
  <out-dir>/figures/pageP_figI.png   auto-contrasted figure crops
  <out-dir>/images/pageP_imgI.EXT    embedded images as extracted

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Path to libpdfium
"#;

/// Extract figures, embedded images and algorithm headings from scientific PDFs.
#[derive(Parser, Debug)]
#[command(
    name = "pdfsampler",
    version,
    about = "Extract figures, embedded images and algorithm headings from scientific PDFs",
    long_about = "Detect and crop figures, save embedded images with the text printed below \
them, find algorithm headings, caption every visual with a vision LLM and tag captions \
with named entities. Results go to structured_output.json.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path or HTTP/HTTPS URL.
    input: String,

    /// Output directory. Default: <input stem>_extracted.
    #[arg(short, long, env = "PDFSAMPLER_OUT_DIR")]
    out_dir: Option<PathBuf>,

    /// Vision LLM model ID (e.g. gpt-4.1-nano, gpt-4.1, claude-sonnet-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Page render scale for figure detection (0.5–8.0).
    #[arg(long, env = "PDFSAMPLER_SCALE", default_value_t = 2.0)]
    scale: f32,

    /// Height in points of the strip searched for an image caption.
    #[arg(long, env = "PDFSAMPLER_CAPTION_HEIGHT", default_value_t = 300.0)]
    caption_height: f32,

    /// Minimum detector score for a region to count (0.0–1.0).
    #[arg(long, env = "PDFSAMPLER_MIN_SCORE", default_value_t = 0.5)]
    min_score: f32,

    /// Page selection: all, 5, 3-15, or 1,3,5,7.
    #[arg(long, env = "PDFSAMPLER_PAGES", default_value = "all")]
    pages: String,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDFSAMPLER_PASSWORD")]
    password: Option<String>,

    /// Entity extraction backend.
    #[arg(long, env = "PDFSAMPLER_ENTITIES", value_enum, default_value = "regex")]
    entities: EntitiesArg,

    /// Regex for algorithm headings. A named group `id` sets the identifier.
    #[arg(long, env = "PDFSAMPLER_HEADING_PATTERN")]
    heading_pattern: Option<String>,

    /// Comma-separated relevance markers a heading must contain.
    #[arg(long, env = "PDFSAMPLER_MARKERS")]
    markers: Option<String>,

    /// Max LLM output tokens per call.
    #[arg(long, env = "PDFSAMPLER_MAX_TOKENS", default_value_t = 512)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "PDFSAMPLER_TEMPERATURE", default_value_t = 0.0)]
    temperature: f32,

    /// Retries per model call.
    #[arg(long, env = "PDFSAMPLER_MAX_RETRIES", default_value_t = 2)]
    max_retries: u32,

    /// Base delay before the first retry, doubled on each further attempt.
    #[arg(long, env = "PDFSAMPLER_RETRY_BACKOFF_MS", default_value_t = 500)]
    retry_backoff_ms: u64,

    /// Print the records as JSON on stdout.
    #[arg(long, env = "PDFSAMPLER_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDFSAMPLER_NO_PROGRESS")]
    no_progress: bool,

    /// Print PDF metadata only, no extraction.
    #[arg(long)]
    inspect_only: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDFSAMPLER_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDFSAMPLER_QUIET")]
    quiet: bool,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "PDFSAMPLER_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum EntitiesArg {
    Regex,
    Llm,
}

impl From<EntitiesArg> for EntityBackend {
    fn from(v: EntitiesArg) -> Self {
        match v {
            EntitiesArg::Regex => EntityBackend::Regex,
            EntitiesArg::Llm => EntityBackend::Llm,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs; -v brings them back.
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

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let mut builder = ExtractionConfig::builder().download_timeout_secs(cli.download_timeout);
        if let Some(ref password) = cli.password {
            builder = builder.password(password.clone());
        }
        let config = builder.build().context("Invalid configuration")?;
        let meta = inspect(&cli.input, &config)
            .await
            .context("Failed to inspect PDF")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&meta).context("Failed to serialize metadata")?
            );
        } else {
            println!("File:         {}", cli.input);
            if let Some(ref t) = meta.title {
                println!("Title:        {}", t);
            }
            if let Some(ref a) = meta.author {
                println!("Author:       {}", a);
            }
            println!("Pages:        {}", meta.page_count);
            println!("PDF Version:  {}", meta.pdf_version);
            if let Some(ref p) = meta.producer {
                println!("Producer:     {}", p);
            }
        }
        return Ok(());
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ExtractionProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;
    let out_dir = cli
        .out_dir
        .clone()
        .unwrap_or_else(|| default_out_dir(&cli.input));

    // ── Run extraction ───────────────────────────────────────────────────
    let output = extract(&cli.input, &out_dir, &config)
        .await
        .context("Extraction failed")?;

    if cli.json {
        println!("{}", output.records_json().context("Failed to serialise records")?);
    }

    if !cli.quiet {
        eprintln!("Extraction complete! {} items found.", output.records.len());
        if let Some(ref path) = output.json_path {
            eprintln!("   {}  {}", dim("→"), bold(&path.display().to_string()));
        }
        eprintln!(
            "   {} figures  /  {} images  /  {} algorithms  {}",
            output.stats.figures,
            output.stats.embedded_images,
            output.stats.algorithms,
            dim(&format!("{}ms", output.stats.total_duration_ms)),
        );
    }

    Ok(())
}

/// Map CLI args to `ExtractionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ExtractionConfig> {
    let pages = parse_pages(&cli.pages)?;

    let mut matcher = match cli.heading_pattern {
        Some(ref pattern) => HeadingMatcher::new(pattern).context("Invalid --heading-pattern")?,
        None => HeadingMatcher::default(),
    };
    if let Some(ref markers) = cli.markers {
        matcher = matcher.with_markers(
            markers
                .split(',')
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(str::to_string),
        );
    }

    let mut builder = ExtractionConfig::builder()
        .render_scale(cli.scale)
        .caption_search_height(cli.caption_height)
        .min_region_score(cli.min_score)
        .heading_matcher(matcher)
        .pages(pages)
        .entity_backend(cli.entities.into())
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .max_retries(cli.max_retries)
        .retry_backoff_ms(cli.retry_backoff_ms)
        .download_timeout_secs(cli.download_timeout);

    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(ref password) = cli.password {
        builder = builder.password(password.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Parse `--pages` string into `PageSelection`.
fn parse_pages(s: &str) -> Result<PageSelection> {
    let s = s.trim().to_lowercase();

    if s == "all" {
        return Ok(PageSelection::All);
    }

    // Range: "3-15"
    if let Some((start, end)) = s.split_once('-') {
        let start: usize = start
            .trim()
            .parse()
            .context("Invalid start page in range")?;
        let end: usize = end.trim().parse().context("Invalid end page in range")?;
        if start < 1 {
            anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", start);
        }
        if start > end {
            anyhow::bail!("Invalid page range '{}-{}': start must be <= end", start, end);
        }
        return Ok(PageSelection::Range(start, end));
    }

    // Set: "1,3,5,7"
    if s.contains(',') {
        let pages: Vec<usize> = s
            .split(',')
            .map(|p| {
                p.trim()
                    .parse::<usize>()
                    .with_context(|| format!("Invalid page number: '{}'", p.trim()))
            })
            .collect::<Result<Vec<_>>>()?;
        if let Some(&p) = pages.iter().find(|&&p| p < 1) {
            anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", p);
        }
        return Ok(PageSelection::Set(pages));
    }

    // Single page: "5"
    let page: usize = s.parse().context("Invalid page number")?;
    if page < 1 {
        anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", page);
    }
    Ok(PageSelection::Single(page))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_pages_forms() {
        assert!(matches!(parse_pages("all").unwrap(), PageSelection::All));
        assert!(matches!(parse_pages("5").unwrap(), PageSelection::Single(5)));
        assert!(matches!(parse_pages("2-4").unwrap(), PageSelection::Range(2, 4)));
        match parse_pages("1, 3,5").unwrap() {
            PageSelection::Set(p) => assert_eq!(p, vec![1, 3, 5]),
            other => panic!("unexpected selection: {other:?}"),
        }
    }

    #[test]
    fn parse_pages_rejects_bad_input() {
        assert!(parse_pages("0").is_err());
        assert!(parse_pages("5-2").is_err());
        assert!(parse_pages("1,x").is_err());
        assert!(parse_pages("0,2").is_err());
    }

    #[test]
    fn markers_flag_replaces_defaults() {
        let cli = Cli::parse_from(["pdfsampler", "--markers", "Keyframe, Sampling", "a.pdf"]);
        let config = build_config(&cli, None).unwrap();
        assert_eq!(config.heading_matcher.markers(), ["Keyframe", "Sampling"]);
        assert_eq!(config.entity_backend, EntityBackend::Regex);
    }
}
