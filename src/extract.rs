//! Extraction entry points.
//!
//! [`extract_document`] is the synchronous core: it runs the three stages in
//! fixed order over one open [`DocumentSource`], enriches, and writes
//! `structured_output.json`. The async [`extract`] family resolves the input,
//! builds the model adapters, and runs the core on a blocking thread with a
//! pdfium-backed source.

use crate::config::{EntityBackend, ExtractionConfig, PageSelection};
use crate::error::SamplerError;
use crate::models::caption::VlmCaptioner;
use crate::models::detect::VlmRegionDetector;
use crate::models::entities::{LlmEntityExtractor, RegexEntityExtractor};
use crate::models::vlm::VlmClient;
use crate::models::{EntityExtractor, Models};
use crate::output::{self, DocumentMetadata, ExtractionOutput, ExtractionStats, OutputLayout};
use crate::pipeline::{algorithms, embedded, enrich, figures, input, StageContext};
use crate::source::pdfium::{self, PdfiumSource};
use crate::source::DocumentSource;
use edgequake_llm::{LLMProvider, ProviderFactory};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

const DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// Run every stage over an open document and persist the result.
///
/// Returns `Err` only for fatal failures: an empty page selection or a
/// failed output write. Everything else is downgraded and listed in
/// [`ExtractionOutput::issues`].
pub fn extract_document(
    source: &dyn DocumentSource,
    models: &Models,
    layout: &OutputLayout,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, SamplerError> {
    let start = Instant::now();
    let total_pages = source.page_count();

    let pages = config.pages.to_indices(total_pages);
    if pages.is_empty() && !matches!(config.pages, PageSelection::All) {
        return Err(SamplerError::PageOutOfRange {
            page: first_requested_page(&config.pages),
            total: total_pages,
        });
    }
    debug!("Selected {} of {} pages", pages.len(), total_pages);

    if let Some(ref cb) = config.progress_callback {
        cb.on_extraction_start(pages.len());
    }

    let mut ctx = StageContext::new(source, models, layout, config, &pages);

    // ── Stages, in output order ──────────────────────────────────────────
    let mut records = figures::extract_figures(&mut ctx)?;
    records.extend(embedded::extract_embedded_images(&mut ctx)?);
    records.extend(algorithms::extract_algorithms(&mut ctx)?);

    // ── Enrichment ───────────────────────────────────────────────────────
    enrich::enrich_records(&mut ctx, &mut records);
    let issues = ctx.into_issues();

    // ── Persist ──────────────────────────────────────────────────────────
    let json_path = layout.json_path();
    output::write_records(&json_path, &records)?;

    let mut stats = ExtractionStats::tally(total_pages, pages.len(), &records, &issues);
    stats.total_duration_ms = start.elapsed().as_millis() as u64;

    info!(
        "Extraction complete: {} records ({} figures, {} images, {} algorithms), {} issues, {}ms",
        records.len(),
        stats.figures,
        stats.embedded_images,
        stats.algorithms,
        issues.len(),
        stats.total_duration_ms
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_extraction_complete(records.len());
    }

    Ok(ExtractionOutput {
        records,
        stats,
        issues,
        json_path: Some(json_path),
    })
}

fn first_requested_page(selection: &PageSelection) -> usize {
    match selection {
        PageSelection::All => 0,
        PageSelection::Single(p) => *p,
        PageSelection::Range(start, _) => *start,
        PageSelection::Set(pages) => pages.first().copied().unwrap_or(0),
    }
}

/// Extract figures, embedded images and algorithm headings from a PDF file
/// or URL into `out_dir`.
///
/// The bundled vision-model adapters are built from the provider the config
/// resolves to (see [`resolve_provider`]).
///
/// # Example
/// ```rust,no_run
/// use edgequake_pdfsampler::{extract, ExtractionConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ExtractionConfig::default();
/// let output = extract("paper.pdf", "extracted", &config).await?;
/// println!("Extraction complete! {} items found.", output.records.len());
/// # Ok(())
/// # }
/// ```
pub async fn extract(
    input_str: impl AsRef<str>,
    out_dir: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, SamplerError> {
    let provider = resolve_provider(config).await?;
    let models = default_models(provider, config)?;
    extract_with_models(input_str, out_dir, models, config).await
}

/// Like [`extract`], with caller-supplied collaborators.
pub async fn extract_with_models(
    input_str: impl AsRef<str>,
    out_dir: impl AsRef<Path>,
    models: Models,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, SamplerError> {
    let input_str = input_str.as_ref();
    info!("Starting extraction: {}", input_str);

    let resolved = input::resolve_input(input_str, config.download_timeout_secs).await?;
    let layout = OutputLayout::new(out_dir.as_ref());
    let config = config.clone();

    tokio::task::spawn_blocking(move || {
        let pdfium = pdfium::bind_pdfium()?;
        let document = pdfium::open_document(&pdfium, resolved.path(), config.password.as_deref())?;
        let source = PdfiumSource::new(document);
        layout.create_dirs()?;
        extract_document(&source, &models, &layout, &config)
    })
    .await
    .map_err(|e| SamplerError::Internal(format!("Extraction task panicked: {e}")))?
}

/// Blocking wrapper around [`extract`] on a private runtime.
pub fn extract_sync(
    input_str: impl AsRef<str>,
    out_dir: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, SamplerError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| SamplerError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(extract(input_str, out_dir, config))
}

/// Read document metadata without loading any model.
pub async fn inspect(
    input_str: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<DocumentMetadata, SamplerError> {
    let resolved = input::resolve_input(input_str.as_ref(), config.download_timeout_secs).await?;
    let password = config.password.clone();

    tokio::task::spawn_blocking(move || {
        let pdfium = pdfium::bind_pdfium()?;
        let document = pdfium::open_document(&pdfium, resolved.path(), password.as_deref())?;
        Ok::<_, SamplerError>(pdfium::read_metadata(&document))
    })
    .await
    .map_err(|e| SamplerError::Internal(format!("Inspect task panicked: {e}")))?
}

/// The bundled collaborators: vision-model detector and captioner, and the
/// configured entity backend.
///
/// Must be called inside a tokio runtime; the adapters block on it later.
pub fn default_models(
    provider: Arc<dyn LLMProvider>,
    config: &ExtractionConfig,
) -> Result<Models, SamplerError> {
    let client = Arc::new(VlmClient::for_current_runtime(provider, config)?);

    let entities: Arc<dyn EntityExtractor> = match config.entity_backend {
        EntityBackend::Regex => Arc::new(RegexEntityExtractor::new()),
        EntityBackend::Llm => Arc::new(LlmEntityExtractor::new(Arc::clone(&client))),
    };

    Ok(Models::new(
        Arc::new(VlmRegionDetector::new(Arc::clone(&client), config.min_region_score)),
        Arc::new(VlmCaptioner::new(client)),
        entities,
    ))
}

// ── Provider resolution ──────────────────────────────────────────────────

fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, SamplerError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        SamplerError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the vision provider, most specific first:
///
/// 1. `config.provider`, used as-is
/// 2. `config.provider_name` with `config.model`
/// 3. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`, when both are set
/// 4. OpenAI when `OPENAI_API_KEY` is set
/// 5. `ProviderFactory::from_env` auto-detection
pub async fn resolve_provider(
    config: &ExtractionConfig,
) -> Result<Arc<dyn LLMProvider>, SamplerError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);

    if let Some(ref name) = config.provider_name {
        return create_vision_provider(name, model);
    }

    if let (Ok(prov), Ok(env_model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !env_model.is_empty() {
            return create_vision_provider(&prov, &env_model);
        }
    }

    if std::env::var("OPENAI_API_KEY").is_ok_and(|k| !k.is_empty()) {
        return create_vision_provider("openai", model);
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| SamplerError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;
    Ok(llm_provider)
}

/// Default output directory for an input: `<stem>_extracted` next to the
/// current directory.
pub fn default_out_dir(input_str: &str) -> PathBuf {
    let stem = Path::new(input_str.trim_end_matches('/'))
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("document");
    PathBuf::from(format!("{stem}_extracted"))
}
