//! Configuration types for figure, image and algorithm extraction.
//!
//! All extraction behaviour is controlled through [`ExtractionConfig`], built
//! via its [`ExtractionConfigBuilder`]. Keeping every knob in one struct makes
//! two runs easy to diff when their outputs disagree.
//!
//! The builder clamps numeric inputs to sane ranges; [`ExtractionConfigBuilder::build`]
//! rejects the combinations clamping cannot fix.

use crate::error::SamplerError;
use crate::pipeline::algorithms::HeadingMatcher;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Configuration for one extraction run.
///
/// Built via [`ExtractionConfig::builder()`] or using
/// [`ExtractionConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_pdfsampler::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .render_scale(3.0)
///     .caption_search_height(200.0)
///     .model("gpt-4.1-mini")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Upscale factor for page rendering before region detection. Range: 0.5–8.0. Default: 2.0.
    ///
    /// Small figures and thin figure borders get lost at 1×; 2× is what the
    /// layout model sees best without blowing up memory on large pages.
    pub render_scale: f32,

    /// Height, in PDF points, of the strip searched for caption text below an
    /// embedded image's placement. Default: 300.0.
    ///
    /// The strip is clipped to the page's bottom edge.
    pub caption_search_height: f32,

    /// Minimum detector confidence for a region to be kept. Range: 0.0–1.0. Default: 0.5.
    pub min_region_score: f32,

    /// Heading pattern and relevance markers for the algorithm stage.
    pub heading_matcher: HeadingMatcher,

    /// Page selection. Default: All pages.
    pub pages: PageSelection,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// LLM model identifier used by the bundled vision/text adapters.
    /// If None, uses the provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    /// If None along with `provider`, the provider is auto-detected.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature for model calls. Default: 0.0.
    pub temperature: f32,

    /// Maximum tokens a model may generate per call. Default: 512.
    ///
    /// Captions are a sentence; region lists for a dense page rarely exceed
    /// a few hundred tokens.
    pub max_tokens: usize,

    /// Retry attempts on a failed model call. Default: 2.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds (doubles per attempt). Default: 500.
    pub retry_backoff_ms: u64,

    /// Which entity extractor the keyword stage uses. Default: [`EntityBackend::Regex`].
    pub entity_backend: EntityBackend,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Optional progress callback.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            render_scale: 2.0,
            caption_search_height: 300.0,
            min_region_score: 0.5,
            heading_matcher: HeadingMatcher::default(),
            pages: PageSelection::default(),
            password: None,
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.0,
            max_tokens: 512,
            max_retries: 2,
            retry_backoff_ms: 500,
            entity_backend: EntityBackend::default(),
            download_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("render_scale", &self.render_scale)
            .field("caption_search_height", &self.caption_search_height)
            .field("min_region_score", &self.min_region_score)
            .field("heading_matcher", &self.heading_matcher)
            .field("pages", &self.pages)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("entity_backend", &self.entity_backend)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ExtractionProgressCallback>"),
            )
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn render_scale(mut self, scale: f32) -> Self {
        self.config.render_scale = scale.clamp(0.5, 8.0);
        self
    }

    pub fn caption_search_height(mut self, points: f32) -> Self {
        self.config.caption_search_height = points;
        self
    }

    pub fn min_region_score(mut self, score: f32) -> Self {
        self.config.min_region_score = score.clamp(0.0, 1.0);
        self
    }

    pub fn heading_matcher(mut self, matcher: HeadingMatcher) -> Self {
        self.config.heading_matcher = matcher;
        self
    }

    pub fn pages(mut self, selection: PageSelection) -> Self {
        self.config.pages = selection;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn entity_backend(mut self, backend: EntityBackend) -> Self {
        self.config.entity_backend = backend;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, SamplerError> {
        let c = &self.config;
        if !c.caption_search_height.is_finite() || c.caption_search_height <= 0.0 {
            return Err(SamplerError::InvalidConfig(format!(
                "caption search height must be a positive number of points, got {}",
                c.caption_search_height
            )));
        }
        if c.max_tokens == 0 {
            return Err(SamplerError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Entity extractor used by the keyword stage.
///
/// | Backend | Needs a provider | Notes |
/// |---------|------------------|-------|
/// | `Regex` | no  | Acronyms, capitalised names, numbers with units (default) |
/// | `Llm`   | yes | Asks the text model for a JSON array of entities |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityBackend {
    #[default]
    Regex,
    Llm,
}

/// Specifies which pages of the PDF to extract from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub enum PageSelection {
    /// All pages (default).
    #[default]
    All,
    /// A single page (1-indexed).
    Single(usize),
    /// A contiguous range of pages (1-indexed, inclusive).
    Range(usize, usize),
    /// Specific pages (1-indexed, deduplicated).
    Set(Vec<usize>),
}

impl PageSelection {
    /// Expand the selection into a sorted, deduplicated list of 0-indexed page numbers.
    pub fn to_indices(&self, total_pages: usize) -> Vec<usize> {
        let mut indices: Vec<usize> = match self {
            PageSelection::All => (0..total_pages).collect(),
            PageSelection::Single(p) => {
                if *p >= 1 && *p <= total_pages {
                    vec![p - 1]
                } else {
                    vec![]
                }
            }
            PageSelection::Range(start, end) => {
                let s = (*start).max(1) - 1;
                let e = (*end).min(total_pages);
                (s..e).collect()
            }
            PageSelection::Set(pages) => pages
                .iter()
                .filter(|&&p| p >= 1 && p <= total_pages)
                .map(|p| p - 1)
                .collect(),
        };
        indices.sort_unstable();
        indices.dedup();
        indices
    }
}
