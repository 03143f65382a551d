//! Configuration types for Office/PDF-to-Markdown conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. One struct carries every knob so a
//! batch run can share a single config across files and a `--json` report
//! can show exactly what was in effect.
//!
//! # Image flags
//! Callers historically pass three booleans (`extract`, `embed`, `skip`).
//! They are collapsed into a single [`ImageMode`] by [`ImageMode::resolve`]
//! at build time, so exactly one mode is ever active downstream.

use crate::error::Office2MdError;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for converting one document (or a batch of them).
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_office2md::{ConversionConfig, DocxBackend, ImageMode};
///
/// let config = ConversionConfig::builder()
///     .embed_images(true)
///     .docx_backend(DocxBackend::Native)
///     .build()
///     .unwrap();
/// assert_eq!(config.image_mode, ImageMode::Embed);
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// How images are emitted. Default: [`ImageMode::Extract`].
    pub image_mode: ImageMode,

    /// Directory that receives extracted images.
    ///
    /// `None` means `{output_stem}_images/` next to the Markdown file.
    pub images_dir: Option<PathBuf>,

    /// Which DOCX backend to use. Default: [`DocxBackend::Auto`].
    pub docx_backend: DocxBackend,

    /// Convert every worksheet of an XLSX workbook (otherwise only the active one). Default: true.
    pub include_all_sheets: bool,

    /// Emit PPTX speaker notes under each slide. Default: true.
    pub include_notes: bool,

    /// Name or path of the pandoc executable. Default: `"pandoc"`.
    pub pandoc_path: PathBuf,

    /// Wall-clock budget for one pandoc run, in seconds. Default: 120.
    ///
    /// A hung child is killed when the budget runs out and the file is
    /// reported as [`Office2MdError::BackendTimeout`].
    pub pandoc_timeout_secs: u64,

    /// LLM model identifier used by the PDF layout backend.
    /// If None, uses the provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    /// If None along with `provider`, uses `ProviderFactory::from_env()`.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature for page transcription. Default: 0.1.
    pub temperature: f32,

    /// Maximum tokens the LLM may generate per page. Default: 4096.
    pub max_tokens: usize,

    /// Maximum retry attempts on a transient VLM API failure. Default: 3.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds (exponential backoff). Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-VLM-call timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Number of concurrent VLM page calls. Default: 4.
    ///
    /// Results are reassembled in page order regardless of completion order,
    /// so raising this never changes image numbering.
    pub concurrency: usize,

    /// Longest edge of a rendered PDF page, in pixels. Default: 2000.
    pub max_rendered_pixels: u32,

    /// Custom system prompt for the layout backend. If None, uses the built-in default.
    pub system_prompt: Option<String>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            image_mode: ImageMode::Extract,
            images_dir: None,
            docx_backend: DocxBackend::Auto,
            include_all_sheets: true,
            include_notes: true,
            pandoc_path: PathBuf::from("pandoc"),
            pandoc_timeout_secs: 120,
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.1,
            max_tokens: 4096,
            max_retries: 3,
            retry_backoff_ms: 500,
            api_timeout_secs: 60,
            concurrency: 4,
            max_rendered_pixels: 2000,
            system_prompt: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("image_mode", &self.image_mode)
            .field("images_dir", &self.images_dir)
            .field("docx_backend", &self.docx_backend)
            .field("include_all_sheets", &self.include_all_sheets)
            .field("include_notes", &self.include_notes)
            .field("pandoc_path", &self.pandoc_path)
            .field("pandoc_timeout_secs", &self.pandoc_timeout_secs)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("concurrency", &self.concurrency)
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
            extract: true,
            embed: false,
            skip: false,
        }
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
    extract: bool,
    embed: bool,
    skip: bool,
}

impl ConversionConfigBuilder {
    pub fn extract_images(mut self, v: bool) -> Self {
        self.extract = v;
        self
    }

    pub fn embed_images(mut self, v: bool) -> Self {
        self.embed = v;
        self
    }

    pub fn skip_images(mut self, v: bool) -> Self {
        self.skip = v;
        self
    }

    /// Set the mode directly, replacing whatever the individual flags said.
    pub fn image_mode(mut self, mode: ImageMode) -> Self {
        self.extract = mode == ImageMode::Extract;
        self.embed = mode == ImageMode::Embed;
        self.skip = mode == ImageMode::Skip;
        self
    }

    pub fn images_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.images_dir = Some(dir.into());
        self
    }

    pub fn docx_backend(mut self, backend: DocxBackend) -> Self {
        self.config.docx_backend = backend;
        self
    }

    pub fn include_all_sheets(mut self, v: bool) -> Self {
        self.config.include_all_sheets = v;
        self
    }

    pub fn include_notes(mut self, v: bool) -> Self {
        self.config.include_notes = v;
        self
    }

    pub fn pandoc_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pandoc_path = path.into();
        self
    }

    pub fn pandoc_timeout_secs(mut self, secs: u64) -> Self {
        self.config.pandoc_timeout_secs = secs;
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

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    /// Build the configuration, validating constraints and resolving the image mode.
    pub fn build(mut self) -> Result<ConversionConfig, Office2MdError> {
        self.config.image_mode = ImageMode::resolve(self.extract, self.embed, self.skip);
        let c = &self.config;
        if c.pandoc_timeout_secs == 0 {
            return Err(Office2MdError::InvalidConfig(
                "pandoc timeout must be ≥ 1 second".into(),
            ));
        }
        if c.concurrency == 0 {
            return Err(Office2MdError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        if let Some(ref dir) = c.images_dir {
            if dir.as_os_str().is_empty() {
                return Err(Office2MdError::InvalidConfig(
                    "images directory must not be empty".into(),
                ));
            }
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// How images discovered in a document are emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageMode {
    /// Write image files next to the Markdown and reference them by relative path. (default)
    #[default]
    Extract,
    /// Inline every image as a base64 `data:` URI.
    Embed,
    /// Drop images entirely; no image syntax is emitted.
    Skip,
}

impl ImageMode {
    /// Collapse the three legacy flags into one mode.
    ///
    /// Precedence is skip > embed > extract. With no flag set nothing was
    /// asked for, which resolves to [`ImageMode::Skip`].
    pub fn resolve(extract: bool, embed: bool, skip: bool) -> Self {
        if skip {
            ImageMode::Skip
        } else if embed {
            ImageMode::Embed
        } else if extract {
            ImageMode::Extract
        } else {
            ImageMode::Skip
        }
    }

    pub fn is_skip(self) -> bool {
        self == ImageMode::Skip
    }
}

/// DOCX conversion strategy.
///
/// `Auto` walks the ranked list `Pandoc → Markup → Native` and takes the
/// first backend the host can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocxBackend {
    #[default]
    Auto,
    /// External `pandoc` binary.
    Pandoc,
    /// DOCX → HTML → Markdown, images inlined as base64 first.
    Markup,
    /// Structural OOXML reader. Always available.
    Native,
}

impl DocxBackend {
    /// Map forced-backend flags onto a single choice.
    ///
    /// When several are set the most conservative wins: native > markup > pandoc.
    pub fn from_flags(pandoc: bool, markup: bool, native: bool) -> Self {
        if native {
            DocxBackend::Native
        } else if markup {
            DocxBackend::Markup
        } else if pandoc {
            DocxBackend::Pandoc
        } else {
            DocxBackend::Auto
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skip_wins_over_embed() {
        let c = ConversionConfig::builder()
            .skip_images(true)
            .embed_images(true)
            .build()
            .unwrap();
        assert_eq!(c.image_mode, ImageMode::Skip);
        assert_ne!(c.image_mode, ImageMode::Extract);
    }

    #[test]
    fn embed_wins_over_extract() {
        assert_eq!(ImageMode::resolve(true, true, false), ImageMode::Embed);
    }

    #[test]
    fn no_flags_resolves_to_skip() {
        assert_eq!(ImageMode::resolve(false, false, false), ImageMode::Skip);
        let c = ConversionConfig::builder()
            .extract_images(false)
            .build()
            .unwrap();
        assert!(c.image_mode.is_skip());
    }

    #[test]
    fn default_mode_is_extract() {
        let c = ConversionConfig::builder().build().unwrap();
        assert_eq!(c.image_mode, ImageMode::Extract);
        assert!(c.include_all_sheets);
        assert!(c.include_notes);
        assert_eq!(c.pandoc_timeout_secs, 120);
    }

    #[test]
    fn image_mode_setter_overrides_flags() {
        let c = ConversionConfig::builder()
            .skip_images(true)
            .image_mode(ImageMode::Embed)
            .build()
            .unwrap();
        assert_eq!(c.image_mode, ImageMode::Embed);
    }

    #[test]
    fn backend_flag_precedence() {
        assert_eq!(DocxBackend::from_flags(true, true, true), DocxBackend::Native);
        assert_eq!(DocxBackend::from_flags(true, true, false), DocxBackend::Markup);
        assert_eq!(DocxBackend::from_flags(true, false, false), DocxBackend::Pandoc);
        assert_eq!(DocxBackend::from_flags(false, false, false), DocxBackend::Auto);
    }

    #[test]
    fn zero_timeout_rejected() {
        let err = ConversionConfig::builder()
            .pandoc_timeout_secs(0)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("timeout"));
    }

    #[test]
    fn concurrency_clamped() {
        let c = ConversionConfig::builder().concurrency(0).build().unwrap();
        assert_eq!(c.concurrency, 1);
    }
}
