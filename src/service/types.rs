//! Request and response value types of the service boundary.
//!
//! Requests are plain serde structs with optional fields; `resolve`/`into_job`
//! validate them against the process defaults and turn them into
//! [`TranslationJob`]s before anything reaches the orchestrator.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::config::ChunkingConfig;
use crate::engine::{ModelConfig, ModelInfo, Quantization};
use crate::error::ConfigError;
use crate::pipeline::{TranslationJob, TranslationReport};
use crate::slot::SlotStatus;
use crate::text::canonical_code;

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

/// Process defaults that per-request fields override.
#[derive(Debug, Clone)]
pub struct RequestDefaults {
    pub model: ModelConfig,
    pub chunking: ChunkingConfig,
}

/// Resolve an optional model key and quantization against `default`.
///
/// Accepts `"12b-Q4"`, `"12b"` or `"medium"` in any case.  `quantization`
/// only applies when the key does not carry its own.
pub fn resolve_model(
    key: Option<&str>,
    quantization: Option<u8>,
    default: &ModelConfig,
) -> Result<ModelConfig, ConfigError> {
    let quant = match quantization {
        Some(bits) => Quantization::try_from(bits)?,
        None => default.quantization,
    };
    match key.map(str::trim).filter(|k| !k.is_empty()) {
        Some(key) => ModelConfig::parse_key(key, quant, &default.backend),
        None => Ok(ModelConfig::new(default.size, quant, default.backend.clone())),
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Translation parameters shared by every translate-style request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TranslateOptions {
    pub target_lang: String,
    /// Source language; `None`, `""` or `"auto"` means detect.
    pub source_lang: Option<String>,
    /// Model key, e.g. `"27b"` or `"12b-Q8"`.
    pub model: Option<String>,
    pub quantization: Option<u8>,
    /// Maximum chunk length in characters.
    pub chunk_size: Option<usize>,
    pub overlap: Option<usize>,
    pub auto_split: Option<bool>,
}

/// [`TranslateOptions`] after validation.
#[derive(Debug, Clone)]
pub struct ResolvedOptions {
    pub target_lang: String,
    pub source_lang: Option<String>,
    pub model: ModelConfig,
    pub chunking: ChunkingConfig,
}

impl ResolvedOptions {
    pub fn job(&self, text: impl Into<String>) -> TranslationJob {
        TranslationJob::new(text, &self.target_lang, self.model.clone(), self.chunking.clone())
            .with_source(self.source_lang.clone())
    }
}

impl TranslateOptions {
    pub fn resolve(&self, defaults: &RequestDefaults) -> Result<ResolvedOptions, ConfigError> {
        let target_lang = canonical_code(&self.target_lang)
            .ok_or_else(|| ConfigError::UnsupportedLanguage(self.target_lang.clone()))?;

        let source_lang = match self.source_lang.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(s) if s.eq_ignore_ascii_case("auto") => None,
            Some(s) => Some(
                canonical_code(s)
                    .ok_or_else(|| ConfigError::UnsupportedLanguage(s.to_string()))?
                    .to_string(),
            ),
        };

        let model = resolve_model(self.model.as_deref(), self.quantization, &defaults.model)?;

        let chunking = ChunkingConfig {
            max_chunk_length: self
                .chunk_size
                .unwrap_or(defaults.chunking.max_chunk_length),
            overlap: self.overlap.unwrap_or(defaults.chunking.overlap),
            auto_split: self.auto_split.unwrap_or(defaults.chunking.auto_split),
        };
        if chunking.max_chunk_length == 0 {
            return Err(ConfigError::InvalidChunking(
                "chunk_size must be positive".into(),
            ));
        }

        Ok(ResolvedOptions {
            target_lang: target_lang.to_string(),
            source_lang,
            model,
            chunking,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TranslateRequest {
    pub text: String,
    #[serde(flatten)]
    pub options: TranslateOptions,
}

impl TranslateRequest {
    pub fn new(text: impl Into<String>, target_lang: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            options: TranslateOptions {
                target_lang: target_lang.into(),
                ..TranslateOptions::default()
            },
        }
    }

    pub fn into_job(self, defaults: &RequestDefaults) -> Result<TranslationJob, ConfigError> {
        Ok(self.options.resolve(defaults)?.job(self.text))
    }
}

/// Several texts sharing one set of parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct BatchRequest {
    pub texts: Vec<String>,
    #[serde(flatten)]
    pub options: TranslateOptions,
}

impl BatchRequest {
    pub fn into_jobs(self, defaults: &RequestDefaults) -> Result<Vec<TranslationJob>, ConfigError> {
        let resolved = self.options.resolve(defaults)?;
        Ok(self.texts.into_iter().map(|t| resolved.job(t)).collect())
    }
}

/// Translate the UTF-8 text file at `path`.
#[derive(Debug, Clone, Deserialize)]
pub struct FileRequest {
    pub path: PathBuf,
    /// Where to write the translation; nothing is written when absent.
    pub output_path: Option<PathBuf>,
    #[serde(flatten)]
    pub options: TranslateOptions,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SwitchModelRequest {
    /// `"12b-Q4"`, `"12b"`, `"medium"`, …
    pub model: String,
    pub quantization: Option<u8>,
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    #[serde(flatten)]
    pub report: TranslationReport,
    pub output_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SwitchModelResponse {
    pub model: String,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReleaseAck {
    /// `false` when no model was resident.
    pub released: bool,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub slot: SlotStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfigSummary {
    pub default_model: String,
    pub default_backend: String,
    pub idle_timeout_secs: u64,
    pub eviction: String,
    pub max_chunk_length: usize,
    pub chunk_overlap: usize,
    pub auto_split: bool,
    pub supported_languages: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LanguageEntry {
    pub code: &'static str,
    pub name: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ModelEntry {
    pub key: String,
    #[serde(flatten)]
    pub info: &'static ModelInfo,
}

#[derive(Debug, Serialize)]
pub struct ModelsReport {
    pub models: Vec<ModelEntry>,
    pub current: Option<String>,
    pub default: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ModelSize;

    fn defaults() -> RequestDefaults {
        RequestDefaults {
            model: ModelConfig::new(ModelSize::Medium, Quantization::Q4, "ollama"),
            chunking: ChunkingConfig::default(),
        }
    }

    fn options(target: &str) -> TranslateOptions {
        TranslateOptions {
            target_lang: target.into(),
            ..TranslateOptions::default()
        }
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let resolved = options("en").resolve(&defaults()).unwrap();
        assert_eq!(resolved.model.key(), "12b-Q4");
        assert_eq!(resolved.model.backend, "ollama");
        assert_eq!(resolved.chunking.max_chunk_length, 80);
        assert_eq!(resolved.source_lang, None);
    }

    #[test]
    fn model_keys_in_every_accepted_form() {
        let d = defaults().model;
        assert_eq!(resolve_model(Some("27b-q8"), None, &d).unwrap().key(), "27b-Q8");
        assert_eq!(resolve_model(Some("4b"), None, &d).unwrap().key(), "4b-Q4");
        assert_eq!(resolve_model(Some("LARGE"), Some(8), &d).unwrap().key(), "27b-Q8");
        assert_eq!(resolve_model(None, Some(8), &d).unwrap().key(), "12b-Q8");
        assert_eq!(resolve_model(Some("12b-Q4"), Some(8), &d).unwrap().key(), "12b-Q4");
    }

    #[test]
    fn bad_model_or_quantization_is_configuration_error() {
        let d = defaults().model;
        assert!(matches!(
            resolve_model(Some("70b"), None, &d),
            Err(ConfigError::UnknownModelSize(_))
        ));
        assert!(matches!(
            resolve_model(None, Some(3), &d),
            Err(ConfigError::UnknownQuantization(_))
        ));
    }

    #[test]
    fn languages_are_validated_and_canonicalised() {
        let mut opts = options("ZH-tw");
        opts.source_lang = Some("auto".into());
        let resolved = opts.resolve(&defaults()).unwrap();
        assert_eq!(resolved.target_lang, "zh-TW");
        assert_eq!(resolved.source_lang, None);

        let err = options("xx").resolve(&defaults()).unwrap_err();
        assert_eq!(err, ConfigError::UnsupportedLanguage("xx".into()));
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        let mut opts = options("en");
        opts.chunk_size = Some(0);
        assert!(matches!(
            opts.resolve(&defaults()),
            Err(ConfigError::InvalidChunking(_))
        ));
    }

    #[test]
    fn request_deserialises_with_flattened_options() {
        let req: TranslateRequest = serde_json::from_str(
            r#"{"text":"你好","target_lang":"en","model":"4b","chunk_size":40,"overlap":10}"#,
        )
        .unwrap();
        let job = req.into_job(&defaults()).unwrap();
        assert_eq!(job.model.key(), "4b-Q4");
        assert_eq!(job.chunking.max_chunk_length, 40);
        assert_eq!(job.chunking.overlap, 10);
        assert_eq!(job.target_lang, "en");
    }

    #[test]
    fn batch_request_shares_options() {
        let req: BatchRequest =
            serde_json::from_str(r#"{"texts":["a","b"],"target_lang":"ja","source_lang":"en"}"#)
                .unwrap();
        let jobs = req.into_jobs(&defaults()).unwrap();
        assert_eq!(jobs.len(), 2);
        assert!(jobs.iter().all(|j| j.source_lang.as_deref() == Some("en")));
    }
}
