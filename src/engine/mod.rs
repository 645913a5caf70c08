//! Inference engine module.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │              InferenceEngine (trait)                 │
//! │                                                      │
//! │   ┌─────────────┐    ┌────────────────────────┐      │
//! │   │ ModelConfig │───▶│ OllamaEngine::load()   │      │
//! │   │ size, quant │    │  POST /api/generate    │      │
//! │   └─────────────┘    └──────────┬─────────────┘      │
//! │                                 │                    │
//! │                                 ▼                    │
//! │                Box<dyn TranslationSession>           │
//! │                 translate()  /  release()            │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! All engine calls block; callers run them on the tokio blocking pool.

pub mod backend;
pub mod model;
pub mod ollama;
pub mod prompt;

// ── Public re-exports ──────────────────────────────────────────────────────

pub use backend::{
    AcceleratorMemory, InferenceEngine, InferenceError, LoadError, Translation,
    TranslationSession,
};
pub use model::{find_model, ModelConfig, ModelInfo, ModelSize, Quantization, MODEL_CATALOG};
pub use ollama::OllamaEngine;
pub use prompt::PromptBuilder;

#[cfg(test)]
pub use backend::{MockEngine, MockStats};

use crate::config::EngineConfig;
use crate::error::{ConfigError, TranslateError};

/// Backend identifiers this build can construct.
pub const SUPPORTED_BACKENDS: &[&str] = &["ollama"];

/// Build the process-wide engine for `backend`.
pub fn build_engine(
    backend: &str,
    config: &EngineConfig,
) -> Result<Box<dyn InferenceEngine>, TranslateError> {
    match backend {
        "ollama" => Ok(Box::new(OllamaEngine::from_config(config)?)),
        other => Err(ConfigError::UnknownBackend(other.to_string()).into()),
    }
}
