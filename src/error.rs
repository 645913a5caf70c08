//! Crate-level error types.
//!
//! [`ConfigError`] is raised before any model work starts.  Engine failures
//! ([`LoadError`], [`InferenceError`]) live next to the engine traits and are
//! wrapped, together with decoding failures, by [`TranslateError`], the one
//! error every request surface returns.

use thiserror::Error;

use crate::engine::{InferenceError, LoadError};

/// Invalid model, language or chunking parameters.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("Unknown model size: {0} (use 4b, 12b or 27b)")]
    UnknownModelSize(String),

    #[error("Unknown quantization: {0} (use 4 or 8)")]
    UnknownQuantization(String),

    #[error("Unknown backend: {0}")]
    UnknownBackend(String),

    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("Invalid chunking parameters: {0}")]
    InvalidChunking(String),

    /// An environment override could not be parsed.
    #[error("Invalid value for {key}: {value:?}")]
    InvalidEnv { key: String, value: String },
}

/// Everything that can fail a translation request.
#[derive(Debug, Clone, Error)]
pub enum TranslateError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Load(#[from] LoadError),

    /// Chunk `chunk_index` (1-based) failed; remaining chunks were not submitted.
    #[error("Chunk {chunk_index} failed: {source}")]
    Inference {
        chunk_index: usize,
        #[source]
        source: InferenceError,
    },

    /// Input bytes are not valid UTF-8.
    #[error("Input is not valid UTF-8 text: {0}")]
    Encoding(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::string::FromUtf8Error> for TranslateError {
    fn from(e: std::string::FromUtf8Error) -> Self {
        TranslateError::Encoding(e.to_string())
    }
}

impl TranslateError {
    /// Short machine-readable kind, used in wire payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            TranslateError::Config(_) => "configuration",
            TranslateError::Load(_) => "load",
            TranslateError::Inference { .. } => "inference",
            TranslateError::Encoding(_) => "encoding",
            TranslateError::Io(_) => "io",
        }
    }
}
