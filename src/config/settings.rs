//! Service settings structs, defaults, TOML persistence and environment
//! overrides.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across tasks.
//! Settings are read once at start-up; per-request parameters override the
//! defaults but never mutate them.

use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;
use crate::engine::{ModelConfig, ModelSize, Quantization, SUPPORTED_BACKENDS};
use crate::error::ConfigError;

// ---------------------------------------------------------------------------
// ModelDefaults
// ---------------------------------------------------------------------------

/// Model loaded when a request does not name one.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelDefaults {
    pub size: ModelSize,
    pub quantization: Quantization,
    /// Engine backend identifier, fixed for the whole process.
    pub backend: String,
}

impl Default for ModelDefaults {
    fn default() -> Self {
        Self {
            size: ModelSize::Medium,
            quantization: Quantization::Q4,
            backend: "ollama".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// SlotConfig
// ---------------------------------------------------------------------------

/// Resident-model eviction settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SlotConfig {
    /// Seconds of inactivity before the resident model is evicted.
    ///
    /// `0` selects immediate mode: the model is released as soon as each
    /// request finishes.
    pub idle_timeout_secs: u64,
}

impl Default for SlotConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: 300,
        }
    }
}

// ---------------------------------------------------------------------------
// ChunkingConfig
// ---------------------------------------------------------------------------

/// Default segmentation parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum characters per chunk.
    pub max_chunk_length: usize,
    /// Sliding-window context carried into the next chunk (0 = off).
    pub overlap: usize,
    /// Split long input at all; when `false` the whole text is one chunk.
    pub auto_split: bool,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chunk_length: 80,
            overlap: 0,
            auto_split: true,
        }
    }
}

// ---------------------------------------------------------------------------
// EngineConfig
// ---------------------------------------------------------------------------

/// Connection settings for the inference engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Base URL of the Ollama daemon.
    pub base_url: String,
    /// Model tag template; `{size}` and `{bits}` are substituted.
    pub model_tag_template: String,
    /// Sampling temperature passed with every chunk.
    pub temperature: f32,
    /// Per-chunk request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Model load timeout in seconds (large models page in slowly).
    pub load_timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".into(),
            model_tag_template: "translategemma:{size}-q{bits}".into(),
            temperature: 0.1,
            request_timeout_secs: 120,
            load_timeout_secs: 600,
        }
    }
}

// ---------------------------------------------------------------------------
// RuntimeConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Tokio worker threads serving concurrent requests.
    pub worker_threads: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self { worker_threads: 2 }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level service configuration, serialised as `settings.toml`.
///
/// ```rust,no_run
/// use lingoslot::config::AppConfig;
///
/// // File (or defaults on first run), then MODEL_NAME / QUANTIZATION / … overrides.
/// let config = AppConfig::load().unwrap().with_env().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub model: ModelDefaults,
    pub slot: SlotConfig,
    pub chunking: ChunkingConfig,
    pub engine: EngineConfig,
    pub runtime: RuntimeConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save to an explicit path, creating parent directories as needed.
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply process environment overrides.
    pub fn with_env(self) -> Result<Self, ConfigError> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`, then validate.
    ///
    /// | Variable           | Field                             |
    /// |--------------------|-----------------------------------|
    /// | `MODEL_NAME`       | `model.size` (`4b`, `12b`, `27b`) |
    /// | `QUANTIZATION`     | `model.quantization` (`4`, `8`)   |
    /// | `BACKEND`          | `model.backend`                   |
    /// | `GPU_IDLE_TIMEOUT` | `slot.idle_timeout_secs`          |
    /// | `MAX_CHUNK_LENGTH` | `chunking.max_chunk_length`       |
    /// | `CHUNK_OVERLAP`    | `chunking.overlap`                |
    /// | `OLLAMA_HOST`      | `engine.base_url`                 |
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("MODEL_NAME") {
            self.model.size = v.parse()?;
        }
        if let Some(v) = lookup("QUANTIZATION") {
            self.model.quantization = v.parse()?;
        }
        if let Some(v) = lookup("BACKEND") {
            self.model.backend = v.trim().to_string();
        }
        if let Some(v) = lookup("GPU_IDLE_TIMEOUT") {
            self.slot.idle_timeout_secs = parse_env("GPU_IDLE_TIMEOUT", &v)?;
        }
        if let Some(v) = lookup("MAX_CHUNK_LENGTH") {
            self.chunking.max_chunk_length = parse_env("MAX_CHUNK_LENGTH", &v)?;
        }
        if let Some(v) = lookup("CHUNK_OVERLAP") {
            self.chunking.overlap = parse_env("CHUNK_OVERLAP", &v)?;
        }
        if let Some(v) = lookup("OLLAMA_HOST") {
            let host = v.trim();
            self.engine.base_url = if host.starts_with("http") {
                host.to_string()
            } else {
                format!("http://{host}")
            };
        }
        self.validate()?;
        Ok(self)
    }

    /// Reject settings no request could run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !SUPPORTED_BACKENDS.contains(&self.model.backend.as_str()) {
            return Err(ConfigError::UnknownBackend(self.model.backend.clone()));
        }
        if self.chunking.max_chunk_length == 0 {
            return Err(ConfigError::InvalidChunking(
                "max_chunk_length must be positive".into(),
            ));
        }
        Ok(())
    }

    /// The process default [`ModelConfig`].
    pub fn default_model(&self) -> ModelConfig {
        ModelConfig::new(
            self.model.size,
            self.model.quantization,
            self.model.backend.clone(),
        )
    }

    /// Idle timeout as a `Duration`; zero means immediate eviction.
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.slot.idle_timeout_secs)
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        key: key.to_string(),
        value: value.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
