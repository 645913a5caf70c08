//! Model identity, catalog metadata and key parsing.
//!
//! [`ModelConfig`] is the cache key of the [`ModelSlot`](crate::slot::ModelSlot):
//! two configs are equal when their size and quantization match.  The
//! backend identifier is fixed process-wide and deliberately left out of
//! equality.
//!
//! [`MODEL_CATALOG`] lists every size/quantization pair the service knows
//! about, with the rough resource hints surfaced by the `models` operation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// ---------------------------------------------------------------------------
// ModelSize
// ---------------------------------------------------------------------------

/// Parameter-count tier of the translation model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum ModelSize {
    /// 4B parameters, about 3 GB VRAM at Q4.
    Small,
    /// 12B parameters (default).
    Medium,
    /// 27B parameters, about 15 GB VRAM at Q4.
    Large,
}

impl ModelSize {
    /// Short label used in model keys and engine tags (`"4b"`, `"12b"`, `"27b"`).
    pub fn label(&self) -> &'static str {
        match self {
            ModelSize::Small => "4b",
            ModelSize::Medium => "12b",
            ModelSize::Large => "27b",
        }
    }
}

impl FromStr for ModelSize {
    type Err = ConfigError;

    /// Accepts either the tier name (`"medium"`) or the parameter label (`"12b"`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "4b" | "small" => Ok(ModelSize::Small),
            "12b" | "medium" => Ok(ModelSize::Medium),
            "27b" | "large" => Ok(ModelSize::Large),
            other => Err(ConfigError::UnknownModelSize(other.to_string())),
        }
    }
}

impl TryFrom<String> for ModelSize {
    type Error = ConfigError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl fmt::Display for ModelSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Quantization
// ---------------------------------------------------------------------------

/// Weight quantization of the resident model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Quantization {
    Q4,
    Q8,
}

impl Quantization {
    pub fn bits(&self) -> u8 {
        match self {
            Quantization::Q4 => 4,
            Quantization::Q8 => 8,
        }
    }
}

impl TryFrom<u8> for Quantization {
    type Error = ConfigError;

    fn try_from(bits: u8) -> Result<Self, Self::Error> {
        match bits {
            4 => Ok(Quantization::Q4),
            8 => Ok(Quantization::Q8),
            other => Err(ConfigError::UnknownQuantization(other.to_string())),
        }
    }
}

impl From<Quantization> for u8 {
    fn from(q: Quantization) -> Self {
        q.bits()
    }
}

impl FromStr for Quantization {
    type Err = ConfigError;

    /// Accepts `"4"`, `"8"`, `"q4"` or `"Q8"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix('q')
            .or_else(|| trimmed.strip_prefix('Q'))
            .unwrap_or(trimmed);
        let bits: u8 = digits
            .parse()
            .map_err(|_| ConfigError::UnknownQuantization(trimmed.to_string()))?;
        Quantization::try_from(bits)
    }
}

// ---------------------------------------------------------------------------
// ModelConfig
// ---------------------------------------------------------------------------

/// Identity of a loadable model variant.
///
/// ```
/// use lingoslot::engine::{ModelConfig, ModelSize, Quantization};
///
/// let a = ModelConfig::new(ModelSize::Medium, Quantization::Q4, "ollama");
/// let b = ModelConfig::new(ModelSize::Medium, Quantization::Q4, "other");
/// assert_eq!(a, b); // backend does not take part in equality
/// assert_eq!(a.key(), "12b-Q4");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub size: ModelSize,
    pub quantization: Quantization,
    pub backend: String,
}

impl ModelConfig {
    pub fn new(size: ModelSize, quantization: Quantization, backend: impl Into<String>) -> Self {
        Self {
            size,
            quantization,
            backend: backend.into(),
        }
    }

    /// Display key, e.g. `"12b-Q4"`.
    pub fn key(&self) -> String {
        format!("{}-Q{}", self.size.label(), self.quantization.bits())
    }

    /// Parse a model key against process defaults.
    ///
    /// `"12b-Q8"` sets both fields; a bare size (`"27b"`, `"large"`) keeps
    /// `default_quant`.  The backend always comes from `backend`.
    pub fn parse_key(
        key: &str,
        default_quant: Quantization,
        backend: &str,
    ) -> Result<Self, ConfigError> {
        let upper = key.trim().to_ascii_uppercase();
        let (size, quant) = match upper.split_once("-Q") {
            Some((size, bits)) => (size.parse::<ModelSize>()?, bits.parse::<Quantization>()?),
            None => (upper.parse::<ModelSize>()?, default_quant),
        };
        Ok(Self::new(size, quant, backend))
    }
}

impl PartialEq for ModelConfig {
    fn eq(&self, other: &Self) -> bool {
        self.size == other.size && self.quantization == other.quantization
    }
}

impl Eq for ModelConfig {}

impl fmt::Display for ModelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// Static resource hints for one size/quantization pair.
#[derive(Debug, Serialize)]
pub struct ModelInfo {
    pub size: ModelSize,
    pub quantization: Quantization,
    /// Approximate accelerator memory needed while resident.
    pub vram: &'static str,
    pub speed: &'static str,
    pub quality: &'static str,
}

impl ModelInfo {
    pub fn key(&self) -> String {
        format!("{}-Q{}", self.size.label(), self.quantization.bits())
    }
}

pub const MODEL_CATALOG: &[ModelInfo] = &[
    ModelInfo {
        size: ModelSize::Small,
        quantization: Quantization::Q4,
        vram: "~3GB",
        speed: "fastest",
        quality: "good",
    },
    ModelInfo {
        size: ModelSize::Small,
        quantization: Quantization::Q8,
        vram: "~5GB",
        speed: "fast",
        quality: "better",
    },
    ModelInfo {
        size: ModelSize::Medium,
        quantization: Quantization::Q4,
        vram: "~7GB",
        speed: "balanced",
        quality: "high",
    },
    ModelInfo {
        size: ModelSize::Medium,
        quantization: Quantization::Q8,
        vram: "~12GB",
        speed: "medium",
        quality: "higher",
    },
    ModelInfo {
        size: ModelSize::Large,
        quantization: Quantization::Q4,
        vram: "~15GB",
        speed: "slow",
        quality: "best",
    },
    ModelInfo {
        size: ModelSize::Large,
        quantization: Quantization::Q8,
        vram: "~28GB",
        speed: "slowest",
        quality: "best+",
    },
];

/// Look up catalog metadata for a config.
pub fn find_model(config: &ModelConfig) -> Option<&'static ModelInfo> {
    MODEL_CATALOG
        .iter()
        .find(|m| m.size == config.size && m.quantization == config.quantization)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
