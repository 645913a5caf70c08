//! [`OllamaEngine`] drives a local Ollama daemon as the inference engine.
//!
//! The daemon already knows how to page models in and out, so the slot
//! lifecycle maps onto its `keep_alive` knob:
//!
//! | Slot operation | Request                                         |
//! |----------------|-------------------------------------------------|
//! | load           | `POST /api/generate {model, keep_alive: -1}`    |
//! | translate      | `POST /api/chat {model, messages, stream:false}`|
//! | release        | `POST /api/generate {model, keep_alive: 0}`     |
//! | memory status  | `GET /api/ps` (`size_vram` per resident model)  |
//!
//! Uses `reqwest::blocking`; every call must run on the blocking pool.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::StatusCode;

use crate::config::EngineConfig;
use crate::engine::backend::{
    AcceleratorMemory, InferenceEngine, InferenceError, LoadError, Translation,
    TranslationSession,
};
use crate::engine::model::{find_model, ModelConfig, ModelInfo};
use crate::engine::prompt::PromptBuilder;
use crate::text::lang::detect_language;

const BYTES_PER_MB: u64 = 1024 * 1024;

// ---------------------------------------------------------------------------
// OllamaEngine
// ---------------------------------------------------------------------------

pub struct OllamaEngine {
    client: Client,
    config: EngineConfig,
}

impl std::fmt::Debug for OllamaEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OllamaEngine")
            .field("base_url", &self.config.base_url)
            .finish_non_exhaustive()
    }
}

impl OllamaEngine {
    /// Build the engine from config.
    ///
    /// Must be called outside an async context: the blocking client owns a
    /// private runtime.
    pub fn from_config(config: &EngineConfig) -> Result<Self, LoadError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| {
                log::error!("ollama: failed to build HTTP client: {e}");
                LoadError::Backend(format!("HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    /// Ollama model tag for `config`, from the configured template.
    ///
    /// `{size}` expands to `4b`/`12b`/`27b`, `{bits}` to `4`/`8`.
    pub fn model_tag(&self, config: &ModelConfig) -> String {
        model_tag(&self.config.model_tag_template, config)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// VRAM occupied by `tag` according to `/api/ps`, in bytes.
    fn resident_vram(&self, tag: &str) -> Option<u64> {
        let json = self.process_status()?;
        json["models"].as_array()?.iter().find_map(|m| {
            (m["name"].as_str() == Some(tag) || m["model"].as_str() == Some(tag))
                .then(|| m["size_vram"].as_u64())
                .flatten()
        })
    }

    fn process_status(&self) -> Option<serde_json::Value> {
        let response = self.client.get(self.url("/api/ps")).send().ok()?;
        if !response.status().is_success() {
            return None;
        }
        response.json().ok()
    }
}

pub(crate) fn model_tag(template: &str, config: &ModelConfig) -> String {
    template
        .replace("{size}", config.size.label())
        .replace("{bits}", &config.quantization.bits().to_string())
}

/// Catalog entry for `config`; configs outside the catalog have no tag.
fn catalog_entry(config: &ModelConfig) -> Result<&'static ModelInfo, LoadError> {
    find_model(config).ok_or_else(|| LoadError::Unsupported(config.key()))
}

fn classify_load_failure(tag: &str, status: StatusCode, body: &str) -> LoadError {
    let lower = body.to_ascii_lowercase();
    if status == StatusCode::NOT_FOUND || lower.contains("not found") {
        LoadError::ModelNotFound(tag.to_string())
    } else if lower.contains("memory") {
        LoadError::InsufficientMemory(format!("{tag}: {}", body.trim()))
    } else {
        LoadError::Backend(format!("{tag}: HTTP {status}: {}", body.trim()))
    }
}

impl InferenceEngine for OllamaEngine {
    fn load(&self, config: &ModelConfig) -> Result<Box<dyn TranslationSession>, LoadError> {
        let info = catalog_entry(config)?;
        let tag = self.model_tag(config);
        log::info!("ollama: loading {tag} (about {} VRAM)", info.vram);

        let body = serde_json::json!({
            "model":      tag,
            "keep_alive": -1,
            "stream":     false
        });

        let response = self
            .client
            .post(self.url("/api/generate"))
            .timeout(Duration::from_secs(self.config.load_timeout_secs))
            .json(&body)
            .send()
            .map_err(|e| LoadError::Backend(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().unwrap_or_default();
            return Err(classify_load_failure(&tag, status, &text));
        }

        let vram = self.resident_vram(&tag).unwrap_or(0);
        log::debug!("ollama: {tag} resident, size_vram={vram}");

        Ok(Box::new(OllamaSession {
            client: self.client.clone(),
            chat_url: self.url("/api/chat"),
            generate_url: self.url("/api/generate"),
            tag,
            temperature: self.config.temperature,
            accelerator: vram > 0,
        }))
    }

    fn accelerator_memory(&self) -> Option<AcceleratorMemory> {
        let json = self.process_status()?;
        let used: u64 = json["models"]
            .as_array()?
            .iter()
            .filter_map(|m| m["size_vram"].as_u64())
            .sum();
        Some(AcceleratorMemory {
            device: format!("ollama@{}", self.config.base_url),
            used_mb: used / BYTES_PER_MB,
            total_mb: None,
        })
    }
}

// ---------------------------------------------------------------------------
// OllamaSession
// ---------------------------------------------------------------------------

struct OllamaSession {
    client: Client,
    chat_url: String,
    generate_url: String,
    tag: String,
    temperature: f32,
    accelerator: bool,
}

impl TranslationSession for OllamaSession {
    fn translate(
        &self,
        text: &str,
        target_lang: &str,
        source_hint: Option<&str>,
    ) -> Result<Translation, InferenceError> {
        let source_lang = source_hint
            .map(str::to_string)
            .unwrap_or_else(|| detect_language(text).to_string());

        let (system_msg, user_msg) =
            PromptBuilder::new(target_lang).build_chat(text, Some(&source_lang));

        let body = serde_json::json!({
            "model": self.tag,
            "messages": [
                { "role": "system", "content": system_msg },
                { "role": "user",   "content": user_msg   }
            ],
            "stream":     false,
            "keep_alive": -1,
            "options":    { "temperature": self.temperature }
        });

        let response = self
            .client
            .post(&self.chat_url)
            .json(&body)
            .send()
            .map_err(|e| InferenceError::Engine(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().unwrap_or_default();
            return Err(InferenceError::Engine(format!("HTTP {status}: {}", text.trim())));
        }

        let json: serde_json::Value = response
            .json()
            .map_err(|e| InferenceError::Engine(format!("bad response: {e}")))?;

        let translated = json["message"]["content"]
            .as_str()
            .ok_or(InferenceError::EmptyOutput)?
            .trim()
            .to_string();

        if translated.is_empty() {
            return Err(InferenceError::EmptyOutput);
        }

        Ok(Translation {
            text: translated,
            source_lang,
        })
    }

    fn uses_accelerator(&self) -> bool {
        self.accelerator
    }

    fn release(self: Box<Self>) {
        let body = serde_json::json!({ "model": self.tag, "keep_alive": 0 });
        match self.client.post(&self.generate_url).json(&body).send() {
            Ok(r) if r.status().is_success() => log::info!("ollama: released {}", self.tag),
            Ok(r) => log::warn!("ollama: release of {} returned HTTP {}", self.tag, r.status()),
            Err(e) => log::warn!("ollama: release of {} failed: {e}", self.tag),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::model::{ModelSize, Quantization, MODEL_CATALOG};

    fn unreachable_config() -> EngineConfig {
        EngineConfig {
            base_url: "http://127.0.0.1:1".into(),
            request_timeout_secs: 2,
            load_timeout_secs: 2,
            ..EngineConfig::default()
        }
    }

    #[test]
    fn tag_expands_template() {
        let cfg = ModelConfig::new(ModelSize::Large, Quantization::Q8, "ollama");
        assert_eq!(model_tag("translategemma:{size}-q{bits}", &cfg), "translategemma:27b-q8");
        assert_eq!(model_tag("custom", &cfg), "custom");
    }

    #[test]
    fn engine_uses_configured_template() {
        let engine = OllamaEngine::from_config(&EngineConfig::default()).unwrap();
        let cfg = ModelConfig::new(ModelSize::Small, Quantization::Q4, "ollama");
        assert_eq!(engine.model_tag(&cfg), "translategemma:4b-q4");
    }

    #[test]
    fn every_catalog_config_is_loadable() {
        for info in MODEL_CATALOG {
            let cfg = ModelConfig::new(info.size, info.quantization, "ollama");
            let entry = catalog_entry(&cfg).unwrap();
            assert_eq!(entry.key(), cfg.key());
        }
    }

    #[test]
    fn classify_not_found() {
        let e = classify_load_failure("m", StatusCode::NOT_FOUND, "{\"error\":\"model 'm' not found\"}");
        assert!(matches!(e, LoadError::ModelNotFound(_)));
    }

    #[test]
    fn classify_out_of_memory() {
        let e = classify_load_failure(
            "m",
            StatusCode::INTERNAL_SERVER_ERROR,
            "model requires more system memory (17.2 GiB) than is available",
        );
        assert!(matches!(e, LoadError::InsufficientMemory(_)));
    }

    #[test]
    fn classify_other_failure_is_backend() {
        let e = classify_load_failure("m", StatusCode::BAD_GATEWAY, "upstream died");
        assert!(matches!(e, LoadError::Backend(_)));
        assert!(e.to_string().contains("502"));
    }

    #[test]
    fn load_against_closed_port_is_backend_error() {
        let engine = OllamaEngine::from_config(&unreachable_config()).unwrap();
        let cfg = ModelConfig::new(ModelSize::Medium, Quantization::Q4, "ollama");
        let err = engine.load(&cfg).err().expect("load must fail");
        assert!(matches!(err, LoadError::Backend(_)), "got {err:?}");
    }

    #[test]
    fn memory_status_unavailable_when_daemon_down() {
        let engine = OllamaEngine::from_config(&unreachable_config()).unwrap();
        assert!(engine.accelerator_memory().is_none());
    }
}
