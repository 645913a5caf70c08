//! Inference engine traits and error types.
//!
//! # Overview
//!
//! [`InferenceEngine`] is the factory the [`ModelSlot`](crate::slot::ModelSlot)
//! calls on a cache miss.  It hands back a boxed [`TranslationSession`], the
//! resident model, which the slot owns until eviction.
//!
//! Both traits are object-safe and `Send + Sync`.  Every method is a
//! blocking call: the slot and the orchestrator run them on
//! `tokio::task::spawn_blocking`.
//!
//! [`MockEngine`] (available under `#[cfg(test)]`) is a zero-dependency stub
//! that records how often it was loaded and released.

use serde::Serialize;
use thiserror::Error;

use crate::engine::model::ModelConfig;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failures raised while bringing a model into memory.
#[derive(Debug, Clone, Error)]
pub enum LoadError {
    /// The engine has no artifact for the requested configuration.
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// Not enough host or accelerator memory to hold the model.
    #[error("Insufficient memory to load model: {0}")]
    InsufficientMemory(String),

    /// The configuration is valid but this engine cannot serve it.
    #[error("Unsupported model configuration: {0}")]
    Unsupported(String),

    /// Engine start-up or transport failure.
    #[error("Backend initialisation failed: {0}")]
    Backend(String),
}

/// Failures raised while translating one chunk.
#[derive(Debug, Clone, Error)]
pub enum InferenceError {
    /// Engine-internal failure (bad response, crashed worker, …).
    #[error("Inference failed: {0}")]
    Engine(String),

    /// The engine answered but produced no text.
    #[error("Engine returned an empty translation")]
    EmptyOutput,
}

// ---------------------------------------------------------------------------
// Value types
// ---------------------------------------------------------------------------

/// Output of one [`TranslationSession::translate`] call.
#[derive(Debug, Clone, PartialEq)]
pub struct Translation {
    pub text: String,
    /// Source language the engine detected (or the hint it was given).
    pub source_lang: String,
}

/// Accelerator memory snapshot reported by the engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AcceleratorMemory {
    /// Device or runtime description.
    pub device: String,
    /// Memory occupied by resident models, in MiB.
    pub used_mb: u64,
    /// Total device memory in MiB, when the engine knows it.
    pub total_mb: Option<u64>,
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// A resident, loaded model able to translate text.
pub trait TranslationSession: Send + Sync {
    /// Translate `text` into `target_lang`.
    ///
    /// `source_hint` is the caller-supplied (or previously detected) source
    /// language; engines may use it instead of running detection.
    fn translate(
        &self,
        text: &str,
        target_lang: &str,
        source_hint: Option<&str>,
    ) -> Result<Translation, InferenceError>;

    /// `true` when the session holds accelerator memory.
    fn uses_accelerator(&self) -> bool {
        false
    }

    /// Release native and accelerator resources held by the session.
    fn release(self: Box<Self>);
}

/// Factory for [`TranslationSession`]s.
pub trait InferenceEngine: Send + Sync {
    /// Load the model identified by `config`.
    fn load(&self, config: &ModelConfig) -> Result<Box<dyn TranslationSession>, LoadError>;

    /// Current accelerator memory usage, if the engine can report it.
    fn accelerator_memory(&self) -> Option<AcceleratorMemory> {
        None
    }

    /// Best-effort reclamation after an accelerator-backed session was released.
    fn reclaim_accelerator_memory(&self) {}
}

// Compile-time assertion: both traits must be usable as trait objects.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn InferenceEngine>, _: Box<dyn TranslationSession>) {}
};

// ---------------------------------------------------------------------------
// MockEngine  (test-only)
// ---------------------------------------------------------------------------

#[cfg(test)]
pub use mock::{MockEngine, MockStats};

#[cfg(test)]
mod mock {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use super::*;

    /// Shared counters observed by tests after the engine moved into a slot.
    #[derive(Debug, Default)]
    pub struct MockStats {
        pub loads: AtomicUsize,
        pub releases: AtomicUsize,
        pub translations: AtomicUsize,
        pub reclaims: AtomicUsize,
        /// Every text submitted for translation, in call order.
        pub inputs: Mutex<Vec<String>>,
    }

    impl MockStats {
        pub fn loads(&self) -> usize {
            self.loads.load(Ordering::SeqCst)
        }

        pub fn releases(&self) -> usize {
            self.releases.load(Ordering::SeqCst)
        }

        pub fn translations(&self) -> usize {
            self.translations.load(Ordering::SeqCst)
        }

        pub fn reclaims(&self) -> usize {
            self.reclaims.load(Ordering::SeqCst)
        }

        pub fn inputs(&self) -> Vec<String> {
            self.inputs.lock().unwrap().clone()
        }
    }

    /// Test double: translation is `"[<target>] <text>"`, detected language
    /// is fixed.
    pub struct MockEngine {
        pub stats: Arc<MockStats>,
        load_error: Option<LoadError>,
        /// Zero-based translate call index that fails, counted per engine.
        fail_on_call: Option<usize>,
        accelerator: bool,
        detected: String,
    }

    impl MockEngine {
        pub fn new() -> Self {
            Self {
                stats: Arc::new(MockStats::default()),
                load_error: None,
                fail_on_call: None,
                accelerator: false,
                detected: "zh".into(),
            }
        }

        pub fn failing_load(error: LoadError) -> Self {
            Self {
                load_error: Some(error),
                ..Self::new()
            }
        }

        pub fn failing_on_call(mut self, call: usize) -> Self {
            self.fail_on_call = Some(call);
            self
        }

        pub fn with_accelerator(mut self) -> Self {
            self.accelerator = true;
            self
        }

        pub fn stats(&self) -> Arc<MockStats> {
            Arc::clone(&self.stats)
        }
    }

    struct MockSession {
        stats: Arc<MockStats>,
        fail_on_call: Option<usize>,
        accelerator: bool,
        detected: String,
    }

    impl TranslationSession for MockSession {
        fn translate(
            &self,
            text: &str,
            target_lang: &str,
            source_hint: Option<&str>,
        ) -> Result<Translation, InferenceError> {
            let call = self.stats.translations.fetch_add(1, Ordering::SeqCst);
            self.stats.inputs.lock().unwrap().push(text.to_string());
            if self.fail_on_call == Some(call) {
                return Err(InferenceError::Engine(format!("mock failure on call {call}")));
            }
            Ok(Translation {
                text: format!("[{target_lang}] {text}"),
                source_lang: source_hint.unwrap_or(&self.detected).to_string(),
            })
        }

        fn uses_accelerator(&self) -> bool {
            self.accelerator
        }

        fn release(self: Box<Self>) {
            self.stats.releases.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl InferenceEngine for MockEngine {
        fn load(&self, _config: &ModelConfig) -> Result<Box<dyn TranslationSession>, LoadError> {
            if let Some(err) = &self.load_error {
                return Err(err.clone());
            }
            self.stats.loads.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(MockSession {
                stats: Arc::clone(&self.stats),
                fail_on_call: self.fail_on_call,
                accelerator: self.accelerator,
                detected: self.detected.clone(),
            }))
        }

        fn reclaim_accelerator_memory(&self) {
            self.stats.reclaims.fetch_add(1, Ordering::SeqCst);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::model::{ModelSize, Quantization};

    fn cfg() -> ModelConfig {
        ModelConfig::new(ModelSize::Medium, Quantization::Q4, "mock")
    }

    #[test]
    fn mock_translates_with_target_prefix() {
        let engine = MockEngine::new();
        let session = engine.load(&cfg()).unwrap();
        let out = session.translate("你好", "en", None).unwrap();
        assert_eq!(out.text, "[en] 你好");
        assert_eq!(out.source_lang, "zh");
    }

    #[test]
    fn mock_prefers_source_hint() {
        let engine = MockEngine::new();
        let session = engine.load(&cfg()).unwrap();
        let out = session.translate("hola", "en", Some("es")).unwrap();
        assert_eq!(out.source_lang, "es");
    }

    #[test]
    fn mock_counts_load_and_release() {
        let engine = MockEngine::new();
        let stats = engine.stats();
        let session = engine.load(&cfg()).unwrap();
        session.release();
        assert_eq!(stats.loads(), 1);
        assert_eq!(stats.releases(), 1);
    }

    #[test]
    fn mock_failing_load() {
        let engine = MockEngine::failing_load(LoadError::ModelNotFound("12b-Q4".into()));
        let err = engine.load(&cfg()).err().unwrap();
        assert!(matches!(err, LoadError::ModelNotFound(_)));
        assert_eq!(engine.stats().loads(), 0);
    }

    #[test]
    fn mock_fails_on_selected_call() {
        let engine = MockEngine::new().failing_on_call(1);
        let session = engine.load(&cfg()).unwrap();
        assert!(session.translate("a", "en", None).is_ok());
        assert!(session.translate("b", "en", None).is_err());
        assert!(session.translate("c", "en", None).is_ok());
    }

    #[test]
    fn load_error_display_names_model() {
        let e = LoadError::ModelNotFound("translategemma:12b-q4".into());
        assert!(e.to_string().contains("translategemma:12b-q4"));
    }
}
