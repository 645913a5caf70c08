//! [`TranslationService`]: the operations exposed to transports.
//!
//! Every request is validated into a [`TranslationJob`] first, so
//! configuration and encoding problems are rejected before the slot is
//! touched.  Transports (the stdin/stdout front end in `main.rs`, or an HTTP
//! layer) only deal with the request and response types in
//! [`types`](super::types).

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;

use crate::config::AppConfig;
use crate::engine::{InferenceEngine, MODEL_CATALOG};
use crate::error::TranslateError;
use crate::pipeline::{BatchReport, TranslationEvent, TranslationReport, Translator};
use crate::slot::{policy_for_timeout, ModelSlot, SlotStatus};
use crate::text::LANGUAGES;

use super::types::{
    resolve_model, BatchRequest, ConfigSummary, FileReport, FileRequest, HealthReport,
    LanguageEntry, ModelEntry, ModelsReport, ReleaseAck, RequestDefaults, SwitchModelRequest,
    SwitchModelResponse, TranslateOptions, TranslateRequest,
};

/// Service facade over the [`Translator`] and its [`ModelSlot`].
///
/// Cheap to clone; clones share the slot.
#[derive(Debug, Clone)]
pub struct TranslationService {
    translator: Translator,
    defaults: RequestDefaults,
    config: Arc<AppConfig>,
}

impl TranslationService {
    /// Build the slot for `engine` from `config` and wrap it.
    pub fn new(engine: Arc<dyn InferenceEngine>, config: AppConfig) -> Self {
        let slot = ModelSlot::new(
            engine,
            policy_for_timeout(config.idle_timeout()),
            config.default_model(),
        );
        Self::with_slot(slot, config)
    }

    pub fn with_slot(slot: ModelSlot, config: AppConfig) -> Self {
        let defaults = RequestDefaults {
            model: slot.default_model().clone(),
            chunking: config.chunking.clone(),
        };
        Self {
            translator: Translator::new(slot),
            defaults,
            config: Arc::new(config),
        }
    }

    pub fn slot(&self) -> &ModelSlot {
        self.translator.slot()
    }

    // -----------------------------------------------------------------------
    // Translation
    // -----------------------------------------------------------------------

    pub async fn translate_once(
        &self,
        req: TranslateRequest,
    ) -> Result<TranslationReport, TranslateError> {
        let job = req.into_job(&self.defaults)?;
        self.translator.translate(&job).await
    }

    /// Validate `req` and start a streaming translation.
    ///
    /// Must be called from within the tokio runtime.
    pub fn translate_streamed(
        &self,
        req: TranslateRequest,
    ) -> Result<mpsc::Receiver<TranslationEvent>, TranslateError> {
        let job = req.into_job(&self.defaults)?;
        Ok(self.translator.translate_stream(job))
    }

    pub async fn translate_batch(&self, req: BatchRequest) -> Result<BatchReport, TranslateError> {
        let jobs = req.into_jobs(&self.defaults)?;
        Ok(self.translator.translate_batch(jobs).await)
    }

    /// Translate uploaded bytes, which must be UTF-8 text.
    pub async fn translate_bytes(
        &self,
        bytes: Vec<u8>,
        options: &TranslateOptions,
    ) -> Result<TranslationReport, TranslateError> {
        let resolved = options.resolve(&self.defaults)?;
        let text = String::from_utf8(bytes)?;
        self.translator.translate(&resolved.job(text)).await
    }

    /// Translate a text file, optionally writing the result next to it.
    pub async fn translate_file(&self, req: FileRequest) -> Result<FileReport, TranslateError> {
        let resolved = req.options.resolve(&self.defaults)?;
        let bytes = tokio::fs::read(&req.path)
            .await
            .map_err(|e| TranslateError::Io(format!("{}: {e}", req.path.display())))?;
        let text = String::from_utf8(bytes)?;

        let report = self.translator.translate(&resolved.job(text)).await?;

        if let Some(out) = &req.output_path {
            tokio::fs::write(out, report.result.as_bytes())
                .await
                .map_err(|e| TranslateError::Io(format!("{}: {e}", out.display())))?;
            log::info!("file: wrote {} chars to {}", report.output_length, out.display());
        }

        Ok(FileReport {
            report,
            output_path: req.output_path,
        })
    }

    // -----------------------------------------------------------------------
    // Slot management
    // -----------------------------------------------------------------------

    pub async fn slot_status(&self) -> SlotStatus {
        self.slot().status().await
    }

    pub async fn force_release(&self) -> ReleaseAck {
        let released = self.slot().force_evict().await;
        let message = if released {
            "Model released".to_string()
        } else {
            "No model was loaded".to_string()
        };
        ReleaseAck { released, message }
    }

    /// Load `req.model` into the slot now, evicting any other model.
    pub async fn switch_model(
        &self,
        req: SwitchModelRequest,
    ) -> Result<SwitchModelResponse, TranslateError> {
        let config = resolve_model(Some(&req.model), req.quantization, &self.defaults.model)?;
        let started = Instant::now();
        let lease = self.slot().acquire(&config).await?;
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        drop(lease);

        log::info!("switch: {config} ready in {elapsed_ms} ms");
        Ok(SwitchModelResponse {
            model: config.key(),
            elapsed_ms,
        })
    }

    pub async fn shutdown(&self) {
        self.slot().shutdown().await;
    }

    // -----------------------------------------------------------------------
    // Introspection
    // -----------------------------------------------------------------------

    pub async fn health(&self) -> HealthReport {
        HealthReport {
            status: "ok",
            slot: self.slot_status().await,
        }
    }

    pub fn config_summary(&self) -> ConfigSummary {
        let config = &self.config;
        ConfigSummary {
            default_model: self.defaults.model.key(),
            default_backend: self.defaults.model.backend.clone(),
            idle_timeout_secs: config.slot.idle_timeout_secs,
            eviction: self.slot().policy().describe(),
            max_chunk_length: config.chunking.max_chunk_length,
            chunk_overlap: config.chunking.overlap,
            auto_split: config.chunking.auto_split,
            supported_languages: LANGUAGES.len(),
        }
    }

    pub fn languages(&self) -> Vec<LanguageEntry> {
        LANGUAGES
            .iter()
            .map(|&(code, name)| LanguageEntry { code, name })
            .collect()
    }

    pub async fn models(&self) -> ModelsReport {
        let status = self.slot_status().await;
        ModelsReport {
            models: MODEL_CATALOG
                .iter()
                .map(|info| ModelEntry {
                    key: info.key(),
                    info,
                })
                .collect(),
            current: status.current_model,
            default: status.default_model,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{MockEngine, MockStats};
    use crate::error::ConfigError;
    use tempfile::tempdir;

    fn service_with(engine: MockEngine, idle_timeout_secs: u64) -> (TranslationService, Arc<MockStats>) {
        let stats = engine.stats();
        let mut config = AppConfig::default();
        config.slot.idle_timeout_secs = idle_timeout_secs;
        (TranslationService::new(Arc::new(engine), config), stats)
    }

    fn service() -> (TranslationService, Arc<MockStats>) {
        service_with(MockEngine::new(), 300)
    }

    fn file_request(path: std::path::PathBuf, output: Option<std::path::PathBuf>) -> FileRequest {
        FileRequest {
            path,
            output_path: output,
            options: TranslateOptions {
                target_lang: "en".into(),
                ..TranslateOptions::default()
            },
        }
    }

    #[tokio::test]
    async fn translate_once_uses_defaults() {
        let (svc, stats) = service();
        let report = svc
            .translate_once(TranslateRequest::new("你好", "en"))
            .await
            .unwrap();
        assert_eq!(report.result, "[en] 你好");
        assert_eq!(report.model, "12b-Q4");
        assert_eq!(stats.loads(), 1);
    }

    #[tokio::test]
    async fn unsupported_language_is_rejected_before_loading() {
        let (svc, stats) = service();
        let err = svc
            .translate_once(TranslateRequest::new("你好", "xx"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TranslateError::Config(ConfigError::UnsupportedLanguage(_))
        ));
        assert_eq!(stats.loads(), 0);
    }

    #[tokio::test]
    async fn unknown_model_is_rejected_before_loading() {
        let (svc, stats) = service();
        let mut req = TranslateRequest::new("hi", "ja");
        req.options.model = Some("70b".into());
        let err = svc.translate_once(req).await.unwrap_err();
        assert_eq!(err.kind(), "configuration");
        assert_eq!(stats.loads(), 0);
    }

    #[tokio::test]
    async fn streamed_request_yields_events() {
        let (svc, _) = service();
        let mut rx = svc
            .translate_streamed(TranslateRequest::new("a\nb", "en"))
            .unwrap();
        let mut last = None;
        while let Some(event) = rx.recv().await {
            last = Some(event);
        }
        assert!(matches!(last, Some(TranslationEvent::Done { .. })));
    }

    #[tokio::test]
    async fn batch_counts_every_item() {
        let (svc, _) = service();
        let req = BatchRequest {
            texts: vec!["one".into(), "two".into()],
            options: TranslateOptions {
                target_lang: "fr".into(),
                ..TranslateOptions::default()
            },
        };
        let report = svc.translate_batch(req).await.unwrap();
        assert_eq!(report.count, 2);
        assert_eq!(report.succeeded, 2);
    }

    #[tokio::test]
    async fn invalid_utf8_bytes_are_encoding_errors() {
        let (svc, stats) = service();
        let options = TranslateOptions {
            target_lang: "en".into(),
            ..TranslateOptions::default()
        };
        let err = svc
            .translate_bytes(vec![0xff, 0xfe, 0xfd], &options)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "encoding");
        assert_eq!(stats.loads(), 0);
    }

    #[tokio::test]
    async fn file_is_translated_and_written() {
        let dir = tempdir().expect("temp dir");
        let input = dir.path().join("in.txt");
        let output = dir.path().join("out.txt");
        std::fs::write(&input, "第一段。\n第二段。").unwrap();

        let (svc, _) = service();
        let report = svc
            .translate_file(file_request(input, Some(output.clone())))
            .await
            .unwrap();

        assert_eq!(report.report.chunks, 2);
        let written = std::fs::read_to_string(&output).unwrap();
        assert_eq!(written, "[en] 第一段。\n[en] 第二段。");
        assert_eq!(report.output_path, Some(output));
    }

    #[tokio::test]
    async fn missing_file_is_io_error() {
        let dir = tempdir().expect("temp dir");
        let (svc, _) = service();
        let err = svc
            .translate_file(file_request(dir.path().join("absent.txt"), None))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "io");
    }

    #[tokio::test]
    async fn switch_then_release() {
        let (svc, stats) = service();
        let switched = svc
            .switch_model(SwitchModelRequest {
                model: "27b".into(),
                quantization: None,
            })
            .await
            .unwrap();
        assert_eq!(switched.model, "27b-Q4");
        assert_eq!(svc.slot_status().await.current_model.as_deref(), Some("27b-Q4"));

        let ack = svc.force_release().await;
        assert!(ack.released);
        assert_eq!(stats.releases(), 1);
        assert!(!svc.force_release().await.released);
    }

    #[tokio::test]
    async fn switch_to_unknown_model_fails() {
        let (svc, _) = service();
        let err = svc
            .switch_model(SwitchModelRequest {
                model: "huge".into(),
                quantization: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "configuration");
    }

    #[tokio::test]
    async fn models_report_current_and_default() {
        let (svc, _) = service();
        svc.translate_once(TranslateRequest::new("hi", "de")).await.unwrap();
        let models = svc.models().await;
        assert_eq!(models.models.len(), 6);
        assert_eq!(models.current.as_deref(), Some("12b-Q4"));
        assert_eq!(models.default, "12b-Q4");
    }

    #[tokio::test]
    async fn immediate_mode_summary_and_health() {
        let (svc, _) = service_with(MockEngine::new(), 0);
        let summary = svc.config_summary();
        assert_eq!(summary.eviction, "immediate");
        assert_eq!(summary.supported_languages, 54);
        assert_eq!(summary.default_backend, "ollama");

        svc.translate_once(TranslateRequest::new("hi", "de")).await.unwrap();
        let health = svc.health().await;
        assert_eq!(health.status, "ok");
        assert!(!health.slot.loaded);
    }

    #[test]
    fn languages_cover_the_table() {
        let (svc, _) = service();
        let langs = svc.languages();
        assert_eq!(langs.len(), LANGUAGES.len());
        assert!(langs.contains(&LanguageEntry {
            code: "zh-TW",
            name: "Chinese (Traditional)"
        }));
    }
}
