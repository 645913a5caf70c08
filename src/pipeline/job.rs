//! Validated translation work items and their reports.
//!
//! A [`TranslationJob`] is what the service layer hands to the
//! [`Translator`](super::Translator) once a request has passed validation:
//! the model is resolved, the target language is known and the chunking
//! parameters are final.

use std::time::Duration;

use serde::Serialize;

use crate::config::ChunkingConfig;
use crate::engine::ModelConfig;
use crate::error::TranslateError;
use crate::text::{segment, ChunkSpec};

// ---------------------------------------------------------------------------
// TranslationJob
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct TranslationJob {
    pub text: String,
    pub target_lang: String,
    /// Caller-supplied source language; detected from the first chunk when
    /// absent.
    pub source_lang: Option<String>,
    pub model: ModelConfig,
    pub chunking: ChunkingConfig,
}

impl TranslationJob {
    pub fn new(
        text: impl Into<String>,
        target_lang: impl Into<String>,
        model: ModelConfig,
        chunking: ChunkingConfig,
    ) -> Self {
        Self {
            text: text.into(),
            target_lang: target_lang.into(),
            source_lang: None,
            model,
            chunking,
        }
    }

    pub fn with_source(mut self, source_lang: Option<String>) -> Self {
        self.source_lang = source_lang;
        self
    }

    /// Chunks submitted to the engine, in order.
    ///
    /// With `auto_split` off the whole (trimmed) text is a single chunk.
    pub fn chunks(&self) -> Vec<ChunkSpec> {
        if self.chunking.auto_split {
            return segment(
                &self.text,
                self.chunking.max_chunk_length,
                self.chunking.overlap,
            );
        }
        let text = self.text.trim();
        if text.is_empty() {
            Vec::new()
        } else {
            vec![ChunkSpec::plain(text)]
        }
    }

    /// Input length in characters.
    pub fn input_length(&self) -> usize {
        self.text.chars().count()
    }
}

// ---------------------------------------------------------------------------
// TranslationReport
// ---------------------------------------------------------------------------

/// Result of a completed synchronous translation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranslationReport {
    pub result: String,
    pub source_lang: String,
    pub target_lang: String,
    pub elapsed_ms: u64,
    /// Number of chunks submitted.
    pub chunks: usize,
    pub input_length: usize,
    pub output_length: usize,
    /// Model key, e.g. `"12b-Q4"`.
    pub model: String,
    pub chars_per_sec: f64,
    /// Characters of context re-sent as overlap prefixes.
    pub overlap_used: usize,
}

impl TranslationReport {
    pub(crate) fn new(
        job: &TranslationJob,
        chunks: &[ChunkSpec],
        result: String,
        source_lang: Option<String>,
        elapsed: Duration,
    ) -> Self {
        let elapsed_ms = millis(elapsed);
        let input_length = job.input_length();
        Self {
            output_length: result.chars().count(),
            result,
            source_lang: source_lang.unwrap_or_else(|| "unknown".into()),
            target_lang: job.target_lang.clone(),
            elapsed_ms,
            chunks: chunks.len(),
            input_length,
            model: job.model.key(),
            chars_per_sec: chars_per_sec(input_length, elapsed_ms),
            overlap_used: chunks.iter().map(|c| c.overlap_prefix_len).sum(),
        }
    }
}

pub(crate) fn millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

/// Throughput rounded to one decimal; zero when no time was measured.
fn chars_per_sec(input_length: usize, elapsed_ms: u64) -> f64 {
    if elapsed_ms == 0 {
        return 0.0;
    }
    let rate = input_length as f64 / (elapsed_ms as f64 / 1000.0);
    (rate * 10.0).round() / 10.0
}

// ---------------------------------------------------------------------------
// Batch results
// ---------------------------------------------------------------------------

/// Outcome of one batch item.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BatchItem {
    Success(TranslationReport),
    Error { error: String, kind: String },
}

impl BatchItem {
    pub fn is_success(&self) -> bool {
        matches!(self, BatchItem::Success(_))
    }
}

impl From<Result<TranslationReport, TranslateError>> for BatchItem {
    fn from(result: Result<TranslationReport, TranslateError>) -> Self {
        match result {
            Ok(report) => BatchItem::Success(report),
            Err(e) => BatchItem::Error {
                error: e.to_string(),
                kind: e.kind().to_string(),
            },
        }
    }
}

/// Results of a whole batch, in input order.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub results: Vec<BatchItem>,
    pub count: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub total_elapsed_ms: u64,
}

impl BatchReport {
    pub(crate) fn new(results: Vec<BatchItem>, elapsed: Duration) -> Self {
        let succeeded = results.iter().filter(|r| r.is_success()).count();
        Self {
            count: results.len(),
            failed: results.len() - succeeded,
            succeeded,
            results,
            total_elapsed_ms: millis(elapsed),
        }
    }
}
