//! Translation orchestrator: segment → acquire → per-chunk inference → merge.
//!
//! [`Translator`] runs a [`TranslationJob`] against the shared
//! [`ModelSlot`] in one of three modes:
//!
//! ```text
//! translate(job)         ─▶ TranslationReport            (all or nothing)
//! translate_stream(job)  ─▶ mpsc::Receiver<TranslationEvent>
//!                            Start, (Progress, Chunk)*, Done | Error
//! translate_batch(jobs)  ─▶ BatchReport                  (per-item outcome)
//! ```
//!
//! Every mode holds one lease for the whole request, so a multi-chunk
//! request loads the model at most once, and hands it back through
//! [`ModelSlot::release_if_immediate`] on success and failure alike.

use std::time::Instant;

use tokio::sync::mpsc;

use crate::error::TranslateError;
use crate::slot::{ModelLease, ModelSlot};
use crate::text::{merge, ChunkSpec};

use super::events::TranslationEvent;
use super::job::{millis, BatchItem, BatchReport, TranslationJob, TranslationReport};

/// Events buffered between the producer task and a slow consumer.
const EVENT_BUFFER: usize = 32;

// ---------------------------------------------------------------------------
// Translator
// ---------------------------------------------------------------------------

/// Drives translation requests against the process-wide [`ModelSlot`].
///
/// Cheap to clone; clones share the slot.
#[derive(Debug, Clone)]
pub struct Translator {
    slot: ModelSlot,
}

impl Translator {
    pub fn new(slot: ModelSlot) -> Self {
        Self { slot }
    }

    pub fn slot(&self) -> &ModelSlot {
        &self.slot
    }

    /// Translate a whole job and return the merged result.
    ///
    /// A failing chunk aborts the remaining ones and no partial result is
    /// returned.  Input without any text yields an empty report without
    /// touching the slot.
    pub async fn translate(&self, job: &TranslationJob) -> Result<TranslationReport, TranslateError> {
        let started = Instant::now();
        let chunks = job.chunks();
        if chunks.is_empty() {
            return Ok(TranslationReport::new(
                job,
                &chunks,
                String::new(),
                job.source_lang.clone(),
                started.elapsed(),
            ));
        }

        let lease = self.slot.acquire(&job.model).await?;
        let outcome = run_chunks(&lease, job, &chunks).await;
        self.slot.release_if_immediate(lease).await;

        let (results, source_lang) = outcome.map_err(|e| {
            log::warn!("translate: {e}");
            e
        })?;
        let merged = merge(&results, &job.text);
        let report = TranslationReport::new(job, &chunks, merged, source_lang, started.elapsed());

        log::info!(
            "translate: {} chunk(s), {} -> {} chars in {} ms with {} ({} -> {})",
            report.chunks,
            report.input_length,
            report.output_length,
            report.elapsed_ms,
            report.model,
            report.source_lang,
            report.target_lang,
        );
        Ok(report)
    }

    /// Translate a job chunk by chunk, reporting each step as an event.
    ///
    /// The producer runs on its own task.  Dropping the receiver stops it
    /// from submitting further chunks; a chunk already submitted finishes.
    pub fn translate_stream(&self, job: TranslationJob) -> mpsc::Receiver<TranslationEvent> {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let slot = self.slot.clone();
        tokio::spawn(async move { stream_job(slot, job, tx).await });
        rx
    }

    /// Translate each job independently; one failure never aborts the rest.
    pub async fn translate_batch(&self, jobs: Vec<TranslationJob>) -> BatchReport {
        let started = Instant::now();
        let mut results: Vec<BatchItem> = Vec::with_capacity(jobs.len());
        for job in &jobs {
            results.push(self.translate(job).await.into());
        }
        let report = BatchReport::new(results, started.elapsed());
        log::info!(
            "batch: {} item(s), {} failed, {} ms",
            report.count,
            report.failed,
            report.total_elapsed_ms
        );
        report
    }
}

// ---------------------------------------------------------------------------
// Chunk loop
// ---------------------------------------------------------------------------

/// Source language carried across the chunks of one request.
///
/// Starts from the caller's hint; otherwise adopts the language detected on
/// the first chunk and passes it to every later one.
struct SourceLang(Option<String>);

impl SourceLang {
    async fn translate(
        &mut self,
        lease: &ModelLease,
        job: &TranslationJob,
        chunk: &ChunkSpec,
        index: usize,
    ) -> Result<String, TranslateError> {
        let out = lease
            .translate(&chunk.text, &job.target_lang, self.0.as_deref())
            .await
            .map_err(|source| TranslateError::Inference {
                chunk_index: index + 1,
                source,
            })?;
        if self.0.is_none() {
            log::debug!("translate: detected source language {}", out.source_lang);
            self.0 = Some(out.source_lang);
        }
        Ok(out.text)
    }
}

async fn run_chunks(
    lease: &ModelLease,
    job: &TranslationJob,
    chunks: &[ChunkSpec],
) -> Result<(Vec<String>, Option<String>), TranslateError> {
    let mut source = SourceLang(job.source_lang.clone());
    let mut results = Vec::with_capacity(chunks.len());
    for (index, chunk) in chunks.iter().enumerate() {
        results.push(source.translate(lease, job, chunk, index).await?);
    }
    Ok((results, source.0))
}

async fn stream_job(slot: ModelSlot, job: TranslationJob, tx: mpsc::Sender<TranslationEvent>) {
    let started = Instant::now();
    let chunks = job.chunks();
    let total_chunks = chunks.len();
    let start = TranslationEvent::Start {
        total_chunks,
        input_length: job.input_length(),
    };

    if chunks.is_empty() {
        let _ = tx.send(start).await;
        let _ = tx
            .send(TranslationEvent::Done {
                merged_result: String::new(),
                source_lang: job.source_lang.clone().unwrap_or_else(|| "unknown".into()),
                elapsed_ms: millis(started.elapsed()),
                output_length: 0,
                model: job.model.key(),
            })
            .await;
        return;
    }

    let lease = match slot.acquire(&job.model).await {
        Ok(lease) => lease,
        Err(e) => {
            let e = TranslateError::from(e);
            log::warn!("stream: {e}");
            let _ = tx.send(TranslationEvent::from(&e)).await;
            return;
        }
    };

    let mut source = SourceLang(job.source_lang.clone());
    let mut results = Vec::with_capacity(total_chunks);
    let mut failure = None;
    let mut connected = tx.send(start).await.is_ok();

    for (index, chunk) in chunks.iter().enumerate() {
        if !connected {
            break;
        }
        let progress = TranslationEvent::Progress {
            chunk_index: index + 1,
            total_chunks,
        };
        if tx.send(progress).await.is_err() {
            connected = false;
            break;
        }

        let chunk_started = Instant::now();
        match source.translate(&lease, &job, chunk, index).await {
            Ok(text) => {
                let event = TranslationEvent::Chunk {
                    chunk_index: index + 1,
                    translated_text: text.clone(),
                    elapsed_ms: millis(chunk_started.elapsed()),
                };
                results.push(text);
                connected = tx.send(event).await.is_ok();
            }
            Err(e) => {
                failure = Some(e);
                break;
            }
        }
    }

    slot.release_if_immediate(lease).await;

    if !connected {
        log::info!(
            "stream: consumer gone after {}/{total_chunks} chunk(s), stopped",
            results.len()
        );
        return;
    }

    let last = match failure {
        Some(e) => {
            log::warn!("stream: {e}");
            TranslationEvent::from(&e)
        }
        None => {
            let merged_result = merge(&results, &job.text);
            log::info!(
                "stream: {total_chunks} chunk(s) in {} ms with {}",
                millis(started.elapsed()),
                job.model
            );
            TranslationEvent::Done {
                output_length: merged_result.chars().count(),
                merged_result,
                source_lang: source.0.unwrap_or_else(|| "unknown".into()),
                elapsed_ms: millis(started.elapsed()),
                model: job.model.key(),
            }
        }
    };
    let _ = tx.send(last).await;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
