//! Typed events produced by a streaming translation.
//!
//! The stream always opens with [`Start`](TranslationEvent::Start), carries
//! one `Progress`/`Chunk` pair per chunk in chunk order, and ends with
//! exactly one of `Done` or `Error`.  Transports turn each event into their
//! own wire frame; serialised with `serde_json` an event looks like
//! `{"event":"chunk","chunk_index":2,...}`.

use serde::Serialize;

use crate::error::TranslateError;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TranslationEvent {
    Start {
        total_chunks: usize,
        input_length: usize,
    },
    /// Emitted before chunk `chunk_index` (1-based) is submitted.
    Progress {
        chunk_index: usize,
        total_chunks: usize,
    },
    Chunk {
        chunk_index: usize,
        translated_text: String,
        elapsed_ms: u64,
    },
    Done {
        merged_result: String,
        source_lang: String,
        elapsed_ms: u64,
        output_length: usize,
        model: String,
    },
    Error {
        message: String,
        kind: String,
    },
}

impl TranslationEvent {
    /// `true` for `Done` and `Error`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TranslationEvent::Done { .. } | TranslationEvent::Error { .. })
    }
}

impl From<&TranslateError> for TranslationEvent {
    fn from(e: &TranslateError) -> Self {
        TranslationEvent::Error {
            message: e.to_string(),
            kind: e.kind().to_string(),
        }
    }
}
