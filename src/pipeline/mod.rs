//! Translation orchestration.
//!
//! # Architecture
//!
//! ```text
//! TranslationJob
//!        │
//!        ▼
//! Translator::translate / translate_stream / translate_batch
//!        │
//!        ├─ job.chunks()                  → text::segment
//!        ├─ slot.acquire(model)           → ModelLease     (once per request)
//!        ├─ lease.translate(chunk) × N    → spawn_blocking(engine)
//!        ├─ text::merge(results)
//!        └─ slot.release_if_immediate(lease)
//! ```

pub mod events;
pub mod job;
pub mod runner;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use events::TranslationEvent;
pub use job::{BatchItem, BatchReport, TranslationJob, TranslationReport};
pub use runner::Translator;
