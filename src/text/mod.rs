//! Text adaptation layer: segmentation, merging and language metadata.
//!
//! Everything here is pure and shares no state, so the orchestrator calls
//! these functions directly on the request task.
//!
//! ```text
//! input ──segment()──▶ Vec<ChunkSpec> ──engine──▶ Vec<String> ──merge()──▶ output
//! ```

pub mod lang;
pub mod merge;
pub mod segment;

// ── Public re-exports ──────────────────────────────────────────────────────

pub use lang::{canonical_code, detect_language, language_name, LANGUAGES};
pub use merge::merge;
pub use segment::{derive_overlap, segment, split_sentences, ChunkSpec};
