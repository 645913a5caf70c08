//! lingoslot: a translation service core around one resident model.
//!
//! * [`slot`]: single-slot model cache with idle or immediate eviction.
//! * [`text`]: segmentation into bounded chunks, merging, language table.
//! * [`pipeline`]: per-request orchestration (sync, streaming, batch).
//! * [`service`]: validated request/response boundary for transports.
//! * [`engine`]: inference engine traits and the Ollama-backed engine.

pub mod config;
pub mod engine;
pub mod error;
pub mod pipeline;
pub mod service;
pub mod slot;
pub mod text;

pub use error::{ConfigError, TranslateError};
