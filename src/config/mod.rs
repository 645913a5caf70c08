//! Service configuration.
//!
//! Provides `AppConfig` (top-level settings) with one sub-config per
//! subsystem, `AppPaths` for the platform config directory, TOML persistence
//! via `AppConfig::load` / `AppConfig::save_to`, and environment overrides
//! via `AppConfig::with_env`.

pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{
    AppConfig, ChunkingConfig, EngineConfig, ModelDefaults, RuntimeConfig, SlotConfig,
};
