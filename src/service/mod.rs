//! Service boundary consumed by transports.
//!
//! | Operation            | Request              | Response                       |
//! |----------------------|----------------------|--------------------------------|
//! | `translate_once`     | `TranslateRequest`   | `TranslationReport`            |
//! | `translate_streamed` | `TranslateRequest`   | `Receiver<TranslationEvent>`   |
//! | `translate_batch`    | `BatchRequest`       | `BatchReport`                  |
//! | `translate_file`     | `FileRequest`        | `FileReport`                   |
//! | `slot_status`        | –                    | `SlotStatus`                   |
//! | `force_release`      | –                    | `ReleaseAck`                   |
//! | `switch_model`       | `SwitchModelRequest` | `SwitchModelResponse`          |
//! | `health`             | –                    | `HealthReport`                 |
//! | `config_summary`     | –                    | `ConfigSummary`                |
//! | `languages`          | –                    | `Vec<LanguageEntry>`           |
//! | `models`             | –                    | `ModelsReport`                 |

pub mod handler;
pub mod types;

pub use handler::TranslationService;
pub use types::{
    resolve_model, BatchRequest, ConfigSummary, FileReport, FileRequest, HealthReport,
    LanguageEntry, ModelEntry, ModelsReport, ReleaseAck, RequestDefaults, ResolvedOptions,
    SwitchModelRequest, SwitchModelResponse, TranslateOptions, TranslateRequest,
};
