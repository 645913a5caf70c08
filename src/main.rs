//! lingoslot service entry point.
//!
//! # Startup sequence
//!
//! 1. Initialise logging (stderr; stdout carries the protocol).
//! 2. Load [`AppConfig`] from disk, then apply environment overrides.
//! 3. Build the inference engine (outside the runtime: the Ollama client
//!    uses `reqwest::blocking`).
//! 4. Create the [`tokio`] runtime with the configured worker count.
//! 5. Serve newline-delimited JSON commands from stdin until EOF.
//! 6. Shut the slot down, then drop the runtime before the service.
//!
//! # Protocol
//!
//! One JSON object per input line, selected by `op`; an optional `id` is
//! echoed on every output line belonging to that command.
//!
//! ```text
//! {"id":1,"op":"translate","text":"你好","target_lang":"en"}
//! {"id":2,"op":"translate_stream","text":"…","target_lang":"ja","overlap":20}
//! {"op":"batch","texts":["a","b"],"target_lang":"fr"}
//! {"op":"file","path":"in.txt","output_path":"out.txt","target_lang":"en"}
//! {"op":"switch_model","model":"27b-Q4"}
//! {"op":"status"} {"op":"release"} {"op":"health"} {"op":"config"}
//! {"op":"languages"} {"op":"models"}
//! ```

use std::sync::Arc;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use lingoslot::config::AppConfig;
use lingoslot::engine::{build_engine, InferenceEngine};
use lingoslot::service::{
    BatchRequest, FileRequest, SwitchModelRequest, TranslateRequest, TranslationService,
};
use lingoslot::TranslateError;

/// Output lines buffered ahead of the stdout writer.
const OUTPUT_BUFFER: usize = 64;

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Command {
    Translate(TranslateRequest),
    TranslateStream(TranslateRequest),
    Batch(BatchRequest),
    File(FileRequest),
    SwitchModel(SwitchModelRequest),
    Status,
    Release,
    Health,
    Config,
    Languages,
    Models,
}

/// Attach `id` and `status: success` to a serialised payload.
fn success<T: Serialize>(id: &Value, payload: &T) -> Value {
    let value = serde_json::to_value(payload)
        .unwrap_or_else(|e| json!({ "error": format!("serialisation failed: {e}") }));
    let mut out = match value {
        Value::Object(map) => Value::Object(map),
        other => json!({ "data": other }),
    };
    out["status"] = json!("success");
    tag(out, id)
}

fn failure(id: &Value, kind: &str, message: String) -> Value {
    tag(json!({ "status": "error", "kind": kind, "error": message }), id)
}

fn from_result<T: Serialize>(id: &Value, result: Result<T, TranslateError>) -> Value {
    match result {
        Ok(payload) => success(id, &payload),
        Err(e) => failure(id, e.kind(), e.to_string()),
    }
}

fn tag(mut value: Value, id: &Value) -> Value {
    if !id.is_null() {
        value["id"] = id.clone();
    }
    value
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

async fn dispatch(service: TranslationService, id: Value, cmd: Command, out: mpsc::Sender<Value>) {
    let response = match cmd {
        Command::Translate(req) => from_result(&id, service.translate_once(req).await),
        Command::TranslateStream(req) => match service.translate_streamed(req) {
            Ok(mut events) => {
                while let Some(event) = events.recv().await {
                    let line = tag(serde_json::to_value(&event).unwrap_or(Value::Null), &id);
                    if out.send(line).await.is_err() {
                        return;
                    }
                }
                return;
            }
            Err(e) => failure(&id, e.kind(), e.to_string()),
        },
        Command::Batch(req) => from_result(&id, service.translate_batch(req).await),
        Command::File(req) => from_result(&id, service.translate_file(req).await),
        Command::SwitchModel(req) => from_result(&id, service.switch_model(req).await),
        Command::Status => success(&id, &service.slot_status().await),
        Command::Release => success(&id, &service.force_release().await),
        Command::Health => success(&id, &service.health().await),
        Command::Config => success(&id, &service.config_summary()),
        Command::Languages => success(&id, &service.languages()),
        Command::Models => success(&id, &service.models().await),
    };
    let _ = out.send(response).await;
}

async fn write_lines(mut rx: mpsc::Receiver<Value>) -> std::io::Result<()> {
    let mut stdout = tokio::io::stdout();
    while let Some(value) = rx.recv().await {
        let mut line = value.to_string();
        line.push('\n');
        stdout.write_all(line.as_bytes()).await?;
        stdout.flush().await?;
    }
    Ok(())
}

/// Decode one input line into its `id` and command.
///
/// `Ok(None)` for blank lines; `Err` carries the failure frame to send back.
fn parse_line(bytes: &[u8]) -> Result<Option<(Value, Command)>, Value> {
    let line = std::str::from_utf8(bytes)
        .map_err(|e| failure(&Value::Null, "encoding", format!("input line is not UTF-8: {e}")))?
        .trim();
    if line.is_empty() {
        return Ok(None);
    }

    let raw: Value = serde_json::from_str(line)
        .map_err(|e| failure(&Value::Null, "request", format!("invalid JSON: {e}")))?;
    let id = raw.get("id").cloned().unwrap_or(Value::Null);

    match serde_json::from_value::<Command>(raw) {
        Ok(cmd) => Ok(Some((id, cmd))),
        Err(e) => Err(failure(&id, "request", format!("invalid command: {e}"))),
    }
}

/// Run every command read from `input`, then shut the slot down.
///
/// Running commands are drained and the slot is released even when reading
/// fails midway.
async fn run_commands<R>(
    service: &TranslationService,
    mut input: R,
    out: &mpsc::Sender<Value>,
) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut tasks = JoinSet::new();
    let mut buf = Vec::new();

    let read = loop {
        buf.clear();
        match input.read_until(b'\n', &mut buf).await {
            Ok(0) => break Ok(()),
            Ok(_) => {}
            Err(e) => break Err(e),
        }

        match parse_line(&buf) {
            Ok(Some((id, cmd))) => {
                log::debug!("command {id}: {cmd:?}");
                tasks.spawn(dispatch(service.clone(), id, cmd, out.clone()));
            }
            Ok(None) => {}
            Err(frame) => {
                let _ = out.send(frame).await;
            }
        }
    };

    match &read {
        Ok(()) => log::info!("stdin closed, waiting for {} running command(s)", tasks.len()),
        Err(e) => log::error!(
            "reading stdin failed ({e}), waiting for {} running command(s)",
            tasks.len()
        ),
    }
    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            log::error!("command task failed: {e}");
        }
    }
    service.shutdown().await;
    read
}

/// Serve stdin until EOF, writing responses to stdout.
async fn serve(service: TranslationService) -> anyhow::Result<()> {
    let (out_tx, out_rx) = mpsc::channel::<Value>(OUTPUT_BUFFER);
    let writer = tokio::spawn(write_lines(out_rx));

    let read = run_commands(&service, BufReader::new(tokio::io::stdin()), &out_tx).await;

    drop(out_tx);
    writer.await.context("stdout writer task")??;
    read.context("reading stdin")
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> anyhow::Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("lingoslot starting up");

    // 2. Configuration
    let config = AppConfig::load()
        .unwrap_or_else(|e| {
            log::warn!("Failed to load config ({e}); using defaults");
            AppConfig::default()
        })
        .with_env()
        .context("invalid configuration")?;
    log::info!(
        "default model {}, backend {}, idle timeout {}s, chunks of {} chars",
        config.default_model(),
        config.model.backend,
        config.slot.idle_timeout_secs,
        config.chunking.max_chunk_length
    );

    // 3. Engine
    let engine: Arc<dyn InferenceEngine> =
        Arc::from(build_engine(&config.model.backend, &config.engine)?);

    let worker_threads = config.runtime.worker_threads.max(1);
    let service = TranslationService::new(engine, config);

    // 4. Tokio runtime
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(worker_threads)
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    // 5-6. Serve, then tear down outside the runtime
    let result = rt.block_on(serve(service.clone()));
    drop(rt);
    drop(service);

    log::info!("lingoslot stopped");
    result
}
