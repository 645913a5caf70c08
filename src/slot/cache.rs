//! [`ModelSlot`]: the single-capacity model cache and its leases.
//!
//! One async mutex guards the resident model, so a load or an eviction is a
//! single critical section process-wide.  Inference runs outside the lock
//! on a [`ModelLease`]; every live lease holds a strong reference to the
//! resident model and an eviction never releases a model while one exists:
//!
//! * the idle timer re-arms instead of evicting,
//! * the request-completion hook leaves eviction to the last finisher,
//! * a forced or cache-miss eviction detaches the model at once and waits
//!   for outstanding leases to drain before releasing it.
//!
//! Slot bookkeeping shown by [`ModelSlot::status`] lives behind a separate
//! `std::sync::Mutex` so status never waits on a running load.

use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::policy::EvictionPolicy;
use crate::engine::{
    AcceleratorMemory, InferenceEngine, InferenceError, LoadError, ModelConfig, Translation,
    TranslationSession,
};

// ---------------------------------------------------------------------------
// LoadedModel
// ---------------------------------------------------------------------------

/// A resident session together with the configuration it was loaded for.
struct LoadedModel {
    config: ModelConfig,
    session: Box<dyn TranslationSession>,
}

// ---------------------------------------------------------------------------
// SlotStatus
// ---------------------------------------------------------------------------

/// Snapshot reported by [`ModelSlot::status`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlotStatus {
    pub loaded: bool,
    pub loading: bool,
    /// Key of the resident model, e.g. `"12b-Q4"`.
    pub current_model: Option<String>,
    /// Seconds since the resident model was last acquired.
    pub idle_seconds: Option<u64>,
    pub load_duration_ms: Option<u64>,
    pub default_model: String,
    pub eviction: String,
    /// Only reported while an accelerator-backed model is resident.
    pub accelerator: Option<AcceleratorMemory>,
}

#[derive(Debug, Clone, Default)]
struct StatusCell {
    loading: bool,
    current: Option<ModelConfig>,
    last_used: Option<Instant>,
    load_duration_ms: Option<u64>,
    accelerator: bool,
}

// ---------------------------------------------------------------------------
// ModelSlot
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Resident {
    model: Option<Arc<LoadedModel>>,
    timer: Option<JoinHandle<()>>,
}

struct SlotInner {
    engine: Arc<dyn InferenceEngine>,
    policy: Box<dyn EvictionPolicy>,
    default_model: ModelConfig,
    resident: tokio::sync::Mutex<Resident>,
    status: Mutex<StatusCell>,
    /// Signalled every time a lease is dropped.
    drained: Notify,
}

/// Process-wide holder of at most one loaded model.
///
/// Cheap to clone; all clones share the same slot.
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use std::time::Duration;
/// use lingoslot::engine::{ModelConfig, ModelSize, Quantization, OllamaEngine};
/// use lingoslot::config::EngineConfig;
/// use lingoslot::slot::{policy_for_timeout, ModelSlot};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let engine = Arc::new(OllamaEngine::from_config(&EngineConfig::default())?);
/// let default = ModelConfig::new(ModelSize::Medium, Quantization::Q4, "ollama");
/// let slot = ModelSlot::new(engine, policy_for_timeout(Duration::from_secs(300)), default.clone());
///
/// let lease = slot.acquire(&default).await?;
/// let out = lease.translate("你好", "en", None).await?;
/// slot.release_if_immediate(lease).await;
/// # let _ = out;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ModelSlot {
    inner: Arc<SlotInner>,
}

impl std::fmt::Debug for ModelSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelSlot")
            .field("policy", &self.inner.policy)
            .field("default_model", &self.inner.default_model.key())
            .finish_non_exhaustive()
    }
}

impl ModelSlot {
    pub fn new(
        engine: Arc<dyn InferenceEngine>,
        policy: Box<dyn EvictionPolicy>,
        default_model: ModelConfig,
    ) -> Self {
        log::info!(
            "slot: eviction policy {}, default model {default_model}",
            policy.describe()
        );
        Self {
            inner: Arc::new(SlotInner {
                engine,
                policy,
                default_model,
                resident: tokio::sync::Mutex::new(Resident::default()),
                status: Mutex::new(StatusCell::default()),
                drained: Notify::new(),
            }),
        }
    }

    /// Model used when a request does not name one.
    pub fn default_model(&self) -> &ModelConfig {
        &self.inner.default_model
    }

    pub fn policy(&self) -> &dyn EvictionPolicy {
        self.inner.policy.as_ref()
    }

    /// Return a lease on a model loaded for `config`, loading it if needed.
    ///
    /// A resident model of a different configuration is evicted first.  A
    /// failed load leaves the slot empty.
    pub async fn acquire(&self, config: &ModelConfig) -> Result<ModelLease, LoadError> {
        let inner = &self.inner;
        let mut resident = inner.resident.lock().await;
        if let Some(timer) = resident.timer.take() {
            timer.abort();
        }

        let hit = resident
            .model
            .as_ref()
            .filter(|m| m.config == *config)
            .map(Arc::clone);
        if let Some(model) = hit {
            log::debug!("slot: cache hit for {config}");
            inner.status().last_used = Some(Instant::now());
            self.arm_idle_timer(&mut resident);
            return Ok(ModelLease::new(model, Arc::clone(inner)));
        }

        if let Some(previous) = resident.model.take() {
            log::info!("slot: switching {} -> {config}", previous.config);
            inner.retire(previous, "model switch").await;
        }

        let session = {
            let _loading = LoadingFlag::raise(inner);
            let engine = Arc::clone(&inner.engine);
            let requested = config.clone();
            let started = Instant::now();
            log::info!("slot: loading {config}");

            let session = match tokio::task::spawn_blocking(move || engine.load(&requested)).await
            {
                Ok(Ok(session)) => session,
                Ok(Err(e)) => {
                    log::error!("slot: failed to load {config}: {e}");
                    return Err(e);
                }
                Err(e) => {
                    log::error!("slot: load task for {config} failed: {e}");
                    return Err(LoadError::Backend(format!("load task failed: {e}")));
                }
            };

            let load_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
            let mut status = inner.status();
            status.current = Some(config.clone());
            status.last_used = Some(Instant::now());
            status.load_duration_ms = Some(load_ms);
            status.accelerator = session.uses_accelerator();
            log::info!("slot: loaded {config} in {load_ms} ms");
            session
        };

        let model = Arc::new(LoadedModel {
            config: config.clone(),
            session,
        });
        resident.model = Some(Arc::clone(&model));
        self.arm_idle_timer(&mut resident);
        Ok(ModelLease::new(model, Arc::clone(inner)))
    }

    /// Request-completion hook: evict now if the policy says so.
    ///
    /// Consumes the request's lease.  Eviction is skipped while other
    /// requests still hold leases on the same model; the last of them to
    /// finish evicts it.
    pub async fn release_if_immediate(&self, lease: ModelLease) {
        if !self.inner.policy.evicts_after_request() {
            return;
        }
        let ours = Arc::downgrade(lease.model());
        drop(lease);

        let mut resident = self.inner.resident.lock().await;
        let evict = match resident.model.as_ref() {
            Some(model) if std::ptr::eq(Arc::as_ptr(model), ours.as_ptr()) => {
                let others = Arc::strong_count(model) - 1;
                if others > 0 {
                    log::debug!("slot: {others} request(s) still running, eviction deferred");
                }
                others == 0
            }
            _ => false,
        };
        if evict {
            if let Some(model) = resident.model.take() {
                self.inner.retire(model, "request complete").await;
            }
        }
    }

    /// Cancel the idle timer and evict the resident model, if any.
    ///
    /// Returns `true` when a model was evicted.
    pub async fn force_evict(&self) -> bool {
        let mut resident = self.inner.resident.lock().await;
        if let Some(timer) = resident.timer.take() {
            timer.abort();
        }
        match resident.model.take() {
            Some(model) => {
                self.inner.retire(model, "forced").await;
                true
            }
            None => false,
        }
    }

    /// Current slot state. Never waits on a load in progress.
    pub async fn status(&self) -> SlotStatus {
        let cell = self.inner.status().clone();

        let accelerator = if cell.current.is_some() && cell.accelerator {
            let engine = Arc::clone(&self.inner.engine);
            tokio::task::spawn_blocking(move || engine.accelerator_memory())
                .await
                .ok()
                .flatten()
        } else {
            None
        };

        SlotStatus {
            loaded: cell.current.is_some(),
            loading: cell.loading,
            current_model: cell.current.as_ref().map(ModelConfig::key),
            idle_seconds: cell
                .current
                .as_ref()
                .and(cell.last_used)
                .map(|t| t.elapsed().as_secs()),
            load_duration_ms: cell.current.as_ref().and(cell.load_duration_ms),
            default_model: self.inner.default_model.key(),
            eviction: self.inner.policy.describe(),
            accelerator,
        }
    }

    /// Cancel pending timers and release any resident model.
    pub async fn shutdown(&self) {
        if self.force_evict().await {
            log::info!("slot: resident model released on shutdown");
        }
        log::info!("slot: shut down");
    }

    fn arm_idle_timer(&self, resident: &mut Resident) {
        if let Some(timeout) = self.inner.policy.idle_timeout() {
            let slot = Arc::downgrade(&self.inner);
            resident.timer = Some(tokio::spawn(watch_idle(slot, timeout)));
        }
    }
}

impl SlotInner {
    fn status(&self) -> MutexGuard<'_, StatusCell> {
        self.status.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Release a model already detached from the slot.
    ///
    /// Called with the resident lock held, so no other model can be loaded
    /// until the release has finished.
    async fn retire(&self, model: Arc<LoadedModel>, reason: &'static str) {
        {
            let mut status = self.status();
            status.current = None;
            status.last_used = None;
            status.load_duration_ms = None;
            status.accelerator = false;
        }

        let loaded = self.wait_for_leases(model).await;
        let key = loaded.config.key();
        let accelerator = loaded.session.uses_accelerator();
        let engine = Arc::clone(&self.engine);

        let released = tokio::task::spawn_blocking(move || {
            loaded.session.release();
            if accelerator {
                engine.reclaim_accelerator_memory();
            }
        })
        .await;

        match released {
            Ok(()) => log::info!("slot: evicted {key} ({reason})"),
            Err(e) => log::error!("slot: release of {key} failed: {e}"),
        }
    }

    async fn wait_for_leases(&self, mut model: Arc<LoadedModel>) -> LoadedModel {
        loop {
            let notified = self.drained.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            match Arc::try_unwrap(model) {
                Ok(loaded) => return loaded,
                Err(shared) => {
                    log::info!(
                        "slot: waiting for {} in-flight request(s) on {}",
                        Arc::strong_count(&shared) - 1,
                        shared.config
                    );
                    model = shared;
                    notified.await;
                }
            }
        }
    }
}

/// Idle timer task, armed on every acquire and aborted by the next one.
async fn watch_idle(slot: Weak<SlotInner>, timeout: Duration) {
    let mut wait = timeout;
    loop {
        tokio::time::sleep(wait).await;
        let Some(inner) = slot.upgrade() else {
            return;
        };
        let mut resident = inner.resident.lock().await;

        let leased = match resident.model.as_ref() {
            Some(model) => Arc::strong_count(model) > 1,
            None => {
                resident.timer = None;
                return;
            }
        };

        let idle = inner
            .status()
            .last_used
            .map_or(timeout, |t| t.elapsed());
        if idle < timeout {
            wait = timeout - idle;
            continue;
        }
        if leased {
            log::debug!("slot: idle timer fired while a request is running, re-armed");
            wait = timeout;
            continue;
        }

        // Detach our own handle instead of aborting it.
        resident.timer = None;
        if let Some(model) = resident.model.take() {
            log::info!("slot: {} idle for {}s", model.config, idle.as_secs());
            inner.retire(model, "idle timeout").await;
        }
        return;
    }
}

/// Keeps `loading` raised for the duration of a load, even if the acquiring
/// future is dropped midway.
struct LoadingFlag<'a>(&'a SlotInner);

impl<'a> LoadingFlag<'a> {
    fn raise(inner: &'a SlotInner) -> Self {
        inner.status().loading = true;
        Self(inner)
    }
}

impl Drop for LoadingFlag<'_> {
    fn drop(&mut self) {
        self.0.status().loading = false;
    }
}

// ---------------------------------------------------------------------------
// ModelLease
// ---------------------------------------------------------------------------

/// An in-flight claim on the resident model.
///
/// While any lease is alive the model it points to is not released.
/// Dropping the lease ends the claim; hand it back through
/// [`ModelSlot::release_if_immediate`] when a request completes.
pub struct ModelLease {
    /// Taken out only in `Drop`.
    model: Option<Arc<LoadedModel>>,
    slot: Arc<SlotInner>,
}

impl ModelLease {
    fn new(model: Arc<LoadedModel>, slot: Arc<SlotInner>) -> Self {
        Self {
            model: Some(model),
            slot,
        }
    }

    fn model(&self) -> &Arc<LoadedModel> {
        match &self.model {
            Some(model) => model,
            None => unreachable!("lease model is only taken on drop"),
        }
    }

    /// Configuration of the leased model.
    pub fn config(&self) -> &ModelConfig {
        &self.model().config
    }

    /// Translate one chunk on the blocking pool.
    pub async fn translate(
        &self,
        text: &str,
        target_lang: &str,
        source_hint: Option<&str>,
    ) -> Result<Translation, InferenceError> {
        // The worker keeps its own lease so an abandoned request cannot
        // release the model under a running call.
        let worker = self.clone();
        let text = text.to_string();
        let target_lang = target_lang.to_string();
        let source_hint = source_hint.map(str::to_string);

        tokio::task::spawn_blocking(move || {
            worker
                .model()
                .session
                .translate(&text, &target_lang, source_hint.as_deref())
        })
        .await
        .map_err(|e| InferenceError::Engine(format!("inference task failed: {e}")))?
    }
}

impl Clone for ModelLease {
    fn clone(&self) -> Self {
        Self::new(Arc::clone(self.model()), Arc::clone(&self.slot))
    }
}

impl Drop for ModelLease {
    fn drop(&mut self) {
        drop(self.model.take());
        self.slot.drained.notify_waiters();
    }
}

impl std::fmt::Debug for ModelLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelLease")
            .field("model", &self.config().key())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
