//! Resident-model lifecycle.
//!
//! # Architecture
//!
//! ```text
//!   request ──acquire(config)──▶ ┌──────────────── ModelSlot ───────────────┐
//!                                │ lock ─▶ hit?  ──yes──▶ refresh, re-arm   │
//!                                │          │no                            │
//!                                │          ▼                               │
//!                                │   evict current (drain leases, release)  │
//!                                │   spawn_blocking(engine.load)            │
//!                                └───────────────┬──────────────────────────┘
//!                                                ▼
//!                                           ModelLease ──translate()──▶ engine
//!                                                │
//!   request done ──release_if_immediate(lease)───┘
//!
//!   idle timer (DeferredIdleEviction) ───▶ evict when idle and unleased
//!   force_evict()                     ───▶ evict now
//! ```

pub mod cache;
pub mod policy;

pub use cache::{ModelLease, ModelSlot, SlotStatus};
pub use policy::{policy_for_timeout, DeferredIdleEviction, EvictAfterEachRequest, EvictionPolicy};
