//! Eviction policies for the [`ModelSlot`](super::ModelSlot).
//!
//! The policy is chosen once, when the slot is built, from the configured
//! idle timeout.  The slot consults it at two points only: after every
//! successful acquire (arm the idle timer?) and when a request finishes
//! (evict now?).

use std::fmt;
use std::time::Duration;

/// Decides when the resident model is released.
pub trait EvictionPolicy: Send + Sync + fmt::Debug {
    /// Inactivity period after which the idle timer evicts, if this policy
    /// uses one.
    fn idle_timeout(&self) -> Option<Duration>;

    /// `true` when the request-completion hook should evict the model.
    fn evicts_after_request(&self) -> bool;

    /// Short label for status and config payloads.
    fn describe(&self) -> String;
}

/// Keep the model warm and evict it after `timeout` without an acquire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeferredIdleEviction {
    pub timeout: Duration,
}

impl EvictionPolicy for DeferredIdleEviction {
    fn idle_timeout(&self) -> Option<Duration> {
        Some(self.timeout)
    }

    fn evicts_after_request(&self) -> bool {
        false
    }

    fn describe(&self) -> String {
        format!("idle ({}s)", self.timeout.as_secs())
    }
}

/// Release the model as soon as each request (all of its chunks) is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EvictAfterEachRequest;

impl EvictionPolicy for EvictAfterEachRequest {
    fn idle_timeout(&self) -> Option<Duration> {
        None
    }

    fn evicts_after_request(&self) -> bool {
        true
    }

    fn describe(&self) -> String {
        "immediate".into()
    }
}

/// Select the policy for an idle timeout; zero means immediate eviction.
pub fn policy_for_timeout(timeout: Duration) -> Box<dyn EvictionPolicy> {
    if timeout.is_zero() {
        Box::new(EvictAfterEachRequest)
    } else {
        Box::new(DeferredIdleEviction { timeout })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_timeout_selects_immediate() {
        let policy = policy_for_timeout(Duration::ZERO);
        assert!(policy.evicts_after_request());
        assert_eq!(policy.idle_timeout(), None);
        assert_eq!(policy.describe(), "immediate");
    }

    #[test]
    fn positive_timeout_selects_deferred() {
        let policy = policy_for_timeout(Duration::from_secs(300));
        assert!(!policy.evicts_after_request());
        assert_eq!(policy.idle_timeout(), Some(Duration::from_secs(300)));
        assert_eq!(policy.describe(), "idle (300s)");
    }
}
