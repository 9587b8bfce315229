//! Delay policy between successive vault calls.
//!
//! The vault's API rate-limits bursts of attachment and create calls, so
//! the pipelines pause between calls.  The pause is a function of the
//! call index; tests use `Throttle::none()`.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::deadline::Deadline;
use crate::errors::Result;

/// Default pause between vault calls, in milliseconds.
pub const DEFAULT_SLEEP_MILLISECONDS: u64 = 300;

type Policy = dyn Fn(usize) -> Duration + Send + Sync;

/// How long to wait before / after the n-th call.
#[derive(Clone)]
pub struct Throttle {
    policy: Arc<Policy>,
}

impl Throttle {
    /// Never wait.
    pub fn none() -> Self {
        Self::fixed(Duration::ZERO)
    }

    /// Wait the same `delay` every time.
    pub fn fixed(delay: Duration) -> Self {
        Self::from_fn(move |_| delay)
    }

    pub fn from_millis(millis: u64) -> Self {
        Self::fixed(Duration::from_millis(millis))
    }

    /// Arbitrary policy of the call index.
    pub fn from_fn<F>(policy: F) -> Self
    where
        F: Fn(usize) -> Duration + Send + Sync + 'static,
    {
        Self {
            policy: Arc::new(policy),
        }
    }

    pub fn delay(&self, call_index: usize) -> Duration {
        (self.policy)(call_index)
    }

    /// Sleep for the n-th delay, giving up early if `deadline` passes.
    pub fn pause(&self, call_index: usize, deadline: &Deadline) -> Result<()> {
        deadline.sleep(self.delay(call_index))
    }
}

impl Default for Throttle {
    fn default() -> Self {
        Self::from_millis(DEFAULT_SLEEP_MILLISECONDS)
    }
}

impl fmt::Debug for Throttle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Throttle")
            .field("first_delay", &self.delay(0))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_is_zero() {
        assert_eq!(Throttle::none().delay(7), Duration::ZERO);
    }

    #[test]
    fn default_matches_constant() {
        assert_eq!(Throttle::default().delay(0), Duration::from_millis(300));
    }

    #[test]
    fn policy_sees_call_index() {
        let t = Throttle::from_fn(|i| Duration::from_millis(i as u64 * 10));
        assert_eq!(t.delay(0), Duration::ZERO);
        assert_eq!(t.delay(3), Duration::from_millis(30));
    }

    #[test]
    fn pause_with_zero_delay_returns_immediately() {
        assert!(Throttle::none().pause(0, &Deadline::none()).is_ok());
    }
}
