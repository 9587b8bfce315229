//! Overall deadline for one export or restore run.
//!
//! Everything in a run is synchronous, so cancellation is expressed as a
//! point in time: pipelines check it between external calls, and the `bw`
//! process runner kills an in-flight child once it has passed.

use std::time::{Duration, Instant};

use crate::errors::{PortwardenError, Result};

/// An optional instant after which the run must stop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Deadline(Option<Instant>);

impl Deadline {
    /// No deadline: the run may take as long as it needs.
    pub fn none() -> Self {
        Self(None)
    }

    /// A deadline `timeout` from now.  A timeout too large to represent
    /// means no deadline.
    pub fn after(timeout: Duration) -> Self {
        Self(Instant::now().checked_add(timeout))
    }

    /// A deadline from a timeout in seconds, where `0` means none.
    pub fn from_seconds(seconds: u64) -> Self {
        if seconds == 0 {
            Self::none()
        } else {
            Self::after(Duration::from_secs(seconds))
        }
    }

    pub fn is_expired(&self) -> bool {
        self.0.is_some_and(|at| Instant::now() >= at)
    }

    /// Time left before the deadline, `None` when there is no deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.0.map(|at| at.saturating_duration_since(Instant::now()))
    }

    /// Fail with `Cancelled` once the deadline has passed.
    pub fn check(&self) -> Result<()> {
        if self.is_expired() {
            Err(PortwardenError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Sleep for `duration`, waking early and failing if the deadline
    /// passes first.
    pub fn sleep(&self, duration: Duration) -> Result<()> {
        if duration.is_zero() {
            return self.check();
        }
        match self.remaining() {
            Some(left) if left < duration => {
                std::thread::sleep(left);
                Err(PortwardenError::Cancelled)
            }
            _ => {
                std::thread::sleep(duration);
                self.check()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_never_expires() {
        let d = Deadline::none();
        assert!(!d.is_expired());
        assert!(d.remaining().is_none());
        assert!(d.check().is_ok());
    }

    #[test]
    fn zero_seconds_means_no_deadline() {
        assert_eq!(Deadline::from_seconds(0), Deadline::none());
    }

    #[test]
    fn huge_timeout_means_no_deadline() {
        assert_eq!(Deadline::from_seconds(u64::MAX), Deadline::none());
        assert_eq!(Deadline::after(Duration::MAX), Deadline::none());
    }

    #[test]
    fn elapsed_deadline_cancels() {
        let d = Deadline::after(Duration::ZERO);
        assert!(d.is_expired());
        assert!(matches!(d.check(), Err(PortwardenError::Cancelled)));
    }

    #[test]
    fn sleep_past_deadline_cancels() {
        let d = Deadline::after(Duration::from_millis(5));
        let result = d.sleep(Duration::from_secs(5));
        assert!(matches!(result, Err(PortwardenError::Cancelled)));
    }
}
