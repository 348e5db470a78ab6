//! Concurrency gate bounding simultaneous upstream calls.
//!
//! A counting semaphore with a fixed ceiling. Slots are taken before an
//! upstream call and released when the returned [`GatePermit`] drops, which
//! covers success, error, panic unwind and cancellation of the caller's
//! future alike. No slot can leak.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::telemetry;
use crate::{ProxyError, Result};

/// Default ceiling on concurrent upstream calls.
pub const DEFAULT_MAX_CONCURRENT: usize = 8;

/// Counting gate over in-flight upstream calls.
#[derive(Debug, Clone)]
pub struct ConcurrencyGate {
    semaphore: Arc<Semaphore>,
    limit: usize,
}

impl ConcurrencyGate {
    /// Create a gate allowing at most `limit` concurrent holders.
    ///
    /// A zero limit would park every cache miss forever and is rejected.
    pub fn new(limit: usize) -> Result<Self> {
        if limit == 0 {
            return Err(ProxyError::Configuration(
                "max concurrent upstream calls must be at least 1".to_string(),
            ));
        }
        if limit > Semaphore::MAX_PERMITS {
            return Err(ProxyError::Configuration(format!(
                "max concurrent upstream calls must be at most {}",
                Semaphore::MAX_PERMITS
            )));
        }
        Ok(Self {
            semaphore: Arc::new(Semaphore::new(limit)),
            limit,
        })
    }

    /// Wait (without spinning) for a free slot.
    pub async fn acquire(&self) -> GatePermit {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("gate semaphore is never closed");
        metrics::gauge!(telemetry::IN_FLIGHT).increment(1.0);
        GatePermit { _permit: permit }
    }

    /// Configured ceiling.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Slots currently free.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Slots currently held.
    pub fn in_flight(&self) -> usize {
        self.limit - self.available()
    }
}

/// A held gate slot. Released on drop.
#[must_use = "the slot is released as soon as the permit is dropped"]
pub struct GatePermit {
    _permit: OwnedSemaphorePermit,
}

impl Drop for GatePermit {
    fn drop(&mut self) {
        metrics::gauge!(telemetry::IN_FLIGHT).decrement(1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn zero_limit_rejected() {
        assert!(matches!(
            ConcurrencyGate::new(0),
            Err(ProxyError::Configuration(_))
        ));
    }

    #[test]
    fn oversized_limit_rejected() {
        assert!(matches!(
            ConcurrencyGate::new(usize::MAX),
            Err(ProxyError::Configuration(_))
        ));
        assert!(ConcurrencyGate::new(Semaphore::MAX_PERMITS).is_ok());
    }

    #[tokio::test]
    async fn permit_drop_releases_slot() {
        let gate = ConcurrencyGate::new(2).unwrap();
        let p1 = gate.acquire().await;
        let _p2 = gate.acquire().await;
        assert_eq!(gate.in_flight(), 2);
        assert_eq!(gate.available(), 0);
        drop(p1);
        assert_eq!(gate.in_flight(), 1);
    }

    #[tokio::test]
    async fn acquire_waits_for_free_slot() {
        let gate = ConcurrencyGate::new(1).unwrap();
        let held = gate.acquire().await;

        let blocked = tokio::time::timeout(Duration::from_millis(20), gate.acquire()).await;
        assert!(blocked.is_err(), "second acquire should wait");

        drop(held);
        let _next = tokio::time::timeout(Duration::from_millis(200), gate.acquire())
            .await
            .expect("slot should be free after release");
    }

    #[tokio::test]
    async fn cancelled_waiter_does_not_leak() {
        let gate = ConcurrencyGate::new(1).unwrap();
        let held = gate.acquire().await;

        let waiter = {
            let gate = gate.clone();
            tokio::spawn(async move {
                let _permit = gate.acquire().await;
                tokio::time::sleep(Duration::from_secs(60)).await;
            })
        };
        tokio::task::yield_now().await;
        waiter.abort();
        let _ = waiter.await;

        drop(held);
        assert_eq!(gate.available(), 1);
    }
}
