//! Per-session single-flight serialization
//!
//! Only one turn per session id may be in flight. The lock table is the
//! sole serialization mechanism: turns on different sessions never block
//! each other.

use crate::config::BusyPolicy;
use crate::error::{Error, Result};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

/// Guard held for the duration of one turn
pub type SessionPermit = OwnedMutexGuard<()>;

/// Lock table keyed by session id
#[derive(Default)]
pub struct SessionLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl SessionLocks {
    /// Create an empty lock table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the single-flight permit for a session
    ///
    /// `FailFast` returns `SessionBusy` when a turn is already running;
    /// `Queue` waits, and tokio mutexes wake waiters in arrival order.
    ///
    /// # Errors
    /// Returns `SessionBusy` under `FailFast` contention.
    pub async fn acquire(&self, session_id: &str, policy: BusyPolicy) -> Result<SessionPermit> {
        let lock = self
            .locks
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        match policy {
            BusyPolicy::FailFast => lock.try_lock_owned().map_err(|_| {
                debug!(session_id = %session_id, "Concurrent turn rejected");
                Error::SessionBusy(session_id.to_string())
            }),
            BusyPolicy::Queue => Ok(lock.lock_owned().await),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fail_fast_rejects_second_acquire() {
        let locks = SessionLocks::new();

        let permit = locks.acquire("s1", BusyPolicy::FailFast).await.unwrap();
        let second = locks.acquire("s1", BusyPolicy::FailFast).await;
        assert!(matches!(second, Err(Error::SessionBusy(_))));

        drop(permit);
        assert!(locks.acquire("s1", BusyPolicy::FailFast).await.is_ok());
    }

    #[tokio::test]
    async fn test_different_sessions_do_not_block() {
        let locks = SessionLocks::new();

        let _a = locks.acquire("s1", BusyPolicy::FailFast).await.unwrap();
        let b = locks.acquire("s2", BusyPolicy::FailFast).await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn test_queue_waits_for_running_turn() {
        let locks = Arc::new(SessionLocks::new());

        let permit = locks.acquire("s1", BusyPolicy::Queue).await.unwrap();

        let locks_clone = locks.clone();
        let waiter = tokio::spawn(async move {
            locks_clone.acquire("s1", BusyPolicy::Queue).await.unwrap();
        });

        // The waiter cannot finish while the permit is held
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(permit);
        waiter.await.unwrap();
    }
}
