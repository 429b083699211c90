//! Per-identity mutual exclusion.
//!
//! Scans and enrollments for one person id run one at a time; different
//! ids never wait on each other. Idle entries are dropped with the last guard.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type Slot = Arc<AsyncMutex<()>>;

#[derive(Default)]
pub struct IdentityLocks {
    slots: Mutex<HashMap<String, Slot>>,
}

/// Held while a person's read-decide-write sequence runs.
pub struct IdentityGuard<'a> {
    locks: &'a IdentityLocks,
    person_id: String,
    slot: Slot,
    held: Option<OwnedMutexGuard<()>>,
}

impl IdentityLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `person_id`.
    pub async fn lock(&self, person_id: &str) -> IdentityGuard<'_> {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            slots.entry(person_id.to_string()).or_default().clone()
        };
        let held = slot.clone().lock_owned().await;
        IdentityGuard {
            locks: self,
            person_id: person_id.to_string(),
            slot,
            held: Some(held),
        }
    }

    /// Number of ids with a live lock entry.
    #[cfg(test)]
    pub fn active(&self) -> usize {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl Drop for IdentityGuard<'_> {
    fn drop(&mut self) {
        self.held.take();
        let mut slots = self.locks.slots.lock().unwrap_or_else(PoisonError::into_inner);
        // Map entry plus ours: nobody else is holding or waiting.
        if Arc::strong_count(&self.slot) == 2 {
            slots.remove(&self.person_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_entry_removed_after_release() {
        let locks = IdentityLocks::new();
        {
            let _guard = locks.lock("E100").await;
            assert_eq!(locks.active(), 1);
        }
        assert_eq!(locks.active(), 0);
    }

    #[tokio::test]
    async fn test_different_ids_do_not_block() {
        let locks = IdentityLocks::new();
        let _a = locks.lock("E100").await;
        let b = tokio::time::timeout(Duration::from_millis(200), locks.lock("E200")).await;
        assert!(b.is_ok());
        assert_eq!(locks.active(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_same_id_is_serialized() {
        let locks = Arc::new(IdentityLocks::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let locks = locks.clone();
            let inside = inside.clone();
            let peak = peak.clone();
            tasks.push(tokio::spawn(async move {
                let _guard = locks.lock("E100").await;
                let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                inside.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(peak.load(Ordering::SeqCst), 1);
        assert_eq!(locks.active(), 0);
    }
}
