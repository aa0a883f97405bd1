//! Per-task serialization
//!
//! Rounds for the same task never overlap: a Round 1 reset and a Round 2
//! revision of one repository run one after the other, in the order their
//! workers reached the lock. Different tasks never wait on each other.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::OwnedMutexGuard;

/// Registry of one async mutex per task name
#[derive(Default)]
pub struct TaskLocks {
    locks: Mutex<HashMap<String, Weak<tokio::sync::Mutex<()>>>>,
}

impl TaskLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no other run holds `task`
    pub async fn acquire(&self, task: &str) -> OwnedMutexGuard<()> {
        let lock = self.lock_for(task);
        lock.lock_owned().await
    }

    fn lock_for(&self, task: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());

        // entries whose last guard has dropped
        locks.retain(|_, weak| weak.strong_count() > 0);

        if let Some(existing) = locks.get(task).and_then(Weak::upgrade) {
            return existing;
        }

        let lock = Arc::new(tokio::sync::Mutex::new(()));
        locks.insert(task.to_string(), Arc::downgrade(&lock));
        lock
    }

    /// Number of tasks currently running or waiting
    pub fn active(&self) -> usize {
        let locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.values().filter(|weak| weak.strong_count() > 0).count()
    }
}
