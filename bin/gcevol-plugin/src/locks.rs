//! Per-volume request serialization
//!
//! Docker may issue concurrent requests for the same volume. The driver
//! itself holds no state, so overlapping mount and unmount calls are ordered
//! here, one async mutex per name. Distinct names never wait on each other.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::OwnedMutexGuard;

type Slot = Arc<tokio::sync::Mutex<()>>;

/// Map of volume name to its in-flight lock
#[derive(Debug, Clone, Default)]
pub struct NameLocks {
    slots: Arc<Mutex<HashMap<String, Slot>>>,
}

impl NameLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no other request holds `name`
    ///
    /// Dropping the returned future before it resolves leaves no entry behind.
    pub async fn lock(&self, name: &str) -> NameGuard {
        let slot = self.slots.lock().entry(name.to_string()).or_default().clone();
        let release = Release {
            locks: self.clone(),
            name: name.to_string(),
        };
        // a cancelled wait drops the pending acquire, then `release`
        let guard = slot.lock_owned().await;
        NameGuard {
            _guard: guard,
            _release: release,
        }
    }

    /// Number of names currently locked or waited on
    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Held for the duration of one request
///
/// Fields drop in order: the mutex is unlocked before the entry is reclaimed.
#[derive(Debug)]
pub struct NameGuard {
    _guard: OwnedMutexGuard<()>,
    _release: Release,
}

/// Removes the map entry once nobody holds or waits on it
#[derive(Debug)]
struct Release {
    locks: NameLocks,
    name: String,
}

impl Drop for Release {
    fn drop(&mut self) {
        // holders and waiters each own a clone of the slot
        let mut slots = self.locks.slots.lock();
        if slots
            .get(&self.name)
            .is_some_and(|slot| Arc::strong_count(slot) == 1)
        {
            slots.remove(&self.name);
        }
    }
}
