//! Key-scoped write serialization for module updates.

use dashmap::DashMap;
use parking_lot::{Mutex, RawMutex};
use parking_lot::lock_api::ArcMutexGuard;
use std::sync::Arc;

/// Guards held for the duration of one check-then-write section.
pub struct HeldLocks {
    _guards: Vec<ArcMutexGuard<RawMutex, ()>>,
}

/// One mutex per module key, created on first use.
#[derive(Default)]
pub struct KeyLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl KeyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock every key in `keys`. Keys are locked in sorted order so two
    /// writers with overlapping sets cannot deadlock.
    pub fn lock_all(&self, keys: &[String]) -> HeldLocks {
        let mut sorted: Vec<&String> = keys.iter().collect();
        sorted.sort();
        sorted.dedup();

        let guards = sorted
            .into_iter()
            .map(|key| {
                let lock = self.locks.entry(key.clone()).or_default().clone();
                Mutex::lock_arc(&lock)
            })
            .collect();
        HeldLocks { _guards: guards }
    }
}
