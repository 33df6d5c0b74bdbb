//! In-memory repository backed by DashMap.

use confgate_core::error::{StoreError, StoreResult};
use confgate_core::store::Repository;
use confgate_core::types::{ConfigRecord, TenantScope};
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};

/// Process-local repository keyed by `(key, scope)`.
///
/// `set_unavailable(true)` makes every call fail with
/// `StoreError::Unavailable`, for exercising error paths.
pub struct MemoryRepository<R: ConfigRecord> {
    records: DashMap<(String, TenantScope), R>,
    unavailable: AtomicBool,
}

impl<R: ConfigRecord> Default for MemoryRepository<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: ConfigRecord> MemoryRepository<R> {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Build a repository pre-populated with `records`.
    pub fn with_records(records: impl IntoIterator<Item = R>) -> Self {
        let repo = Self::new();
        for record in records {
            repo.records
                .insert((record.key().to_string(), record.scope().clone()), record);
        }
        repo
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn check(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(format!(
                "{} repository offline",
                R::ENTITY
            )));
        }
        Ok(())
    }
}

impl<R: ConfigRecord> Repository<R> for MemoryRepository<R> {
    fn find_one(&self, key: &str, scope: &TenantScope) -> StoreResult<Option<R>> {
        self.check()?;
        Ok(self
            .records
            .get(&(key.to_string(), scope.clone()))
            .map(|r| r.value().clone()))
    }

    fn upsert(&self, record: R) -> StoreResult<R> {
        self.check()?;
        self.records.insert(
            (record.key().to_string(), record.scope().clone()),
            record.clone(),
        );
        Ok(record)
    }

    fn list(&self, scope: &TenantScope) -> StoreResult<Vec<R>> {
        self.check()?;
        let mut records: Vec<R> = self
            .records
            .iter()
            .filter(|e| e.key().1 == *scope)
            .map(|e| e.value().clone())
            .collect();
        records.sort_by(|a, b| a.key().cmp(b.key()));
        Ok(records)
    }

    fn find_all(&self, key: &str) -> StoreResult<Vec<R>> {
        self.check()?;
        let mut records: Vec<R> = self
            .records
            .iter()
            .filter(|e| e.key().0 == key)
            .map(|e| e.value().clone())
            .collect();
        records.sort_by(|a, b| a.scope().cmp(b.scope()));
        Ok(records)
    }

    fn delete(&self, key: &str, scope: &TenantScope) -> StoreResult<bool> {
        self.check()?;
        Ok(self
            .records
            .remove(&(key.to_string(), scope.clone()))
            .is_some())
    }
}
