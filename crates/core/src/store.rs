//! Persistence collaborator contracts.
//!
//! The services never talk to a database directly: each entity is read and
//! written through a `Repository<R>`, and the dependency rules count rows
//! through a `RowCounter`. Implementations must return promptly with an
//! error rather than hang.

use crate::dependency::CountedEntity;
use crate::error::StoreResult;
use crate::types::{ConfigRecord, TenantScope};

/// Per-entity storage keyed by `(key, scope)`. At most one record exists for
/// each pair; `upsert` replaces it.
pub trait Repository<R: ConfigRecord>: Send + Sync {
    /// Load the record stored at exactly this scope (no fallback).
    fn find_one(&self, key: &str, scope: &TenantScope) -> StoreResult<Option<R>>;

    /// Insert or replace the record at `(record.key(), record.scope())`.
    fn upsert(&self, record: R) -> StoreResult<R>;

    /// All records stored at exactly this scope.
    fn list(&self, scope: &TenantScope) -> StoreResult<Vec<R>>;

    /// Every record stored under `key`, across all scopes, global first.
    fn find_all(&self, key: &str) -> StoreResult<Vec<R>>;

    /// Remove the record at exactly this scope. Returns whether one existed.
    fn delete(&self, key: &str, scope: &TenantScope) -> StoreResult<bool>;
}

/// Row counts consulted by predicate rules.
pub trait RowCounter: Send + Sync {
    fn count(&self, entity: CountedEntity) -> StoreResult<u64>;
}
