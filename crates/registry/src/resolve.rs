//! Resolution shared by the three stores: org record, then global record,
//! through a short-lived cache that writers invalidate.

use confgate_cache::{ResolutionCache, ScopeKey};
use confgate_core::audit::{AuditEntry, AuditSink};
use confgate_core::error::{ConfigResult, StoreResult};
use confgate_core::store::Repository;
use confgate_core::types::{ConfigRecord, TenantId, TenantScope};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Read-through resolution: the tenant's own record if present, else the
/// global one. Never consults a cache.
pub(crate) fn resolve_record<R: ConfigRecord>(
    repo: &dyn Repository<R>,
    key: &str,
    tenant_id: Option<&TenantId>,
) -> StoreResult<Option<R>> {
    for scope in TenantScope::resolution_chain(tenant_id) {
        if let Some(record) = repo.find_one(key, &scope)? {
            return Ok(Some(record));
        }
    }
    Ok(None)
}

/// Every record visible to a tenant: global records overlaid by the
/// tenant's own, sorted by key.
pub(crate) fn resolve_all<R: ConfigRecord>(
    repo: &dyn Repository<R>,
    tenant_id: Option<&TenantId>,
) -> StoreResult<Vec<R>> {
    let mut merged: BTreeMap<String, R> = BTreeMap::new();
    for scope in TenantScope::resolution_chain(tenant_id).into_iter().rev() {
        for record in repo.list(&scope)? {
            merged.insert(record.key().to_string(), record);
        }
    }
    Ok(merged.into_values().collect())
}

/// Cached value for `(key, tenant)`, loading and caching it on a miss.
pub(crate) fn cached<V: Clone>(
    cache: &dyn ResolutionCache<V>,
    key: &str,
    tenant_id: Option<&TenantId>,
    load: impl FnOnce() -> ConfigResult<V>,
) -> ConfigResult<V> {
    let scope_key = ScopeKey::new(key, tenant_id);
    if let Some(value) = cache.get(&scope_key) {
        return Ok(value);
    }

    let generation = cache.generation();
    let value = load()?;
    if !cache.put_if_current(scope_key, value.clone(), generation) {
        debug!(key, "resolved value not cached, a write raced the read");
    }
    Ok(value)
}

/// Drop whatever a write at `scope` made stale. A global write is visible to
/// every tenant that falls back to it, so all tenants' entries for the key go.
pub(crate) fn invalidate_scope<V>(cache: &dyn ResolutionCache<V>, key: &str, scope: &TenantScope) {
    match scope {
        TenantScope::Global => cache.invalidate_prefix(key),
        TenantScope::Org(_) => cache.invalidate(&ScopeKey::for_scope(key, scope)),
    }
}

/// Fire-and-forget audit record; failures are logged and swallowed.
pub(crate) fn audit(sink: &dyn AuditSink, entry: AuditEntry) {
    let action = entry.action.clone();
    if let Err(err) = sink.record(entry) {
        warn!(action = %action, error = %err, "Audit record failed, continuing");
    }
}
