//! Boolean feature flags with the same org-over-global fallback as settings.

use crate::resolve::{audit, cached, invalidate_scope, resolve_all, resolve_record};
use chrono::Utc;
use confgate_cache::ResolutionCache;
use confgate_core::audit::{AuditEntry, AuditSink};
use confgate_core::error::ConfigResult;
use confgate_core::store::Repository;
use confgate_core::types::{FeatureFlagRecord, TenantId, TenantScope};
use std::sync::Arc;
use tracing::info;

/// Options for `FeatureFlagStore::set_flag`.
#[derive(Debug, Clone, Default)]
pub struct FlagOptions {
    pub tenant_id: Option<TenantId>,
    pub description: Option<String>,
    pub updated_by: Option<String>,
}

pub struct FeatureFlagStore {
    repo: Arc<dyn Repository<FeatureFlagRecord>>,
    cache: Arc<dyn ResolutionCache<bool>>,
    audit: Arc<dyn AuditSink>,
}

impl FeatureFlagStore {
    pub fn new(
        repo: Arc<dyn Repository<FeatureFlagRecord>>,
        cache: Arc<dyn ResolutionCache<bool>>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self { repo, cache, audit }
    }

    /// Whether the flag is on for the tenant. `false` when no record exists
    /// at either scope.
    pub fn is_enabled(&self, key: &str, tenant_id: Option<&TenantId>) -> ConfigResult<bool> {
        cached(&*self.cache, key, tenant_id, || {
            Ok(resolve_record(&*self.repo, key, tenant_id)?.is_some_and(|f| f.enabled))
        })
    }

    pub fn set_flag(
        &self,
        key: &str,
        enabled: bool,
        options: FlagOptions,
    ) -> ConfigResult<FeatureFlagRecord> {
        let scope = TenantScope::from_tenant(options.tenant_id.as_ref());
        let description = match options.description {
            Some(d) => Some(d),
            None => self
                .repo
                .find_one(key, &scope)?
                .and_then(|existing| existing.description),
        };

        let record = self.repo.upsert(FeatureFlagRecord {
            key: key.to_string(),
            scope: scope.clone(),
            enabled,
            description,
            updated_by: options.updated_by,
            updated_at: Utc::now(),
        })?;
        invalidate_scope(&*self.cache, key, &scope);

        info!(key, scope = %scope, enabled, "Feature flag updated");
        audit(
            &*self.audit,
            AuditEntry::new(
                record.updated_by.as_deref(),
                "feature_flag.update",
                "feature_flag",
                Some(key),
                &scope,
                serde_json::json!({ "enabled": enabled }),
            ),
        );
        Ok(record)
    }

    pub fn delete_flag(
        &self,
        key: &str,
        tenant_id: Option<&TenantId>,
        updated_by: Option<&str>,
    ) -> ConfigResult<bool> {
        let scope = TenantScope::from_tenant(tenant_id);
        let existed = self.repo.delete(key, &scope)?;
        invalidate_scope(&*self.cache, key, &scope);

        if existed {
            info!(key, scope = %scope, "Feature flag deleted");
            audit(
                &*self.audit,
                AuditEntry::new(
                    updated_by,
                    "feature_flag.delete",
                    "feature_flag",
                    Some(key),
                    &scope,
                    serde_json::Value::Null,
                ),
            );
        }
        Ok(existed)
    }

    /// Every flag visible to a tenant. Bypasses the cache.
    pub fn list(&self, tenant_id: Option<&TenantId>) -> ConfigResult<Vec<FeatureFlagRecord>> {
        Ok(resolve_all(&*self.repo, tenant_id)?)
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use confgate_cache::LocalCache;
    use confgate_core::audit::CaptureAuditSink;
    use confgate_store::MemoryRepository;
    use std::time::Duration;

    fn store() -> (FeatureFlagStore, Arc<CaptureAuditSink>) {
        let audit = Arc::new(CaptureAuditSink::new());
        let store = FeatureFlagStore::new(
            Arc::new(MemoryRepository::<FeatureFlagRecord>::new()),
            Arc::new(LocalCache::new("flags", Duration::from_secs(60), 1_000)),
            audit.clone(),
        );
        (store, audit)
    }

    #[test]
    fn test_missing_flag_is_disabled() {
        let (store, _) = store();
        assert!(!store.is_enabled("new_checkout", None).unwrap());
        assert!(!store
            .is_enabled("new_checkout", Some(&TenantId::new("acme")))
            .unwrap());
    }

    #[test]
    fn test_org_flag_overrides_global() {
        let (store, audit) = store();
        let acme = TenantId::new("acme");
        let other = TenantId::new("other");

        store
            .set_flag("new_checkout", true, FlagOptions::default())
            .unwrap();
        assert!(store.is_enabled("new_checkout", Some(&acme)).unwrap());

        store
            .set_flag(
                "new_checkout",
                false,
                FlagOptions {
                    tenant_id: Some(acme.clone()),
                    updated_by: Some("admin".into()),
                    ..FlagOptions::default()
                },
            )
            .unwrap();
        assert!(!store.is_enabled("new_checkout", Some(&acme)).unwrap());
        assert!(store.is_enabled("new_checkout", Some(&other)).unwrap());
        assert_eq!(audit.count_action("feature_flag.update"), 2);
    }

    #[test]
    fn test_write_invalidates_cached_negative() {
        let (store, _) = store();
        assert!(!store.is_enabled("beta", None).unwrap());
        store.set_flag("beta", true, FlagOptions::default()).unwrap();
        assert!(store.is_enabled("beta", None).unwrap());
    }

    #[test]
    fn test_delete_and_list() {
        let (store, _) = store();
        let acme = TenantId::new("acme");
        store.set_flag("a", true, FlagOptions::default()).unwrap();
        store.set_flag("b", false, FlagOptions::default()).unwrap();
        store
            .set_flag(
                "b",
                true,
                FlagOptions {
                    tenant_id: Some(acme.clone()),
                    ..FlagOptions::default()
                },
            )
            .unwrap();

        let listed = store.list(Some(&acme)).unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().all(|f| f.enabled));

        assert!(store.delete_flag("b", Some(&acme), None).unwrap());
        assert!(!store.is_enabled("b", Some(&acme)).unwrap());
    }
}
