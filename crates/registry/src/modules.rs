//! Tenant-aware module toggles guarded by the dependency table.
//!
//! Reads are cached lookups. Writes run check-then-write inside a critical
//! section covering every module key the check reads, so two concurrent
//! updates can never commit a combination the rules forbid.

use crate::catalog::{self, BUILTIN_MODULES};
use crate::locks::KeyLocks;
use crate::resolve::{audit, cached, invalidate_scope, resolve_all, resolve_record};
use crate::rules::{DependencyTable, ModuleState};
use chrono::Utc;
use confgate_cache::ResolutionCache;
use confgate_core::audit::{AuditEntry, AuditSink};
use confgate_core::dependency::{CountedEntity, DependencyViolation};
use confgate_core::error::{ConfigError, ConfigResult};
use confgate_core::store::{Repository, RowCounter};
use confgate_core::types::{ModuleRecord, TenantId, TenantScope};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct ModuleRegistry {
    repo: Arc<dyn Repository<ModuleRecord>>,
    rows: Arc<dyn RowCounter>,
    cache: Arc<dyn ResolutionCache<Option<ModuleRecord>>>,
    audit: Arc<dyn AuditSink>,
    rules: DependencyTable,
    locks: KeyLocks,
}

impl ModuleRegistry {
    pub fn new(
        repo: Arc<dyn Repository<ModuleRecord>>,
        rows: Arc<dyn RowCounter>,
        cache: Arc<dyn ResolutionCache<Option<ModuleRecord>>>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self::with_rules(repo, rows, cache, audit, DependencyTable::standard())
    }

    pub fn with_rules(
        repo: Arc<dyn Repository<ModuleRecord>>,
        rows: Arc<dyn RowCounter>,
        cache: Arc<dyn ResolutionCache<Option<ModuleRecord>>>,
        audit: Arc<dyn AuditSink>,
        rules: DependencyTable,
    ) -> Self {
        Self {
            repo,
            rows,
            cache,
            audit,
            rules,
            locks: KeyLocks::new(),
        }
    }

    /// Org record if present, else global, else `false`.
    pub fn is_module_enabled(&self, key: &str, tenant_id: Option<&TenantId>) -> ConfigResult<bool> {
        Ok(self.get_module(key, tenant_id)?.is_some_and(|m| m.enabled))
    }

    /// The resolved record, cached per `(key, tenant)`.
    pub fn get_module(
        &self,
        key: &str,
        tenant_id: Option<&TenantId>,
    ) -> ConfigResult<Option<ModuleRecord>> {
        cached(&*self.cache, key, tenant_id, || {
            Ok(resolve_record(&*self.repo, key, tenant_id)?)
        })
    }

    /// Move a module to `desired_enabled` at the given scope.
    ///
    /// A vetoed update returns `ConfigError::Dependency` without writing or
    /// touching the cache. Keys with neither a stored record nor a built-in
    /// definition return `ConfigError::NotFound`.
    pub fn update_module(
        &self,
        key: &str,
        desired_enabled: bool,
        tenant_id: Option<&TenantId>,
        updated_by: Option<&str>,
    ) -> ConfigResult<ModuleRecord> {
        let scope = TenantScope::from_tenant(tenant_id);
        let _held = self.locks.lock_all(&self.rules.lock_set(key));

        let template = match resolve_record(&*self.repo, key, tenant_id)? {
            Some(record) => record,
            None => self.from_catalog(key, &scope)?,
        };

        if let Some(violation) = self.find_violation(key, desired_enabled, tenant_id)? {
            warn!(
                key,
                scope = %scope,
                desired_enabled,
                rule = %violation.rule,
                blocked_tenant = ?violation.tenant_id.as_ref().map(TenantId::as_str),
                "Module update vetoed: {violation}"
            );
            return Err(ConfigError::Dependency(violation));
        }

        let previous = template.enabled;
        let record = self.repo.upsert(ModuleRecord {
            scope: scope.clone(),
            enabled: desired_enabled,
            updated_by: updated_by.map(str::to_string),
            updated_at: Utc::now(),
            ..template
        })?;
        invalidate_scope(&*self.cache, key, &scope);

        info!(
            key,
            scope = %scope,
            enabled = desired_enabled,
            actor = updated_by.unwrap_or("-"),
            "Module updated"
        );
        audit(
            &*self.audit,
            AuditEntry::new(
                updated_by,
                "module.update",
                "module",
                Some(key),
                &scope,
                serde_json::json!({ "previous": previous, "enabled": desired_enabled }),
            ),
        );
        Ok(record)
    }

    /// Every module visible to a tenant. Always reads through.
    pub fn get_all_modules(&self, tenant_id: Option<&TenantId>) -> ConfigResult<Vec<ModuleRecord>> {
        Ok(resolve_all(&*self.repo, tenant_id)?)
    }

    /// Create a global record for each built-in module that has none.
    /// Existing records are left untouched. Returns the keys created.
    pub fn seed_defaults(&self, actor: Option<&str>) -> ConfigResult<Vec<String>> {
        let mut created = Vec::new();
        for definition in BUILTIN_MODULES {
            let _held = self.locks.lock_all(&[definition.key.to_string()]);
            if self
                .repo
                .find_one(definition.key, &TenantScope::Global)?
                .is_some()
            {
                debug!(key = definition.key, "Module already seeded");
                continue;
            }
            self.repo.upsert(ModuleRecord {
                key: definition.key.to_string(),
                scope: TenantScope::Global,
                name: definition.name.to_string(),
                description: Some(definition.description.to_string()),
                enabled: definition.default_enabled,
                scope_class: definition.scope_class,
                updated_by: actor.map(str::to_string),
                updated_at: Utc::now(),
            })?;
            invalidate_scope(&*self.cache, definition.key, &TenantScope::Global);
            created.push(definition.key.to_string());
        }

        if !created.is_empty() {
            info!(count = created.len(), "Seeded default modules");
            audit(
                &*self.audit,
                AuditEntry::new(
                    actor,
                    "module.seed",
                    "module",
                    None,
                    &TenantScope::Global,
                    serde_json::json!({ "created": created }),
                ),
            );
        }
        Ok(created)
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// First rule the write would break. A global write is also checked
    /// against every tenant whose resolved state it changes while that
    /// tenant holds its own record for a related key.
    fn find_violation(
        &self,
        key: &str,
        desired_enabled: bool,
        tenant_id: Option<&TenantId>,
    ) -> ConfigResult<Option<DependencyViolation>> {
        let state = StoreState {
            repo: &*self.repo,
            rows: &*self.rows,
            tenant_id,
        };
        if let Some(violation) = self.rules.check(key, desired_enabled, &state)? {
            return Ok(Some(violation));
        }
        if tenant_id.is_some() {
            return Ok(None);
        }

        for tenant in self.inheriting_tenants(key)? {
            let state = StoreState {
                repo: &*self.repo,
                rows: &*self.rows,
                tenant_id: Some(&tenant),
            };
            if let Some(mut violation) = self.rules.check(key, desired_enabled, &state)? {
                violation.tenant_id = Some(tenant);
                return Ok(Some(violation));
            }
        }
        Ok(None)
    }

    /// Tenants with an org record for some key `key` is checked against but
    /// none for `key` itself. Tenants without such records resolve exactly
    /// like the global scope.
    fn inheriting_tenants(&self, key: &str) -> ConfigResult<BTreeSet<TenantId>> {
        let mut tenants = BTreeSet::new();
        for related in self.rules.lock_set(key) {
            if related == key {
                continue;
            }
            for record in self.repo.find_all(&related)? {
                if let TenantScope::Org(tenant) = record.scope {
                    tenants.insert(tenant);
                }
            }
        }
        if !tenants.is_empty() {
            for record in self.repo.find_all(key)? {
                if let TenantScope::Org(tenant) = record.scope {
                    tenants.remove(&tenant);
                }
            }
        }
        Ok(tenants)
    }

    fn from_catalog(&self, key: &str, scope: &TenantScope) -> ConfigResult<ModuleRecord> {
        let definition = catalog::definition(key).ok_or_else(|| ConfigError::NotFound {
            entity: "module",
            key: key.to_string(),
        })?;
        Ok(ModuleRecord {
            key: definition.key.to_string(),
            scope: scope.clone(),
            name: definition.name.to_string(),
            description: Some(definition.description.to_string()),
            enabled: false,
            scope_class: definition.scope_class,
            updated_by: None,
            updated_at: Utc::now(),
        })
    }
}

/// Rule-evaluation view over the store. Never consults the cache.
struct StoreState<'a> {
    repo: &'a dyn Repository<ModuleRecord>,
    rows: &'a dyn RowCounter,
    tenant_id: Option<&'a TenantId>,
}

impl ModuleState for StoreState<'_> {
    fn is_enabled(&self, module: &str) -> ConfigResult<bool> {
        Ok(resolve_record(self.repo, module, self.tenant_id)?.is_some_and(|m| m.enabled))
    }

    fn count(&self, entity: CountedEntity) -> ConfigResult<u64> {
        Ok(self.rows.count(entity)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use confgate_cache::LocalCache;
    use confgate_core::audit::CaptureAuditSink;
    use confgate_core::dependency::Rule;
    use confgate_core::AuditError;
    use confgate_store::{FixedRowCounter, MemoryRepository};
    use std::time::Duration;

    struct Fixture {
        registry: ModuleRegistry,
        repo: Arc<MemoryRepository<ModuleRecord>>,
        rows: Arc<FixedRowCounter>,
        audit: Arc<CaptureAuditSink>,
    }

    fn fixture() -> Fixture {
        let repo = Arc::new(MemoryRepository::new());
        let rows = Arc::new(FixedRowCounter::new());
        let audit = Arc::new(CaptureAuditSink::new());
        let registry = ModuleRegistry::new(
            repo.clone(),
            rows.clone(),
            Arc::new(LocalCache::new("modules", Duration::from_secs(60), 1_000)),
            audit.clone(),
        );
        registry.seed_defaults(Some("system")).unwrap();
        Fixture {
            registry,
            repo,
            rows,
            audit,
        }
    }

    #[test]
    fn test_seed_is_idempotent() {
        let f = fixture();
        assert_eq!(f.repo.len(), BUILTIN_MODULES.len());
        assert!(f.registry.seed_defaults(None).unwrap().is_empty());
        assert!(f.registry.is_module_enabled("dashboard", None).unwrap());
        assert!(!f.registry.is_module_enabled("billing", None).unwrap());
    }

    #[test]
    fn test_unknown_module_is_disabled_and_not_updatable() {
        let f = fixture();
        assert!(!f.registry.is_module_enabled("nope", None).unwrap());
        let err = f.registry.update_module("nope", true, None, None).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound { entity: "module", .. }));
    }

    #[test]
    fn test_admin_is_immutable() {
        let f = fixture();
        let err = f
            .registry
            .update_module("admin", false, None, Some("root"))
            .unwrap_err();
        assert_eq!(err.as_violation().unwrap().rule, Rule::CannotDisable);
        assert!(f.registry.is_module_enabled("admin", None).unwrap());
        assert_eq!(f.audit.count_action("module.update"), 0);
    }

    #[test]
    fn test_auth_veto_names_dashboard() {
        let f = fixture();
        let err = f.registry.update_module("auth", false, None, None).unwrap_err();
        let violation = err.as_violation().unwrap();
        assert_eq!(violation.blocking_module.as_deref(), Some("dashboard"));
        assert!(f.registry.is_module_enabled("auth", None).unwrap());
    }

    #[test]
    fn test_dashboard_predicate_uses_row_count() {
        let f = fixture();
        f.rows.set(CountedEntity::User, 3);
        assert!(f.registry.update_module("dashboard", false, None, None).is_err());

        f.rows.set(CountedEntity::User, 0);
        let record = f.registry.update_module("dashboard", false, None, None).unwrap();
        assert!(!record.enabled);
        assert!(!f.registry.is_module_enabled("dashboard", None).unwrap());

        // With the dashboard off, auth can go too.
        f.registry.update_module("auth", false, None, None).unwrap();
        assert!(!f.registry.is_module_enabled("auth", None).unwrap());
    }

    #[test]
    fn test_enable_blocked_while_guard_owner_disabled() {
        let f = fixture();
        f.registry.update_module("dashboard", false, None, None).unwrap();
        f.registry.update_module("auth", false, None, None).unwrap();

        let err = f.registry.update_module("dashboard", true, None, None).unwrap_err();
        assert_eq!(err.as_violation().unwrap().rule_owner, "auth");

        f.registry.update_module("auth", true, None, None).unwrap();
        f.registry.update_module("dashboard", true, None, None).unwrap();
    }

    #[test]
    fn test_org_update_copies_global_metadata() {
        let f = fixture();
        let acme = TenantId::new("acme");
        let record = f
            .registry
            .update_module("billing", true, Some(&acme), Some("owner"))
            .unwrap();
        assert_eq!(record.scope, TenantScope::Org(acme.clone()));
        assert_eq!(record.name, "Billing");

        assert!(f.registry.is_module_enabled("billing", Some(&acme)).unwrap());
        assert!(!f.registry.is_module_enabled("billing", Some(&TenantId::new("other"))).unwrap());
        assert!(!f.registry.is_module_enabled("billing", None).unwrap());
        assert_eq!(f.audit.count_action("module.update"), 1);
    }

    #[test]
    fn test_cached_read_reflects_write() {
        let f = fixture();
        assert!(!f.registry.is_module_enabled("notifications", None).unwrap());
        f.registry.update_module("notifications", true, None, None).unwrap();
        assert!(f.registry.is_module_enabled("notifications", None).unwrap());
    }

    #[test]
    fn test_global_write_reaches_tenants_that_fall_back() {
        let f = fixture();
        let acme = TenantId::new("acme");
        assert!(!f.registry.is_module_enabled("notifications", Some(&acme)).unwrap());
        f.registry.update_module("notifications", true, None, None).unwrap();
        assert!(f.registry.is_module_enabled("notifications", Some(&acme)).unwrap());
    }

    #[test]
    fn test_global_disable_vetoed_by_tenant_override() {
        let f = fixture();
        let acme = TenantId::new("acme");
        f.registry
            .update_module("dashboard", true, Some(&acme), None)
            .unwrap();
        f.registry.update_module("dashboard", false, None, None).unwrap();

        let err = f.registry.update_module("auth", false, None, None).unwrap_err();
        let violation = err.as_violation().unwrap();
        assert_eq!(violation.blocking_module.as_deref(), Some("dashboard"));
        assert_eq!(violation.tenant_id, Some(acme.clone()));
        assert!(err.to_string().contains("acme"));
        assert!(f.registry.is_module_enabled("auth", Some(&acme)).unwrap());
        assert!(f.registry.is_module_enabled("auth", None).unwrap());
    }

    #[test]
    fn test_global_enable_vetoed_by_tenant_guard() {
        let f = fixture();
        let acme = TenantId::new("acme");
        f.registry.update_module("dashboard", false, None, None).unwrap();
        f.registry
            .update_module("auth", false, Some(&acme), None)
            .unwrap();

        let err = f.registry.update_module("dashboard", true, None, None).unwrap_err();
        let violation = err.as_violation().unwrap();
        assert_eq!(violation.rule_owner, "auth");
        assert_eq!(violation.tenant_id, Some(acme.clone()));
        assert!(!f.registry.is_module_enabled("dashboard", Some(&acme)).unwrap());
        assert!(!f.registry.is_module_enabled("dashboard", None).unwrap());
    }

    #[test]
    fn test_global_write_skips_tenants_with_own_record() {
        let f = fixture();
        let acme = TenantId::new("acme");
        f.registry
            .update_module("dashboard", false, Some(&acme), None)
            .unwrap();
        f.registry
            .update_module("auth", false, Some(&acme), None)
            .unwrap();

        // acme keeps its own dashboard record, so the global toggle never
        // reaches it.
        f.registry.update_module("dashboard", false, None, None).unwrap();
        f.registry.update_module("dashboard", true, None, None).unwrap();
        assert!(!f.registry.is_module_enabled("dashboard", Some(&acme)).unwrap());
        assert!(f.registry.is_module_enabled("dashboard", None).unwrap());
    }

    #[test]
    fn test_global_write_succeeds_when_audit_sink_fails() {
        struct BrokenSink;
        impl AuditSink for BrokenSink {
            fn record(&self, _entry: AuditEntry) -> Result<(), AuditError> {
                Err(AuditError("sink offline".into()))
            }
        }

        let repo = Arc::new(MemoryRepository::<ModuleRecord>::new());
        let registry = ModuleRegistry::new(
            repo.clone(),
            Arc::new(FixedRowCounter::new()),
            Arc::new(LocalCache::new("modules", Duration::from_secs(60), 1_000)),
            Arc::new(BrokenSink),
        );
        assert_eq!(registry.seed_defaults(None).unwrap().len(), BUILTIN_MODULES.len());
        let record = registry.update_module("billing", true, None, None).unwrap();
        assert!(record.enabled);
        assert!(registry.is_module_enabled("billing", None).unwrap());
        assert!(repo.find_one("billing", &TenantScope::Global).unwrap().unwrap().enabled);
    }

    #[test]
    fn test_list_overlays_org_records() {
        let f = fixture();
        let acme = TenantId::new("acme");
        f.registry
            .update_module("billing", true, Some(&acme), None)
            .unwrap();
        let all = f.registry.get_all_modules(Some(&acme)).unwrap();
        assert_eq!(all.len(), BUILTIN_MODULES.len());
        let billing = all.iter().find(|m| m.key == "billing").unwrap();
        assert!(billing.enabled);
        assert!(!billing.scope.is_global());
    }

    #[test]
    fn test_store_failure_propagates() {
        let f = fixture();
        f.registry.clear_cache();
        f.repo.set_unavailable(true);
        assert!(matches!(
            f.registry.is_module_enabled("auth", None),
            Err(ConfigError::BackingStore(_))
        ));
        assert!(f.registry.update_module("billing", true, None, None).is_err());
    }
}
