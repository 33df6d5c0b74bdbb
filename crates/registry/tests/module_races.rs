//! Concurrent module updates must never commit a state the dependency
//! rules forbid.

use confgate_cache::LocalCache;
use confgate_core::audit::NoOpAuditSink;
use confgate_core::store::Repository;
use confgate_core::types::{ModuleRecord, TenantId, TenantScope};
use confgate_registry::ModuleRegistry;
use confgate_store::{FixedRowCounter, MemoryRepository};
use std::sync::{Arc, Barrier};
use std::time::Duration;

fn registry() -> (ModuleRegistry, Arc<MemoryRepository<ModuleRecord>>) {
    let repo = Arc::new(MemoryRepository::new());
    let registry = ModuleRegistry::new(
        repo.clone(),
        Arc::new(FixedRowCounter::new()),
        Arc::new(LocalCache::new("modules", Duration::from_secs(60), 1_000)),
        Arc::new(NoOpAuditSink),
    );
    registry.seed_defaults(None).unwrap();
    (registry, repo)
}

fn persisted(repo: &MemoryRepository<ModuleRecord>, key: &str, scope: &TenantScope) -> bool {
    repo.find_one(key, scope)
        .unwrap()
        .or_else(|| repo.find_one(key, &TenantScope::Global).unwrap())
        .is_some_and(|m| m.enabled)
}

#[test]
fn test_disable_auth_enable_dashboard_race() {
    for _ in 0..200 {
        let (registry, repo) = registry();
        // Start from auth on, dashboard off.
        registry.update_module("dashboard", false, None, None).unwrap();

        let barrier = Barrier::new(2);
        std::thread::scope(|s| {
            s.spawn(|| {
                barrier.wait();
                let _ = registry.update_module("auth", false, None, None);
            });
            s.spawn(|| {
                barrier.wait();
                let _ = registry.update_module("dashboard", true, None, None);
            });
        });

        let auth = persisted(&repo, "auth", &TenantScope::Global);
        let dashboard = persisted(&repo, "dashboard", &TenantScope::Global);
        assert!(auth || !dashboard, "auth=false with dashboard=true was committed");
        assert_eq!(registry.is_module_enabled("auth", None).unwrap(), auth);
        assert_eq!(registry.is_module_enabled("dashboard", None).unwrap(), dashboard);
    }
}

#[test]
fn test_many_writers_keep_invariant_per_tenant() {
    let (registry, repo) = registry();
    let tenants: Vec<TenantId> = ["acme", "globex"].into_iter().map(TenantId::new).collect();

    std::thread::scope(|s| {
        for worker in 0..8 {
            let registry = &registry;
            let tenants = &tenants;
            s.spawn(move || {
                for i in 0..100 {
                    let tenant = &tenants[(worker + i) % tenants.len()];
                    let (key, enabled) = match (worker + i) % 4 {
                        0 => ("auth", false),
                        1 => ("auth", true),
                        2 => ("dashboard", false),
                        _ => ("dashboard", true),
                    };
                    let _ = registry.update_module(key, enabled, Some(tenant), None);
                }
            });
        }
    });

    for tenant in &tenants {
        let scope = TenantScope::Org(tenant.clone());
        let auth = persisted(&repo, "auth", &scope);
        let dashboard = persisted(&repo, "dashboard", &scope);
        assert!(auth || !dashboard, "{tenant}: auth=false with dashboard=true");
    }
}

#[test]
fn test_rest_api_and_api_docs_race() {
    for _ in 0..100 {
        let (registry, repo) = registry();
        registry.update_module("api_docs", false, None, None).unwrap();

        let barrier = Barrier::new(2);
        std::thread::scope(|s| {
            s.spawn(|| {
                barrier.wait();
                let _ = registry.update_module("rest_api", false, None, None);
            });
            s.spawn(|| {
                barrier.wait();
                let _ = registry.update_module("api_docs", true, None, None);
            });
        });

        let rest_api = persisted(&repo, "rest_api", &TenantScope::Global);
        let api_docs = persisted(&repo, "api_docs", &TenantScope::Global);
        assert!(rest_api || !api_docs);
    }
}

#[test]
fn test_global_writes_respect_tenant_overrides() {
    let (registry, repo) = registry();
    let acme = TenantId::new("acme");
    let acme_scope = TenantScope::Org(acme.clone());

    registry
        .update_module("dashboard", true, Some(&acme), None)
        .unwrap();
    registry.update_module("dashboard", false, None, None).unwrap();
    let err = registry.update_module("auth", false, None, None).unwrap_err();
    assert_eq!(err.as_violation().unwrap().tenant_id, Some(acme.clone()));
    assert!(persisted(&repo, "auth", &acme_scope));

    registry.update_module("api_docs", false, None, None).unwrap();
    registry
        .update_module("rest_api", false, Some(&acme), None)
        .unwrap();
    let err = registry.update_module("api_docs", true, None, None).unwrap_err();
    assert_eq!(err.as_violation().unwrap().rule_owner, "rest_api");
    assert!(!persisted(&repo, "api_docs", &acme_scope));
}

#[test]
fn test_mixed_global_and_org_writers_keep_invariant() {
    let tenants: Vec<TenantId> = ["acme", "globex", "initech"]
        .into_iter()
        .map(TenantId::new)
        .collect();

    for _ in 0..20 {
        let (registry, repo) = registry();
        std::thread::scope(|s| {
            for worker in 0..6 {
                let registry = &registry;
                let tenants = &tenants;
                s.spawn(move || {
                    for i in 0..60 {
                        // One write in four is global.
                        let tenant = match (worker + i) % 4 {
                            0 => None,
                            n => Some(&tenants[n - 1]),
                        };
                        let (key, enabled) = match (worker * 7 + i) % 4 {
                            0 => ("auth", false),
                            1 => ("auth", true),
                            2 => ("dashboard", false),
                            _ => ("dashboard", true),
                        };
                        let _ = registry.update_module(key, enabled, tenant, None);
                    }
                });
            }
        });

        let scopes = std::iter::once(TenantScope::Global)
            .chain(tenants.iter().cloned().map(TenantScope::Org));
        for scope in scopes {
            let auth = persisted(&repo, "auth", &scope);
            let dashboard = persisted(&repo, "dashboard", &scope);
            assert!(auth || !dashboard, "{scope}: auth=false with dashboard=true");
        }
    }
}
