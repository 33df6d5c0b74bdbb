use confgate_core::types::{TenantId, TenantScope};
use std::fmt;

/// Composite cache key: the config key plus the tenant it was resolved for
/// (`None` is the global sentinel).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScopeKey {
    pub key: String,
    pub tenant: Option<TenantId>,
}

impl ScopeKey {
    pub fn new(key: impl Into<String>, tenant: Option<&TenantId>) -> Self {
        Self {
            key: key.into(),
            tenant: tenant.cloned(),
        }
    }

    pub fn global(key: impl Into<String>) -> Self {
        Self::new(key, None)
    }

    /// Key of the cache entry a write at `scope` makes stale.
    pub fn for_scope(key: impl Into<String>, scope: &TenantScope) -> Self {
        Self::new(key, scope.tenant_id())
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.tenant {
            Some(t) => write!(f, "{}@{t}", self.key),
            None => write!(f, "{}@*", self.key),
        }
    }
}
