//! Route access checks against tenant module state.

use crate::routes::RouteTable;
use confgate_core::error::ConfigResult;
use confgate_core::types::{ModuleScope, TenantId};
use confgate_registry::ModuleRegistry;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// Key of the administrative module. Routes it gates are never denied.
pub const ADMIN_MODULE: &str = "admin";

/// Result of an access check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum AccessDecision {
    Allow,
    Deny(Denial),
}

impl AccessDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// Why a route was refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Denial {
    pub route: String,
    pub module: String,
    /// Audience of the disabled module, when a record exists.
    pub scope_class: Option<ModuleScope>,
}

/// How a caller would usually render a denial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialStyle {
    /// Pretend the route does not exist (404).
    NotFound,
    /// Refuse an authenticated caller (403).
    Forbidden,
}

impl Denial {
    pub fn reason(&self) -> String {
        format!("module `{}` is disabled", self.module)
    }

    /// Public-facing modules hide behind a 404; authenticated areas answer 403.
    pub fn style(&self) -> DenialStyle {
        match self.scope_class {
            Some(ModuleScope::Auth) | Some(ModuleScope::Admin) => DenialStyle::Forbidden,
            _ => DenialStyle::NotFound,
        }
    }
}

pub struct AccessEnforcer {
    routes: RouteTable,
    modules: Arc<ModuleRegistry>,
}

impl AccessEnforcer {
    pub fn new(routes: RouteTable, modules: Arc<ModuleRegistry>) -> Self {
        Self { routes, modules }
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub fn resolve_required_module(&self, route: &str) -> Option<&str> {
        self.routes.resolve_required_module(route)
    }

    /// Allow when the route is ungated, gates the admin module, the caller is
    /// an administrator, or the gating module is enabled for the tenant.
    pub fn check_access(
        &self,
        route: &str,
        tenant_id: Option<&TenantId>,
        caller_is_admin: bool,
    ) -> ConfigResult<AccessDecision> {
        let Some(module) = self.routes.resolve_required_module(route) else {
            return Ok(AccessDecision::Allow);
        };
        if module == ADMIN_MODULE || caller_is_admin {
            debug!(route, module, caller_is_admin, "Access allowed by admin bypass");
            return Ok(AccessDecision::Allow);
        }

        let record = self.modules.get_module(module, tenant_id)?;
        if record.as_ref().is_some_and(|m| m.enabled) {
            return Ok(AccessDecision::Allow);
        }

        debug!(route, module, tenant = ?tenant_id.map(TenantId::as_str), "Access denied, module disabled");
        Ok(AccessDecision::Deny(Denial {
            route: route.to_string(),
            module: module.to_string(),
            scope_class: record.map(|m| m.scope_class),
        }))
    }
}
