//! Built-in module definitions used to seed a fresh store.

use confgate_core::types::ModuleScope;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleDefinition {
    pub key: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub scope_class: ModuleScope,
    pub default_enabled: bool,
}

const fn def(
    key: &'static str,
    name: &'static str,
    description: &'static str,
    scope_class: ModuleScope,
    default_enabled: bool,
) -> ModuleDefinition {
    ModuleDefinition {
        key,
        name,
        description,
        scope_class,
        default_enabled,
    }
}

pub const BUILTIN_MODULES: &[ModuleDefinition] = &[
    def("admin", "Administration", "Administrative console and controls", ModuleScope::Admin, true),
    def("auth", "Authentication", "Login, registration and sessions", ModuleScope::Public, true),
    def("dashboard", "Dashboard", "Signed-in user dashboard", ModuleScope::Auth, true),
    def("rest_api", "REST API", "Public REST API endpoints", ModuleScope::Public, true),
    def("api_docs", "API Docs", "Interactive API documentation", ModuleScope::Public, true),
    def("billing", "Billing", "Plans, invoices and payment methods", ModuleScope::Auth, false),
    def("organizations", "Organizations", "Multi-tenant organizations and members", ModuleScope::Auth, true),
    def("settings", "Settings", "Runtime configuration management", ModuleScope::Admin, true),
    def("feature_flags", "Feature Flags", "Boolean feature toggles", ModuleScope::Admin, true),
    def("audit_log", "Audit Log", "Record of administrative changes", ModuleScope::Admin, true),
    def("email", "Email", "Transactional email delivery", ModuleScope::Global, true),
    def("notifications", "Notifications", "In-app notifications", ModuleScope::Auth, false),
];

/// Look up a built-in definition by key.
pub fn definition(key: &str) -> Option<&'static ModuleDefinition> {
    BUILTIN_MODULES.iter().find(|d| d.key == key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_keys_are_unique() {
        let keys: HashSet<_> = BUILTIN_MODULES.iter().map(|d| d.key).collect();
        assert_eq!(keys.len(), BUILTIN_MODULES.len());
    }

    #[test]
    fn test_lookup() {
        assert_eq!(definition("admin").map(|d| d.scope_class), Some(ModuleScope::Admin));
        assert!(!definition("billing").unwrap().default_enabled);
        assert!(definition("unknown").is_none());
    }
}
