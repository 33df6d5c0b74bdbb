//! Static route prefix to module key table.

use confgate_core::config::EnforcementConfig;

/// Maps request paths to the module that gates them.
#[derive(Debug, Clone)]
pub struct RouteTable {
    /// `(prefix, module key)`, normalized prefixes.
    routes: Vec<(String, String)>,
    api_prefix: String,
    api_module: String,
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl RouteTable {
    /// Empty table with the given API namespace fallback.
    pub fn new(api_prefix: &str, api_module: &str) -> Self {
        Self {
            routes: Vec::new(),
            api_prefix: normalize(api_prefix),
            api_module: api_module.to_string(),
        }
    }

    /// The built-in routes with `/api` falling back to `rest_api`.
    pub fn with_defaults() -> Self {
        Self::new("/api", "rest_api")
            .route("/admin", "admin")
            .route("/dashboard", "dashboard")
            .route("/login", "auth")
            .route("/register", "auth")
            .route("/auth", "auth")
            .route("/api/docs", "api_docs")
            .route("/billing", "billing")
            .route("/settings", "settings")
            .route("/organizations", "organizations")
    }

    /// Built-in routes plus the configured overrides and API namespace.
    pub fn from_config(config: &EnforcementConfig) -> Self {
        let mut table = Self::with_defaults();
        table.api_prefix = normalize(&config.api_prefix);
        table.api_module = config.api_module.clone();
        for (prefix, module) in &config.routes {
            table.insert(prefix, module);
        }
        table
    }

    pub fn route(mut self, prefix: &str, module: &str) -> Self {
        self.insert(prefix, module);
        self
    }

    /// Add or replace the module for `prefix`.
    pub fn insert(&mut self, prefix: &str, module: &str) {
        let prefix = normalize(prefix);
        match self.routes.iter_mut().find(|(p, _)| *p == prefix) {
            Some(entry) => entry.1 = module.to_string(),
            None => self.routes.push((prefix, module.to_string())),
        }
    }

    pub fn routes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.routes.iter().map(|(p, m)| (p.as_str(), m.as_str()))
    }

    /// Module required for `path`: the longest matching prefix, else the API
    /// module for paths under the API namespace, else `None`.
    pub fn resolve_required_module(&self, path: &str) -> Option<&str> {
        let path = normalize(path);
        self.routes
            .iter()
            .filter(|(prefix, _)| route_matches(&path, prefix))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, module)| module.as_str())
            .or_else(|| {
                route_matches(&path, &self.api_prefix).then_some(self.api_module.as_str())
            })
    }
}

/// Segment-aware prefix match: `/admin` matches `/admin` and `/admin/x`,
/// not `/administrator`.
fn route_matches(path: &str, prefix: &str) -> bool {
    if prefix == "/" {
        return true;
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// Drop query and fragment, ensure a leading slash, strip trailing slashes.
fn normalize(path: &str) -> String {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_routes() {
        let table = RouteTable::with_defaults();
        assert_eq!(table.resolve_required_module("/admin"), Some("admin"));
        assert_eq!(table.resolve_required_module("/admin/users/42"), Some("admin"));
        assert_eq!(table.resolve_required_module("/login"), Some("auth"));
        assert_eq!(table.resolve_required_module("/register?next=/x"), Some("auth"));
        assert_eq!(table.resolve_required_module("/billing/"), Some("billing"));
    }

    #[test]
    fn test_unmapped_route_is_ungated() {
        let table = RouteTable::with_defaults();
        assert_eq!(table.resolve_required_module("/"), None);
        assert_eq!(table.resolve_required_module("/about"), None);
        assert_eq!(table.resolve_required_module("/administrator"), None);
    }

    #[test]
    fn test_longest_prefix_wins() {
        let table = RouteTable::with_defaults();
        assert_eq!(table.resolve_required_module("/api/docs"), Some("api_docs"));
        assert_eq!(table.resolve_required_module("/api/docs/openapi.json"), Some("api_docs"));
        assert_eq!(table.resolve_required_module("/api/v1/users"), Some("rest_api"));
        assert_eq!(table.resolve_required_module("/api"), Some("rest_api"));
        assert_eq!(table.resolve_required_module("/apis"), None);
    }

    #[test]
    fn test_config_overrides() {
        let mut config = EnforcementConfig::default();
        config.api_prefix = "/v2/api/".into();
        config.api_module = "public_api".into();
        config.routes.insert("/reports".into(), "audit_log".into());
        config.routes.insert("/billing".into(), "payments".into());

        let table = RouteTable::from_config(&config);
        assert_eq!(table.resolve_required_module("/reports/daily"), Some("audit_log"));
        assert_eq!(table.resolve_required_module("/billing"), Some("payments"));
        assert_eq!(table.resolve_required_module("/v2/api/things"), Some("public_api"));
        assert_eq!(table.resolve_required_module("/api/v1/users"), None);
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("admin/"), "/admin");
        assert_eq!(normalize(""), "/");
        assert_eq!(normalize("/a/b#frag"), "/a/b");
    }
}
