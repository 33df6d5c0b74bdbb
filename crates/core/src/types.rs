//! Record shapes shared by the settings, feature-flag and module stores.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of an organization (tenant).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TenantId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TenantId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Scope a configuration record is stored under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "tenant_id")]
pub enum TenantScope {
    Global,
    Org(TenantId),
}

impl TenantScope {
    /// `None` means the global scope.
    pub fn from_tenant(tenant_id: Option<&TenantId>) -> Self {
        match tenant_id {
            Some(id) => Self::Org(id.clone()),
            None => Self::Global,
        }
    }

    pub fn tenant_id(&self) -> Option<&TenantId> {
        match self {
            Self::Global => None,
            Self::Org(id) => Some(id),
        }
    }

    pub fn is_global(&self) -> bool {
        matches!(self, Self::Global)
    }

    /// Resolution order for a caller: org record first (if any), then global.
    pub fn resolution_chain(tenant_id: Option<&TenantId>) -> Vec<TenantScope> {
        match tenant_id {
            Some(id) => vec![Self::Org(id.clone()), Self::Global],
            None => vec![Self::Global],
        }
    }
}

impl fmt::Display for TenantScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global => f.write_str("global"),
            Self::Org(id) => write!(f, "org:{id}"),
        }
    }
}

/// Common accessors every persisted configuration record exposes.
pub trait ConfigRecord: Clone + Send + Sync + 'static {
    /// Entity name used in errors, audit entries and file names.
    const ENTITY: &'static str;

    fn key(&self) -> &str;
    fn scope(&self) -> &TenantScope;
}

// ---------------------------------------------------------------------------
// Modules
// ---------------------------------------------------------------------------

/// Declarative audience of a module. Informational only; the resolver never
/// enforces it, callers use it to pick a response shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleScope {
    Global,
    Public,
    Auth,
    Admin,
}

impl ModuleScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::Public => "public",
            Self::Auth => "auth",
            Self::Admin => "admin",
        }
    }
}

/// A named feature area that can be toggled per tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleRecord {
    pub key: String,
    pub scope: TenantScope,
    pub name: String,
    pub description: Option<String>,
    pub enabled: bool,
    pub scope_class: ModuleScope,
    pub updated_by: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl ConfigRecord for ModuleRecord {
    const ENTITY: &'static str = "module";

    fn key(&self) -> &str {
        &self.key
    }

    fn scope(&self) -> &TenantScope {
        &self.scope
    }
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Declared type of a setting value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingType {
    String,
    Number,
    Boolean,
    Json,
}

impl SettingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Json => "json",
        }
    }
}

impl fmt::Display for SettingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SettingType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "string" | "str" => Ok(Self::String),
            "number" | "num" => Ok(Self::Number),
            "boolean" | "bool" => Ok(Self::Boolean),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown setting type '{other}'")),
        }
    }
}

/// A decoded, typed setting value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum SettingValue {
    String(String),
    Number(f64),
    Boolean(bool),
    Json(serde_json::Value),
}

impl SettingValue {
    pub fn setting_type(&self) -> SettingType {
        match self {
            Self::String(_) => SettingType::String,
            Self::Number(_) => SettingType::Number,
            Self::Boolean(_) => SettingType::Boolean,
            Self::Json(_) => SettingType::Json,
        }
    }

    /// Canonical string form as stored in `SettingRecord::value`.
    pub fn to_raw(&self) -> String {
        match self {
            Self::String(s) => s.clone(),
            Self::Number(n) => n.to_string(),
            Self::Boolean(b) => b.to_string(),
            Self::Json(j) => j.to_string(),
        }
    }
}

/// Persisted setting. `value` holds the canonical string form, or the
/// encoded ciphertext when `is_secret` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingRecord {
    pub key: String,
    pub scope: TenantScope,
    pub value: String,
    pub value_type: SettingType,
    pub is_secret: bool,
    pub description: Option<String>,
    pub updated_by: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl ConfigRecord for SettingRecord {
    const ENTITY: &'static str = "setting";

    fn key(&self) -> &str {
        &self.key
    }

    fn scope(&self) -> &TenantScope {
        &self.scope
    }
}

// ---------------------------------------------------------------------------
// Feature flags
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureFlagRecord {
    pub key: String,
    pub scope: TenantScope,
    pub enabled: bool,
    pub description: Option<String>,
    pub updated_by: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl ConfigRecord for FeatureFlagRecord {
    const ENTITY: &'static str = "feature_flag";

    fn key(&self) -> &str {
        &self.key
    }

    fn scope(&self) -> &TenantScope {
        &self.scope
    }
}
