//! Typed key/value settings with org-over-global fallback and encrypted
//! secrets.
//!
//! Writes are strict: a value that does not parse as its declared type is
//! rejected. Reads through the typed getters are lenient: a missing record,
//! a type mismatch or a store failure all degrade to the caller's default.

use crate::resolve::{audit, cached, invalidate_scope, resolve_all, resolve_record};
use chrono::{DateTime, Utc};
use confgate_cache::ResolutionCache;
use confgate_core::audit::{AuditEntry, AuditSink};
use confgate_core::cipher::SecretCipher;
use confgate_core::error::{ConfigError, ConfigResult, StoreError};
use confgate_core::store::Repository;
use confgate_core::types::{SettingRecord, SettingType, SettingValue, TenantId, TenantScope};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Placeholder shown instead of a secret value on any read-back.
pub const MASK: &str = "********";

/// A decoded setting together with where it was resolved from.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSetting {
    pub value: SettingValue,
    pub scope: TenantScope,
    pub is_secret: bool,
}

/// External read-back of a setting. Secret values are always masked.
#[derive(Debug, Clone, Serialize)]
pub struct SettingView {
    pub key: String,
    pub value: serde_json::Value,
    pub value_type: SettingType,
    pub is_secret: bool,
    pub description: Option<String>,
    pub scope: TenantScope,
    pub updated_by: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Options for `SettingsStore::set`.
#[derive(Debug, Clone, Default)]
pub struct SetOptions {
    pub tenant_id: Option<TenantId>,
    pub is_secret: bool,
    pub description: Option<String>,
    pub updated_by: Option<String>,
}

impl SetOptions {
    pub fn global() -> Self {
        Self::default()
    }

    pub fn for_tenant(tenant_id: TenantId) -> Self {
        Self {
            tenant_id: Some(tenant_id),
            ..Self::default()
        }
    }

    pub fn secret(mut self) -> Self {
        self.is_secret = true;
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn updated_by(mut self, actor: impl Into<String>) -> Self {
        self.updated_by = Some(actor.into());
        self
    }
}

pub struct SettingsStore {
    repo: Arc<dyn Repository<SettingRecord>>,
    cipher: Arc<dyn SecretCipher>,
    cache: Arc<dyn ResolutionCache<Option<ResolvedSetting>>>,
    audit: Arc<dyn AuditSink>,
}

impl SettingsStore {
    pub fn new(
        repo: Arc<dyn Repository<SettingRecord>>,
        cipher: Arc<dyn SecretCipher>,
        cache: Arc<dyn ResolutionCache<Option<ResolvedSetting>>>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            repo,
            cipher,
            cache,
            audit,
        }
    }

    /// Resolve a setting: the tenant's record if present, else the global
    /// record, else `None`. Secret values are decrypted.
    pub fn get(&self, key: &str, tenant_id: Option<&TenantId>) -> ConfigResult<Option<SettingValue>> {
        Ok(self.resolve(key, tenant_id)?.map(|r| r.value))
    }

    /// Like `get`, but also reports the scope the value came from.
    pub fn resolve(
        &self,
        key: &str,
        tenant_id: Option<&TenantId>,
    ) -> ConfigResult<Option<ResolvedSetting>> {
        cached(&*self.cache, key, tenant_id, || {
            resolve_record(&*self.repo, key, tenant_id)?
                .map(|record| self.decode(&record))
                .transpose()
        })
    }

    pub fn get_string(&self, key: &str, default: &str, tenant_id: Option<&TenantId>) -> String {
        match self.lenient(key, SettingType::String, tenant_id) {
            Some(SettingValue::String(s)) => s,
            _ => default.to_string(),
        }
    }

    pub fn get_number(&self, key: &str, default: f64, tenant_id: Option<&TenantId>) -> f64 {
        match self.lenient(key, SettingType::Number, tenant_id) {
            Some(SettingValue::Number(n)) => n,
            _ => default,
        }
    }

    pub fn get_boolean(&self, key: &str, default: bool, tenant_id: Option<&TenantId>) -> bool {
        match self.lenient(key, SettingType::Boolean, tenant_id) {
            Some(SettingValue::Boolean(b)) => b,
            _ => default,
        }
    }

    pub fn get_json(
        &self,
        key: &str,
        default: serde_json::Value,
        tenant_id: Option<&TenantId>,
    ) -> serde_json::Value {
        match self.lenient(key, SettingType::Json, tenant_id) {
            Some(SettingValue::Json(j)) => j,
            _ => default,
        }
    }

    /// Validate, encrypt if secret, upsert and invalidate.
    pub fn set(
        &self,
        key: &str,
        value: serde_json::Value,
        value_type: SettingType,
        options: SetOptions,
    ) -> ConfigResult<SettingView> {
        let typed = validate(key, &value, value_type)?;
        let scope = TenantScope::from_tenant(options.tenant_id.as_ref());

        let raw = typed.to_raw();
        let stored = if options.is_secret {
            self.cipher
                .encrypt(raw.as_bytes(), associated_data(key, &scope).as_bytes())?
        } else {
            raw
        };

        let description = match options.description {
            Some(d) => Some(d),
            None => self
                .repo
                .find_one(key, &scope)?
                .and_then(|existing| existing.description),
        };

        let record = self.repo.upsert(SettingRecord {
            key: key.to_string(),
            scope: scope.clone(),
            value: stored,
            value_type,
            is_secret: options.is_secret,
            description,
            updated_by: options.updated_by,
            updated_at: Utc::now(),
        })?;
        invalidate_scope(&*self.cache, key, &scope);

        info!(
            key,
            scope = %scope,
            value_type = %value_type,
            secret = options.is_secret,
            actor = record.updated_by.as_deref().unwrap_or("-"),
            "Setting updated"
        );
        let shown = if options.is_secret {
            serde_json::Value::String(MASK.into())
        } else {
            to_json(&typed)
        };
        audit(
            &*self.audit,
            AuditEntry::new(
                record.updated_by.as_deref(),
                "setting.update",
                "setting",
                Some(key),
                &scope,
                serde_json::json!({
                    "value_type": value_type,
                    "is_secret": options.is_secret,
                    "value": shown,
                }),
            ),
        );

        Ok(view(&record, Some(&typed)))
    }

    /// Remove the record at the given scope so resolution falls back to the
    /// next level. Returns whether a record existed.
    pub fn delete(
        &self,
        key: &str,
        tenant_id: Option<&TenantId>,
        updated_by: Option<&str>,
    ) -> ConfigResult<bool> {
        let scope = TenantScope::from_tenant(tenant_id);
        let existed = self.repo.delete(key, &scope)?;
        invalidate_scope(&*self.cache, key, &scope);

        if existed {
            info!(key, scope = %scope, "Setting deleted");
            audit(
                &*self.audit,
                AuditEntry::new(
                    updated_by,
                    "setting.delete",
                    "setting",
                    Some(key),
                    &scope,
                    serde_json::Value::Null,
                ),
            );
        }
        Ok(existed)
    }

    /// Resolved, masked view of one setting.
    pub fn describe(
        &self,
        key: &str,
        tenant_id: Option<&TenantId>,
    ) -> ConfigResult<Option<SettingView>> {
        let Some(record) = resolve_record(&*self.repo, key, tenant_id)? else {
            return Ok(None);
        };
        let decoded = if record.is_secret {
            None
        } else {
            Some(decode_raw(&record.key, &record.value, record.value_type)?)
        };
        Ok(Some(view(&record, decoded.as_ref())))
    }

    /// Every setting visible to a tenant, masked. Bypasses the cache.
    pub fn list(&self, tenant_id: Option<&TenantId>) -> ConfigResult<Vec<SettingView>> {
        resolve_all(&*self.repo, tenant_id)?
            .iter()
            .map(|record| {
                let decoded = if record.is_secret {
                    None
                } else {
                    Some(decode_raw(&record.key, &record.value, record.value_type)?)
                };
                Ok(view(record, decoded.as_ref()))
            })
            .collect()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    fn lenient(
        &self,
        key: &str,
        wanted: SettingType,
        tenant_id: Option<&TenantId>,
    ) -> Option<SettingValue> {
        match self.get(key, tenant_id) {
            Ok(Some(value)) if value.setting_type() == wanted => Some(value),
            Ok(Some(value)) => {
                warn!(
                    key,
                    stored = %value.setting_type(),
                    requested = %wanted,
                    "Setting type mismatch, using default"
                );
                None
            }
            Ok(None) => None,
            Err(err) => {
                warn!(key, error = %err, "Setting lookup failed, using default");
                None
            }
        }
    }

    fn decode(&self, record: &SettingRecord) -> ConfigResult<ResolvedSetting> {
        let raw = if record.is_secret {
            let plain = self.cipher.decrypt(
                &record.value,
                associated_data(&record.key, &record.scope).as_bytes(),
            )?;
            String::from_utf8(plain).map_err(|_| StoreError::Corrupt {
                key: record.key.clone(),
                reason: "secret is not valid UTF-8".into(),
            })?
        } else {
            record.value.clone()
        };

        Ok(ResolvedSetting {
            value: decode_raw(&record.key, &raw, record.value_type)?,
            scope: record.scope.clone(),
            is_secret: record.is_secret,
        })
    }
}

/// Binds a secret's ciphertext to its key and scope.
fn associated_data(key: &str, scope: &TenantScope) -> String {
    format!("setting|{key}|{scope}")
}

/// Check `value` against the declared type and convert it.
fn validate(key: &str, value: &serde_json::Value, value_type: SettingType) -> ConfigResult<SettingValue> {
    use serde_json::Value;

    match (value_type, value) {
        (SettingType::String, Value::String(s)) => Ok(SettingValue::String(s.clone())),
        (SettingType::String, other) => Err(ConfigError::validation(
            key,
            format!("expected a string, got {}", json_kind(other)),
        )),

        (SettingType::Number, Value::Number(n)) => n
            .as_f64()
            .map(SettingValue::Number)
            .ok_or_else(|| ConfigError::validation(key, "number out of range")),
        (SettingType::Number, Value::String(s)) => match s.trim().parse::<f64>() {
            Ok(n) if n.is_finite() => Ok(SettingValue::Number(n)),
            _ => Err(ConfigError::validation(key, format!("'{s}' is not a number"))),
        },
        (SettingType::Number, other) => Err(ConfigError::validation(
            key,
            format!("expected a number, got {}", json_kind(other)),
        )),

        (SettingType::Boolean, Value::Bool(b)) => Ok(SettingValue::Boolean(*b)),
        (SettingType::Boolean, Value::String(s)) => match s.trim().to_lowercase().as_str() {
            "true" => Ok(SettingValue::Boolean(true)),
            "false" => Ok(SettingValue::Boolean(false)),
            _ => Err(ConfigError::validation(key, format!("'{s}' is not a boolean"))),
        },
        (SettingType::Boolean, other) => Err(ConfigError::validation(
            key,
            format!("expected a boolean, got {}", json_kind(other)),
        )),

        (SettingType::Json, Value::String(s)) => serde_json::from_str(s)
            .map(SettingValue::Json)
            .map_err(|e| ConfigError::validation(key, format!("invalid JSON: {e}"))),
        (SettingType::Json, other) => Ok(SettingValue::Json(other.clone())),
    }
}

/// Parse a stored canonical string back into its declared type.
fn decode_raw(key: &str, raw: &str, value_type: SettingType) -> ConfigResult<SettingValue> {
    let corrupt = |reason: String| {
        ConfigError::from(StoreError::Corrupt {
            key: key.to_string(),
            reason,
        })
    };

    match value_type {
        SettingType::String => Ok(SettingValue::String(raw.to_string())),
        SettingType::Number => raw
            .parse::<f64>()
            .map(SettingValue::Number)
            .map_err(|_| corrupt(format!("stored value '{raw}' is not a number"))),
        SettingType::Boolean => raw
            .parse::<bool>()
            .map(SettingValue::Boolean)
            .map_err(|_| corrupt(format!("stored value '{raw}' is not a boolean"))),
        SettingType::Json => serde_json::from_str(raw)
            .map(SettingValue::Json)
            .map_err(|e| corrupt(format!("stored JSON is invalid: {e}"))),
    }
}

fn to_json(value: &SettingValue) -> serde_json::Value {
    match value {
        SettingValue::String(s) => serde_json::Value::String(s.clone()),
        SettingValue::Number(n) => serde_json::Number::from_f64(*n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        SettingValue::Boolean(b) => serde_json::Value::Bool(*b),
        SettingValue::Json(j) => j.clone(),
    }
}

fn view(record: &SettingRecord, decoded: Option<&SettingValue>) -> SettingView {
    let value = if record.is_secret {
        serde_json::Value::String(MASK.into())
    } else {
        decoded.map(to_json).unwrap_or(serde_json::Value::Null)
    };
    SettingView {
        key: record.key.clone(),
        value,
        value_type: record.value_type,
        is_secret: record.is_secret,
        description: record.description.clone(),
        scope: record.scope.clone(),
        updated_by: record.updated_by.clone(),
        updated_at: record.updated_at,
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
