//! Shared vocabulary of the tenant-aware configuration engine: record
//! shapes, the error taxonomy, configuration and the collaborator traits
//! (persistence, audit, secret cipher) the services are built against.

#![warn(clippy::unwrap_used)]

pub mod audit;
pub mod cipher;
pub mod config;
pub mod dependency;
pub mod error;
pub mod store;
pub mod types;

pub use audit::{AuditEntry, AuditSink, CaptureAuditSink, NoOpAuditSink};
pub use cipher::SecretCipher;
pub use config::AppConfig;
pub use dependency::{CountedEntity, DependencyViolation, Precondition, Rule};
pub use error::{AuditError, CipherError, ConfigError, ConfigResult, StoreError, StoreResult};
pub use store::{Repository, RowCounter};
pub use types::{
    ConfigRecord, FeatureFlagRecord, ModuleRecord, ModuleScope, SettingRecord, SettingType,
    SettingValue, TenantId, TenantScope,
};
