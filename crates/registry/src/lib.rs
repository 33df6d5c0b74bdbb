//! Tenant-aware configuration services: typed settings, feature flags and
//! dependency-checked module toggles, each resolved org-first then global
//! through a short-lived cache.

#![warn(clippy::unwrap_used)]

pub mod catalog;
pub mod engine;
pub mod flags;
pub mod locks;
pub mod modules;
mod resolve;
pub mod rules;
pub mod settings;

pub use catalog::{ModuleDefinition, BUILTIN_MODULES};
pub use engine::{Collaborators, ConfigServices};
pub use flags::{FeatureFlagStore, FlagOptions};
pub use locks::KeyLocks;
pub use modules::ModuleRegistry;
pub use rules::{DependencyTable, ModuleState};
pub use settings::{ResolvedSetting, SetOptions, SettingView, SettingsStore, MASK};
