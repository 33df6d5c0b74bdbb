//! Wiring of the three services over a shared set of collaborators.

use crate::flags::FeatureFlagStore;
use crate::modules::ModuleRegistry;
use crate::settings::SettingsStore;
use confgate_cache::LocalCache;
use confgate_core::audit::AuditSink;
use confgate_core::cipher::SecretCipher;
use confgate_core::config::CacheConfig;
use confgate_core::store::{Repository, RowCounter};
use confgate_core::types::{FeatureFlagRecord, ModuleRecord, SettingRecord};
use std::sync::Arc;

/// External collaborators the services are built against.
pub struct Collaborators {
    pub modules: Arc<dyn Repository<ModuleRecord>>,
    pub settings: Arc<dyn Repository<SettingRecord>>,
    pub flags: Arc<dyn Repository<FeatureFlagRecord>>,
    pub rows: Arc<dyn RowCounter>,
    pub cipher: Arc<dyn SecretCipher>,
    pub audit: Arc<dyn AuditSink>,
}

/// The settings, feature flag and module services, each with its own
/// `LocalCache` sized from `CacheConfig`. The registry is shared so route
/// enforcement can hold it too.
pub struct ConfigServices {
    pub settings: SettingsStore,
    pub flags: FeatureFlagStore,
    pub modules: Arc<ModuleRegistry>,
}

impl ConfigServices {
    pub fn new(collaborators: Collaborators, cache: &CacheConfig) -> Self {
        let Collaborators {
            modules,
            settings,
            flags,
            rows,
            cipher,
            audit,
        } = collaborators;

        Self {
            settings: SettingsStore::new(
                settings,
                cipher,
                Arc::new(LocalCache::new("settings", cache.setting_ttl(), cache.max_entries)),
                audit.clone(),
            ),
            flags: FeatureFlagStore::new(
                flags,
                Arc::new(LocalCache::new("feature_flags", cache.flag_ttl(), cache.max_entries)),
                audit.clone(),
            ),
            modules: Arc::new(ModuleRegistry::new(
                modules,
                rows,
                Arc::new(LocalCache::new("modules", cache.module_ttl(), cache.max_entries)),
                audit,
            )),
        }
    }

    /// Drop every cached resolution in all three services.
    pub fn clear_caches(&self) {
        self.settings.clear_cache();
        self.flags.clear_cache();
        self.modules.clear_cache();
    }
}
