//! Builds the services over the file-backed stores in the data directory.

use anyhow::{Context as _, Result};
use confgate_core::cipher::SecretCipher;
use confgate_core::config::{AppConfig, SecretsConfig};
use confgate_core::dependency::CountedEntity;
use confgate_core::error::CipherError;
use confgate_core::types::{FeatureFlagRecord, ModuleRecord, SettingRecord};
use confgate_enforcement::{AccessEnforcer, RouteTable};
use confgate_platform::{AesGcmCipher, AuditLogger, SecretKey};
use confgate_registry::{Collaborators, ConfigServices};
use confgate_store::{FileRepository, FixedRowCounter};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

pub struct Context {
    pub services: ConfigServices,
    pub enforcer: AccessEnforcer,
}

impl Context {
    pub fn open(config: &AppConfig, user_count: u64) -> Result<Self> {
        let dir = Path::new(&config.store.data_dir);
        let modules: FileRepository<ModuleRecord> = FileRepository::open(dir)
            .with_context(|| format!("opening module store in {}", dir.display()))?;
        let settings: FileRepository<SettingRecord> = FileRepository::open(dir)
            .with_context(|| format!("opening settings store in {}", dir.display()))?;
        let flags: FileRepository<FeatureFlagRecord> = FileRepository::open(dir)
            .with_context(|| format!("opening feature flag store in {}", dir.display()))?;

        let services = ConfigServices::new(
            Collaborators {
                modules: Arc::new(modules),
                settings: Arc::new(settings),
                flags: Arc::new(flags),
                rows: Arc::new(FixedRowCounter::with_count(CountedEntity::User, user_count)),
                cipher: load_cipher(&config.secrets)?,
                audit: Arc::new(AuditLogger::new()),
            },
            &config.cache,
        );
        let enforcer = AccessEnforcer::new(
            RouteTable::from_config(&config.enforcement),
            services.modules.clone(),
        );

        info!(data_dir = %dir.display(), "Configuration stores opened");
        Ok(Self { services, enforcer })
    }
}

fn load_cipher(config: &SecretsConfig) -> Result<Arc<dyn SecretCipher>> {
    let key = match (&config.key_base64, &config.key_file) {
        (Some(encoded), _) => Some(SecretKey::from_base64(encoded).context("secrets.key_base64")?),
        (None, Some(path)) => Some(
            SecretKey::load_from_file(Path::new(path))
                .with_context(|| format!("loading secrets key from {path}"))?,
        ),
        (None, None) => None,
    };

    match key {
        Some(key) => Ok(Arc::new(AesGcmCipher::new(&key)?)),
        None => {
            warn!("No secrets key configured, secret settings are unavailable");
            Ok(Arc::new(NoKeyCipher))
        }
    }
}

/// Stand-in when no key is configured: plain settings keep working, any
/// secret read or write fails.
struct NoKeyCipher;

impl SecretCipher for NoKeyCipher {
    fn encrypt(&self, _plaintext: &[u8], _aad: &[u8]) -> Result<String, CipherError> {
        Err(CipherError::InvalidKey("no secrets key configured".into()))
    }

    fn decrypt(&self, _encoded: &str, _aad: &[u8]) -> Result<Vec<u8>, CipherError> {
        Err(CipherError::InvalidKey("no secrets key configured".into()))
    }
}
