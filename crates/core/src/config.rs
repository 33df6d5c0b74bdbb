use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Root configuration. Loaded from an optional TOML file and environment
/// variables with the prefix `CONFGATE__`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub secrets: SecretsConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub enforcement: EnforcementConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_ttl_secs")]
    pub module_ttl_secs: u64,
    #[serde(default = "default_ttl_secs")]
    pub setting_ttl_secs: u64,
    #[serde(default = "default_ttl_secs")]
    pub flag_ttl_secs: u64,
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SecretsConfig {
    /// Base64 AES-256 key. Takes precedence over `key_file`.
    #[serde(default)]
    pub key_base64: Option<String>,
    #[serde(default)]
    pub key_file: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnforcementConfig {
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,
    #[serde(default = "default_api_module")]
    pub api_module: String,
    /// Extra `route prefix -> module key` pairs merged over the built-in table.
    #[serde(default)]
    pub routes: BTreeMap<String, String>,
}

// Default functions
fn default_ttl_secs() -> u64 {
    60
}
fn default_max_entries() -> usize {
    100_000
}
fn default_data_dir() -> String {
    "./data".to_string()
}
fn default_api_prefix() -> String {
    "/api".to_string()
}
fn default_api_module() -> String {
    "rest_api".to_string()
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            module_ttl_secs: default_ttl_secs(),
            setting_ttl_secs: default_ttl_secs(),
            flag_ttl_secs: default_ttl_secs(),
            max_entries: default_max_entries(),
        }
    }
}

impl CacheConfig {
    pub fn module_ttl(&self) -> Duration {
        Duration::from_secs(self.module_ttl_secs)
    }

    pub fn setting_ttl(&self) -> Duration {
        Duration::from_secs(self.setting_ttl_secs)
    }

    pub fn flag_ttl(&self) -> Duration {
        Duration::from_secs(self.flag_ttl_secs)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

impl Default for EnforcementConfig {
    fn default() -> Self {
        Self {
            api_prefix: default_api_prefix(),
            api_module: default_api_module(),
            routes: BTreeMap::new(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables and an optional config file.
    pub fn load(file: Option<&Path>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let builder = builder.add_source(
            config::Environment::with_prefix("CONFGATE")
                .separator("__")
                .try_parsing(true)
                .list_separator(","),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.cache.module_ttl(), Duration::from_secs(60));
        assert_eq!(config.cache.setting_ttl(), Duration::from_secs(60));
        assert_eq!(config.cache.flag_ttl(), Duration::from_secs(60));
        assert_eq!(config.enforcement.api_prefix, "/api");
        assert_eq!(config.enforcement.api_module, "rest_api");
        assert!(config.secrets.key_base64.is_none());
    }

    #[test]
    fn test_load_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("confgate.toml");
        std::fs::write(
            &path,
            r#"
[cache]
module_ttl_secs = 5

[store]
data_dir = "/var/lib/confgate"

[enforcement.routes]
"/reports" = "reporting"
"#,
        )
        .unwrap();

        let config = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(config.cache.module_ttl_secs, 5);
        assert_eq!(config.cache.setting_ttl_secs, 60);
        assert_eq!(config.store.data_dir, "/var/lib/confgate");
        assert_eq!(
            config.enforcement.routes.get("/reports").map(String::as_str),
            Some("reporting")
        );
    }
}
