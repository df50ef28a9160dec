use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    #[serde(default = "default_dev_env")]
    pub dev_env: String,
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

fn default_dev_env() -> String {
    "dev".to_string()
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default = "true_default")]
    pub cors_allow_any: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StorageConfig {
    /// JSON file holding the shared state. Relative paths resolve against
    /// the working directory.
    pub data_path: PathBuf,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    pub format: LoggingFormatConfig,
    pub levels: LoggingLevelsConfig,
    #[serde(default)]
    pub redaction: RedactionConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingFormatConfig {
    pub show_time: bool,
    pub location: LoggingLocationConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingLocationConfig {
    pub show_file: bool,
    pub show_line: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingLevelsConfig {
    pub debug: bool,
    pub info: bool,
    pub warning: bool,
    pub error: bool,
    pub critical: bool,
}

impl LoggingLevelsConfig {
    /// The most verbose level enabled, as an `EnvFilter` directive.
    pub fn directive(&self) -> &'static str {
        if self.debug {
            "debug"
        } else if self.info {
            "info"
        } else if self.warning {
            "warn"
        } else if self.error || self.critical {
            "error"
        } else {
            "off"
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RedactionConfig {
    #[serde(default = "true_default")]
    pub enabled: bool,
    #[serde(default = "true_default")]
    pub use_default_pii: bool,
    #[serde(default)]
    pub patterns: Vec<RedactionPattern>,
}

impl Default for RedactionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            use_default_pii: true,
            patterns: Vec::new(),
        }
    }
}

fn true_default() -> bool {
    true
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RedactionPattern {
    pub name: String,
    pub regex: String,
    pub placeholder: String,
}

static CONFIG: RwLock<Option<&'static AppConfig>> = RwLock::new(None);

/// Load the configuration once and hand out the same instance afterwards.
pub fn get_config() -> Result<&'static AppConfig, ConfigError> {
    if let Some(cfg) = *CONFIG.read().unwrap_or_else(PoisonError::into_inner) {
        return Ok(cfg);
    }

    let mut write = CONFIG.write().unwrap_or_else(PoisonError::into_inner);
    if let Some(cfg) = *write {
        return Ok(cfg);
    }

    let cfg: &'static AppConfig = Box::leak(Box::new(load_config()?));
    *write = Some(cfg);
    Ok(cfg)
}

#[cfg(test)]
pub fn reset_config() {
    let mut write = CONFIG.write().unwrap_or_else(PoisonError::into_inner);
    *write = None;
}

/// Resolve a config file next to the crate manifest, falling back to the
/// crate directory relative to the workspace root.
fn config_file(name: &str) -> PathBuf {
    let manifest_dir = std::env::var("CARGO_MANIFEST_DIR").unwrap_or_else(|_| ".".to_string());
    let in_manifest = Path::new(&manifest_dir).join(name);
    if in_manifest.exists() {
        in_manifest
    } else {
        Path::new("crates").join("server").join(name)
    }
}

pub fn load_config() -> Result<AppConfig, ConfigError> {
    let builder = Config::builder()
        .add_source(File::from(config_file("global_config.yaml")).required(true))
        .add_source(File::from(config_file("production_config.yaml")).required(false))
        .add_source(File::from(config_file(".global_config.yaml")).required(false))
        // Nested keys, e.g. AUTOCARE__SERVER__PORT=8080
        .add_source(Environment::with_prefix("AUTOCARE").separator("__"));

    builder.build()?.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    struct EnvGuard(&'static str);
    impl EnvGuard {
        fn new(key: &'static str, val: &str) -> Self {
            reset_config();
            env::set_var(key, val);
            Self(key)
        }
    }
    impl Drop for EnvGuard {
        fn drop(&mut self) {
            env::remove_var(self.0);
            reset_config();
        }
    }

    #[test]
    #[serial]
    fn test_load_config() {
        let config = load_config();
        assert!(config.is_ok(), "Failed to load config: {:?}", config.err());

        let config = config.unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 5174);
        assert_eq!(config.storage.data_path, PathBuf::from("data/db.json"));
        assert_eq!(config.logging.levels.directive(), "info");
    }

    #[test]
    #[serial]
    fn test_env_var_override_precedence() {
        let _guard = EnvGuard::new("AUTOCARE__STORAGE__DATA_PATH", "/srv/autocare/db.json");

        let config = load_config().expect("Should load config");
        assert_eq!(config.storage.data_path, PathBuf::from("/srv/autocare/db.json"));
    }

    #[test]
    #[serial]
    fn test_type_coercion_numeric() {
        let _guard = EnvGuard::new("AUTOCARE__SERVER__PORT", "8080");
        let config = load_config().expect("Should load config");
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    #[serial]
    fn test_type_coercion_boolean() {
        {
            let _guard = EnvGuard::new("AUTOCARE__LOGGING__LEVELS__DEBUG", "true");
            let config = load_config().expect("Should load config");
            assert_eq!(config.logging.levels.directive(), "debug");
        }

        {
            let _guard = EnvGuard::new("AUTOCARE__SERVER__CORS_ALLOW_ANY", "false");
            let config = load_config().expect("Should load config");
            assert!(!config.server.cors_allow_any);
        }
    }

    #[test]
    #[serial]
    fn test_get_config_is_cached() {
        reset_config();
        let first = get_config().expect("Should load config");
        let second = get_config().expect("Should load config");
        assert!(std::ptr::eq(first, second));
        reset_config();
    }

    #[test]
    fn test_level_directive_picks_most_verbose() {
        let levels = LoggingLevelsConfig {
            debug: false,
            info: false,
            warning: true,
            error: true,
            critical: true,
        };
        assert_eq!(levels.directive(), "warn");

        let silent = LoggingLevelsConfig {
            debug: false,
            info: false,
            warning: false,
            error: false,
            critical: false,
        };
        assert_eq!(silent.directive(), "off");
    }
}
