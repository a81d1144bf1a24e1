//! Configuration loading from and saving to disk.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::schema::RelayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading and saving.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Serialize(toml::ser::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Serialize(e) => write!(f, "Serialize error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Durable home of the binding/provider document.
///
/// `save` always rewrites the whole document and must reject invalid
/// documents before touching storage.
pub trait ConfigStore: Send + Sync {
    fn load(&self) -> Result<RelayConfig, ConfigError>;
    fn save(&self, config: &RelayConfig) -> Result<(), ConfigError>;
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<RelayConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let config: RelayConfig = toml::from_str(&content).map_err(ConfigError::Parse)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Validate and atomically write configuration to a TOML file.
pub fn save_config(path: &Path, config: &RelayConfig) -> Result<(), ConfigError> {
    validate_config(config).map_err(ConfigError::Validation)?;
    let content = toml::to_string_pretty(config).map_err(ConfigError::Serialize)?;

    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(ConfigError::Io)?;
    }

    // Readers never see a half-written file.
    let tmp = path.with_extension("toml.tmp");
    fs::write(&tmp, content).map_err(ConfigError::Io)?;
    fs::rename(&tmp, path).map_err(ConfigError::Io)?;
    Ok(())
}

/// TOML-file backed [`ConfigStore`].
#[derive(Debug, Clone)]
pub struct TomlConfigStore {
    path: PathBuf,
}

impl TomlConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigStore for TomlConfigStore {
    fn load(&self) -> Result<RelayConfig, ConfigError> {
        load_config(&self.path)
    }

    fn save(&self, config: &RelayConfig) -> Result<(), ConfigError> {
        save_config(&self.path, config)?;
        tracing::debug!(path = %self.path.display(), ports = config.ports.len(), "Configuration saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::PortBinding;
    use crate::upstream::UpstreamEndpoint;

    fn sample() -> RelayConfig {
        let mut config = RelayConfig::default();
        config.ports.push(PortBinding {
            local_port: 1080,
            name: "main".into(),
            provider: None,
            monitoring: true,
            local_username: Some("local".into()),
            local_password: Some("secret".into()),
            upstream: Some(UpstreamEndpoint::socks5("10.0.0.1", 9050)),
        });
        config
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = TomlConfigStore::new(dir.path().join("relay.toml"));

        store.save(&sample()).unwrap();
        let loaded = store.load().unwrap();
        assert_eq!(loaded, sample());
        assert!(!dir.path().join("relay.toml.tmp").exists());
    }

    #[test]
    fn test_save_rejects_invalid_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relay.toml");
        let store = TomlConfigStore::new(&path);

        let mut config = sample();
        config.ports.push(config.ports[0].clone());
        let err = store.save(&config).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(!path.exists());
    }

    #[test]
    fn test_load_reports_missing_file() {
        let store = TomlConfigStore::new("/nonexistent/relay.toml");
        assert!(matches!(store.load(), Err(ConfigError::Io(_))));
    }
}
