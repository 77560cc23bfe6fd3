//! Configuration file loader.

use std::path::{Path, PathBuf};

use super::RelayConfig;

/// Configuration loader that searches multiple locations.
#[derive(Debug)]
pub struct ConfigLoader {
    /// Search paths in order of priority.
    search_paths: Vec<PathBuf>,
}

impl ConfigLoader {
    /// Create a new config loader with default search paths.
    #[must_use]
    pub fn new() -> Self {
        let mut search_paths = Vec::new();

        // 1. Current directory: .incident-relay.toml
        search_paths.push(PathBuf::from(".incident-relay.toml"));

        // 2. User config directory: ~/.config/incident-relay/config.toml
        if let Some(config_dir) = dirs::config_dir() {
            search_paths.push(config_dir.join("incident-relay").join("config.toml"));
        }

        Self { search_paths }
    }

    /// Create a config loader with a specific config file path.
    #[must_use]
    pub fn with_path(path: PathBuf) -> Self {
        Self {
            search_paths: vec![path],
        }
    }

    /// Load configuration from the first available file, or return defaults.
    ///
    /// Environment overrides are not applied here; see
    /// [`RelayConfig::apply_env_overrides`].
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be parsed.
    pub fn load(&self) -> Result<RelayConfig, ConfigError> {
        for path in &self.search_paths {
            if path.exists() {
                tracing::debug!(path = %path.display(), "Loading config file");
                return Self::load_from_path(path);
            }
        }

        tracing::debug!("No config file found, using defaults");
        Ok(RelayConfig::default())
    }

    /// Load a file, apply environment overrides, then `adjust`, and
    /// validate the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be parsed or the resulting
    /// configuration is incomplete.
    pub fn load_validated_with<F>(&self, adjust: F) -> Result<RelayConfig, ConfigError>
    where
        F: FnOnce(&mut RelayConfig),
    {
        let mut config = self.load()?;
        config.apply_env_overrides();
        adjust(&mut config);
        config.validate()?;
        Ok(config)
    }

    fn load_from_path(path: &Path) -> Result<RelayConfig, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Get the search paths for debugging.
    #[must_use]
    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// Find the first config file that exists.
    #[must_use]
    pub fn find_config_file(&self) -> Option<PathBuf> {
        self.search_paths.iter().find(|p| p.exists()).cloned()
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors that can occur during configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_config_loader_default_paths() {
        let loader = ConfigLoader::new();
        assert!(!loader.search_paths().is_empty());
        assert!(loader.search_paths()[0].ends_with(".incident-relay.toml"));
    }

    #[test]
    fn test_config_loader_returns_defaults_when_no_file() {
        let loader = ConfigLoader::with_path(PathBuf::from("/nonexistent/path.toml"));
        let config = loader.load().unwrap();
        assert_eq!(config.watcher.poll_interval_ms, 500);
        assert!(loader.find_config_file().is_none());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [ticketing]
            app_token = "app"
            user_token = "user"

            [watcher]
            log_file = "/var/log/events.log"
            "#
        )
        .unwrap();

        let loader = ConfigLoader::with_path(file.path().to_path_buf());
        let config = loader.load().unwrap();
        assert_eq!(config.ticketing.app_token, "app");
        assert_eq!(config.watcher.log_file, PathBuf::from("/var/log/events.log"));
        assert_eq!(loader.find_config_file(), Some(file.path().to_path_buf()));
    }

    #[test]
    fn test_load_validated_with_applies_adjustment() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [ticketing]
            app_token = "app"
            user_token = "user"
            "#
        )
        .unwrap();

        let loader = ConfigLoader::with_path(file.path().to_path_buf());
        let config = loader
            .load_validated_with(|c| c.watcher.log_file = PathBuf::from("/tmp/override.log"))
            .unwrap();
        assert_eq!(config.watcher.log_file, PathBuf::from("/tmp/override.log"));

        let err = loader
            .load_validated_with(|c| c.watcher.poll_interval_ms = 0)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_parse_error_names_path() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[ticketing\nbase_url = ").unwrap();

        let loader = ConfigLoader::with_path(file.path().to_path_buf());
        let err = loader.load().unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
        assert!(err.to_string().contains(&file.path().display().to_string()));
    }
}
