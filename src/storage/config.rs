use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

pub const APP_DIR_NAME: &str = "shared-calendar";
pub const DEFAULT_STORAGE_KEY: &str = "sharedCalendarEvents";
pub const DEFAULT_COLLECTION: &str = "events";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),
}

/// Which persistence backend to try at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendChoice {
    #[default]
    Local,
    Remote,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub backend: BackendChoice,
    pub local: LocalConfig,
    pub remote: RemoteConfig,
    pub export: ExportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LocalConfig {
    pub database_path: PathBuf,
    pub storage_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RemoteConfig {
    pub database_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
    pub collection: String,
    pub poll_interval_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExportConfig {
    pub file_name: String,
    pub calendar_name: String,
    pub calendar_description: String,
}

impl RemoteConfig {
    /// A database URL is set and is not the sample placeholder.
    pub fn is_configured(&self) -> bool {
        let url = self.database_url.trim();
        !url.is_empty() && !url.contains("YOUR_")
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            database_url: "YOUR_DATABASE_URL".to_string(),
            auth_token: None,
            collection: DEFAULT_COLLECTION.to_string(),
            poll_interval_seconds: 5,
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            file_name: "our-shared-calendar.ics".to_string(),
            calendar_name: "Our Shared Calendar".to_string(),
            calendar_description: "Shared calendar for couples".to_string(),
        }
    }
}

impl Config {
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(ConfigError::from)
    }

    pub fn load_or_create() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            Self::from_toml(&content)
        } else {
            let config = Self::default();
            config.save()?;
            Ok(config)
        }
    }

    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR_NAME)
    }

    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        let config_path = Self::config_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR_NAME);

        Self {
            backend: BackendChoice::Local,
            local: LocalConfig {
                database_path: data_dir.join("calendar.db"),
                storage_key: DEFAULT_STORAGE_KEY.to_string(),
            },
            remote: RemoteConfig::default(),
            export: ExportConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_uses_local_backend() {
        let config = Config::default();
        assert_eq!(config.backend, BackendChoice::Local);
    }

    #[test]
    fn default_config_uses_shared_storage_key() {
        let config = Config::default();
        assert_eq!(config.local.storage_key, "sharedCalendarEvents");
    }

    #[test]
    fn default_remote_is_not_configured() {
        let config = Config::default();
        assert!(!config.remote.is_configured());
    }

    #[test]
    fn remote_with_real_url_is_configured() {
        let remote = RemoteConfig {
            database_url: "https://our-calendar.firebaseio.com".to_string(),
            ..RemoteConfig::default()
        };
        assert!(remote.is_configured());
    }

    #[test]
    fn parse_valid_toml_config() {
        let toml_content = r#"
            backend = "remote"

            [local]
            database_path = "/tmp/calendar.db"
            storage_key = "sharedCalendarEvents"

            [remote]
            database_url = "https://our-calendar.firebaseio.com"
            auth_token = "secret"
            collection = "events"
            poll_interval_seconds = 10

            [export]
            file_name = "ours.ics"
            calendar_name = "Ours"
            calendar_description = "Things we do"
        "#;

        let config = Config::from_toml(toml_content).unwrap();

        assert_eq!(config.backend, BackendChoice::Remote);
        assert_eq!(config.local.database_path, PathBuf::from("/tmp/calendar.db"));
        assert_eq!(config.remote.auth_token.as_deref(), Some("secret"));
        assert_eq!(config.remote.poll_interval_seconds, 10);
        assert_eq!(config.export.file_name, "ours.ics");
    }

    #[test]
    fn default_config_survives_toml_round_trip() {
        let config = Config::default();

        let content = toml::to_string_pretty(&config).unwrap();

        assert_eq!(Config::from_toml(&content).unwrap(), config);
    }

    #[test]
    fn parse_unknown_backend_returns_error() {
        let toml_content = r#"
            backend = "carrier-pigeon"
        "#;
        assert!(Config::from_toml(toml_content).is_err());
    }

    #[test]
    fn parse_invalid_toml_returns_error() {
        let invalid_toml = "this is not valid toml";
        let result = Config::from_toml(invalid_toml);
        assert!(result.is_err());
    }
}
