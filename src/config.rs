use serde::{Deserialize, Serialize, Serializer};
use std::path::PathBuf;

/// Source of a configuration value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    Default,
    File,
    Environment,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Default => write!(f, "default"),
            ConfigSource::File => write!(f, "file"),
            ConfigSource::Environment => write!(f, "environment"),
        }
    }
}

/// A configuration value with its source
#[derive(Debug, Clone, Serialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }
}

/// Application configuration with source tracking
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Root of the local document store
    pub data_dir: ConfigValue<PathBuf>,
    /// Class passcode required before anything else works
    #[serde(serialize_with = "mask_secret")]
    pub passcode: ConfigValue<Option<String>>,
    /// Signing in with this email shows the admin view
    pub admin_email: ConfigValue<Option<String>>,
    /// Config file path used (if any)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_file: Option<PathBuf>,
}

/// Internal struct for deserializing config file
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ConfigFile {
    data_dir: Option<PathBuf>,
    passcode: Option<String>,
    admin_email: Option<String>,
}

const MASK: &str = "********";

fn mask_secret<S>(secret: &ConfigValue<Option<String>>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let masked = ConfigValue::new(secret.value.as_ref().map(|_| MASK), secret.source.clone());
    masked.serialize(serializer)
}

impl Config {
    /// Load configuration with priority: env vars > config file > defaults
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut data_dir = ConfigValue::new(Self::default_data_dir(), ConfigSource::Default);
        let mut passcode = ConfigValue::new(None, ConfigSource::Default);
        let mut admin_email = ConfigValue::new(None, ConfigSource::Default);
        let mut config_file = None;

        let path = config_path.unwrap_or_else(Self::default_config_path);
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadError(path.clone(), e))?;
            let file_config: ConfigFile = serde_yaml::from_str(&contents)
                .map_err(|e| ConfigError::ParseError(path.clone(), e))?;

            config_file = Some(path.clone());

            if let Some(dir) = file_config.data_dir {
                // Resolve relative paths against config file's directory
                let resolved = if dir.is_relative() {
                    path.parent().map(|p| p.join(&dir)).unwrap_or(dir)
                } else {
                    dir
                };
                data_dir = ConfigValue::new(resolved, ConfigSource::File);
            }
            if let Some(code) = file_config.passcode.filter(|c| !c.is_empty()) {
                passcode = ConfigValue::new(Some(code), ConfigSource::File);
            }
            if let Some(email) = file_config.admin_email {
                admin_email = ConfigValue::new(Some(email), ConfigSource::File);
            }
        }

        if let Ok(dir) = std::env::var("ONDOKU_DATA_DIR") {
            data_dir = ConfigValue::new(PathBuf::from(dir), ConfigSource::Environment);
        }
        if let Some(code) = std::env::var("ONDOKU_PASSCODE")
            .ok()
            .filter(|c| !c.is_empty())
        {
            passcode = ConfigValue::new(Some(code), ConfigSource::Environment);
        }
        if let Ok(email) = std::env::var("ONDOKU_ADMIN_EMAIL") {
            admin_email = ConfigValue::new(Some(email), ConfigSource::Environment);
        }

        Ok(Self {
            data_dir,
            passcode,
            admin_email,
            config_file,
        })
    }

    /// Default config directory (platform-specific):
    /// - Linux: ~/.config/ondoku/
    /// - macOS: ~/Library/Application Support/ondoku/
    /// - Windows: %APPDATA%/ondoku/
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("ondoku")
    }

    /// Default data directory (platform-specific):
    /// - Linux: ~/.local/share/ondoku/
    /// - macOS: ~/Library/Application Support/ondoku/
    /// - Windows: %APPDATA%/ondoku/
    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("ondoku")
    }

    /// Default config file path (platform-specific config dir + config.yaml)
    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join("config.yaml")
    }
}

#[derive(Debug)]
pub enum ConfigError {
    ReadError(PathBuf, std::io::Error),
    ParseError(PathBuf, serde_yaml::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
