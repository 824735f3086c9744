//! Configuration file handling for temporal-architect.
//!
//! Loads configuration from `~/.config/temporal-architect/config.toml` or a
//! custom path. Every field is optional; missing values fall back to the
//! built-in defaults.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::veo::{
    OperationPoller, DEFAULT_MODEL, DEFAULT_POLL_INTERVAL, DOWNLOAD_FILENAME, GEMINI_API_KEY_ENV,
    VEO_API_BASE_URL,
};

/// Default configuration written by `config init`.
pub const DEFAULT_CONFIG_TOML: &str = r#"# temporal-architect configuration

[provider]
# Gemini API base URL
base_url = "https://generativelanguage.googleapis.com"
# Video model
model = "veo-3.1-fast-generate-preview"
# Environment variable holding the API key
api_key_env = "GEMINI_API_KEY"

[polling]
# Seconds between status checks
interval_secs = 8
# Give up after this many seconds (unset = wait until done)
# timeout_secs = 900

[credential]
# When stdin is not a terminal there is no key prompt: true assumes the
# key is configured, false refuses to submit
fail_open = true

[output]
# Where `generate` saves the result when --output is not given
# dir = "."
filename = "timelapse.mp4"
"#;

/// Configuration file structure.
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub credential: CredentialConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Deserialize, Default)]
pub struct ProviderConfig {
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub api_key_env: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PollingConfig {
    pub interval_secs: Option<u64>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct CredentialConfig {
    #[serde(default = "default_true")]
    pub fail_open: bool,
}

impl Default for CredentialConfig {
    fn default() -> Self {
        Self { fail_open: true }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct OutputConfig {
    pub dir: Option<PathBuf>,
    pub filename: Option<String>,
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from a file path.
    /// Returns default config if the file doesn't exist.
    /// Returns an error if the file exists but cannot be parsed.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.map(PathBuf::from).unwrap_or_else(default_path);

        if path.exists() {
            Self::read(&path)
        } else {
            log::debug!("No config file at {}, using defaults", path.display());
            Ok(Config::default())
        }
    }

    /// Load configuration from a path the user named explicitly.
    /// Unlike `load`, a missing file is an error.
    pub fn load_from_explicit(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            });
        }
        Self::read(path)
    }

    fn read(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn base_url(&self) -> &str {
        self.provider.base_url.as_deref().unwrap_or(VEO_API_BASE_URL)
    }

    pub fn model(&self) -> &str {
        self.provider.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    pub fn api_key_env(&self) -> &str {
        self.provider
            .api_key_env
            .as_deref()
            .unwrap_or(GEMINI_API_KEY_ENV)
    }

    pub fn poll_interval(&self) -> Duration {
        self.polling
            .interval_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_POLL_INTERVAL)
    }

    pub fn poll_timeout(&self) -> Option<Duration> {
        self.polling.timeout_secs.map(Duration::from_secs)
    }

    pub fn poller(&self) -> OperationPoller {
        OperationPoller::new(self.poll_interval()).with_max_wait(self.poll_timeout())
    }

    /// Where a finished video is saved when no output path is given.
    pub fn output_path(&self) -> PathBuf {
        let filename = self
            .output
            .filename
            .as_deref()
            .unwrap_or(DOWNLOAD_FILENAME);
        match &self.output.dir {
            Some(dir) => dir.join(filename),
            None => PathBuf::from(filename),
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{}': {source}", path.display())]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{}': {source}", path.display())]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Config file not found: {}", path.display())]
    NotFound { path: PathBuf },
}

/// Get the default config file path.
pub fn default_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("temporal-architect").join("config.toml"))
        .unwrap_or_else(|| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".config/temporal-architect/config.toml")
        })
}
