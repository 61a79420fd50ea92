// src/config.rs ---------------------------------------------------------------
use std::{
    net::SocketAddr,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use thiserror::Error;

pub const CONFIG_PATH_ENV: &str = "TODO_AGENT_CONFIG";
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";
const DEFAULT_CONFIG_PATH: &str = "todo_agent.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("no generation API key: set `generation.api_key` or GEMINI_API_KEY")]
    MissingApiKey,
}

/// Everything the service needs, handed to each component at construction.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub listen:     SocketAddr,
    pub auth:       AuthConfig,
    pub mail:       MailConfig,
    pub calendar:   CalendarConfig,
    pub generation: GenerationConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Persisted credential record, overwritten on refresh or re-consent.
    pub token_path:          PathBuf,
    /// Google "installed app" client secret, read-only.
    pub client_secret_path:  PathBuf,
    pub scopes:              Vec<String>,
    /// When false the service never opens a consent flow and fails instead.
    pub interactive_consent: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    pub max_results:     u32,
    /// Gmail search query. Empty lists the most recent messages.
    pub query:           String,
    /// Body length cap in characters; 0 keeps bodies whole.
    pub body_char_limit: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CalendarConfig {
    pub calendar_id: String,
    pub max_results: u32,
}

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub api_base: String,
    pub model:    String,
    pub api_key:  String,
}

// the key must never end up in logs
impl std::fmt::Debug for GenerationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationConfig")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .field("api_key", &if self.api_key.is_empty() { "<unset>" } else { "<redacted>" })
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen:     SocketAddr::from(([127, 0, 0, 1], 5000)),
            auth:       AuthConfig::default(),
            mail:       MailConfig::default(),
            calendar:   CalendarConfig::default(),
            generation: GenerationConfig::default(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_path:          PathBuf::from("token.json"),
            client_secret_path:  PathBuf::from("credentials.json"),
            scopes: vec![
                "https://www.googleapis.com/auth/gmail.readonly".into(),
                "https://www.googleapis.com/auth/calendar.readonly".into(),
            ],
            interactive_consent: true,
        }
    }
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            max_results:     5,
            query:           "is:unread".into(),
            body_char_limit: 500,
        }
    }
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            calendar_id: "primary".into(),
            max_results: 5,
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_base: "https://generativelanguage.googleapis.com/v1beta/openai".into(),
            model:    "gemini-2.5-pro".into(),
            api_key:  String::new(),
        }
    }
}

impl Config {
    /// Load from `$TODO_AGENT_CONFIG` (or `todo_agent.toml`), then apply the
    /// API key from the environment. A missing file means defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var_os(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

        let mut config = Self::from_file(&path)?;
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            config.generation.api_key = key;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(text) => Self::from_toml(&text).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            }),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.generation.api_key.trim().is_empty() {
            return Err(ConfigError::MissingApiKey);
        }
        Ok(())
    }
}
