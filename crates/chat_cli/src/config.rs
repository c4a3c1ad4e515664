use std::path::{Path, PathBuf};
use std::time::Duration;

use gateway_api::GatewayConfig;
use model_registry::{ModelConfig, ModelRegistry, RegistryError};
use serde::Deserialize;
use stream_chat::{DEFAULT_HANDOFF_DELAY, DEFAULT_SYSTEM_PROMPT};
use thiserror::Error;

pub const CONFIG_PATH_ENV: &str = "STREAM_CHAT_CONFIG_PATH";
pub const BASE_URL_ENV: &str = "STREAM_CHAT_BASE_URL";
pub const COOKIE_ENV: &str = "STREAM_CHAT_COOKIE";
pub const SYSTEM_PROMPT_ENV: &str = "STREAM_CHAT_SYSTEM_PROMPT";
pub const LOG_ENV: &str = "STREAM_CHAT_LOG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("timeout_sec must be greater than zero")]
    InvalidTimeout,

    #[error("default_model '{0}' is not in the model list")]
    UnknownDefaultModel(String),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    base_url: Option<String>,
    #[serde(default)]
    session_cookie: Option<String>,
    #[serde(default)]
    system_prompt: Option<String>,
    #[serde(default)]
    timeout_sec: Option<u64>,
    #[serde(default)]
    default_model: Option<String>,
    #[serde(default)]
    handoff_delay_ms: Option<u64>,
    #[serde(default)]
    models: Option<Vec<ModelConfig>>,
}

/// Fully resolved CLI settings.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub gateway: GatewayConfig,
    pub system_prompt: String,
    pub default_model: Option<String>,
    pub handoff_delay: Duration,
    pub registry: ModelRegistry,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig::default(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_owned(),
            default_model: None,
            handoff_delay: DEFAULT_HANDOFF_DELAY,
            registry: ModelRegistry::builtin(),
        }
    }
}

impl CliConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::resolve(|key| std::env::var(key).ok())
    }

    /// Load the optional config file named by [`CONFIG_PATH_ENV`], then apply
    /// environment overrides. Blank variables count as unset.
    pub fn resolve(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let file = match env(CONFIG_PATH_ENV) {
            Some(path) => load_file(Path::new(path.trim()))?,
            None => ConfigFile::default(),
        };
        let mut config = Self::from_file(file)?;

        if let Some(base_url) = env(BASE_URL_ENV) {
            config.gateway.base_url = base_url.trim().to_owned();
        }
        if let Some(cookie) = env(COOKIE_ENV) {
            config.gateway.session_cookie = Some(cookie);
        }
        if let Some(prompt) = env(SYSTEM_PROMPT_ENV) {
            config.system_prompt = prompt;
        }

        Ok(config)
    }

    fn from_file(file: ConfigFile) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(base_url) = file.base_url {
            config.gateway.base_url = base_url;
        }
        config.gateway.session_cookie = file.session_cookie;
        if let Some(prompt) = file.system_prompt {
            config.system_prompt = prompt;
        }
        match file.timeout_sec {
            Some(0) => return Err(ConfigError::InvalidTimeout),
            Some(secs) => config.gateway.timeout = Some(Duration::from_secs(secs)),
            None => {}
        }
        if let Some(delay) = file.handoff_delay_ms {
            config.handoff_delay = Duration::from_millis(delay);
        }
        if let Some(models) = file.models {
            config.registry = ModelRegistry::new(models)?;
        }
        if let Some(id) = file.default_model {
            if config.registry.find(&id).is_none() {
                return Err(ConfigError::UnknownDefaultModel(id));
            }
            config.default_model = Some(id);
        }

        Ok(config)
    }
}

fn load_file(path: &Path) -> Result<ConfigFile, ConfigError> {
    let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&source).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
