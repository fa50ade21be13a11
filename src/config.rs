use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::GconError;

pub const DEFAULT_CONFIG_FILE: &str = "gcon.json";
pub const DEFAULT_CHUNK_SIZE: usize = 15;
pub const DEFAULT_TOOL: &str = "gcon";

pub const EMAIL_ENV: &str = "CURRENT_USER_EMAIL";
pub const API_KEY_ENV: &str = "NCBI_API_KEY";
pub const CHUNK_SIZE_ENV: &str = "GCON_CHUNK_SIZE";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub chunk_size: Option<usize>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub tool: Option<String>,
}

/// Values taken from the process environment. They win over the file.
#[derive(Debug, Default, Clone)]
pub struct EnvOverrides {
    pub email: Option<String>,
    pub api_key: Option<String>,
    pub chunk_size: Option<String>,
}

impl EnvOverrides {
    pub fn from_env() -> Self {
        Self {
            email: non_empty_var(EMAIL_ENV),
            api_key: non_empty_var(API_KEY_ENV),
            chunk_size: non_empty_var(CHUNK_SIZE_ENV),
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub chunk_size: usize,
    pub email: Option<String>,
    pub api_key: Option<String>,
    pub tool: String,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            schema_version: 1,
            chunk_size: DEFAULT_CHUNK_SIZE,
            email: None,
            api_key: None,
            tool: DEFAULT_TOOL.to_string(),
        }
    }
}

impl ResolvedConfig {
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Result<Self, GconError> {
        self.chunk_size = validate_chunk_size(chunk_size)?;
        Ok(self)
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Reads `path` (or `gcon.json` when present) and applies environment
    /// overrides. A missing default file is not an error.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, GconError> {
        let config = Self::load(path)?;
        Self::resolve_config(config, EnvOverrides::from_env())
    }

    pub fn load(path: Option<&str>) -> Result<Config, GconError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| GconError::ConfigRead(config_path.clone()))?;
        serde_json::from_str(&content).map_err(|err| GconError::ConfigParse(err.to_string()))
    }

    pub fn resolve_config(
        config: Config,
        env: EnvOverrides,
    ) -> Result<ResolvedConfig, GconError> {
        let chunk_size = match env.chunk_size {
            Some(raw) => raw.parse::<usize>().map_err(|_| {
                GconError::InvalidArgument(format!("{CHUNK_SIZE_ENV} must be an integer: {raw}"))
            })?,
            None => config.chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE),
        };

        Ok(ResolvedConfig {
            schema_version: config.schema_version.unwrap_or(1),
            chunk_size: validate_chunk_size(chunk_size)?,
            email: env.email.or(config.email.filter(|email| !email.trim().is_empty())),
            api_key: env.api_key.or(config.api_key),
            tool: config.tool.unwrap_or_else(|| DEFAULT_TOOL.to_string()),
        })
    }
}

fn validate_chunk_size(chunk_size: usize) -> Result<usize, GconError> {
    if chunk_size == 0 {
        return Err(GconError::InvalidArgument(
            "chunk size must be greater than zero".to_string(),
        ));
    }
    Ok(chunk_size)
}
