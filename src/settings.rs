use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use url::Url;

pub const DEFAULT_ENDPOINT: &str = "https://careway-chatbot-1056327500922.us-central1.run.app/invoke";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

pub const ENV_ENDPOINT: &str = "CAREWAY_ENDPOINT";
pub const ENV_TIMEOUT_SECS: &str = "CAREWAY_TIMEOUT_SECS";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("invalid config file {path}: {source}")]
    Parse { path: PathBuf, source: serde_json::Error },
    #[error("invalid endpoint url {0:?}: {1}")]
    Endpoint(String, url::ParseError),
    #[error("endpoint must use http or https, got {0}")]
    Scheme(String),
    #[error("invalid CAREWAY_TIMEOUT_SECS value {0:?}")]
    Timeout(String),
}

/// One layer of client configuration. Unset fields fall through to the next layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SettingsLayer {
    pub endpoint: Option<String>,
    pub timeout_secs: Option<u64>,
    /// Records sent as `PatientHistory` with the first message of a session.
    pub patient_history: Option<Vec<Value>>,
}

impl SettingsLayer {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let endpoint = lookup(ENV_ENDPOINT).filter(|v| !v.trim().is_empty());
        let timeout_secs = match lookup(ENV_TIMEOUT_SECS) {
            Some(raw) => Some(raw.trim().parse::<u64>().map_err(|_| ConfigError::Timeout(raw))?),
            None => None,
        };
        Ok(Self { endpoint, timeout_secs, patient_history: None })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveSettings {
    pub endpoint: Url,
    pub timeout: Duration,
    pub patient_history: Vec<Value>,
}

/// Command line wins over the environment, which wins over the config file.
pub fn resolve_effective_settings(
    file: &SettingsLayer,
    env: &SettingsLayer,
    cli: &SettingsLayer,
) -> Result<EffectiveSettings, ConfigError> {
    let endpoint = cli
        .endpoint
        .clone()
        .or_else(|| env.endpoint.clone())
        .or_else(|| file.endpoint.clone())
        .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
    let endpoint = parse_endpoint(&endpoint)?;

    let timeout_secs = cli
        .timeout_secs
        .or(env.timeout_secs)
        .or(file.timeout_secs)
        .filter(|secs| *secs > 0)
        .unwrap_or(DEFAULT_TIMEOUT_SECS);

    let patient_history = cli
        .patient_history
        .clone()
        .or_else(|| env.patient_history.clone())
        .or_else(|| file.patient_history.clone())
        .unwrap_or_default();

    Ok(EffectiveSettings {
        endpoint,
        timeout: Duration::from_secs(timeout_secs),
        patient_history,
    })
}

/// Loads every layer and resolves them. `config` is optional; a missing flag means no file layer.
pub fn load(config: Option<&Path>, cli: &SettingsLayer) -> Result<EffectiveSettings, ConfigError> {
    let file = match config {
        Some(path) => SettingsLayer::from_file(path)?,
        None => SettingsLayer::default(),
    };
    let env = SettingsLayer::from_env()?;
    resolve_effective_settings(&file, &env, cli)
}

fn parse_endpoint(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim()).map_err(|e| ConfigError::Endpoint(raw.to_string(), e))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::Scheme(other.to_string())),
    }
}
