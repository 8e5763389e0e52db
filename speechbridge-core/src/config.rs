//! Plugin configuration (JSON file plus environment overrides).
//!
//! Resolution order:
//! 1. `SPEECHBRIDGE_CONFIG` or the platform data directory for the file;
//! 2. defaults for anything the file does not set (or if it is unreadable);
//! 3. `SPEECHBRIDGE_*` environment variables on top.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{BridgeError, Result};

pub const CONFIG_PATH_ENV: &str = "SPEECHBRIDGE_CONFIG";
pub const SUBSCRIPTION_KEY_ENV: &str = "SPEECHBRIDGE_SUBSCRIPTION_KEY";
pub const REGION_ENV: &str = "SPEECHBRIDGE_REGION";
pub const ENDPOINT_ENV: &str = "SPEECHBRIDGE_ENDPOINT";
pub const LANGUAGE_ENV: &str = "SPEECHBRIDGE_LANGUAGE";

const CONFIG_FILE_NAME: &str = "speechbridge.json";
const DEFAULT_LANGUAGE: &str = "en-US";
const DEFAULT_LOG_FILTER: &str = "speechbridge=info";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct BridgeConfig {
    pub recognizer: RecognizerConfig,
    /// Route every callback through this single host script function as
    /// `relay(callbackName, payload)` instead of invoking callbacks by name.
    pub relay_function: Option<String>,
    /// `tracing` filter directive used when `SPEECHBRIDGE_LOG` is unset.
    pub log_filter: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            recognizer: RecognizerConfig::default(),
            relay_function: None,
            log_filter: DEFAULT_LOG_FILTER.into(),
        }
    }
}

/// Endpoint/credential pair for the recognition service.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct RecognizerConfig {
    pub subscription_key: String,
    pub region: String,
    /// Explicit service endpoint; overrides the region-derived one.
    pub endpoint: Option<String>,
    pub language: String,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            subscription_key: String::new(),
            region: String::new(),
            endpoint: None,
            language: DEFAULT_LANGUAGE.into(),
        }
    }
}

// The key never reaches logs.
impl std::fmt::Debug for RecognizerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecognizerConfig")
            .field("has_subscription_key", &!self.subscription_key.is_empty())
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("language", &self.language)
            .finish()
    }
}

impl RecognizerConfig {
    /// # Errors
    /// `InvalidConfig` when the key is missing, when neither a region nor an
    /// endpoint is given, or when the endpoint is not a `wss://`/`https://` URL.
    pub fn validate(&self) -> Result<()> {
        if self.subscription_key.trim().is_empty() {
            return Err(BridgeError::InvalidConfig(
                "recognizer subscription key is not set".into(),
            ));
        }
        match &self.endpoint {
            Some(endpoint) => {
                if !(endpoint.starts_with("wss://") || endpoint.starts_with("https://")) {
                    return Err(BridgeError::InvalidConfig(format!(
                        "recognizer endpoint must be a wss:// or https:// URL, got '{endpoint}'"
                    )));
                }
            }
            None if self.region.trim().is_empty() => {
                return Err(BridgeError::InvalidConfig(
                    "recognizer region is not set and no endpoint was given".into(),
                ));
            }
            None => {}
        }
        Ok(())
    }

    pub fn resolved_endpoint(&self) -> String {
        self.endpoint.clone().unwrap_or_else(|| {
            format!(
                "wss://{}.stt.speech.microsoft.com/speech/recognition/conversation/cognitiveservices/v1",
                self.region
            )
        })
    }
}

impl BridgeConfig {
    pub fn normalize(&mut self) {
        let recognizer = &mut self.recognizer;
        recognizer.subscription_key = recognizer.subscription_key.trim().to_string();
        recognizer.region = recognizer.region.trim().to_ascii_lowercase();
        recognizer.endpoint = trimmed_non_empty(recognizer.endpoint.as_deref());
        recognizer.language = trimmed_non_empty(Some(&recognizer.language))
            .unwrap_or_else(|| DEFAULT_LANGUAGE.into());
        self.relay_function = trimmed_non_empty(self.relay_function.as_deref());
        self.log_filter =
            trimmed_non_empty(Some(&self.log_filter)).unwrap_or_else(|| DEFAULT_LOG_FILTER.into());
    }

    /// Overlay values from `lookup` (normally the process environment).
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup(SUBSCRIPTION_KEY_ENV) {
            self.recognizer.subscription_key = key;
        }
        if let Some(region) = lookup(REGION_ENV) {
            self.recognizer.region = region;
        }
        if let Some(endpoint) = lookup(ENDPOINT_ENV) {
            self.recognizer.endpoint = Some(endpoint);
        }
        if let Some(language) = lookup(LANGUAGE_ENV) {
            self.recognizer.language = language;
        }
    }
}

fn trimmed_non_empty(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

pub fn default_config_path() -> PathBuf {
    if let Some(path) = std::env::var_os(CONFIG_PATH_ENV) {
        return PathBuf::from(path);
    }
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("SpeechBridge")
            .join(CONFIG_FILE_NAME)
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var_os("XDG_DATA_HOME")
            .map(PathBuf::from)
            .or_else(|| {
                std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".local/share"))
            })
            .unwrap_or_else(|| PathBuf::from("."))
            .join("speechbridge")
            .join(CONFIG_FILE_NAME)
    }
}

/// Read `path`, falling back to defaults when it is missing or malformed.
pub fn load_config(path: &Path) -> BridgeConfig {
    let mut config = match fs::read_to_string(path) {
        Ok(raw) => match serde_json::from_str::<BridgeConfig>(&raw) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = ?path, "config file is malformed, using defaults: {e}");
                BridgeConfig::default()
            }
        },
        Err(_) => BridgeConfig::default(),
    };
    config.normalize();
    config
}

/// [`load_config`] from [`default_config_path`] with environment overrides.
pub fn load_effective_config() -> BridgeConfig {
    let mut config = load_config(&default_config_path());
    config.apply_overrides(|name| std::env::var(name).ok());
    config.normalize();
    config
}
