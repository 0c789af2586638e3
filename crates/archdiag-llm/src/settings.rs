use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub const DEFAULT_PROVIDER: &str = "ollama";
pub const DEFAULT_MODEL: &str = "mistral:7b-instruct";
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

pub const ENV_PROVIDER: &str = "ARCHDIAG_LLM_PROVIDER";
pub const ENV_MODEL: &str = "ARCHDIAG_LLM_MODEL";
pub const ENV_API_KEY: &str = "ARCHDIAG_LLM_API_KEY";
pub const ENV_BASE_URL: &str = "ARCHDIAG_LLM_BASE_URL";
pub const ENV_TIMEOUT_SECS: &str = "ARCHDIAG_LLM_TIMEOUT_SECS";

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("cannot locate home directory")]
    NoHomeDir,
    #[error("settings io: {0}")]
    Io(#[from] std::io::Error),
    #[error("settings json: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AiSettings {
    pub provider: String,
    pub api_key: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    pub timeout_secs: u64,
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            provider: DEFAULT_PROVIDER.to_string(),
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            base_url: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl AiSettings {
    /// Settings file merged with `ARCHDIAG_LLM_*` environment variables.
    pub fn load() -> Result<Self, SettingsError> {
        Ok(read_settings()?.apply_overrides(|key| std::env::var(key).ok()))
    }

    /// Overlay non-empty values returned by `lookup` for the `ARCHDIAG_LLM_*` keys.
    pub fn apply_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(provider) = get(ENV_PROVIDER) {
            self.provider = provider.to_lowercase();
        }
        if let Some(model) = get(ENV_MODEL) {
            self.model = model;
        }
        if let Some(key) = get(ENV_API_KEY) {
            self.api_key = key;
        }
        if let Some(url) = get(ENV_BASE_URL) {
            self.base_url = Some(url);
        }
        if let Some(raw) = get(ENV_TIMEOUT_SECS) {
            match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => self.timeout_secs = secs,
                _ => tracing::warn!(value = %raw, "ignoring invalid {}", ENV_TIMEOUT_SECS),
            }
        }
        self
    }

    pub fn ai_configured(&self) -> bool {
        !self.provider.is_empty()
            && !self.model.is_empty()
            && (self.provider == "ollama" || !self.api_key.is_empty())
    }

    /// API key with everything but the last four characters hidden.
    pub fn masked_api_key(&self) -> String {
        let chars: Vec<char> = self.api_key.chars().collect();
        match chars.len() {
            0 => String::new(),
            n if n <= 4 => "*".repeat(n),
            n => {
                let tail: String = chars[n - 4..].iter().collect();
                format!("{}{}", "*".repeat(n - 4), tail)
            }
        }
    }
}

pub fn config_dir() -> Result<PathBuf, SettingsError> {
    dirs::home_dir()
        .map(|home| home.join(".archdiag"))
        .ok_or(SettingsError::NoHomeDir)
}

pub fn settings_path() -> Result<PathBuf, SettingsError> {
    Ok(config_dir()?.join("settings.json"))
}

pub fn read_settings() -> Result<AiSettings, SettingsError> {
    read_settings_from(&settings_path()?)
}

pub fn write_settings(settings: &AiSettings) -> Result<PathBuf, SettingsError> {
    let path = settings_path()?;
    write_settings_to(&path, settings)?;
    Ok(path)
}

/// Missing file means defaults.
pub fn read_settings_from(path: &Path) -> Result<AiSettings, SettingsError> {
    if !path.exists() {
        return Ok(AiSettings::default());
    }
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

pub fn write_settings_to(path: &Path, settings: &AiSettings) -> Result<(), SettingsError> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let json = serde_json::to_string_pretty(settings)?;
    fs::write(path, json)?;
    Ok(())
}
