//! Application configuration management.
//!
//! This module handles loading and saving the application configuration:
//! the backend URL, request timeout, data directory and where the credential
//! store key comes from.
//!
//! Configuration is stored at `~/.config/photoviewer/config.json`. Missing
//! fields take their defaults; a few environment variables override the file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::store::{KeyProvider, KeyringKeyProvider, PassphraseKeyProvider};

/// Application name used for config/data directory paths
const APP_NAME: &str = "photoviewer";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Salt file for passphrase-derived store keys
const SALT_FILE: &str = "credentials.salt";

const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:8000";

/// HTTP request timeout in seconds.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

pub const ENV_API_URL: &str = "PHOTOVIEWER_API_URL";
pub const ENV_DATA_DIR: &str = "PHOTOVIEWER_DATA_DIR";
pub const ENV_KEY_SOURCE: &str = "PHOTOVIEWER_KEY_SOURCE";
pub const ENV_STORE_PASSPHRASE: &str = "PHOTOVIEWER_STORE_PASSPHRASE";

/// Where the credential store key comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum KeySource {
    /// OS keychain
    #[default]
    Keyring,
    /// Argon2id over `PHOTOVIEWER_STORE_PASSPHRASE`
    Passphrase,
}

impl KeySource {
    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keyring" => Some(KeySource::Keyring),
            "passphrase" => Some(KeySource::Passphrase),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    pub data_dir: Option<PathBuf>,
    pub key_source: KeySource,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            data_dir: None,
            key_source: KeySource::default(),
        }
    }
}

impl Config {
    /// Load from the default location, falling back to defaults if absent
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Apply `PHOTOVIEWER_*` environment overrides
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.trim().is_empty()) {
            self.api_base_url = url.trim().to_string();
        }
        if let Some(dir) = lookup(ENV_DATA_DIR).filter(|v| !v.trim().is_empty()) {
            self.data_dir = Some(PathBuf::from(dir));
        }
        if let Some(source) = lookup(ENV_KEY_SOURCE).as_deref().and_then(KeySource::parse) {
            self.key_source = source;
        }
    }

    /// Directory holding the encrypted credential store
    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.data_dir {
            return Ok(dir.clone());
        }
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    /// Build the key provider selected by `key_source`
    pub fn key_provider(&self) -> Result<Box<dyn KeyProvider>> {
        match self.key_source {
            KeySource::Keyring => Ok(Box::new(KeyringKeyProvider::new())),
            KeySource::Passphrase => {
                let passphrase = std::env::var(ENV_STORE_PASSPHRASE).with_context(|| {
                    format!("{} must be set when key_source is \"passphrase\"", ENV_STORE_PASSPHRASE)
                })?;
                let salt_path = self.data_dir()?.join(SALT_FILE);
                Ok(Box::new(PassphraseKeyProvider::new(passphrase, salt_path)))
            }
        }
    }
}
