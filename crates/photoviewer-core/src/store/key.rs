//! Sources for the credential store's encryption key.

use std::path::PathBuf;

use argon2::Argon2;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use keyring::Entry;
use rand::rngs::OsRng;
use rand::RngCore;
use tracing::{debug, info};

use super::cipher::{StoreKey, KEY_LEN};
use super::error::{StoreError, StoreResult};

const SERVICE_NAME: &str = "photoviewer";

/// Keychain entry holding the base64-encoded store key
const KEY_ENTRY_NAME: &str = "credential-store-key";

const SALT_LEN: usize = 16;

/// A secure facility that can produce (creating on first use) the store key.
pub trait KeyProvider: Send + Sync {
    fn load_or_create_key(&self) -> StoreResult<StoreKey>;
}

/// Key kept in the OS keychain (Keychain, Credential Manager, Secret Service).
pub struct KeyringKeyProvider {
    service: String,
}

impl KeyringKeyProvider {
    pub fn new() -> Self {
        Self {
            service: SERVICE_NAME.to_string(),
        }
    }

    /// Use a different keychain service name (separate profiles, tests)
    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self) -> StoreResult<Entry> {
        Entry::new(&self.service, KEY_ENTRY_NAME).map_err(|e| {
            StoreError::SecurityInitialization(format!("Failed to create keyring entry: {}", e))
        })
    }
}

impl Default for KeyringKeyProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyProvider for KeyringKeyProvider {
    fn load_or_create_key(&self) -> StoreResult<StoreKey> {
        let entry = self.entry()?;

        match entry.get_password() {
            Ok(encoded) => {
                let bytes = STANDARD.decode(encoded.trim()).map_err(|e| {
                    StoreError::SecurityInitialization(format!("Keychain key is not valid base64: {}", e))
                })?;
                debug!(service = %self.service, "Loaded store key from keychain");
                StoreKey::from_slice(&bytes).ok_or_else(|| {
                    StoreError::SecurityInitialization(format!(
                        "Keychain key has length {}, expected {}",
                        bytes.len(),
                        KEY_LEN
                    ))
                })
            }
            Err(keyring::Error::NoEntry) => {
                let key = StoreKey::generate();
                entry.set_password(&STANDARD.encode(key.as_bytes())).map_err(|e| {
                    StoreError::SecurityInitialization(format!("Failed to store key in keychain: {}", e))
                })?;
                info!(service = %self.service, "Created new store key in keychain");
                Ok(key)
            }
            Err(e) => Err(StoreError::SecurityInitialization(format!(
                "Failed to read key from keychain: {}",
                e
            ))),
        }
    }
}

/// Key derived with Argon2id from a passphrase, for hosts without a keychain.
/// The salt is persisted beside the credential file.
pub struct PassphraseKeyProvider {
    passphrase: String,
    salt_path: PathBuf,
}

impl PassphraseKeyProvider {
    pub fn new(passphrase: impl Into<String>, salt_path: PathBuf) -> Self {
        Self {
            passphrase: passphrase.into(),
            salt_path,
        }
    }

    fn load_or_create_salt(&self) -> StoreResult<[u8; SALT_LEN]> {
        if self.salt_path.exists() {
            let bytes = std::fs::read(&self.salt_path).map_err(|e| {
                StoreError::SecurityInitialization(format!("Failed to read key salt: {}", e))
            })?;
            return bytes.as_slice().try_into().map_err(|_| {
                StoreError::SecurityInitialization(format!(
                    "Key salt has length {}, expected {}",
                    bytes.len(),
                    SALT_LEN
                ))
            });
        }

        let mut salt = [0u8; SALT_LEN];
        OsRng.fill_bytes(&mut salt);
        if let Some(parent) = self.salt_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.salt_path, salt)?;
        debug!(path = ?self.salt_path, "Created new key salt");
        Ok(salt)
    }
}

impl KeyProvider for PassphraseKeyProvider {
    fn load_or_create_key(&self) -> StoreResult<StoreKey> {
        if self.passphrase.is_empty() {
            return Err(StoreError::SecurityInitialization(
                "Store passphrase is empty".into(),
            ));
        }

        let salt = self.load_or_create_salt()?;
        let mut key = [0u8; KEY_LEN];
        Argon2::default()
            .hash_password_into(self.passphrase.as_bytes(), &salt, &mut key)
            .map_err(|e| StoreError::SecurityInitialization(format!("Key derivation failed: {}", e)))?;
        Ok(StoreKey::from_bytes(key))
    }
}

/// A fixed key supplied by the embedder.
pub struct StaticKeyProvider(StoreKey);

impl StaticKeyProvider {
    pub fn new(key: StoreKey) -> Self {
        Self(key)
    }
}

impl KeyProvider for StaticKeyProvider {
    fn load_or_create_key(&self) -> StoreResult<StoreKey> {
        Ok(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passphrase_key_is_stable_across_providers() {
        let dir = tempfile::tempdir().unwrap();
        let salt_path = dir.path().join("credentials.salt");

        let first = PassphraseKeyProvider::new("correct horse", salt_path.clone())
            .load_or_create_key()
            .unwrap();
        let second = PassphraseKeyProvider::new("correct horse", salt_path.clone())
            .load_or_create_key()
            .unwrap();
        assert_eq!(first, second);

        let other = PassphraseKeyProvider::new("battery staple", salt_path)
            .load_or_create_key()
            .unwrap();
        assert_ne!(first, other);
    }

    #[test]
    fn test_passphrase_rejects_empty_and_bad_salt() {
        let dir = tempfile::tempdir().unwrap();
        let salt_path = dir.path().join("credentials.salt");

        let err = PassphraseKeyProvider::new("", salt_path.clone())
            .load_or_create_key()
            .unwrap_err();
        assert!(err.is_fatal());

        std::fs::write(&salt_path, b"short").unwrap();
        let err = PassphraseKeyProvider::new("pw", salt_path)
            .load_or_create_key()
            .unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_static_provider_returns_its_key() {
        let key = StoreKey::from_bytes([3u8; KEY_LEN]);
        let provider = StaticKeyProvider::new(key.clone());
        assert_eq!(provider.load_or_create_key().unwrap(), key);
    }
}
