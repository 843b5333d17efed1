//! Encrypted persistence for login credentials.
//!
//! This module provides:
//! - `CredentialStore`: the token, remembered username and last-active time,
//!   sealed with XChaCha20-Poly1305 in a single file
//! - `KeyProvider`: where the store key comes from (OS keychain via keyring,
//!   or an Argon2id passphrase for hosts without one)

pub mod cipher;
pub mod credentials;
pub mod error;
pub mod key;

pub use cipher::StoreKey;
pub use credentials::{CredentialRecord, CredentialSnapshot, CredentialStore};
pub use error::{StoreError, StoreResult};
pub use key::{KeyProvider, KeyringKeyProvider, PassphraseKeyProvider, StaticKeyProvider};
