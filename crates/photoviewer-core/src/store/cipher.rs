//! Sealing of the credential file with XChaCha20-Poly1305.
//!
//! File layout: `MAGIC || nonce (24 bytes) || ciphertext + tag`.

use std::fmt;

use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use rand::rngs::OsRng;
use rand::RngCore;

use super::error::{StoreError, StoreResult};

/// Format marker at the start of every credential file
const MAGIC: &[u8; 5] = b"PVCS1";

pub const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 24;
const TAG_LEN: usize = 16;

/// 256-bit key protecting the credential file.
#[derive(Clone, PartialEq, Eq)]
pub struct StoreKey([u8; KEY_LEN]);

impl StoreKey {
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Build a key from a slice, rejecting anything that is not exactly 32 bytes
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let arr: [u8; KEY_LEN] = bytes.try_into().ok()?;
        Some(Self(arr))
    }

    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StoreKey(<redacted>)")
    }
}

/// Encrypt a plaintext record under a fresh random nonce
pub fn seal(key: &StoreKey, plaintext: &[u8]) -> StoreResult<Vec<u8>> {
    let cipher = XChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));

    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);

    let ciphertext = cipher
        .encrypt(XNonce::from_slice(&nonce_bytes), plaintext)
        .map_err(|e| StoreError::Encryption(e.to_string()))?;

    let mut out = Vec::with_capacity(MAGIC.len() + NONCE_LEN + ciphertext.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypt a sealed record.
///
/// Any failure here means the key no longer matches the data (or the file was
/// damaged), which callers must treat as a security initialization failure.
pub fn open(key: &StoreKey, sealed: &[u8]) -> StoreResult<Vec<u8>> {
    if sealed.len() < MAGIC.len() + NONCE_LEN + TAG_LEN {
        return Err(StoreError::SecurityInitialization(
            "credential file is truncated".into(),
        ));
    }
    if &sealed[..MAGIC.len()] != MAGIC {
        return Err(StoreError::SecurityInitialization(
            "credential file has an unknown format".into(),
        ));
    }

    let nonce = XNonce::from_slice(&sealed[MAGIC.len()..MAGIC.len() + NONCE_LEN]);
    let ciphertext = &sealed[MAGIC.len() + NONCE_LEN..];

    let cipher = XChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));
    cipher.decrypt(nonce, ciphertext).map_err(|_| {
        StoreError::SecurityInitialization(
            "stored credentials could not be decrypted - key invalidated?".into(),
        )
    })
}
