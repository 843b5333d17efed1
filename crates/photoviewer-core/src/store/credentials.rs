use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::cipher::{self, StoreKey};
use super::error::StoreResult;
use super::key::KeyProvider;

/// Encrypted credential file name in the data directory
pub const CREDENTIALS_FILE: &str = "credentials.bin";

/// Everything persisted by the store. Keys absent from the file read as `None`;
/// keys this version does not know about are carried through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CredentialRecord {
    #[serde(rename = "auth_token", default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    #[serde(rename = "remembered_username", default, skip_serializing_if = "Option::is_none")]
    pub remembered_username: Option<String>,

    #[serde(rename = "last_active_time", default, skip_serializing_if = "Option::is_none")]
    pub last_active_time_ms: Option<i64>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl CredentialRecord {
    fn clear_session_fields(&mut self) {
        self.token = None;
        self.remembered_username = None;
        self.last_active_time_ms = None;
    }
}

/// A consistent read of the fields the launch check depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CredentialSnapshot {
    pub has_token: bool,
    pub has_last_active_time: bool,
    pub last_active_time_ms: i64,
}

impl CredentialSnapshot {
    pub fn has_session_data(&self) -> bool {
        self.has_last_active_time || self.has_token
    }
}

/// Durable, encrypted store for the auth token, remembered username and
/// last-active timestamp.
///
/// Every mutating call has hit the disk before it returns. The in-memory copy
/// is only replaced after the write succeeds, so a failed write is invisible.
pub struct CredentialStore {
    path: PathBuf,
    key: StoreKey,
    record: Mutex<CredentialRecord>,
}

impl CredentialStore {
    /// Open (or create) the store in `data_dir`.
    ///
    /// Fails with `StoreError::SecurityInitialization` when the key cannot be
    /// obtained or the existing file does not decrypt under it.
    pub fn open(data_dir: &Path, keys: &dyn KeyProvider) -> StoreResult<Self> {
        let key = keys.load_or_create_key()?;
        fs::create_dir_all(data_dir)?;

        let path = data_dir.join(CREDENTIALS_FILE);
        let record = if path.exists() {
            let sealed = fs::read(&path)?;
            let plaintext = cipher::open(&key, &sealed)?;
            serde_json::from_slice(&plaintext)?
        } else {
            CredentialRecord::default()
        };

        debug!(
            path = ?path,
            has_token = record.token.is_some(),
            last_active_time = ?record.last_active_time_ms,
            "Credential store opened"
        );

        Ok(Self {
            path,
            key,
            record: Mutex::new(record),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // ===== Token =====

    pub fn save_token(&self, token: &str) -> StoreResult<()> {
        self.mutate(|r| r.token = Some(token.to_string()))
    }

    pub fn get_token(&self) -> Option<String> {
        self.lock().token.clone()
    }

    pub fn has_token(&self) -> bool {
        self.lock().token.is_some()
    }

    pub fn delete_token(&self) -> StoreResult<()> {
        self.mutate(|r| r.token = None)
    }

    // ===== Remembered username =====

    pub fn save_username(&self, username: &str) -> StoreResult<()> {
        self.mutate(|r| r.remembered_username = Some(username.to_string()))
    }

    /// Remembered username, or an empty string when none is stored
    pub fn get_username(&self) -> String {
        self.lock().remembered_username.clone().unwrap_or_default()
    }

    pub fn delete_username(&self) -> StoreResult<()> {
        self.mutate(|r| r.remembered_username = None)
    }

    // ===== Last active time =====

    pub fn set_last_active_time(&self, timestamp_ms: i64) -> StoreResult<()> {
        self.mutate(|r| r.last_active_time_ms = Some(timestamp_ms))
    }

    /// Epoch milliseconds of the last transition to zero foreground surfaces, 0 if never
    pub fn get_last_active_time(&self) -> i64 {
        self.lock().last_active_time_ms.unwrap_or(0)
    }

    // ===== Session =====

    pub fn has_session_data(&self) -> bool {
        self.snapshot().has_session_data()
    }

    pub fn snapshot(&self) -> CredentialSnapshot {
        let record = self.lock();
        CredentialSnapshot {
            has_token: record.token.is_some(),
            has_last_active_time: record.last_active_time_ms.is_some(),
            last_active_time_ms: record.last_active_time_ms.unwrap_or(0),
        }
    }

    /// Remove token, remembered username and last-active time in one write.
    /// Other keys are left alone.
    pub fn clear_session(&self) -> StoreResult<()> {
        debug!(
            last_active_time = self.get_last_active_time(),
            has_token = self.has_token(),
            "Clearing session"
        );
        self.mutate(CredentialRecord::clear_session_fields)?;
        info!("Session cleared");
        Ok(())
    }

    /// Remove every key in the store
    pub fn clear_all(&self) -> StoreResult<()> {
        self.mutate(|r| *r = CredentialRecord::default())?;
        info!("Credential store wiped");
        Ok(())
    }

    // ===== Persistence =====

    fn lock(&self) -> MutexGuard<'_, CredentialRecord> {
        self.record.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn mutate(&self, f: impl FnOnce(&mut CredentialRecord)) -> StoreResult<()> {
        let mut current = self.lock();
        let mut next = current.clone();
        f(&mut next);

        if next == *current {
            return Ok(());
        }

        self.persist(&next)?;
        *current = next;
        Ok(())
    }

    fn persist(&self, record: &CredentialRecord) -> StoreResult<()> {
        let plaintext = serde_json::to_vec(record)?;
        let sealed = cipher::seal(&self.key, &plaintext)?;

        let tmp_path = self.path.with_extension("tmp");
        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(&sealed)?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;
        sync_dir(&self.path)?;
        Ok(())
    }
}

/// Flush the directory entry so the rename itself survives a crash
#[cfg(unix)]
fn sync_dir(path: &Path) -> StoreResult<()> {
    if let Some(dir) = path.parent() {
        File::open(dir)?.sync_all()?;
    }
    Ok(())
}

// No directory handles to flush on this platform.
#[cfg(not(unix))]
fn sync_dir(_path: &Path) -> StoreResult<()> {
    Ok(())
}
