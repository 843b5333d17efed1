use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    /// The key facility could not produce the key, or existing data could
    /// not be decrypted with it. Fatal at startup.
    #[error("Secure storage initialization failed: {0}")]
    SecurityInitialization(String),

    #[error("Failed to encrypt credential record: {0}")]
    Encryption(String),

    #[error("Credential store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid credential record: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, StoreError::SecurityInitialization(_))
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
