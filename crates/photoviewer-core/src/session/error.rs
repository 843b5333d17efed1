use thiserror::Error;

use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Surface '{0}' stopped while no surface was active")]
    ForegroundUnderflow(String),

    #[error("Session already validated for this launch")]
    AlreadyValidated,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SessionError {
    /// True for errors that indicate a programming defect rather than an
    /// environmental failure
    pub fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            SessionError::ForegroundUnderflow(_) | SessionError::AlreadyValidated
        )
    }
}
