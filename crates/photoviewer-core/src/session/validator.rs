//! Launch-time check that decides whether a stored token may be reused.

use std::sync::Arc;

use tracing::{debug, error, info};

use super::clock::Clock;
use super::error::SessionError;
use super::flag::SessionFlag;
use crate::store::{CredentialSnapshot, CredentialStore};

/// Inactivity allowed before a stored session is discarded (10 minutes)
pub const SESSION_TIMEOUT_MS: i64 = 600_000;

/// What the launch check concluded about the stored session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionVerdict {
    /// Neither a token nor a last-active time is stored
    NoSession,
    /// A token exists but the session flag is down: the process that held it died
    ProcessDeath,
    /// The app sat with no foreground surface for longer than the timeout
    TimedOut { elapsed_ms: i64 },
    /// Session may be kept
    Valid { elapsed_ms: i64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionAction {
    Clear,
    Keep,
}

impl SessionVerdict {
    pub fn action(&self) -> SessionAction {
        match self {
            SessionVerdict::ProcessDeath | SessionVerdict::TimedOut { .. } => SessionAction::Clear,
            SessionVerdict::NoSession | SessionVerdict::Valid { .. } => SessionAction::Keep,
        }
    }
}

/// Decide what to do with the stored session.
///
/// Process death is checked first and short-circuits: the timeout is not
/// evaluated when the flag already proves a restart.
pub fn evaluate(snapshot: &CredentialSnapshot, session_active: bool, now_ms: i64) -> SessionVerdict {
    if !snapshot.has_session_data() {
        return SessionVerdict::NoSession;
    }

    if snapshot.has_token && !session_active {
        return SessionVerdict::ProcessDeath;
    }

    let elapsed_ms = now_ms.saturating_sub(snapshot.last_active_time_ms);
    if elapsed_ms > SESSION_TIMEOUT_MS {
        SessionVerdict::TimedOut { elapsed_ms }
    } else {
        SessionVerdict::Valid { elapsed_ms }
    }
}

/// Applies [`evaluate`] to the live store, once per process.
///
/// The once-only latch lives with the session flag, so a second validator
/// built over the same flag is refused as well.
pub struct SessionValidator {
    store: Arc<CredentialStore>,
    flag: Arc<dyn SessionFlag>,
    clock: Arc<dyn Clock>,
}

impl SessionValidator {
    pub fn new(
        store: Arc<CredentialStore>,
        flag: Arc<dyn SessionFlag>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            flag,
            clock,
        }
    }

    /// Run the launch check. Must complete before any routing decision; any
    /// clear it performs is durable when this returns.
    pub fn validate_on_launch(&self) -> Result<SessionVerdict, SessionError> {
        if !self.flag.claim_validation() {
            error!("Session validation requested twice in one launch");
            return Err(SessionError::AlreadyValidated);
        }

        let snapshot = self.store.snapshot();
        let session_active = self.flag.is_session_active();
        let now_ms = self.clock.now_ms();
        debug!(?snapshot, session_active, now_ms, "Checking session validity");

        let verdict = evaluate(&snapshot, session_active, now_ms);
        match verdict {
            SessionVerdict::NoSession => {
                debug!("No session data - first launch or already cleared");
            }
            SessionVerdict::ProcessDeath => {
                info!("Process death detected (token present, session flag down) - clearing session");
            }
            SessionVerdict::TimedOut { elapsed_ms } => {
                info!(elapsed_secs = elapsed_ms / 1000, "Inactivity timeout exceeded - clearing session");
            }
            SessionVerdict::Valid { elapsed_ms } => {
                debug!(elapsed_secs = elapsed_ms / 1000, "Session still valid");
            }
        }

        if verdict.action() == SessionAction::Clear {
            self.store.clear_session()?;
        }
        Ok(verdict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::clock::ManualClock;
    use crate::session::flag::InMemorySessionFlag;
    use crate::store::{StaticKeyProvider, StoreKey};

    const NOW: i64 = 1_700_000_000_000;

    fn snapshot(has_token: bool, last_active: Option<i64>) -> CredentialSnapshot {
        CredentialSnapshot {
            has_token,
            has_last_active_time: last_active.is_some(),
            last_active_time_ms: last_active.unwrap_or(0),
        }
    }

    #[test]
    fn test_evaluate_no_data() {
        assert_eq!(evaluate(&snapshot(false, None), false, NOW), SessionVerdict::NoSession);
        assert_eq!(evaluate(&snapshot(false, None), true, NOW), SessionVerdict::NoSession);
    }

    #[test]
    fn test_evaluate_process_death_ignores_timestamp() {
        for last_active in [None, Some(NOW), Some(NOW - 1), Some(0)] {
            assert_eq!(
                evaluate(&snapshot(true, last_active), false, NOW),
                SessionVerdict::ProcessDeath
            );
        }
    }

    #[test]
    fn test_evaluate_timeout_boundary() {
        let at_limit = snapshot(false, Some(NOW - SESSION_TIMEOUT_MS));
        assert_eq!(
            evaluate(&at_limit, false, NOW),
            SessionVerdict::Valid { elapsed_ms: SESSION_TIMEOUT_MS }
        );

        let past_limit = snapshot(false, Some(NOW - SESSION_TIMEOUT_MS - 1));
        assert_eq!(
            evaluate(&past_limit, true, NOW),
            SessionVerdict::TimedOut { elapsed_ms: SESSION_TIMEOUT_MS + 1 }
        );
    }

    #[test]
    fn test_evaluate_live_token() {
        let recent = snapshot(true, Some(NOW - 5 * 60 * 1000));
        assert_eq!(evaluate(&recent, true, NOW).action(), SessionAction::Keep);

        let stale = snapshot(true, Some(NOW - 15 * 60 * 1000));
        assert_eq!(evaluate(&stale, true, NOW).action(), SessionAction::Clear);
    }

    #[test]
    fn test_evaluate_extreme_timestamps_do_not_overflow() {
        let ancient = CredentialSnapshot {
            has_token: true,
            has_last_active_time: true,
            last_active_time_ms: i64::MIN,
        };
        assert_eq!(
            evaluate(&ancient, true, NOW),
            SessionVerdict::TimedOut { elapsed_ms: i64::MAX }
        );

        let from_future = CredentialSnapshot {
            last_active_time_ms: i64::MAX,
            ..ancient
        };
        assert_eq!(
            evaluate(&from_future, true, i64::MIN),
            SessionVerdict::Valid { elapsed_ms: i64::MIN }
        );
    }

    #[test]
    fn test_evaluate_token_without_timestamp_times_out() {
        // A token with no stamp reads as last active at the epoch.
        assert!(matches!(
            evaluate(&snapshot(true, None), true, NOW),
            SessionVerdict::TimedOut { .. }
        ));
    }

    fn validator_with(
        seed: impl FnOnce(&CredentialStore),
        session_active: bool,
    ) -> (tempfile::TempDir, Arc<CredentialStore>, SessionValidator) {
        let dir = tempfile::tempdir().unwrap();
        let keys = StaticKeyProvider::new(StoreKey::from_bytes([4u8; 32]));
        let store = Arc::new(CredentialStore::open(dir.path(), &keys).unwrap());
        seed(&store);
        let validator = SessionValidator::new(
            store.clone(),
            Arc::new(InMemorySessionFlag::new(session_active)),
            Arc::new(ManualClock::new(NOW)),
        );
        (dir, store, validator)
    }

    #[test]
    fn test_validate_empty_store_writes_nothing() {
        let (_dir, store, validator) = validator_with(|_| {}, false);
        assert_eq!(validator.validate_on_launch().unwrap(), SessionVerdict::NoSession);
        assert!(!store.path().exists());
    }

    #[test]
    fn test_validate_process_death_clears_everything() {
        let (_dir, store, validator) = validator_with(
            |s| {
                s.save_token("abc").unwrap();
                s.save_username("alice").unwrap();
                s.set_last_active_time(NOW - 1_000).unwrap();
            },
            false,
        );

        assert_eq!(validator.validate_on_launch().unwrap(), SessionVerdict::ProcessDeath);
        assert!(!store.has_token());
        assert!(!store.has_session_data());
        assert_eq!(store.get_username(), "");
    }

    #[test]
    fn test_validate_recent_timestamp_without_token_untouched() {
        let (_dir, store, validator) = validator_with(
            |s| s.set_last_active_time(NOW - 60_000).unwrap(),
            false,
        );
        assert_eq!(
            validator.validate_on_launch().unwrap(),
            SessionVerdict::Valid { elapsed_ms: 60_000 }
        );
        assert_eq!(store.get_last_active_time(), NOW - 60_000);
    }

    #[test]
    fn test_validate_runs_once() {
        let (_dir, _store, validator) = validator_with(|_| {}, true);
        validator.validate_on_launch().unwrap();
        let err = validator.validate_on_launch().unwrap_err();
        assert!(matches!(err, SessionError::AlreadyValidated));
    }

    #[test]
    fn test_second_validator_over_same_flag_refused() {
        let dir = tempfile::tempdir().unwrap();
        let keys = StaticKeyProvider::new(StoreKey::from_bytes([4u8; 32]));
        let store = Arc::new(CredentialStore::open(dir.path(), &keys).unwrap());
        let flag = Arc::new(InMemorySessionFlag::new(false));
        let clock = Arc::new(ManualClock::new(NOW));

        let first = SessionValidator::new(store.clone(), flag.clone(), clock.clone());
        first.validate_on_launch().unwrap();
        drop(first);

        let second = SessionValidator::new(store, flag, clock);
        assert!(matches!(
            second.validate_on_launch(),
            Err(SessionError::AlreadyValidated)
        ));
    }
}
