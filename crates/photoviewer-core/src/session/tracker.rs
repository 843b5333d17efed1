use std::sync::{Arc, Mutex};

use tracing::{debug, error, warn};

use super::clock::Clock;
use super::error::SessionError;
use super::flag::SessionFlag;
use crate::store::CredentialStore;

/// Counts started UI surfaces (screens).
///
/// Every start raises the session flag. The last stop stamps the current
/// time into the credential store as the last-active time; the flag is left
/// raised so that only a process restart can lower it.
pub struct ForegroundTracker {
    count: Mutex<u32>,
    store: Arc<CredentialStore>,
    flag: Arc<dyn SessionFlag>,
    clock: Arc<dyn Clock>,
}

impl ForegroundTracker {
    pub fn new(
        store: Arc<CredentialStore>,
        flag: Arc<dyn SessionFlag>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            count: Mutex::new(0),
            store,
            flag,
            clock,
        }
    }

    pub fn surface_started(&self, surface: &str) {
        let mut count = self.count.lock().unwrap_or_else(|p| p.into_inner());
        *count += 1;
        debug!(surface, active_count = *count, "Surface started");

        // Raised on every start, not only the first.
        self.mark_active();
    }

    pub fn surface_stopped(&self, surface: &str) -> Result<(), SessionError> {
        let mut count = self.count.lock().unwrap_or_else(|p| p.into_inner());
        if *count == 0 {
            error!(surface, "Surface stopped with no active surfaces");
            return Err(SessionError::ForegroundUnderflow(surface.to_string()));
        }

        *count -= 1;
        debug!(surface, active_count = *count, "Surface stopped");

        if *count == 0 {
            let now = self.clock.now_ms();
            self.store.set_last_active_time(now)?;
            debug!(
                last_active_time = now,
                session_active = self.flag.is_session_active(),
                "All surfaces stopped, last active time saved"
            );
        }
        Ok(())
    }

    /// Raise the session flag. Login goes through here as well as surface starts.
    pub fn mark_active(&self) {
        self.flag.set_session_active(true);
    }

    pub fn active_surfaces(&self) -> u32 {
        *self.count.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Start `surface` and stop it again when the returned guard is dropped
    pub fn enter(self: &Arc<Self>, surface: impl Into<String>) -> SurfaceGuard {
        let surface = surface.into();
        self.surface_started(&surface);
        SurfaceGuard {
            tracker: Arc::clone(self),
            surface,
        }
    }
}

/// A started surface; stops it on drop.
pub struct SurfaceGuard {
    tracker: Arc<ForegroundTracker>,
    surface: String,
}

impl SurfaceGuard {
    pub fn surface(&self) -> &str {
        &self.surface
    }
}

impl Drop for SurfaceGuard {
    fn drop(&mut self) {
        if let Err(e) = self.tracker.surface_stopped(&self.surface) {
            warn!(surface = %self.surface, error = %e, "Failed to record surface stop");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::clock::ManualClock;
    use crate::session::flag::InMemorySessionFlag;
    use crate::store::{StaticKeyProvider, StoreKey};

    struct Fixture {
        _dir: tempfile::TempDir,
        store: Arc<CredentialStore>,
        flag: Arc<InMemorySessionFlag>,
        clock: Arc<ManualClock>,
        tracker: Arc<ForegroundTracker>,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let keys = StaticKeyProvider::new(StoreKey::from_bytes([5u8; 32]));
        let store = Arc::new(CredentialStore::open(dir.path(), &keys).unwrap());
        let flag = Arc::new(InMemorySessionFlag::new(false));
        let clock = Arc::new(ManualClock::new(1_000));
        let tracker = Arc::new(ForegroundTracker::new(
            store.clone(),
            flag.clone(),
            clock.clone(),
        ));
        Fixture {
            _dir: dir,
            store,
            flag,
            clock,
            tracker,
        }
    }

    #[test]
    fn test_start_raises_flag() {
        let f = fixture();
        f.tracker.surface_started("login");
        assert!(f.flag.is_session_active());
        assert_eq!(f.tracker.active_surfaces(), 1);
    }

    #[test]
    fn test_last_stop_stamps_time_and_keeps_flag() {
        let f = fixture();
        f.tracker.surface_started("feed");
        f.tracker.surface_started("detail");

        f.clock.set(5_000);
        f.tracker.surface_stopped("detail").unwrap();
        assert!(!f.store.has_session_data());

        f.clock.set(9_000);
        f.tracker.surface_stopped("feed").unwrap();
        assert_eq!(f.store.get_last_active_time(), 9_000);
        assert!(f.flag.is_session_active());
        assert_eq!(f.tracker.active_surfaces(), 0);
    }

    #[test]
    fn test_stop_without_start_is_reported() {
        let f = fixture();
        let err = f.tracker.surface_stopped("feed").unwrap_err();
        assert!(matches!(err, SessionError::ForegroundUnderflow(_)));
        assert!(err.is_invariant_violation());
        assert_eq!(f.tracker.active_surfaces(), 0);
        assert!(!f.store.has_session_data());
    }

    #[test]
    fn test_guard_stops_on_drop() {
        let f = fixture();
        {
            let guard = f.tracker.enter("feed");
            assert_eq!(guard.surface(), "feed");
            assert_eq!(f.tracker.active_surfaces(), 1);
            f.clock.advance_ms(250);
        }
        assert_eq!(f.tracker.active_surfaces(), 0);
        assert_eq!(f.store.get_last_active_time(), 1_250);
    }
}
