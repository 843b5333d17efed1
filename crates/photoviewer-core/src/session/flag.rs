//! The volatile "session active" flag.
//!
//! The flag lives only in process memory. It starts `false` when the process
//! starts and, once raised, stays raised until the process exits. A stored
//! token seen together with a lowered flag therefore means the process that
//! logged in is gone.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, error};

/// Read/raise access to the session flag.
pub trait SessionFlag: Send + Sync {
    fn is_session_active(&self) -> bool;
    fn set_session_active(&self, active: bool);

    /// Claim the single launch check allowed for the process that owns this
    /// flag. Returns `false` if it was already claimed.
    fn claim_validation(&self) -> bool;
}

static SESSION_ACTIVE: AtomicBool = AtomicBool::new(false);
static SESSION_VALIDATED: AtomicBool = AtomicBool::new(false);

/// Handle to the one flag owned by this process.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessSessionFlag;

impl ProcessSessionFlag {
    pub fn new() -> Self {
        Self
    }
}

impl SessionFlag for ProcessSessionFlag {
    fn is_session_active(&self) -> bool {
        SESSION_ACTIVE.load(Ordering::SeqCst)
    }

    fn set_session_active(&self, active: bool) {
        raise_only(&SESSION_ACTIVE, active);
    }

    fn claim_validation(&self) -> bool {
        claim_once(&SESSION_VALIDATED)
    }
}

/// Raise `flag` when `active` is true. Lowering a raised flag is a defect: it
/// is reported and ignored.
fn raise_only(flag: &AtomicBool, active: bool) {
    if active {
        let was = flag.swap(true, Ordering::SeqCst);
        debug!(was_active = was, "Session flag raised");
    } else if flag.load(Ordering::SeqCst) {
        error!("Attempt to lower the session flag within a live process ignored");
    }
}

fn claim_once(latch: &AtomicBool) -> bool {
    !latch.swap(true, Ordering::SeqCst)
}

/// Free-standing flag for tests and embedders that drive the lifecycle by hand.
/// Unlike the process flag it can be created in either state, which is how a
/// fresh process is simulated.
#[derive(Debug, Default)]
pub struct InMemorySessionFlag {
    active: AtomicBool,
    validated: AtomicBool,
}

impl InMemorySessionFlag {
    pub fn new(active: bool) -> Self {
        Self {
            active: AtomicBool::new(active),
            validated: AtomicBool::new(false),
        }
    }
}

impl SessionFlag for InMemorySessionFlag {
    fn is_session_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn set_session_active(&self, active: bool) {
        raise_only(&self.active, active);
    }

    fn claim_validation(&self) -> bool {
        claim_once(&self.validated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_starts_lowered() {
        assert!(!InMemorySessionFlag::default().is_session_active());
    }

    #[test]
    fn test_flag_is_monotonic() {
        let flag = InMemorySessionFlag::new(false);

        flag.set_session_active(false);
        assert!(!flag.is_session_active());

        flag.set_session_active(true);
        assert!(flag.is_session_active());

        flag.set_session_active(false);
        assert!(flag.is_session_active());

        flag.set_session_active(true);
        assert!(flag.is_session_active());
    }

    #[test]
    fn test_validation_claimed_once_per_flag() {
        let flag = InMemorySessionFlag::new(true);
        assert!(flag.claim_validation());
        assert!(!flag.claim_validation());

        // A new flag stands for a new process.
        assert!(InMemorySessionFlag::new(false).claim_validation());
    }

    #[test]
    fn test_claim_once_latch() {
        let latch = AtomicBool::new(false);
        assert!(claim_once(&latch));
        assert!(!claim_once(&latch));
        assert!(latch.load(Ordering::SeqCst));
    }
}
