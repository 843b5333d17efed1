//! Session lifecycle: the volatile session flag, foreground tracking and the
//! launch-time validity check.
//!
//! A stored token is reused only when the process that obtained it is still
//! alive (session flag raised) and the app has not been out of the
//! foreground for more than [`SESSION_TIMEOUT_MS`].

pub mod clock;
pub mod error;
pub mod flag;
pub mod tracker;
pub mod validator;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::SessionError;
pub use flag::{InMemorySessionFlag, ProcessSessionFlag, SessionFlag};
pub use tracker::{ForegroundTracker, SurfaceGuard};
pub use validator::{evaluate, SessionAction, SessionValidator, SessionVerdict, SESSION_TIMEOUT_MS};
