//! Authentication module: turning a username and password into a stored
//! session.
//!
//! This module provides:
//! - `Authenticator`: anything that can exchange credentials for a token
//! - `LoginFlow`: persists the token (and optionally the username) and marks
//!   the session active

pub mod flow;

pub use flow::{AuthError, Authenticator, LoginFlow};
