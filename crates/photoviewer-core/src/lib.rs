//! PhotoViewer core - session lifecycle, encrypted credential storage and the
//! REST client for the photo backend.
//!
//! Startup order matters: build an [`App`] with [`App::launch`], which opens
//! the credential store and runs the session check, before deciding which
//! screen to show.

pub mod api;
pub mod app;
pub mod auth;
pub mod config;
pub mod models;
pub mod session;
pub mod store;

pub use app::{App, Route};
pub use config::Config;
