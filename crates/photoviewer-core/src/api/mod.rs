//! REST API client module for the photo backend.
//!
//! This module provides the `ApiClient` for logging in and for managing
//! posts. Authenticated requests carry an `Authorization: Token <token>`
//! header.

pub mod client;
pub mod error;

pub use client::ApiClient;
pub use error::ApiError;
