//! Application startup and shared state.
//!
//! `App::launch` opens the credential store, runs the session check and only
//! then lets the caller ask where to route. Nothing should read the stored
//! token before `launch` has returned.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::api::ApiClient;
use crate::auth::{AuthError, LoginFlow};
use crate::config::Config;
use crate::session::{Clock, ForegroundTracker, SessionFlag, SessionValidator, SessionVerdict};
use crate::store::{CredentialStore, KeyProvider};

/// First screen to show after launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Login,
    Feed,
}

pub struct App {
    pub config: Config,
    store: Arc<CredentialStore>,
    tracker: Arc<ForegroundTracker>,
    api: ApiClient,
    verdict: SessionVerdict,
}

impl App {
    /// Open the store, validate the stored session and build the API client.
    ///
    /// A store that cannot be opened (key unavailable, data undecryptable) is
    /// returned as an error; callers must abort rather than continue without it.
    pub fn launch(
        config: Config,
        keys: &dyn KeyProvider,
        flag: Arc<dyn SessionFlag>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let data_dir = config.data_dir()?;
        debug!(?data_dir, "Data directory configured");

        let store = Arc::new(
            CredentialStore::open(&data_dir, keys)
                .context("Secure credential storage is unavailable")?,
        );

        let validator = SessionValidator::new(store.clone(), flag.clone(), clock.clone());
        let verdict = validator
            .validate_on_launch()
            .context("Session validation failed")?;

        let tracker = Arc::new(ForegroundTracker::new(store.clone(), flag, clock));

        let mut api = ApiClient::new(&config.api_base_url, config.request_timeout_secs)?;
        if let Some(token) = store.get_token() {
            api.set_token(token);
            debug!("Token set on API client");
        }

        info!(?verdict, "Launch complete");
        Ok(Self {
            config,
            store,
            tracker,
            api,
            verdict,
        })
    }

    pub fn route(&self) -> Route {
        if self.store.has_token() {
            Route::Feed
        } else {
            Route::Login
        }
    }

    /// Outcome of the launch-time session check
    pub fn verdict(&self) -> SessionVerdict {
        self.verdict
    }

    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    pub fn tracker(&self) -> &Arc<ForegroundTracker> {
        &self.tracker
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn login_flow(&self) -> LoginFlow<ApiClient> {
        LoginFlow::new(self.api.clone(), self.store.clone(), self.tracker.clone())
    }

    /// Log in and switch the API client to the new token
    pub async fn login(
        &mut self,
        username: &str,
        password: &str,
        remember_username: bool,
    ) -> Result<(), AuthError> {
        let token = self
            .login_flow()
            .login(username, password, remember_username)
            .await?;
        self.api.set_token(token);
        Ok(())
    }

    pub fn logout(&mut self) -> Result<(), AuthError> {
        self.login_flow().logout()?;
        self.api.clear_token();
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
