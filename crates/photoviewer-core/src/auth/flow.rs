use std::future::Future;
use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::api::{ApiClient, ApiError};
use crate::session::ForegroundTracker;
use crate::store::{CredentialStore, StoreError};

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Username and password required")]
    MissingCredentials,

    /// The backend refused the credentials; the message is user-facing
    #[error("{0}")]
    Rejected(String),

    /// Transport failures and unreadable answers alike
    #[error("Network error: {0}")]
    Network(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<ApiError> for AuthError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::LoginFailed(message) => AuthError::Rejected(message),
            ApiError::NetworkError(e) => AuthError::Network(e.to_string()),
            ApiError::InvalidResponse(message) => AuthError::Network(message),
            other => AuthError::Rejected(other.to_string()),
        }
    }
}

/// Exchanges a username and password for a bearer token.
pub trait Authenticator {
    fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> impl Future<Output = Result<String, ApiError>> + Send;
}

impl Authenticator for ApiClient {
    async fn authenticate(&self, username: &str, password: &str) -> Result<String, ApiError> {
        self.login(username, password).await
    }
}

/// Login, logout and reset against the credential store.
pub struct LoginFlow<A> {
    auth: A,
    store: Arc<CredentialStore>,
    tracker: Arc<ForegroundTracker>,
}

impl<A: Authenticator> LoginFlow<A> {
    pub fn new(auth: A, store: Arc<CredentialStore>, tracker: Arc<ForegroundTracker>) -> Self {
        Self {
            auth,
            store,
            tracker,
        }
    }

    /// Log in and persist the session.
    ///
    /// On success the token is stored, the username is stored or forgotten
    /// according to `remember_username`, and the session flag is raised.
    /// On failure nothing in the store changes.
    pub async fn login(
        &self,
        username: &str,
        password: &str,
        remember_username: bool,
    ) -> Result<String, AuthError> {
        let username = username.trim();
        let password = password.trim();
        if username.is_empty() || password.is_empty() {
            return Err(AuthError::MissingCredentials);
        }

        let token = match self.auth.authenticate(username, password).await {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "Login failed");
                return Err(e.into());
            }
        };

        self.store.save_token(&token)?;
        if remember_username {
            self.store.save_username(username)?;
        } else {
            self.store.delete_username()?;
        }
        self.tracker.mark_active();

        info!(username, remembered = remember_username, "Logged in");
        Ok(token)
    }

    /// Drop the token; the remembered username stays for the next login
    pub fn logout(&self) -> Result<(), AuthError> {
        self.store.delete_token()?;
        info!("Logged out");
        Ok(())
    }

    /// Remove everything the store holds
    pub fn reset(&self) -> Result<(), AuthError> {
        self.store.clear_all()?;
        Ok(())
    }

    pub fn is_logged_in(&self) -> bool {
        self.store.has_token()
    }

    /// Username to prefill on the login screen, if one was remembered
    pub fn remembered_username(&self) -> Option<String> {
        Some(self.store.get_username()).filter(|u| !u.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::session::{InMemorySessionFlag, ManualClock, SessionFlag};
    use crate::store::{StaticKeyProvider, StoreKey};

    /// Accepts one password and records what it was asked.
    struct FakeAuth {
        password: &'static str,
        calls: Mutex<Vec<String>>,
    }

    impl FakeAuth {
        fn accepting(password: &'static str) -> Self {
            Self {
                password,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl Authenticator for FakeAuth {
        async fn authenticate(&self, username: &str, password: &str) -> Result<String, ApiError> {
            self.calls.lock().unwrap().push(username.to_string());
            if password == self.password {
                Ok(format!("token-for-{}", username))
            } else {
                Err(ApiError::login_failed(r#"{"error": "Invalid credentials"}"#))
            }
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        store: Arc<CredentialStore>,
        flag: Arc<InMemorySessionFlag>,
        flow: LoginFlow<FakeAuth>,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let keys = StaticKeyProvider::new(StoreKey::from_bytes([8u8; 32]));
        let store = Arc::new(CredentialStore::open(dir.path(), &keys).unwrap());
        let flag = Arc::new(InMemorySessionFlag::new(false));
        let tracker = Arc::new(ForegroundTracker::new(
            store.clone(),
            flag.clone(),
            Arc::new(ManualClock::new(0)),
        ));
        let flow = LoginFlow::new(FakeAuth::accepting("secret"), store.clone(), tracker);
        Fixture {
            _dir: dir,
            store,
            flag,
            flow,
        }
    }

    #[tokio::test]
    async fn test_login_persists_token_and_raises_flag() {
        let f = fixture();
        let token = f.flow.login("  alice ", "secret", true).await.unwrap();

        assert_eq!(token, "token-for-alice");
        assert_eq!(f.store.get_token().as_deref(), Some("token-for-alice"));
        assert_eq!(f.store.get_username(), "alice");
        assert!(f.flag.is_session_active());
        assert!(f.flow.is_logged_in());
    }

    #[tokio::test]
    async fn test_login_without_remember_forgets_username() {
        let f = fixture();
        f.store.save_username("old-user").unwrap();

        f.flow.login("alice", "secret", false).await.unwrap();
        assert_eq!(f.flow.remembered_username(), None);
    }

    #[tokio::test]
    async fn test_failed_login_leaves_store_untouched() {
        let f = fixture();
        f.store.save_username("bob").unwrap();

        let err = f.flow.login("alice", "wrong", true).await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid credentials");
        assert!(!f.store.has_token());
        assert_eq!(f.store.get_username(), "bob");
        assert!(!f.flag.is_session_active());
    }

    #[tokio::test]
    async fn test_blank_input_rejected_before_request() {
        let f = fixture();
        let err = f.flow.login("  ", "secret", false).await.unwrap_err();
        assert!(matches!(err, AuthError::MissingCredentials));
        assert_eq!(err.to_string(), "Username and password required");
        assert!(f.flow.auth.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_logout_keeps_remembered_username_reset_clears_all() {
        let f = fixture();
        f.flow.login("alice", "secret", true).await.unwrap();

        f.flow.logout().unwrap();
        assert!(!f.flow.is_logged_in());
        assert_eq!(f.flow.remembered_username().as_deref(), Some("alice"));

        f.flow.reset().unwrap();
        assert_eq!(f.flow.remembered_username(), None);
        assert!(!f.store.has_session_data());
    }

    #[test]
    fn test_api_errors_map_to_messages() {
        let err: AuthError = ApiError::LoginFailed("Login failed".into()).into();
        assert_eq!(err.to_string(), "Login failed");

        let err: AuthError = ApiError::InvalidResponse("login response: missing field `token`".into()).into();
        assert!(matches!(err, AuthError::Network(_)));
        assert_eq!(err.to_string(), "Network error: login response: missing field `token`");
    }
}
