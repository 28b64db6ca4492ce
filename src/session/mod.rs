//! Authentication state shared by every screen of one client session.

mod file;

use std::sync::{Arc, Mutex, MutexGuard};

use thiserror::Error;
use tracing::{info, warn};

use crate::api::{ApiError, ApiGateway, CredentialSource, FieldErrors};
use crate::types::UserIdentity;

pub use file::SessionFile;

#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub enum SessionState {
    #[default]
    Anonymous,
    Authenticated(UserIdentity),
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated(_))
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("invalid username or password")]
    Rejected,
    #[error("{0}")]
    Invalid(FieldErrors),
    #[error("could not reach the service ({0}); please try again")]
    Unreachable(String),
}

impl AuthError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, AuthError::Unreachable(_))
    }
}

impl From<ApiError> for AuthError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Unauthorized | ApiError::NotFound => AuthError::Rejected,
            ApiError::ValidationFailed(errors) => AuthError::Invalid(errors),
            ApiError::Unreachable(message) => AuthError::Unreachable(message),
        }
    }
}

/// Cloneable handle; clones observe the same state.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    state: Arc<Mutex<SessionState>>,
    file: Option<SessionFile>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restores a previously saved identity, if any, and keeps the file in
    /// sync with later transitions.
    pub fn with_file(file: SessionFile) -> Self {
        let state = match file.load() {
            Some(identity) => SessionState::Authenticated(identity),
            None => SessionState::Anonymous,
        };
        Self {
            state: Arc::new(Mutex::new(state)),
            file: Some(file),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.lock().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.lock().is_authenticated()
    }

    pub fn identity(&self) -> Option<UserIdentity> {
        match &*self.lock() {
            SessionState::Authenticated(identity) => Some(identity.clone()),
            SessionState::Anonymous => None,
        }
    }

    pub async fn login(
        &self,
        api: &dyn ApiGateway,
        username: &str,
        password: &str,
    ) -> Result<UserIdentity, AuthError> {
        match api.login(username, password).await {
            Ok(identity) => {
                self.authenticate(identity.clone());
                Ok(identity)
            }
            Err(err) => {
                warn!(username, error = %err, "login failed");
                Err(err.into())
            }
        }
    }

    pub async fn register(
        &self,
        api: &dyn ApiGateway,
        username: &str,
        password: &str,
    ) -> Result<UserIdentity, AuthError> {
        let registered = match api.register(username, password).await {
            Ok(registered) => registered,
            Err(err) => {
                warn!(username, error = %err, "registration failed");
                return Err(err.into());
            }
        };

        match registered {
            Some(identity) => {
                self.authenticate(identity.clone());
                Ok(identity)
            }
            None => {
                info!(username, "account created; signing in");
                self.login(api, username, password).await
            }
        }
    }

    pub fn logout(&self) {
        self.reset();
        info!("signed out");
    }

    /// Forced transition after the service rejected the credential.
    pub fn expire(&self) {
        if self.is_authenticated() {
            warn!("credential rejected by the service; session expired");
        }
        self.reset();
    }

    fn authenticate(&self, identity: UserIdentity) {
        if let Some(file) = &self.file
            && let Err(err) = file.save(&identity)
        {
            warn!(error = %format!("{err:#}"), "failed to persist session");
        }
        info!(username = %identity.username, "signed in");
        *self.lock() = SessionState::Authenticated(identity);
    }

    fn reset(&self) {
        *self.lock() = SessionState::Anonymous;
        if let Some(file) = &self.file
            && let Err(err) = file.remove()
        {
            warn!(error = %format!("{err:#}"), "failed to remove persisted session");
        }
    }
}

impl CredentialSource for SessionStore {
    fn credential(&self) -> Option<String> {
        self.identity().map(|identity| identity.token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fake::{Call, FakeGateway, Op};
    use tempfile::TempDir;

    #[tokio::test]
    async fn login_with_valid_credentials_authenticates() {
        let api = FakeGateway::new();
        api.add_user("bob", "hunter22");
        let session = SessionStore::new();

        let identity = session
            .login(&api, "bob", "hunter22")
            .await
            .expect("login should succeed");

        assert_eq!(identity.username, "bob");
        assert_eq!(session.credential().as_deref(), Some("token-bob"));
    }

    #[tokio::test]
    async fn login_with_wrong_password_stays_anonymous() {
        let api = FakeGateway::new();
        api.add_user("bob", "hunter22");
        let session = SessionStore::new();

        let err = session
            .login(&api, "bob", "wrongpass")
            .await
            .expect_err("login should be rejected");

        assert_eq!(err, AuthError::Rejected);
        assert!(!err.is_retryable());
        assert_eq!(session.state(), SessionState::Anonymous);
    }

    #[tokio::test]
    async fn login_when_unreachable_is_retryable() {
        let api = FakeGateway::new();
        api.fail_next(Op::Login, ApiError::Unreachable("connection refused".into()));
        let session = SessionStore::new();

        let err = session
            .login(&api, "bob", "hunter22")
            .await
            .expect_err("login should fail");

        assert!(err.is_retryable());
        assert!(!session.is_authenticated());
    }

    #[tokio::test]
    async fn register_without_token_logs_in_with_same_credentials() {
        let api = FakeGateway::new();
        let session = SessionStore::new();

        session
            .register(&api, "carol", "secret123")
            .await
            .expect("registration should authenticate");

        assert!(session.is_authenticated());
        assert_eq!(
            api.calls(),
            vec![
                Call::Register("carol".to_string()),
                Call::Login("carol".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn register_with_token_skips_login() {
        let api = FakeGateway::new();
        api.set_register_returns_token(true);
        let session = SessionStore::new();

        session
            .register(&api, "dave", "secret123")
            .await
            .expect("registration should authenticate");

        assert_eq!(api.call_count(), 1);
        assert!(session.is_authenticated());
    }

    #[tokio::test]
    async fn register_duplicate_username_surfaces_field_error() {
        let api = FakeGateway::new();
        api.add_user("erin", "secret123");
        let session = SessionStore::new();

        let err = session
            .register(&api, "erin", "secret123")
            .await
            .expect_err("duplicate should fail");

        match err {
            AuthError::Invalid(errors) => assert!(errors.contains("username")),
            other => panic!("expected field errors, got {other:?}"),
        }
        assert!(!session.is_authenticated());
    }

    #[tokio::test]
    async fn logout_and_expire_return_to_anonymous() {
        let api = FakeGateway::new();
        api.add_user("bob", "hunter22");
        let session = SessionStore::new();
        let shared = session.clone();

        session
            .login(&api, "bob", "hunter22")
            .await
            .expect("login should succeed");
        assert!(shared.is_authenticated());

        shared.expire();
        assert!(!session.is_authenticated());

        session.logout();
        assert_eq!(session.state(), SessionState::Anonymous);
    }

    #[tokio::test]
    async fn session_file_tracks_transitions() {
        let temp = TempDir::new().expect("temp dir");
        let path = temp.path().join("session.toml");
        let api = FakeGateway::new();
        api.add_user("bob", "hunter22");

        let session = SessionStore::with_file(SessionFile::new(&path));
        assert!(!session.is_authenticated());
        session
            .login(&api, "bob", "hunter22")
            .await
            .expect("login should succeed");
        assert!(path.exists());

        let restored = SessionStore::with_file(SessionFile::new(&path));
        assert_eq!(
            restored.identity().map(|identity| identity.username),
            Some("bob".to_string())
        );

        restored.expire();
        assert!(!path.exists());
    }
}
