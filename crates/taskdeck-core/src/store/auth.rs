use std::sync::Arc;

use taskdeck_shared::{AuthData, LoginRequest, SignupRequest, User};
use tokio::sync::watch;
use tracing::{info, instrument, warn};

use crate::api::AuthApi;
use crate::error::ApiError;
use crate::session::Session;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("failed to save session: {0:#}")]
    Session(anyhow::Error),
    #[error("Please login to continue")]
    NotAuthenticated,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthState {
    pub user: Option<User>,
    pub token: Option<String>,
    pub loading: bool,
    pub error: Option<String>,
}

impl AuthState {
    pub fn is_authenticated(&self) -> bool {
        self.token.is_some() && self.user.is_some()
    }
}

/// Fields a user may change on their own profile copy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(Clone)]
pub struct AuthStore {
    api: Arc<dyn AuthApi>,
    session: Session,
    state: Arc<watch::Sender<AuthState>>,
}

impl std::fmt::Debug for AuthStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthStore")
            .field("authenticated", &self.is_authenticated())
            .finish()
    }
}

impl AuthStore {
    /// Starts from whatever the session already holds.
    pub fn new(api: Arc<dyn AuthApi>, session: Session) -> Self {
        let stored = session.current();
        let (state, _) = watch::channel(AuthState {
            user: stored.as_ref().map(|s| s.user.clone()),
            token: stored.map(|s| s.token),
            loading: false,
            error: None,
        });
        Self {
            api,
            session,
            state: Arc::new(state),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> AuthState {
        self.state.borrow().clone()
    }

    pub fn user(&self) -> Option<User> {
        self.state.borrow().user.clone()
    }

    /// True while the session still holds a token. The HTTP client clears
    /// the session on a 401, so this also reflects expiry seen elsewhere.
    pub fn is_authenticated(&self) -> bool {
        self.session.is_signed_in() && self.state.borrow().is_authenticated()
    }

    /// Gate for commands that need a signed-in user.
    pub fn require_auth(&self) -> Result<User, AuthError> {
        if !self.is_authenticated() {
            return Err(AuthError::NotAuthenticated);
        }
        self.user().ok_or(AuthError::NotAuthenticated)
    }

    /// Confirms a persisted session with the server. Any failure signs the
    /// user out.
    #[instrument(skip(self))]
    pub async fn restore(&self) -> Result<Option<User>, AuthError> {
        if !self.session.is_signed_in() {
            return Ok(None);
        }
        self.state.send_modify(|s| s.loading = true);
        let result = self.api.current_user().await;
        self.state.send_modify(|s| s.loading = false);

        match result {
            Ok(user) => {
                self.session
                    .set_user(user.clone())
                    .map_err(AuthError::Session)?;
                let fresh = user.clone();
                self.state.send_modify(|s| s.user = Some(fresh));
                info!(user = %user.email, "session restored");
                Ok(Some(user))
            }
            Err(err) => {
                warn!(kind = %err.kind(), message = err.message(), "stored session rejected");
                self.logout()?;
                Ok(None)
            }
        }
    }

    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let request = LoginRequest {
            email: email.trim().to_string(),
            password: password.to_string(),
        };
        self.begin();
        let result = self.api.login(&request).await;
        self.finish(result)
    }

    #[instrument(skip(self, password))]
    pub async fn signup(&self, name: &str, email: &str, password: &str) -> Result<User, AuthError> {
        let request = SignupRequest {
            name: name.trim().to_string(),
            email: email.trim().to_string(),
            password: password.to_string(),
        };
        self.begin();
        let result = self.api.signup(&request).await;
        self.finish(result)
    }

    #[instrument(skip(self))]
    pub fn logout(&self) -> Result<(), AuthError> {
        self.session.clear().map_err(AuthError::Session)?;
        self.state.send_modify(|s| {
            s.user = None;
            s.token = None;
            s.error = None;
        });
        info!("signed out");
        Ok(())
    }

    /// Merges profile changes into the local copy only.
    pub fn update_user(&self, update: UserUpdate) -> Result<User, AuthError> {
        let mut user = self.require_auth()?;
        if let Some(name) = update.name {
            user.name = name;
        }
        if let Some(email) = update.email {
            user.email = email;
        }
        self.session
            .set_user(user.clone())
            .map_err(AuthError::Session)?;
        let updated = user.clone();
        self.state.send_modify(|s| s.user = Some(updated));
        Ok(user)
    }

    fn begin(&self) {
        self.state.send_modify(|s| {
            s.loading = true;
            s.error = None;
        });
    }

    fn finish(&self, result: Result<AuthData, ApiError>) -> Result<User, AuthError> {
        match result {
            Ok(AuthData { user, token }) => {
                let saved = self.session.set(token.clone(), user.clone());
                if let Err(err) = saved {
                    self.state.send_modify(|s| s.loading = false);
                    return Err(AuthError::Session(err));
                }
                let signed_in = user.clone();
                self.state.send_modify(|s| {
                    s.user = Some(signed_in);
                    s.token = Some(token);
                    s.loading = false;
                });
                info!(user = %user.email, "signed in");
                Ok(user)
            }
            Err(err) => {
                warn!(kind = %err.kind(), message = err.message(), "authentication failed");
                let message = err.message().to_string();
                self.state.send_modify(|s| {
                    s.loading = false;
                    s.error = Some(message);
                });
                Err(AuthError::Api(err))
            }
        }
    }
}
