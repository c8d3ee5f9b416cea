use crate::{validate_sign_up, AuthError, AuthProvider, AuthUser};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub user: Option<AuthUser>,
    /// True until the provider has reported its current user once.
    pub loading: bool,
}

/// The signed-in state shared by everything that needs to know who is using
/// the app.
///
/// [`Session::start`] subscribes to the provider; [`Session::shutdown`] (or
/// dropping the session) unsubscribes.
pub struct Session {
    provider: Arc<dyn AuthProvider>,
    state: watch::Receiver<SessionState>,
    listener: Option<JoinHandle<()>>,
}

impl Session {
    /// Subscribe to `provider`. Must be called from within a tokio runtime.
    pub fn start(provider: Arc<dyn AuthProvider>) -> Self {
        let (tx, rx) = watch::channel(SessionState {
            user: None,
            loading: true,
        });
        let mut changes = provider.current_user();

        let listener = tokio::spawn(async move {
            loop {
                let user = changes.borrow_and_update().clone();
                tracing::debug!(uid = ?user.as_ref().map(|u| u.uid.as_str()), "auth state changed");
                if tx.send(SessionState { user, loading: false }).is_err() {
                    break;
                }
                if changes.changed().await.is_err() {
                    break;
                }
            }
        });

        Session {
            provider,
            state: rx,
            listener: Some(listener),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    /// Wait for the provider's first report.
    pub async fn ready(&mut self) -> SessionState {
        if let Ok(state) = self.state.wait_for(|s| !s.loading).await {
            return state.clone();
        }
        self.state()
    }

    /// Wait until the session reports `uid` (or no user for `None`).
    pub async fn wait_for_user(&mut self, uid: Option<&str>) -> SessionState {
        let matches = |s: &SessionState| !s.loading && s.user.as_ref().map(|u| u.uid.as_str()) == uid;
        if let Ok(state) = self.state.wait_for(matches).await {
            return state.clone();
        }
        self.state()
    }

    /// The signed-in user, or [`AuthError::NotSignedIn`]. Guards every view
    /// that requires an account.
    pub fn require_user(&self) -> Result<AuthUser, AuthError> {
        self.state.borrow().user.clone().ok_or(AuthError::NotSignedIn)
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().user.is_some()
    }

    pub async fn sign_up(&self, email: &str, password: &str, confirm: Option<&str>) -> Result<AuthUser, AuthError> {
        validate_sign_up(email, password, confirm)?;
        self.provider.sign_up(email, password).await
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser, AuthError> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(AuthError::MissingCredentials);
        }
        self.provider.sign_in(email, password).await
    }

    pub async fn sign_in_with_google(&self) -> Result<AuthUser, AuthError> {
        self.provider.sign_in_with_google().await
    }

    pub async fn sign_in_with_github(&self) -> Result<AuthUser, AuthError> {
        self.provider.sign_in_with_github().await
    }

    pub async fn sign_out(&self) -> Result<(), AuthError> {
        self.provider.sign_out().await
    }

    /// Stop following the provider.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
            tracing::debug!("session listener stopped");
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.stop();
    }
}
