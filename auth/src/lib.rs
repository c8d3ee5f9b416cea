//! Authentication for the photo browser.
//!
//! Sign-in backends implement [`AuthProvider`]; consumers hold a [`Session`]
//! that follows the provider's current user.

mod error;
mod local;
mod oauth;
mod session;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::watch;

pub use error::{AuthError, AuthErrorCode};
pub use local::LocalAuthProvider;
pub use oauth::{BrowserOpener, OAuthPopup, OAuthProviderConfig};
pub use session::{Session, SessionState};

/// Minimum accepted password length.
pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignInMethod {
    Password,
    Google,
    Github,
}

impl fmt::Display for SignInMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SignInMethod::Password => "password",
            SignInMethod::Google => "google",
            SignInMethod::Github => "github",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUser {
    pub uid: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub provider: SignInMethod,
}

impl AuthUser {
    /// Name to greet the user with.
    pub fn label(&self) -> &str {
        self.display_name
            .as_deref()
            .or(self.email.as_deref())
            .unwrap_or(&self.uid)
    }
}

/// A sign-in backend.
///
/// `current_user` is the provider's observable session: the receiver holds
/// the signed-in user (or `None`) and is notified on every change.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthUser, AuthError>;
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser, AuthError>;
    async fn sign_in_with_google(&self) -> Result<AuthUser, AuthError>;
    async fn sign_in_with_github(&self) -> Result<AuthUser, AuthError>;
    async fn sign_out(&self) -> Result<(), AuthError>;
    fn current_user(&self) -> watch::Receiver<Option<AuthUser>>;
}

/// Check a sign-up form before it reaches the provider.
pub fn validate_sign_up(email: &str, password: &str, confirm: Option<&str>) -> Result<(), AuthError> {
    if email.trim().is_empty() || password.is_empty() {
        return Err(AuthError::MissingCredentials);
    }
    if let Some(confirm) = confirm {
        if confirm != password {
            return Err(AuthError::PasswordMismatch);
        }
    }
    Ok(())
}
