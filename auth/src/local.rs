//! Email/password accounts kept on this machine, with optional social sign-in.

use crate::{AuthError, AuthErrorCode, AuthProvider, AuthUser, OAuthPopup, SignInMethod, MIN_PASSWORD_LEN};
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::watch;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Account {
    uid: String,
    email: String,
    /// Argon2id hash in PHC string format.
    password_hash: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct AuthStore {
    #[serde(default)]
    accounts: Vec<Account>,
    current: Option<AuthUser>,
}

pub struct LocalAuthProvider {
    store: Mutex<AuthStore>,
    path: Option<PathBuf>,
    google: Option<OAuthPopup>,
    github: Option<OAuthPopup>,
    current: watch::Sender<Option<AuthUser>>,
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

fn compute_password_hash(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut rand_core::OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Storage(format!("Failed to hash password: {}", e)))
}

fn verify_password_hash(expected: &str, candidate: &str) -> bool {
    match PasswordHash::new(expected) {
        Ok(hash) => Argon2::default()
            .verify_password(candidate.as_bytes(), &hash)
            .is_ok(),
        Err(e) => {
            tracing::warn!(error = %e, "stored password hash is not a PHC string");
            false
        }
    }
}

/// Run the hashing work off the async executor.
async fn blocking<T, F>(work: F) -> Result<T, AuthError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| AuthError::Storage(format!("Password task failed: {}", e)))
}

fn new_uid(email: &str) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(email.as_bytes());
    hasher.update(nanos.to_le_bytes());
    let mut uid = hex(&hasher.finalize());
    uid.truncate(28);
    uid
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}

impl LocalAuthProvider {
    /// A provider whose accounts live only as long as the value.
    pub fn in_memory() -> Self {
        Self::from_store(AuthStore::default(), None)
    }

    /// Open (or start) the account file at `path`. A previously signed-in
    /// user is restored.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, AuthError> {
        let path = path.into();
        let store = if path.exists() {
            let data = std::fs::read_to_string(&path)
                .map_err(|e| AuthError::Storage(format!("Failed to read {}: {}", path.display(), e)))?;
            serde_json::from_str(&data)
                .map_err(|e| AuthError::Storage(format!("Failed to parse {}: {}", path.display(), e)))?
        } else {
            AuthStore::default()
        };
        tracing::debug!(path = %path.display(), accounts = store.accounts.len(), "opened account store");
        Ok(Self::from_store(store, Some(path)))
    }

    fn from_store(store: AuthStore, path: Option<PathBuf>) -> Self {
        let (current, _) = watch::channel(store.current.clone());
        LocalAuthProvider {
            store: Mutex::new(store),
            path,
            google: None,
            github: None,
            current,
        }
    }

    pub fn with_google(mut self, popup: OAuthPopup) -> Self {
        self.google = Some(popup);
        self
    }

    pub fn with_github(mut self, popup: OAuthPopup) -> Self {
        self.github = Some(popup);
        self
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock(&self) -> Result<MutexGuard<'_, AuthStore>, AuthError> {
        self.store
            .lock()
            .map_err(|_| AuthError::Storage("account store lock poisoned".into()))
    }

    fn persist(&self, store: &AuthStore) -> Result<(), AuthError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| AuthError::Storage(e.to_string()))?;
        }
        let data = serde_json::to_string_pretty(store).map_err(|e| AuthError::Storage(e.to_string()))?;
        std::fs::write(path, data)
            .map_err(|e| AuthError::Storage(format!("Failed to write {}: {}", path.display(), e)))
    }

    fn set_current(&self, user: Option<AuthUser>) -> Result<(), AuthError> {
        {
            let mut store = self.lock()?;
            store.current = user.clone();
            self.persist(&store)?;
        }
        self.current.send_replace(user);
        Ok(())
    }

    async fn social(&self, popup: Option<&OAuthPopup>, name: &'static str) -> Result<AuthUser, AuthError> {
        let popup = popup.ok_or(AuthError::NotConfigured(name))?;
        let user = popup.sign_in().await?;
        tracing::info!(uid = %user.uid, provider = %user.provider, "signed in");
        self.set_current(Some(user.clone()))?;
        Ok(user)
    }
}

#[async_trait]
impl AuthProvider for LocalAuthProvider {
    #[cfg_attr(feature = "trace-spans", tracing::instrument(skip(self, password)))]
    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthUser, AuthError> {
        let email = normalize_email(email);
        if !is_valid_email(&email) {
            return Err(AuthErrorCode::InvalidEmail.into());
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthErrorCode::WeakPassword.into());
        }

        if self.lock()?.accounts.iter().any(|a| a.email == email) {
            return Err(AuthErrorCode::EmailAlreadyInUse.into());
        }
        let secret = password.to_string();
        let password_hash = blocking(move || compute_password_hash(&secret)).await??;

        let user = {
            let mut store = self.lock()?;
            // Checked again: another sign-up may have finished while hashing.
            if store.accounts.iter().any(|a| a.email == email) {
                return Err(AuthErrorCode::EmailAlreadyInUse.into());
            }
            let account = Account {
                uid: new_uid(&email),
                email: email.clone(),
                password_hash,
            };
            let user = AuthUser {
                uid: account.uid.clone(),
                email: Some(email),
                display_name: None,
                provider: SignInMethod::Password,
            };
            store.accounts.push(account);
            store.current = Some(user.clone());
            self.persist(&store)?;
            user
        };

        tracing::info!(uid = %user.uid, "account created");
        self.current.send_replace(Some(user.clone()));
        Ok(user)
    }

    #[cfg_attr(feature = "trace-spans", tracing::instrument(skip(self, password)))]
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser, AuthError> {
        let email = normalize_email(email);
        if !is_valid_email(&email) {
            return Err(AuthErrorCode::InvalidEmail.into());
        }

        let account = self
            .lock()?
            .accounts
            .iter()
            .find(|a| a.email == email)
            .cloned()
            .ok_or(AuthError::Provider(AuthErrorCode::UserNotFound))?;

        let expected = account.password_hash.clone();
        let candidate = password.to_string();
        if !blocking(move || verify_password_hash(&expected, &candidate)).await? {
            tracing::warn!(uid = %account.uid, "wrong password");
            return Err(AuthErrorCode::WrongPassword.into());
        }
        let user = AuthUser {
            uid: account.uid,
            email: Some(account.email),
            display_name: None,
            provider: SignInMethod::Password,
        };

        tracing::info!(uid = %user.uid, "signed in");
        self.set_current(Some(user.clone()))?;
        Ok(user)
    }

    async fn sign_in_with_google(&self) -> Result<AuthUser, AuthError> {
        self.social(self.google.as_ref(), "Google").await
    }

    async fn sign_in_with_github(&self) -> Result<AuthUser, AuthError> {
        self.social(self.github.as_ref(), "GitHub").await
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        tracing::info!("signing out");
        self.set_current(None)
    }

    fn current_user(&self) -> watch::Receiver<Option<AuthUser>> {
        self.current.subscribe()
    }
}
