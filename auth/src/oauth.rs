//! Social sign-in through an OAuth2 authorization-code popup.
//!
//! The browser is sent to the provider's consent page and the redirect is
//! caught on a loopback listener. The code is exchanged (with PKCE) for an
//! access token, which is then used to read the provider's user profile.

use crate::{AuthError, AuthErrorCode, AuthUser, SignInMethod};
use oauth2::basic::BasicClient;
use oauth2::reqwest::async_http_client;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, PkceCodeChallenge, RedirectUrl,
    Scope, TokenResponse, TokenUrl,
};
use reqwest::header::{ACCEPT, USER_AGENT};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use url::Url;

/// Opens the consent page. Defaults to the system browser.
pub type BrowserOpener = Arc<dyn Fn(&str) -> std::io::Result<()> + Send + Sync>;

const DEFAULT_POPUP_TIMEOUT: Duration = Duration::from_secs(300);

const REDIRECT_PAGE: &str = "HTTP/1.1 200 OK\r\ncontent-type: text/html; charset=utf-8\r\nconnection: close\r\n\r\n\
<html><body><p>Sign-in finished. You can close this window.</p></body></html>";

#[derive(Debug, Clone)]
pub struct OAuthProviderConfig {
    pub method: SignInMethod,
    pub client_id: String,
    pub client_secret: Option<String>,
    pub auth_url: String,
    pub token_url: String,
    pub userinfo_url: String,
    pub scopes: Vec<String>,
    /// Loopback port for the redirect; 0 picks a free port.
    pub redirect_port: u16,
    pub timeout: Duration,
}

impl OAuthProviderConfig {
    pub fn google(client_id: impl Into<String>, client_secret: Option<String>, redirect_port: u16) -> Self {
        OAuthProviderConfig {
            method: SignInMethod::Google,
            client_id: client_id.into(),
            client_secret,
            auth_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            userinfo_url: "https://openidconnect.googleapis.com/v1/userinfo".to_string(),
            scopes: vec!["openid".into(), "email".into(), "profile".into()],
            redirect_port,
            timeout: DEFAULT_POPUP_TIMEOUT,
        }
    }

    pub fn github(client_id: impl Into<String>, client_secret: Option<String>, redirect_port: u16) -> Self {
        OAuthProviderConfig {
            method: SignInMethod::Github,
            client_id: client_id.into(),
            client_secret,
            auth_url: "https://github.com/login/oauth/authorize".to_string(),
            token_url: "https://github.com/login/oauth/access_token".to_string(),
            userinfo_url: "https://api.github.com/user".to_string(),
            scopes: vec!["read:user".into(), "user:email".into()],
            redirect_port,
            timeout: DEFAULT_POPUP_TIMEOUT,
        }
    }

    /// Google credentials from `GOOGLE_CLIENT_ID` / `GOOGLE_CLIENT_SECRET`.
    pub fn google_from_env(redirect_port: u16) -> Option<Self> {
        let client_id = std::env::var("GOOGLE_CLIENT_ID").ok()?;
        let client_secret = std::env::var("GOOGLE_CLIENT_SECRET").ok();
        Some(Self::google(client_id, client_secret, redirect_port))
    }

    /// GitHub credentials from `GITHUB_CLIENT_ID` / `GITHUB_CLIENT_SECRET`.
    pub fn github_from_env(redirect_port: u16) -> Option<Self> {
        let client_id = std::env::var("GITHUB_CLIENT_ID").ok()?;
        let client_secret = std::env::var("GITHUB_CLIENT_SECRET").ok();
        Some(Self::github(client_id, client_secret, redirect_port))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

fn oauth_err(context: &str, e: impl std::fmt::Display) -> AuthError {
    AuthError::OAuth(format!("{}: {}", context, e))
}

pub struct OAuthPopup {
    config: OAuthProviderConfig,
    opener: BrowserOpener,
    http: reqwest::Client,
}

impl OAuthPopup {
    pub fn new(config: OAuthProviderConfig) -> Self {
        OAuthPopup {
            config,
            opener: Arc::new(|url: &str| webbrowser::open(url)),
            http: reqwest::Client::new(),
        }
    }

    pub fn with_opener(mut self, opener: BrowserOpener) -> Self {
        self.opener = opener;
        self
    }

    pub fn config(&self) -> &OAuthProviderConfig {
        &self.config
    }

    /// Run the popup flow. Waiting longer than the configured timeout counts
    /// as an interrupted popup.
    #[cfg_attr(feature = "trace-spans", tracing::instrument(skip(self)))]
    pub async fn sign_in(&self) -> Result<AuthUser, AuthError> {
        match tokio::time::timeout(self.config.timeout, self.run()).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(provider = %self.config.method, "sign-in popup timed out");
                Err(AuthErrorCode::CancelledPopupRequest.into())
            }
        }
    }

    async fn run(&self) -> Result<AuthUser, AuthError> {
        let listener = TcpListener::bind(("127.0.0.1", self.config.redirect_port))
            .await
            .map_err(|e| oauth_err("Failed to bind redirect listener", e))?;
        let port = listener
            .local_addr()
            .map_err(|e| oauth_err("Failed to bind redirect listener", e))?
            .port();
        let redirect = format!("http://127.0.0.1:{}", port);

        let client = BasicClient::new(
            ClientId::new(self.config.client_id.clone()),
            self.config.client_secret.clone().map(ClientSecret::new),
            AuthUrl::new(self.config.auth_url.clone()).map_err(|e| oauth_err("Invalid auth URL", e))?,
            Some(TokenUrl::new(self.config.token_url.clone()).map_err(|e| oauth_err("Invalid token URL", e))?),
        )
        .set_redirect_uri(RedirectUrl::new(redirect.clone()).map_err(|e| oauth_err("Invalid redirect URL", e))?);

        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();
        let mut request = client.authorize_url(CsrfToken::new_random);
        for scope in &self.config.scopes {
            request = request.add_scope(Scope::new(scope.clone()));
        }
        let (authorize_url, csrf_state) = request.set_pkce_challenge(pkce_challenge).url();

        tracing::info!(provider = %self.config.method, port, "opening browser for sign-in");
        (self.opener)(authorize_url.as_str()).map_err(|e| oauth_err("Failed to open browser", e))?;

        let (stream, _) = listener
            .accept()
            .await
            .map_err(|e| oauth_err("Failed to accept redirect", e))?;
        let mut stream = BufReader::new(stream);

        let mut request_line = String::new();
        stream
            .read_line(&mut request_line)
            .await
            .map_err(|e| oauth_err("Failed to read redirect", e))?;

        // The browser only needs to be told it can go away.
        if let Err(e) = stream.get_mut().write_all(REDIRECT_PAGE.as_bytes()).await {
            tracing::debug!(error = %e, "failed to answer redirect");
        }
        if let Err(e) = stream.get_mut().shutdown().await {
            tracing::debug!(error = %e, "failed to close redirect connection");
        }

        let path = request_line
            .split_whitespace()
            .nth(1)
            .ok_or_else(|| AuthError::OAuth("No redirect URL found".into()))?;
        let redirect_url =
            Url::parse(&format!("{}{}", redirect, path)).map_err(|e| oauth_err("Invalid redirect", e))?;
        let params: HashMap<String, String> = redirect_url.query_pairs().into_owned().collect();

        if let Some(error) = params.get("error") {
            tracing::warn!(provider = %self.config.method, %error, "provider refused sign-in");
            return Err(match error.as_str() {
                "access_denied" => AuthErrorCode::PopupClosedByUser.into(),
                other => AuthError::OAuth(other.to_string()),
            });
        }

        if params.get("state").map(String::as_str) != Some(csrf_state.secret().as_str()) {
            tracing::warn!(provider = %self.config.method, "redirect state mismatch");
            return Err(AuthErrorCode::InvalidCredential.into());
        }

        let code = params
            .get("code")
            .ok_or_else(|| AuthError::OAuth("No authorization code found in redirect URL".into()))?;

        let token = client
            .exchange_code(AuthorizationCode::new(code.clone()))
            .set_pkce_verifier(pkce_verifier)
            .request_async(async_http_client)
            .await
            .map_err(|e| {
                tracing::warn!(provider = %self.config.method, error = %e, "code exchange failed");
                AuthError::Provider(AuthErrorCode::InvalidCredential)
            })?;

        self.fetch_profile(token.access_token().secret()).await
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<AuthUser, AuthError> {
        let response = self
            .http
            .get(&self.config.userinfo_url)
            .bearer_auth(access_token)
            .header(USER_AGENT, "photo_browser")
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| oauth_err("Failed to fetch profile", e))?;

        if !response.status().is_success() {
            return Err(AuthError::OAuth(format!(
                "Failed to fetch profile: {}",
                response.status()
            )));
        }

        let profile: Value = response
            .json()
            .await
            .map_err(|e| oauth_err("Failed to parse profile", e))?;
        profile_to_user(self.config.method, &profile)
    }
}

fn profile_to_user(method: SignInMethod, profile: &Value) -> Result<AuthUser, AuthError> {
    let id = match profile.get("sub").or_else(|| profile.get("id")) {
        Some(Value::String(id)) => id.clone(),
        Some(Value::Number(id)) => id.to_string(),
        _ => return Err(AuthError::OAuth("Profile has no id".into())),
    };
    let email = profile.get("email").and_then(Value::as_str).map(str::to_string);
    let display_name = profile
        .get("name")
        .and_then(Value::as_str)
        .or_else(|| profile.get("login").and_then(Value::as_str))
        .map(str::to_string);

    Ok(AuthUser {
        uid: format!("{}:{}", method, id),
        email,
        display_name,
        provider: method,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_google_profile() {
        let profile = json!({ "sub": "1097", "email": "ann@example.com", "name": "Ann" });
        let user = profile_to_user(SignInMethod::Google, &profile).unwrap();
        assert_eq!(user.uid, "google:1097");
        assert_eq!(user.email.as_deref(), Some("ann@example.com"));
        assert_eq!(user.display_name.as_deref(), Some("Ann"));
    }

    #[test]
    fn test_github_profile_falls_back_to_login() {
        let profile = json!({ "id": 583231, "login": "octocat", "name": null, "email": null });
        let user = profile_to_user(SignInMethod::Github, &profile).unwrap();
        assert_eq!(user.uid, "github:583231");
        assert_eq!(user.display_name.as_deref(), Some("octocat"));
        assert!(user.email.is_none());
    }

    #[test]
    fn test_profile_without_id_is_rejected() {
        let profile = json!({ "email": "ann@example.com" });
        assert!(profile_to_user(SignInMethod::Google, &profile).is_err());
    }

    #[test]
    fn test_presets() {
        let google = OAuthProviderConfig::google("id", None, 8080);
        assert_eq!(google.method, SignInMethod::Google);
        assert!(google.scopes.contains(&"email".to_string()));

        let github = OAuthProviderConfig::github("id", Some("secret".into()), 0)
            .with_timeout(Duration::from_secs(1));
        assert_eq!(github.userinfo_url, "https://api.github.com/user");
        assert_eq!(github.timeout, Duration::from_secs(1));
    }
}
