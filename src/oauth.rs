//! Google sign-in (OpenID Connect authorization-code flow).

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use thiserror::Error;

use crate::config::GoogleOAuthConfig;

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";

#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("oauth state mismatch")]
    StateMismatch,

    #[error("authorization code exchange failed: {0}")]
    Exchange(String),

    #[error("userinfo lookup failed: {0}")]
    UserInfo(String),
}

/// Identity asserted by the provider after a successful callback.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OAuthIdentity {
    #[serde(rename = "sub")]
    pub subject: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub email_verified: Option<bool>,
    #[serde(default)]
    pub name: Option<String>,
}

impl OAuthIdentity {
    /// Local username for this identity: the verified email, else `google:{sub}`.
    pub fn username(&self) -> String {
        match (&self.email, self.email_verified) {
            (Some(email), Some(true)) => email.to_ascii_lowercase(),
            _ => format!("google:{}", self.subject),
        }
    }
}

#[async_trait]
pub trait OAuthProvider: Send + Sync {
    /// URL the browser is sent to; `state` comes back on the callback unchanged.
    fn authorize_url(&self, state: &str) -> String;

    /// Exchanges the callback `code` and resolves the user's identity.
    async fn exchange_code(&self, code: &str) -> Result<OAuthIdentity, OAuthError>;
}

pub type OAuthState = Option<Arc<dyn OAuthProvider>>;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// GoogleOAuthClient
///
/// Talks to Google's token and userinfo endpoints with reqwest.
pub struct GoogleOAuthClient {
    client: Client,
    config: GoogleOAuthConfig,
}

impl GoogleOAuthClient {
    pub fn new(config: GoogleOAuthConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }
}

#[async_trait]
impl OAuthProvider for GoogleOAuthClient {
    fn authorize_url(&self, state: &str) -> String {
        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("redirect_uri", self.config.redirect_url.as_str()),
            ("response_type", "code"),
            ("scope", "openid email profile"),
            ("prompt", "select_account"),
            ("state", state),
        ];
        match Url::parse_with_params(GOOGLE_AUTH_URL, &params) {
            Ok(url) => url.to_string(),
            Err(_) => GOOGLE_AUTH_URL.to_string(),
        }
    }

    async fn exchange_code(&self, code: &str) -> Result<OAuthIdentity, OAuthError> {
        let token: TokenResponse = self
            .client
            .post(GOOGLE_TOKEN_URL)
            .form(&[
                ("code", code),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("redirect_uri", self.config.redirect_url.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| OAuthError::Exchange(e.to_string()))?
            .json()
            .await
            .map_err(|e| OAuthError::Exchange(e.to_string()))?;

        self.client
            .get(GOOGLE_USERINFO_URL)
            .bearer_auth(&token.access_token)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| OAuthError::UserInfo(e.to_string()))?
            .json::<OAuthIdentity>()
            .await
            .map_err(|e| OAuthError::UserInfo(e.to_string()))
    }
}

/// MockOAuthProvider
///
/// Accepts exactly one code and returns a fixed identity for it.
#[derive(Clone)]
pub struct MockOAuthProvider {
    pub accepted_code: String,
    pub identity: OAuthIdentity,
}

#[async_trait]
impl OAuthProvider for MockOAuthProvider {
    fn authorize_url(&self, state: &str) -> String {
        format!("http://oauth.mock/authorize?state={state}")
    }

    async fn exchange_code(&self, code: &str) -> Result<OAuthIdentity, OAuthError> {
        if code == self.accepted_code {
            Ok(self.identity.clone())
        } else {
            Err(OAuthError::Exchange("invalid_grant".to_string()))
        }
    }
}
