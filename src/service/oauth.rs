use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::GoogleConfig;

const AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

#[derive(Error, Debug)]
pub enum OAuthError {
    #[error("Google OAuth is not configured")]
    NotConfigured,

    #[error("OAuth request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("OAuth provider returned {status}: {body}")]
    Provider { status: u16, body: String },

    #[error("Google profile has no email")]
    MissingEmail,
}

/// Google 用户资料
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleProfile {
    pub id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: String,
    pub picture: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Google OAuth2 授权码流程
pub struct GoogleOAuth {
    client: Client,
    client_id: String,
    client_secret: String,
    callback_url: String,
}

impl GoogleOAuth {
    pub fn new(cfg: &GoogleConfig) -> Result<Self, OAuthError> {
        let (Some(client_id), Some(client_secret), Some(callback_url)) = (
            cfg.client_id.clone(),
            cfg.client_secret.clone(),
            cfg.callback_url.clone(),
        ) else {
            return Err(OAuthError::NotConfigured);
        };
        let client = Client::builder().timeout(Duration::from_secs(15)).build()?;
        Ok(Self {
            client,
            client_id,
            client_secret,
            callback_url,
        })
    }

    /// 授权页地址 (每次都让用户选择账号)
    pub fn authorize_url(&self) -> String {
        format!(
            "{}?response_type=code&client_id={}&redirect_uri={}&scope={}&prompt=select_account",
            AUTHORIZE_URL,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.callback_url),
            urlencoding::encode("profile email"),
        )
    }

    /// 授权码 -> access token -> 用户资料
    pub async fn exchange_code(&self, code: &str) -> Result<GoogleProfile, OAuthError> {
        let response = self
            .client
            .post(TOKEN_URL)
            .form(&[
                ("code", code),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("redirect_uri", self.callback_url.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await?;
        let token: TokenResponse = check(response).await?.json().await?;

        let response = self
            .client
            .get(USERINFO_URL)
            .bearer_auth(&token.access_token)
            .send()
            .await?;
        let profile: GoogleProfile = check(response).await?.json().await?;
        if profile.email.trim().is_empty() {
            return Err(OAuthError::MissingEmail);
        }
        debug!("Google OAuth profile received for: {}", profile.email);
        Ok(profile)
    }
}

async fn check(response: reqwest::Response) -> Result<reqwest::Response, OAuthError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    warn!(status, "Google OAuth error: {}", body);
    Err(OAuthError::Provider { status, body })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured() -> GoogleConfig {
        GoogleConfig {
            client_id: Some("cid".to_string()),
            client_secret: Some("secret".to_string()),
            callback_url: Some("http://localhost:3000/api/auth/google/callback".to_string()),
        }
    }

    #[test]
    fn requires_full_configuration() {
        let mut cfg = configured();
        cfg.client_secret = None;
        assert!(matches!(GoogleOAuth::new(&cfg), Err(OAuthError::NotConfigured)));
    }

    #[test]
    fn authorize_url_carries_scope_and_prompt() {
        let oauth = GoogleOAuth::new(&configured()).unwrap();
        let url = oauth.authorize_url();
        assert!(url.starts_with(AUTHORIZE_URL));
        assert!(url.contains("client_id=cid"));
        assert!(url.contains("scope=profile%20email"));
        assert!(url.contains("prompt=select_account"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A3000%2Fapi%2Fauth%2Fgoogle%2Fcallback"));
    }

    #[test]
    fn profile_tolerates_missing_picture() {
        let profile: GoogleProfile =
            serde_json::from_str(r#"{"id": "1", "email": "a@b.c", "name": "A"}"#).unwrap();
        assert!(profile.picture.is_none());
    }
}
