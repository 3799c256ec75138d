//! OAuth2 authorization-code client for the identity provider

use grade_common::config::OAuthConfig;
use reqwest::Url;
use serde::Deserialize;
use tracing::debug;

use crate::error::{ApiError, ApiResult};

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Identity reported by the provider's userinfo endpoint
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UserInfo {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: String,
}

pub struct OAuthClient {
    http: reqwest::Client,
    config: OAuthConfig,
}

impl OAuthClient {
    pub fn new(config: OAuthConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("grade-web/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http, config })
    }

    /// Provider URL the browser is sent to by `/login`
    pub fn authorize_url(&self, state: &str) -> ApiResult<String> {
        let mut url = Url::parse(&self.config.auth_url)
            .map_err(|e| ApiError::Internal(format!("invalid auth_url: {e}")))?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", &self.config.redirect_url)
            .append_pair("response_type", "code")
            .append_pair("scope", &self.config.scopes.join(" "))
            .append_pair("state", state);
        Ok(url.to_string())
    }

    /// Exchange an authorization code and fetch the signed-in identity
    pub async fn identify(&self, code: &str) -> ApiResult<UserInfo> {
        let token = self.exchange_code(code).await?;
        self.userinfo(&token).await
    }

    async fn exchange_code(&self, code: &str) -> ApiResult<String> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("redirect_uri", self.config.redirect_url.as_str()),
        ];

        let response = self
            .http
            .post(&self.config.token_url)
            .form(&params)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ApiError::Upstream(format!("token exchange failed: {e}")))?;

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| ApiError::Upstream(format!("invalid token response: {e}")))?;
        debug!("Exchanged authorization code for access token");
        Ok(token.access_token)
    }

    async fn userinfo(&self, access_token: &str) -> ApiResult<UserInfo> {
        self.http
            .get(&self.config.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ApiError::Upstream(format!("userinfo request failed: {e}")))?
            .json::<UserInfo>()
            .await
            .map_err(|e| ApiError::Upstream(format!("invalid userinfo response: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authorize_url_carries_client_and_state() {
        let client = OAuthClient::new(OAuthConfig {
            client_id: "client-1".to_string(),
            redirect_url: "http://localhost:5780/auth/callback".to_string(),
            ..OAuthConfig::default()
        })
        .unwrap();

        let url = Url::parse(&client.authorize_url("nonce123").unwrap()).unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();

        assert!(url.as_str().starts_with("https://accounts.google.com/"));
        assert!(pairs.contains(&("client_id".to_string(), "client-1".to_string())));
        assert!(pairs.contains(&("state".to_string(), "nonce123".to_string())));
        assert!(pairs.contains(&("response_type".to_string(), "code".to_string())));
        assert!(pairs.contains(&(
            "redirect_uri".to_string(),
            "http://localhost:5780/auth/callback".to_string()
        )));
    }
}
