use super::provider::{AccessToken, TokenCredential};
use super::token_cache::TokenCache;
use super::types::{CachedToken, ClientSecretConfig};
use crate::common::errors::{AzureError, AzureResult};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    token_type: String,
    expires_in: u64,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: String,
    error_description: Option<String>,
}

/// Credential implementing the OAuth 2.0 client credentials flow.
///
/// Tokens are cached per scope and refreshed ahead of expiry, so repeated
/// `get_token` calls for the same scope only hit Azure AD when needed.
#[derive(Clone)]
pub struct ClientSecretCredential {
    config: ClientSecretConfig,
    http_client: reqwest::Client,
    cache: TokenCache,
}

impl ClientSecretCredential {
    /// # Errors
    ///
    /// Returns a configuration error if any identifier in `config` is blank.
    pub fn new(config: ClientSecretConfig) -> AzureResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            http_client: reqwest::Client::new(),
            cache: TokenCache::new(),
        })
    }

    async fn request_token(&self, scope: &str) -> AzureResult<AccessToken> {
        let token_url = format!(
            "{}/{}/oauth2/v2.0/token",
            self.config.authority_host(),
            self.config.tenant_id
        );

        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("scope", scope),
        ];

        let response = self
            .http_client
            .post(&token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| {
                AzureError::AuthenticationError(format!("Failed to request token: {e}"))
            })?;

        if !response.status().is_success() {
            let error_info = response
                .json::<ErrorResponse>()
                .await
                .unwrap_or(ErrorResponse {
                    error: "unknown_error".to_string(),
                    error_description: Some("Failed to parse error response".to_string()),
                });

            let user_friendly_message = match error_info.error.as_str() {
                "invalid_client" => {
                    "Invalid client credentials. Please check the client ID and client secret."
                }
                "invalid_request" => {
                    "Invalid token request. Please check the tenant ID and client ID."
                }
                "unauthorized_client" => {
                    "This application is not authorized for the client credentials flow."
                }
                "invalid_scope" => {
                    "The requested scope is invalid or has not been granted to this application."
                }
                _ => error_info
                    .error_description
                    .as_deref()
                    .unwrap_or(&error_info.error),
            };

            return Err(AzureError::AuthenticationError(format!(
                "Authentication failed: {user_friendly_message}"
            )));
        }

        let token_response: TokenResponse = response.json().await.map_err(|e| {
            AzureError::AuthenticationError(format!("Failed to parse token response: {e}"))
        })?;

        Ok(AccessToken {
            token: token_response.access_token,
            token_type: token_response.token_type,
            expires_in_secs: Some(token_response.expires_in),
        })
    }
}

#[async_trait]
impl TokenCredential for ClientSecretCredential {
    async fn get_token(&self, scope: &str) -> AzureResult<AccessToken> {
        if !self.cache.needs_refresh(scope).await {
            if let Some(token) = self.cache.get(scope).await {
                return Ok(AccessToken {
                    token,
                    token_type: "Bearer".to_string(),
                    expires_in_secs: None,
                });
            }
        }

        let token = self.request_token(scope).await?;
        if let Some(expires_in) = token.expires_in_secs {
            self.cache
                .set(
                    scope.to_string(),
                    CachedToken::new(
                        token.token.clone(),
                        Duration::from_secs(expires_in),
                        token.token_type.clone(),
                    ),
                )
                .await;
        }
        log::debug!("Acquired new access token for scope {scope}");
        Ok(token)
    }
}
