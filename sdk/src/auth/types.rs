use crate::common::errors::{AzureError, AzureResult};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Configuration for the OAuth client credentials flow.
///
/// All three identifiers are required; the authority host is optional and
/// defaults to the public Azure AD endpoint.
///
/// # Examples
///
/// ```no_run
/// use stratus::auth::types::ClientSecretConfig;
///
/// let config = ClientSecretConfig {
///     tenant_id: "your-tenant-id".to_string(),
///     client_id: "your-client-id".to_string(),
///     client_secret: "your-client-secret".to_string(),
///     authority_host: None, // Uses https://login.microsoftonline.com
/// };
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClientSecretConfig {
    /// Azure AD tenant ID (REQUIRED)
    pub tenant_id: String,
    /// Azure AD application (client) ID (REQUIRED)
    pub client_id: String,
    /// Azure AD application client secret (REQUIRED)
    pub client_secret: String,
    /// Azure AD authority host URL (OPTIONAL - defaults to https://login.microsoftonline.com)
    pub authority_host: Option<String>,
}

impl ClientSecretConfig {
    pub fn new(
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            authority_host: None,
        }
    }

    pub fn authority_host(&self) -> &str {
        self.authority_host
            .as_deref()
            .unwrap_or("https://login.microsoftonline.com")
    }

    /// Rejects configurations with blank identifiers before any request is made.
    pub fn validate(&self) -> AzureResult<()> {
        if self.tenant_id.trim().is_empty() {
            return Err(AzureError::ConfigurationError(
                "tenant_id is required".to_string(),
            ));
        }
        if self.client_id.trim().is_empty() {
            return Err(AzureError::ConfigurationError(
                "client_id is required".to_string(),
            ));
        }
        if self.client_secret.trim().is_empty() {
            return Err(AzureError::ConfigurationError(
                "client_secret is required".to_string(),
            ));
        }
        Ok(())
    }
}

/// A cached access token with expiration tracking.
///
/// Holds the token string together with its computed expiry so callers can
/// decide between reuse and refresh without re-parsing the token.
#[derive(Clone, Debug)]
pub struct CachedToken {
    /// The access token string
    pub token: String,
    /// When the token expires
    pub expires_at: Instant,
    /// The type of token (e.g., "Bearer")
    pub token_type: String,
}

impl CachedToken {
    pub fn new(token: String, expires_in: Duration, token_type: String) -> Self {
        Self {
            token,
            expires_at: Instant::now() + expires_in,
            token_type,
        }
    }

    /// Checks if the token has passed its expiration time.
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }

    /// Checks if the token should be refreshed soon.
    ///
    /// Uses a 5-minute buffer before expiration so tokens are replaced
    /// before they actually expire mid-request.
    pub fn needs_refresh(&self) -> bool {
        let buffer = Duration::from_secs(300); // 5 minute buffer
        Instant::now() + buffer >= self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_token_is_not_expired() {
        let token = CachedToken::new(
            "tok".to_string(),
            Duration::from_secs(3600),
            "Bearer".to_string(),
        );
        assert!(!token.is_expired());
        assert!(!token.needs_refresh());
    }

    #[test]
    fn token_inside_refresh_buffer_needs_refresh() {
        let token = CachedToken::new(
            "tok".to_string(),
            Duration::from_secs(120),
            "Bearer".to_string(),
        );
        assert!(!token.is_expired());
        assert!(token.needs_refresh());
    }

    #[test]
    fn blank_config_fields_fail_validation() {
        let config = ClientSecretConfig::new("tenant", "", "secret");
        assert!(config.validate().is_err());

        let config = ClientSecretConfig::new("tenant", "client", "secret");
        assert!(config.validate().is_ok());
        assert_eq!(config.authority_host(), "https://login.microsoftonline.com");
    }
}
