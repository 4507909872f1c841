use crate::common::errors::AzureResult;
use async_trait::async_trait;

/// Access token returned by a credential.
#[derive(Clone, Debug)]
pub struct AccessToken {
    /// The actual access token string
    pub token: String,
    /// The type of token (e.g., "Bearer")
    pub token_type: String,
    /// Optional expiration time in seconds from when the token was issued
    pub expires_in_secs: Option<u64>,
}

/// Trait for credentials that can obtain Azure AD access tokens.
///
/// Every service client in this crate authenticates through this seam, so
/// callers can plug in managed identity, workload identity, or test doubles
/// without the clients knowing the difference.
///
/// # Examples
///
/// ```no_run
/// use stratus::auth::provider::{AccessToken, TokenCredential};
/// use stratus::common::errors::AzureResult;
/// use async_trait::async_trait;
///
/// struct MyCredential;
///
/// #[async_trait]
/// impl TokenCredential for MyCredential {
///     async fn get_token(&self, _scope: &str) -> AzureResult<AccessToken> {
///         Ok(AccessToken {
///             token: "example_token".to_string(),
///             token_type: "Bearer".to_string(),
///             expires_in_secs: Some(3600),
///         })
///     }
/// }
/// ```
#[async_trait]
pub trait TokenCredential: Send + Sync {
    /// Obtains an access token valid for the given scope.
    ///
    /// Scopes are full resource URIs with a `/.default` suffix, for example
    /// `https://management.azure.com/.default`.
    ///
    /// # Errors
    ///
    /// Returns an error if the token cannot be obtained for any reason,
    /// including network issues, invalid credentials, or a rejected scope.
    async fn get_token(&self, scope: &str) -> AzureResult<AccessToken>;
}

/// Credential that always hands out one pre-acquired token.
///
/// Useful in tests and in hosts that obtain tokens through an external
/// mechanism and only need to thread them through the clients.
#[derive(Clone, Debug)]
pub struct StaticTokenCredential {
    token: String,
}

impl StaticTokenCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl TokenCredential for StaticTokenCredential {
    async fn get_token(&self, _scope: &str) -> AzureResult<AccessToken> {
        Ok(AccessToken {
            token: self.token.clone(),
            token_type: "Bearer".to_string(),
            expires_in_secs: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_credential_ignores_scope() {
        let credential = StaticTokenCredential::new("fixed");
        let a = credential
            .get_token("https://management.azure.com/.default")
            .await
            .unwrap();
        let b = credential
            .get_token("https://vault.azure.net/.default")
            .await
            .unwrap();
        assert_eq!(a.token, "fixed");
        assert_eq!(a.token, b.token);
        assert_eq!(a.token_type, "Bearer");
    }
}
