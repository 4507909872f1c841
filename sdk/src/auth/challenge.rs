use crate::common::errors::{AzureError, AzureResult};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Authentication challenge returned by Key Vault on an unauthorized request.
///
/// The vault answers the first request with `401 Unauthorized` and a
/// `WWW-Authenticate` header naming the AAD authority and the resource the
/// caller must obtain a token for. Older vaults send `resource=`, newer ones
/// send a ready-made `scope=`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthChallenge {
    /// AAD authority URL, including the tenant
    pub authorization: String,
    /// OAuth scope to request a token for
    pub scope: String,
}

impl AuthChallenge {
    /// Parses a `WWW-Authenticate` bearer challenge.
    ///
    /// Values may be quoted or bare. A `resource=` parameter is converted to
    /// a scope by appending `/.default`.
    ///
    /// # Errors
    ///
    /// Returns [`AzureError::AuthenticationError`] if the scheme is not
    /// `Bearer` or the challenge names neither a resource nor a scope.
    pub fn parse(www_authenticate: &str) -> AzureResult<Self> {
        let trimmed = www_authenticate.trim();
        let rest = trimmed
            .strip_prefix("Bearer ")
            .or_else(|| trimmed.strip_prefix("bearer "))
            .ok_or_else(|| {
                AzureError::AuthenticationError(format!(
                    "Unsupported challenge scheme in header: {trimmed}"
                ))
            })?;

        let mut params = HashMap::new();
        for part in rest.split(',') {
            if let Some((key, value)) = part.split_once('=') {
                params.insert(
                    key.trim().to_ascii_lowercase(),
                    value.trim().trim_matches('"').to_string(),
                );
            }
        }

        let authorization = params
            .remove("authorization")
            .or_else(|| params.remove("authorization_uri"))
            .ok_or_else(|| {
                AzureError::AuthenticationError(
                    "Challenge is missing the authorization parameter".to_string(),
                )
            })?;

        let scope = match params.remove("scope") {
            Some(scope) => scope,
            None => match params.remove("resource") {
                Some(resource) => format!("{}/.default", resource.trim_end_matches('/')),
                None => {
                    return Err(AzureError::AuthenticationError(
                        "Challenge names neither a resource nor a scope".to_string(),
                    ));
                }
            },
        };

        Ok(Self {
            authorization,
            scope,
        })
    }
}

/// Per-vault cache of parsed challenges.
///
/// Keyed by URL origin so every request to an already-seen vault can send
/// a correctly scoped token up front instead of probing for a 401 first.
#[derive(Clone, Default)]
pub struct ChallengeCache {
    entries: Arc<RwLock<HashMap<String, AuthChallenge>>>,
}

impl ChallengeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, origin: &str) -> Option<AuthChallenge> {
        let entries = self.entries.read().await;
        entries.get(origin).cloned()
    }

    pub async fn set(&self, origin: String, challenge: AuthChallenge) {
        let mut entries = self.entries.write().await;
        entries.insert(origin, challenge);
    }
}

/// Cache key for a vault URL: scheme, host, and any explicit port.
pub fn url_origin(url: &reqwest::Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{}://{host}:{port}", url.scheme()),
        None => format!("{}://{host}", url.scheme()),
    }
}
