use crate::auth::TokenCredential;
use crate::auth::challenge::{AuthChallenge, ChallengeCache, url_origin};
use crate::common::errors::{AzureError, AzureResult, HttpError, not_found};
use crate::common::http::{ClientOptions, build_http_client, client_request_id, parse_json};
use crate::common::paging::{PageFlavor, Pager};
use crate::common::retry::RetryPolicy;
use reqwest::header::AUTHORIZATION;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;

use super::models::{
    CreateKeyParameters, DeletedKey, DeletedSecret, KeyItem, KeyOperationParameters,
    KeyOperationResult, KeyVaultKey, KeyVerifyParameters, KeyVerifyResult, Secret, SecretItem,
    SetSecretParameters,
};
use super::security::{
    EncryptionAlgorithm, KeyWrapAlgorithm, SignatureAlgorithm, b64url_decode, b64url_encode,
};

const API_VERSION: &str = "7.4";

/// Shared core for the vault clients: URL building, challenge-based
/// authentication, retries, and error mapping.
///
/// Key Vault does not accept a token scoped by guesswork. The first request
/// to a vault is sent without a body or token; the vault answers
/// `401 Unauthorized` with a challenge naming the scope to use. The core
/// caches that challenge per vault and replays a request at most once when
/// the cached challenge goes stale.
#[derive(Clone)]
pub struct KeyVaultClient {
    base_url: String,
    origin: String,
    api_version: String,
    http_client: reqwest::Client,
    credential: Arc<dyn TokenCredential>,
    challenges: ChallengeCache,
    retry: RetryPolicy,
}

impl KeyVaultClient {
    pub fn new(vault_url: &str, credential: Arc<dyn TokenCredential>) -> AzureResult<Self> {
        Self::with_options(vault_url, credential, ClientOptions::default())
    }

    pub fn with_options(
        vault_url: &str,
        credential: Arc<dyn TokenCredential>,
        options: ClientOptions,
    ) -> AzureResult<Self> {
        let parsed: reqwest::Url = vault_url
            .parse()
            .map_err(|e| AzureError::InvalidConfiguration(format!("Invalid vault URL: {e}")))?;

        Ok(Self {
            base_url: vault_url.trim_end_matches('/').to_string(),
            origin: url_origin(&parsed),
            api_version: options
                .api_version
                .unwrap_or_else(|| API_VERSION.to_string()),
            http_client: build_http_client(options.timeout_secs)?,
            credential,
            challenges: ChallengeCache::new(),
            retry: options.retry,
        })
    }

    fn operation_url(&self, path: &str) -> String {
        format!("{}/{}?api-version={}", self.base_url, path, self.api_version)
    }

    /// Returns the vault's cached challenge, probing for one if necessary.
    ///
    /// The probe carries no body and no token, so nothing sensitive leaves
    /// the client before the vault has named its scope.
    async fn ensure_challenge(&self, method: &Method, url: &str) -> AzureResult<AuthChallenge> {
        if let Some(challenge) = self.challenges.get(&self.origin).await {
            return Ok(challenge);
        }

        let response = self
            .http_client
            .request(method.clone(), url)
            .header("x-ms-client-request-id", client_request_id())
            .send()
            .await
            .map_err(|e| HttpError::RequestFailed {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let challenge = Self::challenge_from(&response)?;
        self.challenges
            .set(self.origin.clone(), challenge.clone())
            .await;
        log::debug!("Cached authentication challenge for {}", self.origin);
        Ok(challenge)
    }

    fn challenge_from(response: &reqwest::Response) -> AzureResult<AuthChallenge> {
        let header = response
            .headers()
            .get(reqwest::header::WWW_AUTHENTICATE)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                AzureError::AuthenticationFailed(
                    "Vault did not return an authentication challenge".to_string(),
                )
            })?;
        AuthChallenge::parse(header)
    }

    async fn request(
        &self,
        method: Method,
        url: &str,
        body: Option<&serde_json::Value>,
        token: &str,
    ) -> AzureResult<reqwest::Response> {
        let mut request = self
            .http_client
            .request(method, url)
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .header("x-ms-client-request-id", client_request_id());
        if let Some(body) = body {
            request = request.json(body);
        }
        request.send().await.map_err(|e| {
            AzureError::from(HttpError::RequestFailed {
                url: url.to_string(),
                reason: e.to_string(),
            })
        })
    }

    /// Sends one authenticated request, replaying at most once if the vault
    /// rejects the cached challenge's scope.
    async fn send_authorized(
        &self,
        method: Method,
        url: &str,
        body: Option<&serde_json::Value>,
        operation: &str,
    ) -> AzureResult<reqwest::Response> {
        let challenge = self.ensure_challenge(&method, url).await?;
        let token = self.credential.get_token(&challenge.scope).await?;
        let response = self.request(method.clone(), url, body, &token.token).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        let challenge = Self::challenge_from(&response)?;
        self.challenges
            .set(self.origin.clone(), challenge.clone())
            .await;
        let token = self.credential.get_token(&challenge.scope).await?;
        let response = self.request(method, url, body, &token.token).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(AzureError::AuthenticationFailed(format!(
                "{operation} was rejected by the vault after a challenge replay"
            )));
        }
        Ok(response)
    }

    async fn execute_json<T: DeserializeOwned>(
        &self,
        method: Method,
        url: String,
        body: Option<serde_json::Value>,
        operation: &'static str,
        expected: &'static str,
    ) -> AzureResult<T> {
        let url_ref = url.as_str();
        let body_ref = body.as_ref();
        self.retry
            .run(operation, || {
                let method = method.clone();
                async move {
                    let response = self
                        .send_authorized(method, url_ref, body_ref, operation)
                        .await?;
                    if !response.status().is_success() {
                        return Err(AzureError::from_azure_response(response, operation).await);
                    }
                    parse_json(response, expected).await
                }
            })
            .await
    }

    async fn pager<T: DeserializeOwned>(
        &self,
        url: String,
        operation: &'static str,
    ) -> AzureResult<Pager<T>> {
        let challenge = self.ensure_challenge(&Method::GET, &url).await?;
        let token = self.credential.get_token(&challenge.scope).await?;
        Ok(Pager::new(
            self.http_client.clone(),
            token.token,
            url,
            operation,
            PageFlavor::NextLink,
        ))
    }
}

/// Client for vault secrets.
#[derive(Clone)]
pub struct SecretClient {
    core: KeyVaultClient,
}

impl SecretClient {
    pub fn new(vault_url: &str, credential: Arc<dyn TokenCredential>) -> AzureResult<Self> {
        Ok(Self {
            core: KeyVaultClient::new(vault_url, credential)?,
        })
    }

    /// Shares the challenge cache and HTTP client of an existing core.
    pub fn from_core(core: KeyVaultClient) -> Self {
        Self { core }
    }

    /// Stores a secret value, creating a new version if the secret exists.
    pub async fn set_secret(
        &self,
        name: &str,
        parameters: SetSecretParameters,
    ) -> AzureResult<Secret> {
        let url = self.core.operation_url(&format!("secrets/{name}"));
        let body = serde_json::to_value(&parameters)?;
        self.core
            .execute_json(Method::PUT, url, Some(body), "set_secret", "secret bundle")
            .await
    }

    /// Reads a secret, latest version unless one is given.
    pub async fn get_secret(&self, name: &str, version: Option<&str>) -> AzureResult<Secret> {
        let path = match version {
            Some(version) => format!("secrets/{name}/{version}"),
            None => format!("secrets/{name}"),
        };
        let url = self.core.operation_url(&path);
        self.core
            .execute_json(Method::GET, url, None, "get_secret", "secret bundle")
            .await
            .map_err(not_found("secret", name))
    }

    pub async fn delete_secret(&self, name: &str) -> AzureResult<DeletedSecret> {
        let url = self.core.operation_url(&format!("secrets/{name}"));
        self.core
            .execute_json(
                Method::DELETE,
                url,
                None,
                "delete_secret",
                "deleted secret bundle",
            )
            .await
            .map_err(not_found("secret", name))
    }

    /// Lists secrets without their values, one page at a time.
    pub async fn list_secrets(&self, max_results: Option<u32>) -> AzureResult<Pager<SecretItem>> {
        let mut url = self.core.operation_url("secrets");
        if let Some(max) = max_results {
            url.push_str(&format!("&maxresults={max}"));
        }
        self.core.pager(url, "list_secrets").await
    }

    pub async fn list_secret_versions(
        &self,
        name: &str,
        max_results: Option<u32>,
    ) -> AzureResult<Pager<SecretItem>> {
        let mut url = self.core.operation_url(&format!("secrets/{name}/versions"));
        if let Some(max) = max_results {
            url.push_str(&format!("&maxresults={max}"));
        }
        self.core.pager(url, "list_secret_versions").await
    }
}

/// Client for vault keys and the cryptographic operations the vault
/// performs on the caller's behalf.
#[derive(Clone)]
pub struct KeyClient {
    core: KeyVaultClient,
}

impl KeyClient {
    pub fn new(vault_url: &str, credential: Arc<dyn TokenCredential>) -> AzureResult<Self> {
        Ok(Self {
            core: KeyVaultClient::new(vault_url, credential)?,
        })
    }

    /// Shares the challenge cache and HTTP client of an existing core.
    pub fn from_core(core: KeyVaultClient) -> Self {
        Self { core }
    }

    pub async fn create_key(
        &self,
        name: &str,
        parameters: CreateKeyParameters,
    ) -> AzureResult<KeyVaultKey> {
        let url = self.core.operation_url(&format!("keys/{name}/create"));
        let body = serde_json::to_value(&parameters)?;
        self.core
            .execute_json(Method::POST, url, Some(body), "create_key", "key bundle")
            .await
    }

    /// Reads a key, latest version unless one is given.
    pub async fn get_key(&self, name: &str, version: Option<&str>) -> AzureResult<KeyVaultKey> {
        let path = match version {
            Some(version) => format!("keys/{name}/{version}"),
            None => format!("keys/{name}"),
        };
        let url = self.core.operation_url(&path);
        self.core
            .execute_json(Method::GET, url, None, "get_key", "key bundle")
            .await
            .map_err(not_found("key", name))
    }

    pub async fn delete_key(&self, name: &str) -> AzureResult<DeletedKey> {
        let url = self.core.operation_url(&format!("keys/{name}"));
        self.core
            .execute_json(Method::DELETE, url, None, "delete_key", "deleted key bundle")
            .await
            .map_err(not_found("key", name))
    }

    pub async fn list_keys(&self, max_results: Option<u32>) -> AzureResult<Pager<KeyItem>> {
        let mut url = self.core.operation_url("keys");
        if let Some(max) = max_results {
            url.push_str(&format!("&maxresults={max}"));
        }
        self.core.pager(url, "list_keys").await
    }

    /// Wraps a symmetric key with a vault key. Returns the wrapped bytes.
    pub async fn wrap_key(
        &self,
        name: &str,
        version: Option<&str>,
        algorithm: KeyWrapAlgorithm,
        key: &[u8],
    ) -> AzureResult<Vec<u8>> {
        self.key_operation(name, version, "wrapkey", "wrap_key", algorithm.as_str(), key)
            .await
    }

    pub async fn unwrap_key(
        &self,
        name: &str,
        version: Option<&str>,
        algorithm: KeyWrapAlgorithm,
        wrapped_key: &[u8],
    ) -> AzureResult<Vec<u8>> {
        self.key_operation(
            name,
            version,
            "unwrapkey",
            "unwrap_key",
            algorithm.as_str(),
            wrapped_key,
        )
        .await
    }

    pub async fn encrypt(
        &self,
        name: &str,
        version: Option<&str>,
        algorithm: EncryptionAlgorithm,
        plaintext: &[u8],
    ) -> AzureResult<Vec<u8>> {
        self.key_operation(
            name,
            version,
            "encrypt",
            "encrypt",
            algorithm.as_str(),
            plaintext,
        )
        .await
    }

    pub async fn decrypt(
        &self,
        name: &str,
        version: Option<&str>,
        algorithm: EncryptionAlgorithm,
        ciphertext: &[u8],
    ) -> AzureResult<Vec<u8>> {
        self.key_operation(
            name,
            version,
            "decrypt",
            "decrypt",
            algorithm.as_str(),
            ciphertext,
        )
        .await
    }

    /// Signs a precomputed digest with a vault key.
    pub async fn sign(
        &self,
        name: &str,
        version: Option<&str>,
        algorithm: SignatureAlgorithm,
        digest: &[u8],
    ) -> AzureResult<Vec<u8>> {
        self.key_operation(name, version, "sign", "sign", algorithm.as_str(), digest)
            .await
    }

    /// Verifies a signature over a precomputed digest with a vault key.
    pub async fn verify(
        &self,
        name: &str,
        version: Option<&str>,
        algorithm: SignatureAlgorithm,
        digest: &[u8],
        signature: &[u8],
    ) -> AzureResult<bool> {
        let url = self
            .core
            .operation_url(&Self::key_path(name, version, "verify"));
        let body = serde_json::to_value(&KeyVerifyParameters {
            alg: algorithm.as_str().to_string(),
            digest: b64url_encode(digest),
            value: b64url_encode(signature),
        })?;
        let result: KeyVerifyResult = self
            .core
            .execute_json(Method::POST, url, Some(body), "verify", "verify result")
            .await
            .map_err(not_found("key", name))?;
        Ok(result.value)
    }

    fn key_path(name: &str, version: Option<&str>, op: &str) -> String {
        match version {
            Some(version) => format!("keys/{name}/{version}/{op}"),
            None => format!("keys/{name}/{op}"),
        }
    }

    async fn key_operation(
        &self,
        name: &str,
        version: Option<&str>,
        op_segment: &str,
        operation: &'static str,
        alg: &str,
        value: &[u8],
    ) -> AzureResult<Vec<u8>> {
        let url = self
            .core
            .operation_url(&Self::key_path(name, version, op_segment));
        let body = serde_json::to_value(&KeyOperationParameters {
            alg: alg.to_string(),
            value: b64url_encode(value),
        })?;
        let result: KeyOperationResult = self
            .core
            .execute_json(Method::POST, url, Some(body), operation, "key operation result")
            .await
            .map_err(not_found("key", name))?;
        b64url_decode(&result.value).map_err(AzureError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticTokenCredential;

    fn test_core() -> KeyVaultClient {
        KeyVaultClient::new(
            "https://myvault.vault.azure.net/",
            Arc::new(StaticTokenCredential::new("token")),
        )
        .unwrap()
    }

    #[test]
    fn operation_urls_carry_api_version() {
        let core = test_core();
        assert_eq!(
            core.operation_url("secrets/db-password"),
            "https://myvault.vault.azure.net/secrets/db-password?api-version=7.4"
        );
    }

    #[test]
    fn key_paths_skip_missing_version() {
        assert_eq!(
            KeyClient::key_path("wrap-key", Some("v1"), "wrapkey"),
            "keys/wrap-key/v1/wrapkey"
        );
        assert_eq!(
            KeyClient::key_path("wrap-key", None, "wrapkey"),
            "keys/wrap-key/wrapkey"
        );
    }

    #[test]
    fn invalid_vault_url_is_rejected() {
        let result = KeyVaultClient::new(
            "not a url",
            Arc::new(StaticTokenCredential::new("token")),
        );
        assert!(result.is_err());
    }
}
