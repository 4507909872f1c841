use super::errors::HttpError;
use super::retry::RetryPolicy;
use once_cell::sync::Lazy;
use std::time::Duration;

/// User agent sent with every request, e.g. `stratus-sdk/0.1.0-alpha.1`.
pub static USER_AGENT: Lazy<String> =
    Lazy::new(|| format!("stratus-sdk/{}", env!("CARGO_PKG_VERSION")));

/// Default per-request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Options shared by all service clients.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Override the client's default `api-version` query parameter
    pub api_version: Option<String>,
    /// Retry policy for transient failures
    pub retry: RetryPolicy,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            api_version: None,
            retry: RetryPolicy::default(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Build the reqwest client used by the service clients.
pub fn build_http_client(timeout_secs: u64) -> Result<reqwest::Client, HttpError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(USER_AGENT.as_str())
        .build()
        .map_err(|e| HttpError::ClientCreation {
            reason: e.to_string(),
        })
}

/// Fresh `x-ms-client-request-id` value for request correlation.
pub fn client_request_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Deserializes a response body, mapping failures to `InvalidResponse`.
pub(crate) async fn parse_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
    expected: &str,
) -> Result<T, crate::common::errors::AzureError> {
    response.json::<T>().await.map_err(|e| {
        HttpError::InvalidResponse {
            expected: expected.to_string(),
            actual: e.to_string(),
        }
        .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_agent_carries_package_version() {
        assert!(USER_AGENT.starts_with("stratus-sdk/"));
        assert!(USER_AGENT.len() > "stratus-sdk/".len());
    }

    #[test]
    fn request_ids_are_unique() {
        assert_ne!(client_request_id(), client_request_id());
    }

    #[test]
    fn default_options() {
        let options = ClientOptions::default();
        assert_eq!(options.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert!(options.api_version.is_none());
        assert_eq!(options.retry.max_retries, 3);
    }
}
