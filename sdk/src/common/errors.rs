use std::fmt;
use thiserror::Error;

/// HTTP-level errors with context for network operations.
///
/// Classifies transport failures underneath the service clients. Service
/// modules convert these into [`AzureError`] before surfacing them.
#[derive(Debug, Error)]
pub enum HttpError {
    /// HTTP client initialization failed.
    ///
    /// # Fields
    /// - `reason`: Detailed description of the client creation failure
    #[error("HTTP client creation failed: {reason}")]
    ClientCreation { reason: String },

    /// HTTP request execution failed.
    ///
    /// # Fields
    /// - `url`: The URL that was being requested
    /// - `reason`: Detailed description of the failure
    #[error("Request failed: {url} - {reason}")]
    RequestFailed { url: String, reason: String },

    /// HTTP request timed out.
    ///
    /// # Fields
    /// - `url`: The URL that timed out
    /// - `seconds`: The timeout duration that was exceeded
    #[error("Request timeout after {seconds}s: {url}")]
    Timeout { url: String, seconds: u64 },

    /// Received response doesn't match the expected format.
    ///
    /// # Fields
    /// - `expected`: Description of what was expected
    /// - `actual`: Description of what was actually received
    #[error("Invalid response: expected {expected}, got {actual}")]
    InvalidResponse { expected: String, actual: String },
}

#[derive(Debug, Clone)]
pub enum AzureError {
    /// Azure API specific errors with full context
    ApiError {
        code: String,               // Azure error code (e.g., "SecretNotFound")
        status_code: u16,           // HTTP status code
        message: String,            // Human-readable error message
        request_id: Option<String>, // Azure request ID for tracking
        operation: String,          // Operation that failed (e.g., "get_secret")
    },

    /// Service asked us to back off
    RateLimited {
        retry_after_seconds: u64,
        operation: String,
    },

    /// Authentication and credential errors
    AuthenticationFailed(String),
    AuthenticationError(String),

    /// Target resource does not exist
    ResourceNotFound(String),

    /// Configuration errors
    ConfigurationError(String),
    InvalidConfiguration(String),

    /// Cryptographic operation errors (message security, signing, key wrap)
    CryptoError(String),

    /// Long-running operation ended in a failed state
    PollingFailed(String),

    /// Serialization / deserialization errors
    SerializationError(String),

    /// Timeout errors
    OperationTimeout(String),

    /// Generic errors
    InternalError(String),
    Unknown(String),
}

impl fmt::Display for AzureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AzureError::ApiError {
                code,
                status_code,
                message,
                request_id,
                operation,
            } => {
                write!(
                    f,
                    "Azure API error during {operation}: {code} (HTTP {status_code}) - {message}"
                )?;
                if let Some(req_id) = request_id {
                    write!(f, " [Request ID: {req_id}]")?;
                }
                Ok(())
            }
            AzureError::RateLimited {
                retry_after_seconds,
                operation,
            } => {
                write!(
                    f,
                    "Rate limit exceeded during {operation}: retry after {retry_after_seconds}s"
                )
            }
            AzureError::AuthenticationFailed(msg) => {
                write!(f, "Authentication failed: {msg}")
            }
            AzureError::AuthenticationError(msg) => {
                write!(f, "Authentication error: {msg}")
            }
            AzureError::ResourceNotFound(msg) => write!(f, "Resource not found: {msg}"),
            AzureError::ConfigurationError(msg) => write!(f, "Configuration error: {msg}"),
            AzureError::InvalidConfiguration(msg) => {
                write!(f, "Invalid configuration: {msg}")
            }
            AzureError::CryptoError(msg) => write!(f, "Cryptographic operation failed: {msg}"),
            AzureError::PollingFailed(msg) => write!(f, "Polling failed: {msg}"),
            AzureError::SerializationError(msg) => write!(f, "Serialization error: {msg}"),
            AzureError::OperationTimeout(msg) => write!(f, "Operation timeout: {msg}"),
            AzureError::InternalError(msg) => write!(f, "Internal error: {msg}"),
            AzureError::Unknown(msg) => write!(f, "Unknown error: {msg}"),
        }
    }
}

impl std::error::Error for AzureError {}

impl AzureError {
    /// Create an Azure API error with full context
    pub fn api_error(
        operation: impl Into<String>,
        code: impl Into<String>,
        status_code: u16,
        message: impl Into<String>,
    ) -> Self {
        Self::ApiError {
            code: code.into(),
            status_code,
            message: message.into(),
            request_id: None,
            operation: operation.into(),
        }
    }

    /// Create an Azure API error with request ID for tracing
    pub fn api_error_with_request_id(
        operation: impl Into<String>,
        code: impl Into<String>,
        status_code: u16,
        message: impl Into<String>,
        request_id: impl Into<String>,
    ) -> Self {
        Self::ApiError {
            code: code.into(),
            status_code,
            message: message.into(),
            request_id: Some(request_id.into()),
            operation: operation.into(),
        }
    }

    /// Extract Azure error details from a reqwest Response.
    ///
    /// Parses the standard management-plane error body
    /// (`{"error": {"code": ..., "message": ...}}`), the storage variant
    /// (`{"odata.error": {...}}`), and the data-plane variant where `code`
    /// and `message` sit at the top level. Falls back to the raw body text
    /// when no shape matches.
    pub async fn from_azure_response(
        response: reqwest::Response,
        operation: impl Into<String>,
    ) -> Self {
        let operation = operation.into();
        let status_code = response.status().as_u16();
        let request_id = response
            .headers()
            .get("x-ms-request-id")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        if status_code == 429 {
            let retry_after_seconds = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(1);
            return Self::RateLimited {
                retry_after_seconds,
                operation,
            };
        }

        match response.text().await {
            Ok(body) => {
                if let Some((code, message)) = parse_error_body(&body) {
                    Self::ApiError {
                        code,
                        status_code,
                        message,
                        request_id,
                        operation,
                    }
                } else {
                    // Fallback for non-JSON responses
                    Self::ApiError {
                        code: format!("HTTP_{status_code}"),
                        status_code,
                        message: if body.is_empty() {
                            format!("HTTP {status_code} error")
                        } else {
                            body
                        },
                        request_id,
                        operation,
                    }
                }
            }
            Err(_) => Self::ApiError {
                code: format!("HTTP_{status_code}"),
                status_code,
                message: format!("HTTP {status_code} error - unable to read response body"),
                request_id,
                operation,
            },
        }
    }

    /// Check if this is an Azure API error
    pub fn is_api_error(&self) -> bool {
        matches!(self, AzureError::ApiError { .. })
    }

    /// Get the Azure error code if this is an Azure API error
    pub fn error_code(&self) -> Option<&str> {
        match self {
            AzureError::ApiError { code, .. } => Some(code),
            _ => None,
        }
    }

    /// Get the HTTP status code if this is an Azure API error
    pub fn status_code(&self) -> Option<u16> {
        match self {
            AzureError::ApiError { status_code, .. } => Some(*status_code),
            _ => None,
        }
    }

    /// Get the Azure request ID if available
    pub fn request_id(&self) -> Option<&str> {
        match self {
            AzureError::ApiError { request_id, .. } => request_id.as_deref(),
            _ => None,
        }
    }

    /// Whether a retry has a chance of succeeding.
    ///
    /// Server errors, timeouts and throttling are retryable. Authentication,
    /// configuration, not-found and crypto errors fail immediately.
    pub fn is_retryable(&self) -> bool {
        match self {
            AzureError::ApiError { status_code, .. } => {
                *status_code >= 500 || *status_code == 408 || *status_code == 429
            }
            AzureError::RateLimited { .. } => true,
            AzureError::OperationTimeout(_) => true,
            AzureError::InternalError(_) => true,
            AzureError::Unknown(_) => true,
            AzureError::AuthenticationFailed(_)
            | AzureError::AuthenticationError(_)
            | AzureError::ResourceNotFound(_)
            | AzureError::ConfigurationError(_)
            | AzureError::InvalidConfiguration(_)
            | AzureError::CryptoError(_)
            | AzureError::PollingFailed(_)
            | AzureError::SerializationError(_) => false,
        }
    }
}

/// Maps a 404 from a lookup onto [`AzureError::ResourceNotFound`] naming
/// the missing resource, leaving every other error untouched.
pub(crate) fn not_found(kind: &str, name: &str) -> impl FnOnce(AzureError) -> AzureError {
    let resource = format!("{kind} {name}");
    move |err| match err.status_code() {
        Some(404) => AzureError::ResourceNotFound(resource),
        _ => err,
    }
}

/// Management-plane error body: `{"error": {"code", "message"}}`
#[derive(Debug, serde::Deserialize)]
struct WrappedErrorResponse {
    error: ErrorDetails,
}

/// Storage services wrap the details as `{"odata.error": {"code", "message"}}`
#[derive(Debug, serde::Deserialize)]
struct ODataErrorResponse {
    #[serde(rename = "odata.error")]
    error: ErrorDetails,
}

#[derive(Debug, serde::Deserialize)]
struct ErrorDetails {
    code: String,
    message: ErrorMessage,
}

/// Data-plane services (Batch) nest the message as `{"lang", "value"}`
#[derive(Debug, serde::Deserialize)]
#[serde(untagged)]
enum ErrorMessage {
    Plain(String),
    Localized { value: String },
}

impl ErrorMessage {
    fn into_string(self) -> String {
        match self {
            ErrorMessage::Plain(s) => s,
            ErrorMessage::Localized { value } => value,
        }
    }
}

fn parse_error_body(body: &str) -> Option<(String, String)> {
    if let Ok(wrapped) = serde_json::from_str::<WrappedErrorResponse>(body) {
        return Some((wrapped.error.code, wrapped.error.message.into_string()));
    }
    if let Ok(wrapped) = serde_json::from_str::<ODataErrorResponse>(body) {
        return Some((wrapped.error.code, wrapped.error.message.into_string()));
    }
    if let Ok(details) = serde_json::from_str::<ErrorDetails>(body) {
        return Some((details.code, details.message.into_string()));
    }
    None
}

impl From<HttpError> for AzureError {
    fn from(err: HttpError) -> Self {
        match err {
            HttpError::ClientCreation { reason } => AzureError::ConfigurationError(format!(
                "HTTP client creation failed: {reason}"
            )),
            HttpError::RequestFailed { url, reason } => {
                AzureError::InternalError(format!("Request to {url} failed: {reason}"))
            }
            HttpError::Timeout { url, seconds } => AzureError::OperationTimeout(format!(
                "Request to {url} timed out after {seconds}s"
            )),
            HttpError::InvalidResponse { expected, actual } => AzureError::ConfigurationError(
                format!("Invalid response: expected {expected}, got {actual}"),
            ),
        }
    }
}

impl From<tokio::time::error::Elapsed> for AzureError {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        AzureError::OperationTimeout(err.to_string())
    }
}

impl From<serde_json::Error> for AzureError {
    fn from(err: serde_json::Error) -> Self {
        AzureError::SerializationError(err.to_string())
    }
}

// Result type alias for convenience
pub type AzureResult<T> = Result<T, AzureError>;
