use crate::common::errors::{AzureError, AzureResult};
use base64::{Engine as _, engine::general_purpose};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Storage account credential that signs requests with the account key.
///
/// Implements the Shared Key Lite scheme used by the Table service, where
/// the string-to-sign is the request date and the canonicalized resource
/// joined by a newline.
///
/// # Examples
///
/// ```no_run
/// use stratus::auth::SharedKeyCredential;
///
/// let credential = SharedKeyCredential::new("myaccount", "base64_encoded_key");
/// let header = credential.sign_table_lite(
///     "Mon, 18 Aug 2025 09:00:00 GMT",
///     "/myaccount/checkpoints",
/// )?;
/// # Ok::<(), stratus::common::AzureError>(())
/// ```
#[derive(Clone)]
pub struct SharedKeyCredential {
    account_name: String,
    account_key: String,
}

impl SharedKeyCredential {
    pub fn new(account_name: impl Into<String>, account_key: impl Into<String>) -> Self {
        Self {
            account_name: account_name.into(),
            account_key: account_key.into(),
        }
    }

    pub fn account_name(&self) -> &str {
        &self.account_name
    }

    /// Produces a complete `Authorization` header value for a Table request.
    ///
    /// # Arguments
    ///
    /// * `date` - The RFC 1123 date sent in the `x-ms-date` header
    /// * `canonicalized_resource` - `/{account}/{table path}` including any
    ///   `comp=` query parameter, with everything else stripped
    ///
    /// # Errors
    ///
    /// Returns [`AzureError::AuthenticationError`] if the account key cannot
    /// be base64 decoded or HMAC creation fails.
    pub fn sign_table_lite(
        &self,
        date: &str,
        canonicalized_resource: &str,
    ) -> AzureResult<String> {
        let string_to_sign = format!("{date}\n{canonicalized_resource}");

        let key_bytes = general_purpose::STANDARD
            .decode(&self.account_key)
            .map_err(|e| {
                AzureError::AuthenticationError(format!("Failed to decode account key: {e}"))
            })?;

        let mut mac = HmacSha256::new_from_slice(&key_bytes).map_err(|e| {
            AzureError::AuthenticationError(format!("Failed to create HMAC: {e}"))
        })?;

        mac.update(string_to_sign.as_bytes());
        let signature = mac.finalize();
        let signature_base64 = general_purpose::STANDARD.encode(signature.into_bytes());

        Ok(format!(
            "SharedKeyLite {}:{}",
            self.account_name, signature_base64
        ))
    }
}

/// Pre-signed shared access signature for the Table service.
///
/// Holds the SAS query string and appends it to request URLs in place of
/// an `Authorization` header.
#[derive(Clone)]
pub struct SasCredential {
    query: String,
}

impl SasCredential {
    /// Accepts the token with or without its leading `?`.
    pub fn new(sas_token: impl Into<String>) -> Self {
        let token = sas_token.into();
        let query = token.strip_prefix('?').unwrap_or(&token).to_string();
        Self { query }
    }

    pub fn query(&self) -> &str {
        &self.query
    }
}

/// Authentication options accepted by the Table client.
#[derive(Clone)]
pub enum TableCredential {
    SharedKey(SharedKeyCredential),
    Sas(SasCredential),
}
