use crate::common::errors::{AzureError, AzureResult};
use base64::{Engine as _, engine::general_purpose};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Generator for Service Bus Shared Access Signature (SAS) tokens.
///
/// Creates time-limited tokens by signing a URL-encoded namespace resource
/// URI and an expiry timestamp with HMAC-SHA256 under a base64-encoded
/// shared access key. A token grants access to the whole namespace under
/// the named key policy.
#[derive(Clone)]
pub struct SasTokenGenerator {
    namespace: String,
}

impl SasTokenGenerator {
    /// `namespace` is the bare namespace name, without
    /// `.servicebus.windows.net`.
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    /// Generates a SAS token valid for `duration_hours` from now.
    ///
    /// # Errors
    ///
    /// Returns [`AzureError::AuthenticationError`] if the key cannot be
    /// base64 decoded or HMAC setup fails.
    pub fn generate_sas_token(
        &self,
        key_name: &str,
        key: &str,
        duration_hours: i64,
    ) -> AzureResult<String> {
        let expiry = Utc::now() + Duration::hours(duration_hours);
        self.sas_token_with_expiry(key_name, key, expiry.timestamp())
    }

    // Expiry taken as a parameter so the signature is reproducible.
    fn sas_token_with_expiry(
        &self,
        key_name: &str,
        key: &str,
        expiry_timestamp: i64,
    ) -> AzureResult<String> {
        let resource_uri = format!("sb://{}.servicebus.windows.net/", self.namespace);
        let string_to_sign = format!(
            "{}\n{}",
            urlencoding::encode(&resource_uri),
            expiry_timestamp
        );

        let key_bytes = general_purpose::STANDARD
            .decode(key)
            .map_err(|e| AzureError::AuthenticationError(format!("Failed to decode key: {e}")))?;

        let mut mac = HmacSha256::new_from_slice(&key_bytes)
            .map_err(|e| AzureError::AuthenticationError(format!("Failed to create HMAC: {e}")))?;

        mac.update(string_to_sign.as_bytes());
        let signature = mac.finalize();
        let signature_base64 = general_purpose::STANDARD.encode(signature.into_bytes());

        let sas_token = format!(
            "SharedAccessSignature sr={}&sig={}&se={}&skn={}",
            urlencoding::encode(&resource_uri),
            urlencoding::encode(&signature_base64),
            expiry_timestamp,
            key_name
        );

        Ok(sas_token)
    }

    /// Connection string embedding a SAS token, for clients that take
    /// connection strings rather than raw tokens.
    pub fn create_connection_string_from_sas(&self, sas_token: &str) -> String {
        format!(
            "Endpoint=sb://{}.servicebus.windows.net/;SharedAccessSignature={}",
            self.namespace, sas_token
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "c2hhcmVkLWFjY2Vzcy1rZXk="; // "shared-access-key"

    #[test]
    fn token_carries_encoded_resource_and_key_name() {
        let generator = SasTokenGenerator::new("bus-prod");
        let token = generator
            .sas_token_with_expiry("RootManageSharedAccessKey", KEY, 1_700_000_000)
            .unwrap();

        assert!(token.starts_with(
            "SharedAccessSignature sr=sb%3A%2F%2Fbus-prod.servicebus.windows.net%2F&sig="
        ));
        assert!(token.ends_with("&se=1700000000&skn=RootManageSharedAccessKey"));
    }

    #[test]
    fn same_inputs_sign_identically() {
        let generator = SasTokenGenerator::new("bus-prod");
        let first = generator
            .sas_token_with_expiry("policy", KEY, 1_700_000_000)
            .unwrap();
        let second = generator
            .sas_token_with_expiry("policy", KEY, 1_700_000_000)
            .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn expiry_changes_the_signature() {
        let generator = SasTokenGenerator::new("bus-prod");
        let sig_of = |token: &str| {
            token
                .split("sig=")
                .nth(1)
                .unwrap()
                .split('&')
                .next()
                .unwrap()
                .to_string()
        };

        let early = generator
            .sas_token_with_expiry("policy", KEY, 1_700_000_000)
            .unwrap();
        let late = generator
            .sas_token_with_expiry("policy", KEY, 1_700_003_600)
            .unwrap();
        assert_ne!(sig_of(&early), sig_of(&late));
    }

    #[test]
    fn namespace_changes_the_signature() {
        let sig_of = |token: &str| {
            token
                .split("sig=")
                .nth(1)
                .unwrap()
                .split('&')
                .next()
                .unwrap()
                .to_string()
        };

        let prod = SasTokenGenerator::new("bus-prod")
            .sas_token_with_expiry("policy", KEY, 1_700_000_000)
            .unwrap();
        let dev = SasTokenGenerator::new("bus-dev")
            .sas_token_with_expiry("policy", KEY, 1_700_000_000)
            .unwrap();
        assert_ne!(sig_of(&prod), sig_of(&dev));
    }

    #[test]
    fn invalid_base64_key_is_an_authentication_error() {
        let generator = SasTokenGenerator::new("bus-prod");
        let result = generator.generate_sas_token("policy", "not base64!!!", 24);
        assert!(matches!(result, Err(AzureError::AuthenticationError(_))));
    }

    #[test]
    fn connection_string_embeds_the_token() {
        let generator = SasTokenGenerator::new("bus-prod");
        let connection_string = generator
            .create_connection_string_from_sas("SharedAccessSignature sr=x&sig=y&se=1&skn=z");
        assert_eq!(
            connection_string,
            "Endpoint=sb://bus-prod.servicebus.windows.net/;SharedAccessSignature=SharedAccessSignature sr=x&sig=y&se=1&skn=z"
        );
    }
}
