pub mod alg;
pub mod cbc_hmac;
pub mod envelope;
pub mod gcm;
pub mod jwe;
pub mod jws;

pub use alg::{EncryptionAlgorithm, KeyWrapAlgorithm, SignatureAlgorithm};
pub use cbc_hmac::CbcHmac;
pub use envelope::MessageSecurity;
pub use gcm::AesGcmProvider;
pub use jwe::Jwe;
pub use jws::Jws;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};

use crate::keyvault::models::JsonWebKey;

/// Errors from message security operations.
///
/// Decryption failures all map to the one detail-free variant; tag
/// mismatches, bad padding, and key-unwrap failures are indistinguishable
/// to the caller.
#[derive(Debug, thiserror::Error)]
pub enum SecurityError {
    /// Message framing problems: wrong segment count, bad base64url,
    /// malformed header JSON.
    #[error("Invalid message format: {reason}")]
    InvalidFormat { reason: String },

    /// Any failure while decrypting.
    #[error("Decryption failed")]
    DecryptionFailed,

    #[error("Signature verification failed")]
    SignatureInvalid,

    #[error("Unsupported algorithm: {name}")]
    UnsupportedAlgorithm { name: String },

    #[error("Invalid key material: {reason}")]
    InvalidKey { reason: String },

    #[error("Encryption failed: {reason}")]
    EncryptionFailed { reason: String },

    #[error("Signing failed: {reason}")]
    SigningFailed { reason: String },
}

impl From<SecurityError> for crate::common::errors::AzureError {
    fn from(err: SecurityError) -> Self {
        crate::common::errors::AzureError::CryptoError(err.to_string())
    }
}

/// Encodes bytes as base64url without padding, the JOSE segment encoding.
pub fn b64url_encode(data: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(data)
}

/// Decodes a base64url segment. Padded or otherwise non-canonical input
/// is rejected.
pub fn b64url_decode(segment: &str) -> Result<Vec<u8>, SecurityError> {
    URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| SecurityError::InvalidFormat {
            reason: format!("invalid base64url segment: {e}"),
        })
}

/// Extracts the symmetric key material of an octet vault key.
pub fn oct_key_from_jwk(jwk: &JsonWebKey) -> Result<zeroize::Zeroizing<Vec<u8>>, SecurityError> {
    if jwk.kty != "oct" {
        return Err(SecurityError::InvalidKey {
            reason: format!("expected an octet key, got kty {}", jwk.kty),
        });
    }
    let k = jwk.k.as_deref().ok_or_else(|| SecurityError::InvalidKey {
        reason: "octet key is missing its key material".to_string(),
    })?;
    Ok(zeroize::Zeroizing::new(b64url_decode(k)?))
}

/// Builds an RSA public key from the `n` and `e` components of a vault key.
pub fn rsa_public_key_from_jwk(jwk: &JsonWebKey) -> Result<rsa::RsaPublicKey, SecurityError> {
    if jwk.kty != "RSA" {
        return Err(SecurityError::InvalidKey {
            reason: format!("expected an RSA key, got kty {}", jwk.kty),
        });
    }
    let n = jwk.n.as_deref().ok_or_else(|| SecurityError::InvalidKey {
        reason: "RSA key is missing the modulus".to_string(),
    })?;
    let e = jwk.e.as_deref().ok_or_else(|| SecurityError::InvalidKey {
        reason: "RSA key is missing the public exponent".to_string(),
    })?;

    let n = rsa::BigUint::from_bytes_be(&b64url_decode(n)?);
    let e = rsa::BigUint::from_bytes_be(&b64url_decode(e)?);
    rsa::RsaPublicKey::new(n, e).map_err(|err| SecurityError::InvalidKey {
        reason: err.to_string(),
    })
}
