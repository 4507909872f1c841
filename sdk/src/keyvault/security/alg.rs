use super::SecurityError;
use std::fmt;

/// Content encryption algorithms.
///
/// The GCM family is served by the vault or the local AES-GCM provider;
/// the CBC-HMAC family is what the message security envelope uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptionAlgorithm {
    A128Gcm,
    A192Gcm,
    A256Gcm,
    A128CbcHs256,
    A256CbcHs512,
}

impl EncryptionAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            EncryptionAlgorithm::A128Gcm => "A128GCM",
            EncryptionAlgorithm::A192Gcm => "A192GCM",
            EncryptionAlgorithm::A256Gcm => "A256GCM",
            EncryptionAlgorithm::A128CbcHs256 => "A128CBC-HS256",
            EncryptionAlgorithm::A256CbcHs512 => "A256CBC-HS512",
        }
    }

    pub fn parse(name: &str) -> Result<Self, SecurityError> {
        match name {
            "A128GCM" => Ok(EncryptionAlgorithm::A128Gcm),
            "A192GCM" => Ok(EncryptionAlgorithm::A192Gcm),
            "A256GCM" => Ok(EncryptionAlgorithm::A256Gcm),
            "A128CBC-HS256" => Ok(EncryptionAlgorithm::A128CbcHs256),
            "A256CBC-HS512" => Ok(EncryptionAlgorithm::A256CbcHs512),
            other => Err(SecurityError::UnsupportedAlgorithm {
                name: other.to_string(),
            }),
        }
    }

    /// Key length in bytes. The CBC-HMAC lengths cover the composite
    /// MAC-then-ENC key.
    pub fn key_len(&self) -> usize {
        match self {
            EncryptionAlgorithm::A128Gcm => 16,
            EncryptionAlgorithm::A192Gcm => 24,
            EncryptionAlgorithm::A256Gcm => 32,
            EncryptionAlgorithm::A128CbcHs256 => 32,
            EncryptionAlgorithm::A256CbcHs512 => 64,
        }
    }
}

impl fmt::Display for EncryptionAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key wrap algorithms for protecting content encryption keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyWrapAlgorithm {
    RsaOaep,
    RsaOaep256,
}

impl KeyWrapAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyWrapAlgorithm::RsaOaep => "RSA-OAEP",
            KeyWrapAlgorithm::RsaOaep256 => "RSA-OAEP-256",
        }
    }

    pub fn parse(name: &str) -> Result<Self, SecurityError> {
        match name {
            "RSA-OAEP" => Ok(KeyWrapAlgorithm::RsaOaep),
            "RSA-OAEP-256" => Ok(KeyWrapAlgorithm::RsaOaep256),
            other => Err(SecurityError::UnsupportedAlgorithm {
                name: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for KeyWrapAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Signature algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureAlgorithm {
    /// RSASSA-PKCS1-v1_5 with SHA-256
    Rs256,
    /// RSASSA-PSS with SHA-256
    Ps256,
}

impl SignatureAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignatureAlgorithm::Rs256 => "RS256",
            SignatureAlgorithm::Ps256 => "PS256",
        }
    }

    pub fn parse(name: &str) -> Result<Self, SecurityError> {
        match name {
            "RS256" => Ok(SignatureAlgorithm::Rs256),
            "PS256" => Ok(SignatureAlgorithm::Ps256),
            other => Err(SecurityError::UnsupportedAlgorithm {
                name: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
