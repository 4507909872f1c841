use rand::rngs::OsRng;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::Zeroizing;

use super::alg::{EncryptionAlgorithm, KeyWrapAlgorithm};
use super::cbc_hmac::CbcHmac;
use super::{SecurityError, b64url_decode, b64url_encode};

/// Protected header of an encrypted message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JweHeader {
    pub alg: String,
    pub enc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
}

/// JSON Web Encryption envelope in compact serialization.
///
/// The protected header segment is kept exactly as transmitted; it doubles
/// as the additional authenticated data, so re-serializing it would break
/// the tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Jwe {
    protected: String,
    encrypted_key: Vec<u8>,
    iv: Vec<u8>,
    ciphertext: Vec<u8>,
    tag: Vec<u8>,
}

impl Jwe {
    /// Encrypts `plaintext` for the holder of `recipient_key`.
    ///
    /// A fresh content encryption key is drawn per message and wrapped with
    /// RSA-OAEP-256; the key material is wiped once the envelope is built.
    pub fn encrypt(
        recipient_key: &RsaPublicKey,
        kid: Option<&str>,
        enc: EncryptionAlgorithm,
        plaintext: &[u8],
    ) -> Result<Self, SecurityError> {
        let cbc = CbcHmac::new(enc)?;
        let cek = cbc.generate_key();
        let encrypted_key = wrap_cek(recipient_key, &cek)?;

        let header = JweHeader {
            alg: KeyWrapAlgorithm::RsaOaep256.as_str().to_string(),
            enc: enc.as_str().to_string(),
            kid: kid.map(str::to_string),
        };
        let header_json =
            serde_json::to_vec(&header).map_err(|e| SecurityError::EncryptionFailed {
                reason: format!("header serialization failed: {e}"),
            })?;
        let protected = b64url_encode(&header_json);

        let payload = cbc.encrypt(&cek, plaintext, protected.as_bytes())?;
        Ok(Self {
            protected,
            encrypted_key,
            iv: payload.iv.to_vec(),
            ciphertext: payload.ciphertext,
            tag: payload.tag,
        })
    }

    /// Unwraps the content encryption key and decrypts the payload.
    pub fn decrypt(&self, recipient_key: &RsaPrivateKey) -> Result<Vec<u8>, SecurityError> {
        let header = self.header()?;
        let alg = KeyWrapAlgorithm::parse(&header.alg)?;
        if alg != KeyWrapAlgorithm::RsaOaep256 {
            return Err(SecurityError::UnsupportedAlgorithm {
                name: header.alg.clone(),
            });
        }
        let enc = EncryptionAlgorithm::parse(&header.enc)?;
        let cbc = CbcHmac::new(enc)?;

        let cek = Zeroizing::new(unwrap_cek(recipient_key, &self.encrypted_key)?);
        cbc.decrypt(
            &cek,
            &self.iv,
            &self.ciphertext,
            &self.tag,
            self.protected.as_bytes(),
        )
    }

    /// `protected.encrypted_key.iv.ciphertext.tag`
    pub fn to_compact(&self) -> String {
        format!(
            "{}.{}.{}.{}.{}",
            self.protected,
            b64url_encode(&self.encrypted_key),
            b64url_encode(&self.iv),
            b64url_encode(&self.ciphertext),
            b64url_encode(&self.tag)
        )
    }

    /// Parses a compact serialization, rejecting wrong segment counts and
    /// non-base64url segments.
    pub fn from_compact(compact: &str) -> Result<Self, SecurityError> {
        let segments: Vec<&str> = compact.split('.').collect();
        if segments.len() != 5 {
            return Err(SecurityError::InvalidFormat {
                reason: format!("expected 5 segments, got {}", segments.len()),
            });
        }
        b64url_decode(segments[0])?;
        Ok(Self {
            protected: segments[0].to_string(),
            encrypted_key: b64url_decode(segments[1])?,
            iv: b64url_decode(segments[2])?,
            ciphertext: b64url_decode(segments[3])?,
            tag: b64url_decode(segments[4])?,
        })
    }

    pub fn header(&self) -> Result<JweHeader, SecurityError> {
        let bytes = b64url_decode(&self.protected)?;
        serde_json::from_slice(&bytes).map_err(|e| SecurityError::InvalidFormat {
            reason: format!("invalid protected header: {e}"),
        })
    }

    /// Key identifier from the protected header, if present.
    pub fn key_id(&self) -> Option<String> {
        self.header().ok().and_then(|h| h.kid)
    }
}

fn wrap_cek(key: &RsaPublicKey, cek: &[u8]) -> Result<Vec<u8>, SecurityError> {
    key.encrypt(&mut OsRng, Oaep::new::<Sha256>(), cek)
        .map_err(|e| SecurityError::EncryptionFailed {
            reason: format!("key wrap failed: {e}"),
        })
}

fn unwrap_cek(key: &RsaPrivateKey, wrapped: &[u8]) -> Result<Vec<u8>, SecurityError> {
    key.decrypt(Oaep::new::<Sha256>(), wrapped)
        .map_err(|_| SecurityError::DecryptionFailed)
}
