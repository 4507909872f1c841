use rand::rngs::OsRng;
use rsa::signature::{RandomizedSigner, SignatureEncoding, Signer, Verifier};
use rsa::{RsaPrivateKey, RsaPublicKey, pkcs1v15, pss};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use super::alg::SignatureAlgorithm;
use super::{SecurityError, b64url_decode, b64url_encode};

/// Protected header of a signed message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JwsHeader {
    pub alg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
}

/// Flattened JSON serialization of a signed message.
#[derive(Debug, Serialize, Deserialize)]
struct FlattenedJws {
    protected: String,
    payload: String,
    signature: String,
}

/// JSON Web Signature over an opaque payload.
///
/// The protected and payload segments are stored exactly as transmitted
/// and verification recomputes the signing input from those segments, so
/// a reserialized header can never alter what is checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Jws {
    protected: String,
    payload: String,
    signature: Vec<u8>,
}

impl Jws {
    /// Signs `payload` with the sender's private key.
    pub fn sign(
        signing_key: &RsaPrivateKey,
        algorithm: SignatureAlgorithm,
        kid: Option<&str>,
        payload: &[u8],
    ) -> Result<Self, SecurityError> {
        let header = JwsHeader {
            alg: algorithm.as_str().to_string(),
            kid: kid.map(str::to_string),
        };
        let header_json =
            serde_json::to_vec(&header).map_err(|e| SecurityError::SigningFailed {
                reason: format!("header serialization failed: {e}"),
            })?;
        let protected = b64url_encode(&header_json);
        let payload = b64url_encode(payload);
        let signing_input = format!("{protected}.{payload}");

        let signature = match algorithm {
            SignatureAlgorithm::Rs256 => {
                let key = pkcs1v15::SigningKey::<Sha256>::new(signing_key.clone());
                key.try_sign(signing_input.as_bytes())
                    .map_err(|e| SecurityError::SigningFailed {
                        reason: e.to_string(),
                    })?
                    .to_vec()
            }
            SignatureAlgorithm::Ps256 => {
                let key = pss::BlindedSigningKey::<Sha256>::new(signing_key.clone());
                key.try_sign_with_rng(&mut OsRng, signing_input.as_bytes())
                    .map_err(|e| SecurityError::SigningFailed {
                        reason: e.to_string(),
                    })?
                    .to_vec()
            }
        };

        Ok(Self {
            protected,
            payload,
            signature,
        })
    }

    /// Verifies the signature against the received segments.
    pub fn verify(&self, verifying_key: &RsaPublicKey) -> Result<(), SecurityError> {
        let header = self.header()?;
        let algorithm = SignatureAlgorithm::parse(&header.alg)?;
        let signing_input = format!("{}.{}", self.protected, self.payload);

        match algorithm {
            SignatureAlgorithm::Rs256 => {
                let key = pkcs1v15::VerifyingKey::<Sha256>::new(verifying_key.clone());
                let signature = pkcs1v15::Signature::try_from(self.signature.as_slice())
                    .map_err(|_| SecurityError::SignatureInvalid)?;
                key.verify(signing_input.as_bytes(), &signature)
                    .map_err(|_| SecurityError::SignatureInvalid)
            }
            SignatureAlgorithm::Ps256 => {
                let key = pss::VerifyingKey::<Sha256>::new(verifying_key.clone());
                let signature = pss::Signature::try_from(self.signature.as_slice())
                    .map_err(|_| SecurityError::SignatureInvalid)?;
                key.verify(signing_input.as_bytes(), &signature)
                    .map_err(|_| SecurityError::SignatureInvalid)
            }
        }
    }

    pub fn header(&self) -> Result<JwsHeader, SecurityError> {
        let bytes = b64url_decode(&self.protected)?;
        serde_json::from_slice(&bytes).map_err(|e| SecurityError::InvalidFormat {
            reason: format!("invalid protected header: {e}"),
        })
    }

    /// Decoded payload bytes.
    pub fn payload_bytes(&self) -> Result<Vec<u8>, SecurityError> {
        b64url_decode(&self.payload)
    }

    /// `protected.payload.signature`
    pub fn to_compact(&self) -> String {
        format!(
            "{}.{}.{}",
            self.protected,
            self.payload,
            b64url_encode(&self.signature)
        )
    }

    pub fn from_compact(compact: &str) -> Result<Self, SecurityError> {
        let segments: Vec<&str> = compact.split('.').collect();
        if segments.len() != 3 {
            return Err(SecurityError::InvalidFormat {
                reason: format!("expected 3 segments, got {}", segments.len()),
            });
        }
        b64url_decode(segments[0])?;
        b64url_decode(segments[1])?;
        Ok(Self {
            protected: segments[0].to_string(),
            payload: segments[1].to_string(),
            signature: b64url_decode(segments[2])?,
        })
    }

    /// Flattened JSON form: `{"protected", "payload", "signature"}`.
    pub fn to_flattened(&self) -> Result<String, SecurityError> {
        serde_json::to_string(&FlattenedJws {
            protected: self.protected.clone(),
            payload: self.payload.clone(),
            signature: b64url_encode(&self.signature),
        })
        .map_err(|e| SecurityError::InvalidFormat {
            reason: e.to_string(),
        })
    }

    pub fn from_flattened(json: &str) -> Result<Self, SecurityError> {
        let flattened: FlattenedJws =
            serde_json::from_str(json).map_err(|e| SecurityError::InvalidFormat {
                reason: format!("invalid flattened serialization: {e}"),
            })?;
        b64url_decode(&flattened.protected)?;
        b64url_decode(&flattened.payload)?;
        Ok(Self {
            protected: flattened.protected,
            payload: flattened.payload,
            signature: b64url_decode(&flattened.signature)?,
        })
    }
}
