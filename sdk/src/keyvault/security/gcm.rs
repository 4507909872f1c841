use aes_gcm::aead::consts::U12;
use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{Aead, AeadCore, Payload};
use aes_gcm::{Aes128Gcm, Aes256Gcm, KeyInit};
use rand::{RngCore, rngs::OsRng};

use super::SecurityError;
use super::alg::EncryptionAlgorithm;

type Aes192Gcm = aes_gcm::AesGcm<aes::Aes192, U12>;

pub const NONCE_LEN: usize = 12;
pub const TAG_LEN: usize = 16;

#[derive(Debug, Clone, Copy)]
enum GcmVariant {
    A128,
    A192,
    A256,
}

/// Output of one AES-GCM encryption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GcmPayload {
    pub nonce: [u8; NONCE_LEN],
    pub ciphertext: Vec<u8>,
    pub tag: Vec<u8>,
}

/// Local AES-GCM provider for octet vault keys.
///
/// Vault keys whose material is available client side (`k` on the JWK) can
/// be used without a round trip. The nonce is 12 random bytes per message
/// and the tag is carried separately, matching the service's encrypt
/// result shape.
#[derive(Debug, Clone, Copy)]
pub struct AesGcmProvider {
    variant: GcmVariant,
}

impl AesGcmProvider {
    /// Accepts the three GCM algorithms; the CBC-HMAC family lives in
    /// [`super::CbcHmac`].
    pub fn new(algorithm: EncryptionAlgorithm) -> Result<Self, SecurityError> {
        let variant = match algorithm {
            EncryptionAlgorithm::A128Gcm => GcmVariant::A128,
            EncryptionAlgorithm::A192Gcm => GcmVariant::A192,
            EncryptionAlgorithm::A256Gcm => GcmVariant::A256,
            other => {
                return Err(SecurityError::UnsupportedAlgorithm {
                    name: other.as_str().to_string(),
                });
            }
        };
        Ok(Self { variant })
    }

    pub fn key_len(&self) -> usize {
        match self.variant {
            GcmVariant::A128 => 16,
            GcmVariant::A192 => 24,
            GcmVariant::A256 => 32,
        }
    }

    pub fn encrypt(
        &self,
        key: &[u8],
        plaintext: &[u8],
        aad: &[u8],
    ) -> Result<GcmPayload, SecurityError> {
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);

        let mut combined = match self.variant {
            GcmVariant::A128 => seal::<Aes128Gcm>(key, &nonce, plaintext, aad)?,
            GcmVariant::A192 => seal::<Aes192Gcm>(key, &nonce, plaintext, aad)?,
            GcmVariant::A256 => seal::<Aes256Gcm>(key, &nonce, plaintext, aad)?,
        };

        let tag = combined.split_off(combined.len() - TAG_LEN);
        Ok(GcmPayload {
            nonce,
            ciphertext: combined,
            tag,
        })
    }

    /// Decrypts and authenticates; all failures map to
    /// [`SecurityError::DecryptionFailed`].
    pub fn decrypt(
        &self,
        key: &[u8],
        nonce: &[u8],
        ciphertext: &[u8],
        tag: &[u8],
        aad: &[u8],
    ) -> Result<Vec<u8>, SecurityError> {
        if nonce.len() != NONCE_LEN || tag.len() != TAG_LEN {
            return Err(SecurityError::DecryptionFailed);
        }

        let mut combined = Vec::with_capacity(ciphertext.len() + tag.len());
        combined.extend_from_slice(ciphertext);
        combined.extend_from_slice(tag);

        match self.variant {
            GcmVariant::A128 => open::<Aes128Gcm>(key, nonce, &combined, aad),
            GcmVariant::A192 => open::<Aes192Gcm>(key, nonce, &combined, aad),
            GcmVariant::A256 => open::<Aes256Gcm>(key, nonce, &combined, aad),
        }
    }
}

fn seal<C>(
    key: &[u8],
    nonce: &[u8; NONCE_LEN],
    plaintext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>, SecurityError>
where
    C: AeadCore<NonceSize = U12> + Aead + KeyInit,
{
    let cipher = C::new_from_slice(key).map_err(|e| SecurityError::InvalidKey {
        reason: e.to_string(),
    })?;
    cipher
        .encrypt(
            GenericArray::from_slice(nonce),
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|e| SecurityError::EncryptionFailed {
            reason: e.to_string(),
        })
}

fn open<C>(key: &[u8], nonce: &[u8], combined: &[u8], aad: &[u8]) -> Result<Vec<u8>, SecurityError>
where
    C: AeadCore<NonceSize = U12> + Aead + KeyInit,
{
    let cipher = C::new_from_slice(key).map_err(|_| SecurityError::DecryptionFailed)?;
    cipher
        .decrypt(
            GenericArray::from_slice(nonce),
            Payload { msg: combined, aad },
        )
        .map_err(|_| SecurityError::DecryptionFailed)
}
