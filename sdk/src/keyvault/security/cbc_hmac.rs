use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::Pkcs7};
use hmac::{Hmac, Mac};
use rand::{RngCore, rngs::OsRng};
use sha2::{Sha256, Sha512};
use zeroize::Zeroizing;

use super::SecurityError;
use super::alg::EncryptionAlgorithm;

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;
type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;
type HmacSha256 = Hmac<Sha256>;
type HmacSha512 = Hmac<Sha512>;

/// AES-CBC block and IV size in bytes.
pub const IV_LEN: usize = 16;

#[derive(Debug, Clone, Copy)]
enum Variant {
    Hs256,
    Hs512,
}

/// Output of one authenticated encryption: fresh IV, ciphertext, and the
/// truncated HMAC tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedPayload {
    pub iv: [u8; IV_LEN],
    pub ciphertext: Vec<u8>,
    pub tag: Vec<u8>,
}

/// AES-CBC with HMAC authentication, composed as `A128CBC-HS256` and
/// `A256CBC-HS512` define it.
///
/// The composite key is the MAC key followed by the encryption key, each
/// half of the total. The tag is the leftmost half of
/// `HMAC(mac_key, aad || iv || ciphertext || al)` where `al` is the
/// big-endian 64-bit count of AAD bits. Tags are checked in constant time,
/// and the ciphertext is only decrypted after the tag verifies.
#[derive(Debug, Clone, Copy)]
pub struct CbcHmac {
    variant: Variant,
}

impl CbcHmac {
    /// Accepts the two CBC-HMAC algorithms; anything else is unsupported here.
    pub fn new(algorithm: EncryptionAlgorithm) -> Result<Self, SecurityError> {
        let variant = match algorithm {
            EncryptionAlgorithm::A128CbcHs256 => Variant::Hs256,
            EncryptionAlgorithm::A256CbcHs512 => Variant::Hs512,
            other => {
                return Err(SecurityError::UnsupportedAlgorithm {
                    name: other.as_str().to_string(),
                });
            }
        };
        Ok(Self { variant })
    }

    /// Composite key length in bytes.
    pub fn key_len(&self) -> usize {
        match self.variant {
            Variant::Hs256 => 32,
            Variant::Hs512 => 64,
        }
    }

    /// Authentication tag length in bytes.
    pub fn tag_len(&self) -> usize {
        self.key_len() / 2
    }

    /// Generates a fresh composite key that wipes itself on drop.
    pub fn generate_key(&self) -> Zeroizing<Vec<u8>> {
        let mut key = Zeroizing::new(vec![0u8; self.key_len()]);
        OsRng.fill_bytes(&mut key);
        key
    }

    /// Encrypts and authenticates `plaintext`, binding `aad` into the tag.
    ///
    /// A fresh random IV is drawn for every call.
    pub fn encrypt(
        &self,
        key: &[u8],
        plaintext: &[u8],
        aad: &[u8],
    ) -> Result<EncryptedPayload, SecurityError> {
        let (mac_key, enc_key) = self.split_key(key)?;

        let mut iv = [0u8; IV_LEN];
        OsRng.fill_bytes(&mut iv);

        let ciphertext = match self.variant {
            Variant::Hs256 => Aes128CbcEnc::new_from_slices(enc_key, &iv)
                .map_err(|e| SecurityError::InvalidKey {
                    reason: e.to_string(),
                })?
                .encrypt_padded_vec_mut::<Pkcs7>(plaintext),
            Variant::Hs512 => Aes256CbcEnc::new_from_slices(enc_key, &iv)
                .map_err(|e| SecurityError::InvalidKey {
                    reason: e.to_string(),
                })?
                .encrypt_padded_vec_mut::<Pkcs7>(plaintext),
        };

        let tag = self.compute_tag(mac_key, aad, &iv, &ciphertext)?;
        Ok(EncryptedPayload {
            iv,
            ciphertext,
            tag,
        })
    }

    /// Verifies the tag, then decrypts.
    ///
    /// Every failure maps to [`SecurityError::DecryptionFailed`]; callers
    /// learn nothing about which check rejected the message.
    pub fn decrypt(
        &self,
        key: &[u8],
        iv: &[u8],
        ciphertext: &[u8],
        tag: &[u8],
        aad: &[u8],
    ) -> Result<Vec<u8>, SecurityError> {
        let (mac_key, enc_key) = self
            .split_key(key)
            .map_err(|_| SecurityError::DecryptionFailed)?;
        if iv.len() != IV_LEN || tag.len() != self.tag_len() {
            return Err(SecurityError::DecryptionFailed);
        }

        self.verify_tag(mac_key, aad, iv, ciphertext, tag)?;

        match self.variant {
            Variant::Hs256 => Aes128CbcDec::new_from_slices(enc_key, iv)
                .map_err(|_| SecurityError::DecryptionFailed)?
                .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
                .map_err(|_| SecurityError::DecryptionFailed),
            Variant::Hs512 => Aes256CbcDec::new_from_slices(enc_key, iv)
                .map_err(|_| SecurityError::DecryptionFailed)?
                .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
                .map_err(|_| SecurityError::DecryptionFailed),
        }
    }

    fn split_key<'a>(&self, key: &'a [u8]) -> Result<(&'a [u8], &'a [u8]), SecurityError> {
        let expected = self.key_len();
        if key.len() != expected {
            return Err(SecurityError::InvalidKey {
                reason: format!(
                    "expected {expected} bytes of key material, got {}",
                    key.len()
                ),
            });
        }
        Ok(key.split_at(expected / 2))
    }

    fn compute_tag(
        &self,
        mac_key: &[u8],
        aad: &[u8],
        iv: &[u8],
        ciphertext: &[u8],
    ) -> Result<Vec<u8>, SecurityError> {
        let al = aad_bit_length(aad);
        match self.variant {
            Variant::Hs256 => {
                let mut mac =
                    HmacSha256::new_from_slice(mac_key).map_err(|e| SecurityError::InvalidKey {
                        reason: e.to_string(),
                    })?;
                mac.update(aad);
                mac.update(iv);
                mac.update(ciphertext);
                mac.update(&al);
                Ok(mac.finalize().into_bytes()[..16].to_vec())
            }
            Variant::Hs512 => {
                let mut mac =
                    HmacSha512::new_from_slice(mac_key).map_err(|e| SecurityError::InvalidKey {
                        reason: e.to_string(),
                    })?;
                mac.update(aad);
                mac.update(iv);
                mac.update(ciphertext);
                mac.update(&al);
                Ok(mac.finalize().into_bytes()[..32].to_vec())
            }
        }
    }

    fn verify_tag(
        &self,
        mac_key: &[u8],
        aad: &[u8],
        iv: &[u8],
        ciphertext: &[u8],
        tag: &[u8],
    ) -> Result<(), SecurityError> {
        let al = aad_bit_length(aad);
        match self.variant {
            Variant::Hs256 => {
                let mut mac = HmacSha256::new_from_slice(mac_key)
                    .map_err(|_| SecurityError::DecryptionFailed)?;
                mac.update(aad);
                mac.update(iv);
                mac.update(ciphertext);
                mac.update(&al);
                mac.verify_truncated_left(tag)
                    .map_err(|_| SecurityError::DecryptionFailed)
            }
            Variant::Hs512 => {
                let mut mac = HmacSha512::new_from_slice(mac_key)
                    .map_err(|_| SecurityError::DecryptionFailed)?;
                mac.update(aad);
                mac.update(iv);
                mac.update(ciphertext);
                mac.update(&al);
                mac.verify_truncated_left(tag)
                    .map_err(|_| SecurityError::DecryptionFailed)
            }
        }
    }
}

/// 64-bit big-endian count of bits in the AAD.
fn aad_bit_length(aad: &[u8]) -> [u8; 8] {
    ((aad.len() as u64) * 8).to_be_bytes()
}
