use rsa::{RsaPrivateKey, RsaPublicKey};

use super::alg::{EncryptionAlgorithm, SignatureAlgorithm};
use super::jwe::Jwe;
use super::jws::Jws;
use super::SecurityError;

/// Sign-then-encrypt message protection.
///
/// `protect` signs a request body with the sender's key and encrypts the
/// resulting signed message to the recipient's public key, producing one
/// opaque compact string. `unprotect` runs the reverse: decrypt with the
/// recipient's private key, then verify the inner signature against the
/// sender's public key. A message that decrypts but carries a bad
/// signature is rejected, so confidentiality never stands in for
/// authenticity.
#[derive(Debug, Clone)]
pub struct MessageSecurity {
    signature_algorithm: SignatureAlgorithm,
    encryption_algorithm: EncryptionAlgorithm,
    sender_key_id: Option<String>,
    recipient_key_id: Option<String>,
}

impl Default for MessageSecurity {
    fn default() -> Self {
        Self {
            signature_algorithm: SignatureAlgorithm::Rs256,
            encryption_algorithm: EncryptionAlgorithm::A128CbcHs256,
            sender_key_id: None,
            recipient_key_id: None,
        }
    }
}

impl MessageSecurity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_algorithms(
        mut self,
        signature: SignatureAlgorithm,
        encryption: EncryptionAlgorithm,
    ) -> Self {
        self.signature_algorithm = signature;
        self.encryption_algorithm = encryption;
        self
    }

    /// Key identifier stamped into the signature header.
    pub fn with_sender_key_id(mut self, kid: impl Into<String>) -> Self {
        self.sender_key_id = Some(kid.into());
        self
    }

    /// Key identifier stamped into the encryption header.
    pub fn with_recipient_key_id(mut self, kid: impl Into<String>) -> Self {
        self.recipient_key_id = Some(kid.into());
        self
    }

    /// Protects `body`: sign with `signing_key`, then encrypt the signed
    /// message to `recipient_key`. Returns the outer compact serialization.
    pub fn protect(
        &self,
        body: &[u8],
        signing_key: &RsaPrivateKey,
        recipient_key: &RsaPublicKey,
    ) -> Result<String, SecurityError> {
        let jws = Jws::sign(
            signing_key,
            self.signature_algorithm,
            self.sender_key_id.as_deref(),
            body,
        )?;
        let jwe = Jwe::encrypt(
            recipient_key,
            self.recipient_key_id.as_deref(),
            self.encryption_algorithm,
            jws.to_compact().as_bytes(),
        )?;
        Ok(jwe.to_compact())
    }

    /// Reverses [`MessageSecurity::protect`] and returns the original body.
    pub fn unprotect(
        &self,
        message: &str,
        recipient_key: &RsaPrivateKey,
        sender_key: &RsaPublicKey,
    ) -> Result<Vec<u8>, SecurityError> {
        let jwe = Jwe::from_compact(message)?;
        let inner = jwe.decrypt(recipient_key)?;
        let compact = String::from_utf8(inner).map_err(|_| SecurityError::InvalidFormat {
            reason: "decrypted payload is not a UTF-8 signed message".to_string(),
        })?;

        let jws = Jws::from_compact(&compact)?;
        jws.verify(sender_key)?;
        jws.payload_bytes()
    }
}
