pub mod client;
pub mod models;
pub mod security;

pub use client::{KeyClient, KeyVaultClient, SecretClient};
pub use models::{
    CreateKeyParameters, DeletedKey, DeletedSecret, JsonWebKey, KeyItem, KeyVaultKey,
    ObjectAttributes, Secret, SecretItem, SetSecretParameters,
};
pub use security::{
    EncryptionAlgorithm, KeyWrapAlgorithm, MessageSecurity, SecurityError, SignatureAlgorithm,
};
