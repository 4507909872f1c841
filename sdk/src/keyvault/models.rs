use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Management attributes shared by secrets and keys.
///
/// Timestamps are unix seconds, matching the vault's wire format.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ObjectAttributes {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(rename = "nbf", skip_serializing_if = "Option::is_none")]
    pub not_before: Option<i64>,
    #[serde(rename = "exp", skip_serializing_if = "Option::is_none")]
    pub expires: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated: Option<i64>,
    #[serde(rename = "recoveryLevel", skip_serializing_if = "Option::is_none")]
    pub recovery_level: Option<String>,
}

/// A secret bundle returned by get, set, and delete operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Secret {
    /// Full secret identifier: `https://{vault}/secrets/{name}/{version}`
    pub id: String,
    pub value: String,
    #[serde(rename = "contentType", skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<ObjectAttributes>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<HashMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub managed: Option<bool>,
}

/// A secret as it appears in list responses, without the value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretItem {
    pub id: String,
    #[serde(rename = "contentType", skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<ObjectAttributes>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<HashMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub managed: Option<bool>,
}

/// A deleted secret with its recovery metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletedSecret {
    #[serde(flatten)]
    pub secret: Secret,
    #[serde(rename = "recoveryId", skip_serializing_if = "Option::is_none")]
    pub recovery_id: Option<String>,
    #[serde(rename = "scheduledPurgeDate", skip_serializing_if = "Option::is_none")]
    pub scheduled_purge_date: Option<i64>,
    #[serde(rename = "deletedDate", skip_serializing_if = "Option::is_none")]
    pub deleted_date: Option<i64>,
}

/// Request body for setting a secret.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SetSecretParameters {
    pub value: String,
    #[serde(rename = "contentType", skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<ObjectAttributes>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<HashMap<String, String>>,
}

/// JSON Web Key as stored by the vault.
///
/// Only the fields the vault actually returns are modeled: identifier and
/// type, permitted operations, the RSA public components, and the symmetric
/// key value for octet keys. All octet fields are base64url without padding.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct JsonWebKey {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    pub kty: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_ops: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub k: Option<String>,
}

/// A key bundle returned by create, get, and delete operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyVaultKey {
    pub key: JsonWebKey,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<ObjectAttributes>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<HashMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub managed: Option<bool>,
}

/// A key as it appears in list responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyItem {
    pub kid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<ObjectAttributes>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<HashMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub managed: Option<bool>,
}

/// A deleted key with its recovery metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletedKey {
    #[serde(flatten)]
    pub key: KeyVaultKey,
    #[serde(rename = "recoveryId", skip_serializing_if = "Option::is_none")]
    pub recovery_id: Option<String>,
    #[serde(rename = "scheduledPurgeDate", skip_serializing_if = "Option::is_none")]
    pub scheduled_purge_date: Option<i64>,
    #[serde(rename = "deletedDate", skip_serializing_if = "Option::is_none")]
    pub deleted_date: Option<i64>,
}

/// Request body for creating a key.
#[derive(Debug, Clone, Serialize)]
pub struct CreateKeyParameters {
    pub kty: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_ops: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<ObjectAttributes>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<HashMap<String, String>>,
}

impl CreateKeyParameters {
    pub fn rsa(key_size: u32) -> Self {
        Self {
            kty: "RSA".to_string(),
            key_size: Some(key_size),
            key_ops: None,
            attributes: None,
            tags: None,
        }
    }
}

/// Request body for wrap, unwrap, encrypt, decrypt, and sign operations.
///
/// `value` is base64url without padding.
#[derive(Debug, Clone, Serialize)]
pub struct KeyOperationParameters {
    pub alg: String,
    pub value: String,
}

/// Result of a remote key operation; `value` is base64url without padding.
#[derive(Debug, Clone, Deserialize)]
pub struct KeyOperationResult {
    #[serde(default)]
    pub kid: Option<String>,
    pub value: String,
}

/// Request body for signature verification.
#[derive(Debug, Clone, Serialize)]
pub struct KeyVerifyParameters {
    pub alg: String,
    pub digest: String,
    pub value: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KeyVerifyResult {
    pub value: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_secret_bundle() {
        let body = r#"{
            "value": "hunter2",
            "id": "https://myvault.vault.azure.net/secrets/db-password/abc123",
            "contentType": "text/plain",
            "attributes": {
                "enabled": true,
                "created": 1493938410,
                "updated": 1493938410,
                "recoveryLevel": "Recoverable+Purgeable"
            }
        }"#;
        let secret: Secret = serde_json::from_str(body).unwrap();
        assert_eq!(secret.value, "hunter2");
        assert_eq!(secret.content_type.as_deref(), Some("text/plain"));
        assert_eq!(secret.attributes.unwrap().enabled, Some(true));
    }

    #[test]
    fn deserializes_deleted_secret_with_recovery_fields() {
        let body = r#"{
            "recoveryId": "https://myvault.vault.azure.net/deletedsecrets/db-password",
            "deletedDate": 1493938433,
            "scheduledPurgeDate": 1501714433,
            "id": "https://myvault.vault.azure.net/secrets/db-password/abc123",
            "value": "hunter2"
        }"#;
        let deleted: DeletedSecret = serde_json::from_str(body).unwrap();
        assert_eq!(deleted.scheduled_purge_date, Some(1501714433));
        assert_eq!(deleted.secret.value, "hunter2");
    }

    #[test]
    fn deserializes_rsa_key_bundle() {
        let body = r#"{
            "key": {
                "kid": "https://myvault.vault.azure.net/keys/wrap-key/v1",
                "kty": "RSA",
                "key_ops": ["wrapKey", "unwrapKey"],
                "n": "sXchDaQebHnPiGvyDOAT4saGEUetSyo9MKLOoWFsueri23bOdgWp4Dy1Wl",
                "e": "AQAB"
            },
            "attributes": {"enabled": true}
        }"#;
        let key: KeyVaultKey = serde_json::from_str(body).unwrap();
        assert_eq!(key.key.kty, "RSA");
        assert_eq!(key.key.e.as_deref(), Some("AQAB"));
        assert!(key.key.k.is_none());
    }

    #[test]
    fn create_key_body_omits_unset_fields() {
        let body = serde_json::to_value(CreateKeyParameters::rsa(2048)).unwrap();
        assert_eq!(body["kty"], "RSA");
        assert_eq!(body["key_size"], 2048);
        assert!(body.get("key_ops").is_none());
    }
}
