use proptest::prelude::*;
use stratus::auth::AuthChallenge;
use stratus::batch::TaskCreateParameters;
use stratus::common::errors::AzureError;
use stratus::keyvault::security::{b64url_decode, b64url_encode};
use stratus::servicebus::{NamespaceScope, QueueType};

#[cfg(test)]
mod jose_encoding_property_tests {
    use super::*;

    proptest! {
        #[test]
        fn test_b64url_round_trips_arbitrary_bytes(
            data in prop::collection::vec(any::<u8>(), 0..512)
        ) {
            let encoded = b64url_encode(&data);

            // Property: segments stay URL safe and unpadded
            prop_assert!(!encoded.contains('='));
            prop_assert!(!encoded.contains('+'));
            prop_assert!(!encoded.contains('/'));

            // Property: decoding returns the original bytes
            prop_assert_eq!(b64url_decode(&encoded).unwrap(), data);
        }

        #[test]
        fn test_padded_segments_are_always_rejected(
            data in prop::collection::vec(any::<u8>(), 1..64)
        ) {
            let padded = format!("{}=", b64url_encode(&data));
            prop_assert!(b64url_decode(&padded).is_err());
        }
    }
}

#[cfg(test)]
mod error_classification_property_tests {
    use super::*;

    proptest! {
        #[test]
        fn test_server_errors_are_always_retryable(status in 500u16..600) {
            let error = AzureError::api_error("list_queues", "ServerBusy", status, "busy");
            prop_assert!(error.is_retryable());
        }

        #[test]
        fn test_client_errors_are_final_except_throttling_and_timeouts(
            status in 400u16..500
        ) {
            let error = AzureError::api_error("list_queues", "BadRequest", status, "rejected");

            // Property: only 408 and 429 earn another attempt
            let expected = status == 408 || status == 429;
            prop_assert_eq!(error.is_retryable(), expected);
        }

        #[test]
        fn test_api_errors_expose_code_and_status(
            status in 400u16..600,
            code in "[A-Za-z]{3,24}",
        ) {
            let error = AzureError::api_error("get_queue", code.clone(), status, "message");
            prop_assert_eq!(error.error_code(), Some(code.as_str()));
            prop_assert_eq!(error.status_code(), Some(status));
        }
    }
}

#[cfg(test)]
mod queue_name_property_tests {
    use super::*;

    proptest! {
        #[test]
        fn test_the_dead_letter_suffix_decides_the_queue_type(
            name in "[a-zA-Z0-9._-]{1,40}"
        ) {
            prop_assert_eq!(QueueType::from_queue_name(&name), QueueType::Main);

            let dlq = format!("{name}/$deadletterqueue");
            prop_assert_eq!(QueueType::from_queue_name(&dlq), QueueType::DeadLetter);
        }
    }
}

#[cfg(test)]
mod resource_id_property_tests {
    use super::*;

    proptest! {
        #[test]
        fn test_namespace_scopes_survive_arm_id_round_trips(
            subscription in "[a-f0-9]{8}-[a-f0-9]{4}-[a-f0-9]{4}",
            resource_group in "[a-zA-Z0-9-]{1,30}",
            namespace in "[a-zA-Z][a-zA-Z0-9-]{0,29}",
        ) {
            let id = format!(
                "/subscriptions/{subscription}/resourceGroups/{resource_group}/providers/Microsoft.ServiceBus/namespaces/{namespace}"
            );

            let scope = NamespaceScope::from_resource_id(&id).unwrap();
            prop_assert_eq!(scope.subscription_id, subscription);
            prop_assert_eq!(scope.resource_group, resource_group);
            prop_assert_eq!(scope.namespace, namespace);
        }
    }
}

#[cfg(test)]
mod challenge_property_tests {
    use super::*;

    proptest! {
        #[test]
        fn test_resource_challenges_always_gain_the_default_scope(
            vault in "[a-z][a-z0-9]{2,20}"
        ) {
            let header = format!(
                r#"Bearer authorization="https://login.microsoftonline.com/tenant", resource="https://{vault}.vault.azure.net""#
            );

            let challenge = AuthChallenge::parse(&header).unwrap();
            prop_assert_eq!(
                challenge.scope,
                format!("https://{vault}.vault.azure.net/.default")
            );
        }
    }
}

#[cfg(test)]
mod task_serialization_property_tests {
    use super::*;

    proptest! {
        #[test]
        fn test_minimal_tasks_serialize_exactly_two_fields(
            id in "[a-zA-Z0-9_-]{1,64}",
            command in "[ -~]{1,120}",
        ) {
            let task = TaskCreateParameters::new(id.clone(), command.clone());
            let value = serde_json::to_value(&task).unwrap();
            let object = value.as_object().unwrap();

            // Property: unset optional fields never appear on the wire
            prop_assert_eq!(object.len(), 2);
            prop_assert_eq!(object["id"].as_str(), Some(id.as_str()));
            prop_assert_eq!(object["commandLine"].as_str(), Some(command.as_str()));
        }
    }
}
