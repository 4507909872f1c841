use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Subscription {
    pub id: String,
    #[serde(rename = "subscriptionId")]
    pub subscription_id: String,
    #[serde(rename = "displayName")]
    pub display_name: String,
    pub state: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourceGroup {
    pub id: String,
    pub name: String,
    pub location: String,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceBusNamespace {
    pub id: String,
    pub name: String,
    pub location: String,
    #[serde(rename = "type")]
    pub resource_type: String,
    pub properties: NamespaceProperties,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NamespaceProperties {
    #[serde(rename = "serviceBusEndpoint")]
    pub service_bus_endpoint: String,
    pub status: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: Option<String>,
}

/// Keys and connection strings behind a namespace authorization rule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccessKeys {
    #[serde(rename = "primaryConnectionString")]
    pub primary_connection_string: String,
    #[serde(rename = "secondaryConnectionString")]
    pub secondary_connection_string: String,
    #[serde(rename = "primaryKey")]
    pub primary_key: String,
    #[serde(rename = "secondaryKey")]
    pub secondary_key: String,
}

/// Availability of a queue, topic, or subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityStatus {
    Active,
    Creating,
    Deleting,
    Disabled,
    ReceiveDisabled,
    Renaming,
    Restoring,
    SendDisabled,
    Unknown,
}

/// Message count breakdown reported under `countDetails`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MessageCountDetails {
    #[serde(rename = "activeMessageCount")]
    pub active_message_count: i64,
    #[serde(rename = "deadLetterMessageCount")]
    pub dead_letter_message_count: i64,
    #[serde(rename = "scheduledMessageCount")]
    pub scheduled_message_count: i64,
    #[serde(rename = "transferMessageCount")]
    pub transfer_message_count: i64,
    #[serde(rename = "transferDeadLetterMessageCount")]
    pub transfer_dead_letter_message_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueDescription {
    pub id: Option<String>,
    pub name: String,
    #[serde(rename = "type")]
    pub resource_type: Option<String>,
    pub properties: QueueProperties,
}

/// Queue settings and runtime state. Every field is optional so the same
/// model serves both GET responses and sparse create-or-update bodies;
/// fields left `None` are omitted on the wire and the service applies its
/// defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueProperties {
    #[serde(rename = "countDetails", skip_serializing_if = "Option::is_none")]
    pub count_details: Option<MessageCountDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<EntityStatus>,
    #[serde(rename = "lockDuration", skip_serializing_if = "Option::is_none")]
    pub lock_duration: Option<String>,
    #[serde(rename = "maxSizeInMegabytes", skip_serializing_if = "Option::is_none")]
    pub max_size_in_megabytes: Option<i64>,
    #[serde(rename = "maxDeliveryCount", skip_serializing_if = "Option::is_none")]
    pub max_delivery_count: Option<i32>,
    #[serde(
        rename = "defaultMessageTimeToLive",
        skip_serializing_if = "Option::is_none"
    )]
    pub default_message_time_to_live: Option<String>,
    #[serde(rename = "requiresSession", skip_serializing_if = "Option::is_none")]
    pub requires_session: Option<bool>,
    #[serde(
        rename = "requiresDuplicateDetection",
        skip_serializing_if = "Option::is_none"
    )]
    pub requires_duplicate_detection: Option<bool>,
    #[serde(
        rename = "deadLetteringOnMessageExpiration",
        skip_serializing_if = "Option::is_none"
    )]
    pub dead_lettering_on_message_expiration: Option<bool>,
    #[serde(rename = "enablePartitioning", skip_serializing_if = "Option::is_none")]
    pub enable_partitioning: Option<bool>,
    #[serde(rename = "sizeInBytes", skip_serializing_if = "Option::is_none")]
    pub size_in_bytes: Option<i64>,
    #[serde(rename = "messageCount", skip_serializing_if = "Option::is_none")]
    pub message_count: Option<i64>,
    #[serde(rename = "createdAt", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(rename = "updatedAt", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(rename = "accessedAt", skip_serializing_if = "Option::is_none")]
    pub accessed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicDescription {
    pub id: Option<String>,
    pub name: String,
    #[serde(rename = "type")]
    pub resource_type: Option<String>,
    pub properties: TopicProperties,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicProperties {
    #[serde(rename = "countDetails", skip_serializing_if = "Option::is_none")]
    pub count_details: Option<MessageCountDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<EntityStatus>,
    #[serde(rename = "maxSizeInMegabytes", skip_serializing_if = "Option::is_none")]
    pub max_size_in_megabytes: Option<i64>,
    #[serde(
        rename = "defaultMessageTimeToLive",
        skip_serializing_if = "Option::is_none"
    )]
    pub default_message_time_to_live: Option<String>,
    #[serde(
        rename = "requiresDuplicateDetection",
        skip_serializing_if = "Option::is_none"
    )]
    pub requires_duplicate_detection: Option<bool>,
    #[serde(rename = "enablePartitioning", skip_serializing_if = "Option::is_none")]
    pub enable_partitioning: Option<bool>,
    #[serde(rename = "subscriptionCount", skip_serializing_if = "Option::is_none")]
    pub subscription_count: Option<i32>,
    #[serde(rename = "sizeInBytes", skip_serializing_if = "Option::is_none")]
    pub size_in_bytes: Option<i64>,
    #[serde(rename = "createdAt", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(rename = "updatedAt", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(rename = "accessedAt", skip_serializing_if = "Option::is_none")]
    pub accessed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionDescription {
    pub id: Option<String>,
    pub name: String,
    #[serde(rename = "type")]
    pub resource_type: Option<String>,
    pub properties: SubscriptionProperties,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscriptionProperties {
    #[serde(rename = "countDetails", skip_serializing_if = "Option::is_none")]
    pub count_details: Option<MessageCountDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<EntityStatus>,
    #[serde(rename = "lockDuration", skip_serializing_if = "Option::is_none")]
    pub lock_duration: Option<String>,
    #[serde(rename = "maxDeliveryCount", skip_serializing_if = "Option::is_none")]
    pub max_delivery_count: Option<i32>,
    #[serde(
        rename = "defaultMessageTimeToLive",
        skip_serializing_if = "Option::is_none"
    )]
    pub default_message_time_to_live: Option<String>,
    #[serde(rename = "requiresSession", skip_serializing_if = "Option::is_none")]
    pub requires_session: Option<bool>,
    #[serde(
        rename = "deadLetteringOnMessageExpiration",
        skip_serializing_if = "Option::is_none"
    )]
    pub dead_lettering_on_message_expiration: Option<bool>,
    #[serde(rename = "messageCount", skip_serializing_if = "Option::is_none")]
    pub message_count: Option<i64>,
    #[serde(rename = "createdAt", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(rename = "updatedAt", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(rename = "accessedAt", skip_serializing_if = "Option::is_none")]
    pub accessed_at: Option<DateTime<Utc>>,
}
