use crate::auth::TokenCredential;
use crate::common::errors::{AzureError, AzureResult, HttpError, not_found};
use crate::common::http::{ClientOptions, build_http_client, client_request_id, parse_json};
use crate::common::paging::{PageFlavor, Pager};
use crate::common::rate_limiter::{RateLimiter, RateLimiterConfig};
use crate::common::retry::RetryPolicy;
use reqwest::Method;
use reqwest::header::AUTHORIZATION;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;

use super::models::{
    AccessKeys, QueueDescription, QueueProperties, ResourceGroup, ServiceBusNamespace,
    Subscription, SubscriptionDescription, SubscriptionProperties, TopicDescription,
    TopicProperties,
};

const AZURE_MANAGEMENT_URL: &str = "https://management.azure.com";
const ARM_SCOPE: &str = "https://management.azure.com/.default";
const API_VERSION_SUBSCRIPTIONS: &str = "2022-12-01";
const API_VERSION_RESOURCE_GROUPS: &str = "2021-04-01";
const API_VERSION_SERVICE_BUS: &str = "2021-11-01";

/// Addresses one Service Bus namespace inside a subscription and resource
/// group. Every entity operation hangs off this triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceScope {
    pub subscription_id: String,
    pub resource_group: String,
    pub namespace: String,
}

impl NamespaceScope {
    pub fn new(
        subscription_id: impl Into<String>,
        resource_group: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            resource_group: resource_group.into(),
            namespace: namespace.into(),
        }
    }

    /// Parses an ARM resource ID of the form
    /// `/subscriptions/{id}/resourceGroups/{rg}/providers/Microsoft.ServiceBus/namespaces/{ns}`.
    pub fn from_resource_id(resource_id: &str) -> AzureResult<Self> {
        let parts: Vec<&str> = resource_id.split('/').collect();

        if parts.len() < 9 {
            return Err(AzureError::ConfigurationError(
                "Invalid resource ID format".to_string(),
            ));
        }

        Ok(Self::new(parts[2], parts[4], parts[8]))
    }

    fn base_url(&self) -> String {
        format!(
            "{}/subscriptions/{}/resourceGroups/{}/providers/Microsoft.ServiceBus/namespaces/{}",
            AZURE_MANAGEMENT_URL, self.subscription_id, self.resource_group, self.namespace
        )
    }
}

#[derive(Serialize)]
struct PropertiesEnvelope<T> {
    properties: T,
}

/// ARM client for Service Bus: subscription and namespace discovery, queue,
/// topic, and subscription management, and access key retrieval.
///
/// All requests pass through a client-side rate limiter so that bursts of
/// entity lookups stay under the ARM throttling thresholds.
#[derive(Clone)]
pub struct ServiceBusManagementClient {
    http_client: reqwest::Client,
    credential: Arc<dyn TokenCredential>,
    retry: RetryPolicy,
    rate_limiter: RateLimiter,
}

impl ServiceBusManagementClient {
    pub fn new(credential: Arc<dyn TokenCredential>) -> AzureResult<Self> {
        Self::with_options(
            credential,
            ClientOptions::default(),
            RateLimiterConfig::default(),
        )
    }

    pub fn with_options(
        credential: Arc<dyn TokenCredential>,
        options: ClientOptions,
        rate_limiter: RateLimiterConfig,
    ) -> AzureResult<Self> {
        Ok(Self {
            http_client: build_http_client(options.timeout_secs)?,
            credential,
            retry: options.retry,
            rate_limiter: rate_limiter.build(),
        })
    }

    async fn bearer_token(&self) -> AzureResult<String> {
        Ok(self.credential.get_token(ARM_SCOPE).await?.token)
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<&serde_json::Value>,
    ) -> AzureResult<reqwest::Response> {
        self.rate_limiter.wait_until_ready().await;
        let token = self.bearer_token().await?;
        let mut request = self
            .http_client
            .request(method, url)
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .header("x-ms-client-request-id", client_request_id());
        if let Some(body) = body {
            request = request.json(body);
        }
        request.send().await.map_err(|e| {
            AzureError::from(HttpError::RequestFailed {
                url: url.to_string(),
                reason: e.to_string(),
            })
        })
    }

    async fn execute_json<T: DeserializeOwned>(
        &self,
        method: Method,
        url: String,
        body: Option<serde_json::Value>,
        operation: &'static str,
        expected: &'static str,
    ) -> AzureResult<T> {
        let url_ref = url.as_str();
        let body_ref = body.as_ref();
        self.retry
            .run(operation, || {
                let method = method.clone();
                async move {
                    let response = self.send(method, url_ref, body_ref).await?;
                    if !response.status().is_success() {
                        return Err(AzureError::from_azure_response(response, operation).await);
                    }
                    parse_json(response, expected).await
                }
            })
            .await
    }

    async fn execute_empty(
        &self,
        method: Method,
        url: String,
        operation: &'static str,
    ) -> AzureResult<()> {
        let url_ref = url.as_str();
        self.retry
            .run(operation, || {
                let method = method.clone();
                async move {
                    let response = self.send(method, url_ref, None).await?;
                    if !response.status().is_success() {
                        return Err(AzureError::from_azure_response(response, operation).await);
                    }
                    Ok(())
                }
            })
            .await
    }

    /// Follows a paged ARM listing to the end, waiting on the rate limiter
    /// before each page request.
    async fn collect_paged<T: DeserializeOwned>(
        &self,
        url: String,
        operation: &'static str,
    ) -> AzureResult<Vec<T>> {
        let token = self.bearer_token().await?;
        let mut pager: Pager<T> = Pager::new(
            self.http_client.clone(),
            token,
            url,
            operation,
            PageFlavor::NextLink,
        );

        let mut items = Vec::new();
        loop {
            self.rate_limiter.wait_until_ready().await;
            match pager.next_page().await {
                Some(page) => items.extend(page?),
                None => break,
            }
        }
        Ok(items)
    }

    // Discovery

    /// Lists every subscription the credential can see, across all
    /// continuation pages.
    pub async fn list_subscriptions(&self) -> AzureResult<Vec<Subscription>> {
        let url = format!(
            "{}/subscriptions?api-version={}",
            AZURE_MANAGEMENT_URL, API_VERSION_SUBSCRIPTIONS
        );
        self.collect_paged(url, "list_subscriptions").await
    }

    /// Lists all resource groups in a subscription.
    pub async fn list_resource_groups(
        &self,
        subscription_id: &str,
    ) -> AzureResult<Vec<ResourceGroup>> {
        let url = format!(
            "{}/subscriptions/{}/resourcegroups?api-version={}",
            AZURE_MANAGEMENT_URL, subscription_id, API_VERSION_RESOURCE_GROUPS
        );
        self.collect_paged(url, "list_resource_groups").await
    }

    /// Lists all Service Bus namespaces in a subscription.
    pub async fn list_namespaces(
        &self,
        subscription_id: &str,
    ) -> AzureResult<Vec<ServiceBusNamespace>> {
        let url = format!(
            "{}/subscriptions/{}/providers/Microsoft.ServiceBus/namespaces?api-version={}",
            AZURE_MANAGEMENT_URL, subscription_id, API_VERSION_SERVICE_BUS
        );
        self.collect_paged(url, "list_namespaces").await
    }

    // Queues

    pub async fn list_queues(&self, scope: &NamespaceScope) -> AzureResult<Vec<QueueDescription>> {
        self.collect_paged(collection_url(scope, "queues"), "list_queues")
            .await
    }

    pub async fn get_queue(
        &self,
        scope: &NamespaceScope,
        queue_name: &str,
    ) -> AzureResult<QueueDescription> {
        self.execute_json(
            Method::GET,
            entity_url(scope, "queues", queue_name),
            None,
            "get_queue",
            "queue",
        )
        .await
        .map_err(not_found("queue", queue_name))
    }

    pub async fn create_or_update_queue(
        &self,
        scope: &NamespaceScope,
        queue_name: &str,
        properties: QueueProperties,
    ) -> AzureResult<QueueDescription> {
        let body = serde_json::to_value(PropertiesEnvelope { properties })?;
        self.execute_json(
            Method::PUT,
            entity_url(scope, "queues", queue_name),
            Some(body),
            "create_or_update_queue",
            "queue",
        )
        .await
    }

    pub async fn delete_queue(&self, scope: &NamespaceScope, queue_name: &str) -> AzureResult<()> {
        self.execute_empty(
            Method::DELETE,
            entity_url(scope, "queues", queue_name),
            "delete_queue",
        )
        .await
    }

    /// Active and dead-letter message counts for one queue. Counts the
    /// service reports as negative are clamped to zero.
    pub async fn get_queue_counts(
        &self,
        scope: &NamespaceScope,
        queue_name: &str,
    ) -> AzureResult<(u64, u64)> {
        let queue = self.get_queue(scope, queue_name).await?;
        let details = queue.properties.count_details.unwrap_or_default();

        let active_raw = details.active_message_count;
        let dlq_raw = details.dead_letter_message_count;

        let active = if active_raw < 0 { 0 } else { active_raw as u64 };
        let dlq = if dlq_raw < 0 { 0 } else { dlq_raw as u64 };

        Ok((active, dlq))
    }

    // Topics

    pub async fn list_topics(&self, scope: &NamespaceScope) -> AzureResult<Vec<TopicDescription>> {
        self.collect_paged(collection_url(scope, "topics"), "list_topics")
            .await
    }

    pub async fn get_topic(
        &self,
        scope: &NamespaceScope,
        topic_name: &str,
    ) -> AzureResult<TopicDescription> {
        self.execute_json(
            Method::GET,
            entity_url(scope, "topics", topic_name),
            None,
            "get_topic",
            "topic",
        )
        .await
        .map_err(not_found("topic", topic_name))
    }

    pub async fn create_or_update_topic(
        &self,
        scope: &NamespaceScope,
        topic_name: &str,
        properties: TopicProperties,
    ) -> AzureResult<TopicDescription> {
        let body = serde_json::to_value(PropertiesEnvelope { properties })?;
        self.execute_json(
            Method::PUT,
            entity_url(scope, "topics", topic_name),
            Some(body),
            "create_or_update_topic",
            "topic",
        )
        .await
    }

    pub async fn delete_topic(&self, scope: &NamespaceScope, topic_name: &str) -> AzureResult<()> {
        self.execute_empty(
            Method::DELETE,
            entity_url(scope, "topics", topic_name),
            "delete_topic",
        )
        .await
    }

    // Topic subscriptions

    pub async fn list_topic_subscriptions(
        &self,
        scope: &NamespaceScope,
        topic_name: &str,
    ) -> AzureResult<Vec<SubscriptionDescription>> {
        let url = format!(
            "{}/topics/{}/subscriptions?api-version={}",
            scope.base_url(),
            urlencoding::encode(topic_name),
            API_VERSION_SERVICE_BUS
        );
        self.collect_paged(url, "list_topic_subscriptions").await
    }

    pub async fn get_subscription(
        &self,
        scope: &NamespaceScope,
        topic_name: &str,
        subscription_name: &str,
    ) -> AzureResult<SubscriptionDescription> {
        self.execute_json(
            Method::GET,
            subscription_url(scope, topic_name, subscription_name),
            None,
            "get_subscription",
            "subscription",
        )
        .await
        .map_err(not_found("subscription", subscription_name))
    }

    pub async fn create_or_update_subscription(
        &self,
        scope: &NamespaceScope,
        topic_name: &str,
        subscription_name: &str,
        properties: SubscriptionProperties,
    ) -> AzureResult<SubscriptionDescription> {
        let body = serde_json::to_value(PropertiesEnvelope { properties })?;
        self.execute_json(
            Method::PUT,
            subscription_url(scope, topic_name, subscription_name),
            Some(body),
            "create_or_update_subscription",
            "subscription",
        )
        .await
    }

    pub async fn delete_subscription(
        &self,
        scope: &NamespaceScope,
        topic_name: &str,
        subscription_name: &str,
    ) -> AzureResult<()> {
        self.execute_empty(
            Method::DELETE,
            subscription_url(scope, topic_name, subscription_name),
            "delete_subscription",
        )
        .await
    }

    // Access keys

    /// Fetches the keys behind a namespace authorization rule.
    pub async fn list_keys(
        &self,
        scope: &NamespaceScope,
        rule_name: &str,
    ) -> AzureResult<AccessKeys> {
        let url = format!(
            "{}/authorizationRules/{}/listKeys?api-version={}",
            scope.base_url(),
            urlencoding::encode(rule_name),
            API_VERSION_SERVICE_BUS
        );
        // Empty JSON body required for Azure Management API POST requests
        self.execute_json(
            Method::POST,
            url,
            Some(serde_json::json!({})),
            "list_keys",
            "access keys",
        )
        .await
    }

    /// Connection string from the namespace's root shared access policy.
    pub async fn get_namespace_connection_string(
        &self,
        scope: &NamespaceScope,
    ) -> AzureResult<String> {
        let keys = self.list_keys(scope, "RootManageSharedAccessKey").await?;
        Ok(keys.primary_connection_string)
    }

    /// Same as [`get_namespace_connection_string`], addressed by ARM
    /// resource ID.
    ///
    /// [`get_namespace_connection_string`]: Self::get_namespace_connection_string
    pub async fn get_namespace_connection_string_by_id(
        &self,
        resource_id: &str,
    ) -> AzureResult<String> {
        let scope = NamespaceScope::from_resource_id(resource_id)?;
        self.get_namespace_connection_string(&scope).await
    }
}

fn collection_url(scope: &NamespaceScope, collection: &str) -> String {
    format!(
        "{}/{}?api-version={}",
        scope.base_url(),
        collection,
        API_VERSION_SERVICE_BUS
    )
}

fn entity_url(scope: &NamespaceScope, collection: &str, name: &str) -> String {
    format!(
        "{}/{}/{}?api-version={}",
        scope.base_url(),
        collection,
        urlencoding::encode(name),
        API_VERSION_SERVICE_BUS
    )
}

fn subscription_url(scope: &NamespaceScope, topic_name: &str, subscription_name: &str) -> String {
    format!(
        "{}/topics/{}/subscriptions/{}?api-version={}",
        scope.base_url(),
        urlencoding::encode(topic_name),
        urlencoding::encode(subscription_name),
        API_VERSION_SERVICE_BUS
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope() -> NamespaceScope {
        NamespaceScope::new("sub-123", "rg-prod", "bus-prod")
    }

    #[test]
    fn parses_namespace_resource_id() {
        let parsed = NamespaceScope::from_resource_id(
            "/subscriptions/sub-123/resourceGroups/rg-prod/providers/Microsoft.ServiceBus/namespaces/bus-prod",
        )
        .unwrap();
        assert_eq!(parsed, scope());
    }

    #[test]
    fn short_resource_id_is_rejected() {
        let result = NamespaceScope::from_resource_id("/subscriptions/sub-123/resourceGroups/rg");
        assert!(matches!(result, Err(AzureError::ConfigurationError(_))));
    }

    #[test]
    fn entity_url_carries_api_version() {
        assert_eq!(
            entity_url(&scope(), "queues", "orders"),
            "https://management.azure.com/subscriptions/sub-123/resourceGroups/rg-prod/providers/Microsoft.ServiceBus/namespaces/bus-prod/queues/orders?api-version=2021-11-01"
        );
    }

    #[test]
    fn entity_names_are_escaped() {
        let url = entity_url(&scope(), "queues", "orders/audit");
        assert!(url.contains("/queues/orders%2Faudit?"));
    }

    #[test]
    fn subscription_url_nests_under_topic() {
        assert_eq!(
            subscription_url(&scope(), "billing", "invoices"),
            "https://management.azure.com/subscriptions/sub-123/resourceGroups/rg-prod/providers/Microsoft.ServiceBus/namespaces/bus-prod/topics/billing/subscriptions/invoices?api-version=2021-11-01"
        );
    }

    #[test]
    fn properties_envelope_wraps_body() {
        let body = serde_json::to_value(PropertiesEnvelope {
            properties: QueueProperties {
                max_delivery_count: Some(10),
                ..Default::default()
            },
        })
        .unwrap();
        assert_eq!(body["properties"]["maxDeliveryCount"], 10);
    }
}
