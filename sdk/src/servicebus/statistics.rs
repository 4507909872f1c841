use super::management::{NamespaceScope, ServiceBusManagementClient};
use crate::auth::TokenCredential;
use crate::common::errors::AzureError;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Which side of a queue a count refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueType {
    Main,
    DeadLetter,
}

impl QueueType {
    /// [`QueueType::DeadLetter`] if the name ends with `/$deadletterqueue`,
    /// [`QueueType::Main`] otherwise.
    pub fn from_queue_name(queue_name: &str) -> Self {
        if queue_name.ends_with("/$deadletterqueue") {
            QueueType::DeadLetter
        } else {
            QueueType::Main
        }
    }
}

/// Configuration for queue statistics
#[derive(Debug, Clone)]
pub struct StatisticsConfig {
    pub display_enabled: bool,
    pub cache_ttl_seconds: u64,
}

impl StatisticsConfig {
    pub fn new(display_enabled: bool, cache_ttl_seconds: u64) -> Self {
        Self {
            display_enabled,
            cache_ttl_seconds,
        }
    }
}

impl Default for StatisticsConfig {
    fn default() -> Self {
        Self {
            display_enabled: true,
            cache_ttl_seconds: 60,
        }
    }
}

/// Cached message counts for a single queue.
#[derive(Debug, Clone)]
pub struct QueueStatsCache {
    pub queue_name: String,
    pub active_count: u64,
    pub dlq_count: u64,
    pub fetched_at: DateTime<Utc>,
    pub ttl_seconds: u64,
}

impl QueueStatsCache {
    pub fn new(
        queue_name: impl Into<String>,
        active_count: u64,
        dlq_count: u64,
        ttl_seconds: u64,
    ) -> Self {
        Self {
            queue_name: queue_name.into(),
            active_count,
            dlq_count,
            fetched_at: Utc::now(),
            ttl_seconds,
        }
    }

    /// Whether the cached counts have outlived their TTL.
    pub fn is_expired(&self) -> bool {
        let age = Utc::now().signed_duration_since(self.fetched_at);
        age.num_seconds().max(0) as u64 > self.ttl_seconds
    }

    pub fn get_count_for_type(&self, queue_type: &QueueType) -> u64 {
        match queue_type {
            QueueType::Main => self.active_count,
            QueueType::DeadLetter => self.dlq_count,
        }
    }
}

/// Queue count provider backed by the management API, with a per-queue TTL
/// cache.
///
/// Lookups never fail the caller: every error path logs and degrades to
/// `None`, and while the management API is unreachable the previous counts
/// keep being served even past their TTL. A queue the service reports as
/// gone drops out of the cache instead.
pub struct QueueStatisticsService {
    management_client: Mutex<Option<Arc<ServiceBusManagementClient>>>,
    credential: Arc<dyn TokenCredential>,
    scope: NamespaceScope,
    config: StatisticsConfig,
    cache: Mutex<HashMap<String, QueueStatsCache>>,
    initialized: Mutex<bool>,
}

impl QueueStatisticsService {
    pub fn new(
        credential: Arc<dyn TokenCredential>,
        scope: NamespaceScope,
        config: StatisticsConfig,
    ) -> Self {
        Self {
            management_client: Mutex::new(None),
            credential,
            scope,
            config,
            cache: Mutex::new(HashMap::new()),
            initialized: Mutex::new(false),
        }
    }

    /// Initialize the management client lazily on first use
    async fn ensure_initialized(&self) {
        let mut initialized = self.initialized.lock().await;
        if *initialized {
            return;
        }

        match ServiceBusManagementClient::new(self.credential.clone()) {
            Ok(client) => {
                log::info!(
                    "Management client initialized for namespace {}",
                    self.scope.namespace
                );
                let mut client_lock = self.management_client.lock().await;
                *client_lock = Some(Arc::new(client));
            }
            Err(e) => {
                log::warn!(
                    "Failed to initialize management client: {e}. Queue statistics will not be available.",
                );
            }
        }

        *initialized = true;
    }

    /// Active or dead-letter count for a queue, served from cache while
    /// fresh.
    pub async fn get_queue_statistics(
        &self,
        queue_name: &str,
        queue_type: &QueueType,
    ) -> Option<u64> {
        if !self.config.display_enabled {
            log::debug!("Queue statistics display is disabled");
            return None;
        }

        self.ensure_initialized().await;
        self.current_stats(queue_name)
            .await
            .map(|stats| stats.get_count_for_type(queue_type))
    }

    /// Both counts in one call, sharing a single fetch.
    pub async fn get_both_queue_counts(&self, queue_name: &str) -> (Option<u64>, Option<u64>) {
        if !self.config.display_enabled {
            log::debug!("Queue statistics display is disabled");
            return (None, None);
        }

        self.ensure_initialized().await;
        match self.current_stats(queue_name).await {
            Some(stats) => (Some(stats.active_count), Some(stats.dlq_count)),
            None => (None, None),
        }
    }

    async fn current_stats(&self, queue_name: &str) -> Option<QueueStatsCache> {
        {
            let cache = self.cache.lock().await;
            if let Some(entry) = cache.get(queue_name).filter(|entry| !entry.is_expired()) {
                return Some(entry.clone());
            }
        }

        let client = {
            let client_lock = self.management_client.lock().await;
            match &*client_lock {
                Some(client) => Arc::clone(client),
                None => {
                    log::debug!("Management client not available");
                    return None;
                }
            }
        };

        match client.get_queue_counts(&self.scope, queue_name).await {
            Ok((active, dlq)) => {
                log::debug!("Retrieved counts for {queue_name} - active: {active}, dlq: {dlq}");
                let entry =
                    QueueStatsCache::new(queue_name, active, dlq, self.config.cache_ttl_seconds);
                let mut cache = self.cache.lock().await;
                cache.insert(queue_name.to_string(), entry.clone());
                Some(entry)
            }
            Err(AzureError::ResourceNotFound(_)) => {
                log::warn!("Queue not found: {queue_name}");
                self.invalidate(queue_name).await;
                None
            }
            Err(AzureError::AuthenticationFailed(msg))
            | Err(AzureError::AuthenticationError(msg)) => {
                log::warn!("Authentication failed for management API: {msg}");
                self.stale_stats(queue_name).await
            }
            Err(e) => {
                log::warn!("Failed to get queue statistics: {e}");
                self.stale_stats(queue_name).await
            }
        }
    }

    // Expired entries stay in the map until a refresh succeeds, so a flaky
    // management API degrades to stale counts rather than none.
    async fn stale_stats(&self, queue_name: &str) -> Option<QueueStatsCache> {
        let cache = self.cache.lock().await;
        cache.get(queue_name).cloned()
    }

    /// Drops the cached counts for one queue.
    pub async fn invalidate(&self, queue_name: &str) {
        let mut cache = self.cache.lock().await;
        if cache.remove(queue_name).is_some() {
            log::debug!("Invalidated cached statistics for queue {queue_name}");
        }
    }

    /// Drops every cached entry.
    pub async fn clear_cache(&self) {
        let mut cache = self.cache.lock().await;
        cache.clear();
    }

    /// Check if the service is properly configured and ready
    pub async fn is_available(&self) -> bool {
        if !self.config.display_enabled {
            return false;
        }

        self.ensure_initialized().await;
        let client_lock = self.management_client.lock().await;
        client_lock.is_some()
    }

    /// Get the current configuration
    pub fn config(&self) -> &StatisticsConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticTokenCredential;
    use chrono::Duration;

    fn test_service(display_enabled: bool) -> QueueStatisticsService {
        QueueStatisticsService::new(
            Arc::new(StaticTokenCredential::new("token")),
            NamespaceScope::new("sub-123", "rg-prod", "bus-prod"),
            StatisticsConfig::new(display_enabled, 60),
        )
    }

    #[test]
    fn queue_type_from_name_detects_dead_letter_suffix() {
        assert_eq!(QueueType::from_queue_name("orders"), QueueType::Main);
        assert_eq!(
            QueueType::from_queue_name("orders/$deadletterqueue"),
            QueueType::DeadLetter
        );
    }

    #[test]
    fn fresh_entry_is_not_expired() {
        let entry = QueueStatsCache::new("orders", 10, 2, 60);
        assert!(!entry.is_expired());
    }

    #[test]
    fn entry_expires_after_ttl() {
        let mut entry = QueueStatsCache::new("orders", 10, 2, 60);
        entry.fetched_at = Utc::now() - Duration::seconds(120);
        assert!(entry.is_expired());
    }

    #[test]
    fn count_selection_by_queue_type() {
        let entry = QueueStatsCache::new("orders", 10, 2, 60);
        assert_eq!(entry.get_count_for_type(&QueueType::Main), 10);
        assert_eq!(entry.get_count_for_type(&QueueType::DeadLetter), 2);
    }

    #[tokio::test]
    async fn disabled_display_short_circuits() {
        let service = test_service(false);
        assert_eq!(
            service.get_queue_statistics("orders", &QueueType::Main).await,
            None
        );
        assert_eq!(service.get_both_queue_counts("orders").await, (None, None));
        assert!(!service.is_available().await);
    }

    #[tokio::test]
    async fn fresh_cache_entry_is_served_without_a_fetch() {
        let service = test_service(true);
        service
            .cache
            .lock()
            .await
            .insert("orders".to_string(), QueueStatsCache::new("orders", 41, 3, 60));

        assert_eq!(
            service.get_queue_statistics("orders", &QueueType::Main).await,
            Some(41)
        );
        assert_eq!(
            service
                .get_queue_statistics("orders", &QueueType::DeadLetter)
                .await,
            Some(3)
        );
    }

    #[tokio::test]
    async fn invalidate_drops_only_the_named_queue() {
        let service = test_service(true);
        {
            let mut cache = service.cache.lock().await;
            cache.insert("orders".to_string(), QueueStatsCache::new("orders", 1, 0, 60));
            cache.insert("audit".to_string(), QueueStatsCache::new("audit", 2, 0, 60));
        }

        service.invalidate("orders").await;

        let cache = service.cache.lock().await;
        assert!(!cache.contains_key("orders"));
        assert!(cache.contains_key("audit"));
    }
}
