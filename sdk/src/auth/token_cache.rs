use super::types::CachedToken;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Scope-keyed cache of access tokens shared across clients.
#[derive(Clone)]
pub struct TokenCache {
    cache: Arc<RwLock<HashMap<String, CachedToken>>>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self {
            cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn get(&self, scope: &str) -> Option<String> {
        let cache = self.cache.read().await;
        cache
            .get(scope)
            .filter(|token| !token.is_expired())
            .map(|token| token.token.clone())
    }

    pub async fn set(&self, scope: String, token: CachedToken) {
        let mut cache = self.cache.write().await;
        cache.insert(scope, token);
    }

    pub async fn invalidate(&self, scope: &str) {
        let mut cache = self.cache.write().await;
        cache.remove(scope);
    }

    pub async fn clear(&self) {
        let mut cache = self.cache.write().await;
        cache.clear();
    }

    pub async fn needs_refresh(&self, scope: &str) -> bool {
        let cache = self.cache.read().await;
        cache
            .get(scope)
            .map(|token| token.needs_refresh())
            .unwrap_or(true)
    }
}

impl Default for TokenCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn expired_entries_are_not_returned() {
        let cache = TokenCache::new();
        cache
            .set(
                "scope-a".to_string(),
                CachedToken::new("tok-a".to_string(), Duration::ZERO, "Bearer".to_string()),
            )
            .await;

        assert_eq!(cache.get("scope-a").await, None);
        assert!(cache.needs_refresh("scope-a").await);
    }

    #[tokio::test]
    async fn scopes_are_cached_independently() {
        let cache = TokenCache::new();
        cache
            .set(
                "scope-a".to_string(),
                CachedToken::new(
                    "tok-a".to_string(),
                    Duration::from_secs(3600),
                    "Bearer".to_string(),
                ),
            )
            .await;

        assert_eq!(cache.get("scope-a").await.as_deref(), Some("tok-a"));
        assert_eq!(cache.get("scope-b").await, None);

        cache.invalidate("scope-a").await;
        assert_eq!(cache.get("scope-a").await, None);
    }
}
