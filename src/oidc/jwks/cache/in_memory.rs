use jsonwebtoken::jwk::Jwk;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
pub struct InMemoryJwksCache {
    cache: Arc<RwLock<HashMap<String, (Jwk, i64)>>>,
}

impl InMemoryJwksCache {
    /// Creates a new in memory cache backed by a HashMap.
    /// No max capacity limit is enforced, but entries are cleared based on expiry.
    pub fn new() -> Self {
        Self {
            cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryJwksCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl super::JwksCache for InMemoryJwksCache {
    async fn get(&self, kid: &str) -> Option<Jwk> {
        let now = chrono::Utc::now().timestamp();
        {
            let cache = self.cache.read().await;
            match cache.get(kid) {
                Some((key, expires_at)) if *expires_at >= now => return Some(key.clone()),
                Some(_) => {}
                None => return None,
            }
        }

        let mut cache = self.cache.write().await;
        if matches!(cache.get(kid), Some((_, expires_at)) if *expires_at < now) {
            cache.remove(kid);
        }
        None
    }

    async fn set(&self, kid: &str, key: Jwk, expires_at: i64) {
        if expires_at < chrono::Utc::now().timestamp() {
            return;
        }
        self.cache
            .write()
            .await
            .insert(kid.to_string(), (key, expires_at));
    }

    async fn clear(&self) {
        self.cache.write().await.clear();
    }
}
