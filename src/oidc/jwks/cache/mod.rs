use async_trait::async_trait;
use jsonwebtoken::jwk::Jwk;
use std::fmt::Debug;
use std::ops::Deref;

pub mod in_memory;

/// Signing keys resolved from a JWKS endpoint, keyed by key id.
#[async_trait]
pub trait JwksCache: Send + Sync + std::fmt::Debug {
    async fn get(&self, kid: &str) -> Option<Jwk>;

    async fn set(&self, kid: &str, key: Jwk, expires_at: i64);

    async fn clear(&self);
}

#[async_trait]
impl<T, V> JwksCache for T
where
    T: Deref<Target = V> + Send + Sync + Debug,
    V: JwksCache,
{
    async fn get(&self, kid: &str) -> Option<Jwk> {
        self.deref().get(kid).await
    }

    async fn set(&self, kid: &str, key: Jwk, expires_at: i64) {
        self.deref().set(kid, key, expires_at).await
    }

    async fn clear(&self) {
        self.deref().clear().await
    }
}
