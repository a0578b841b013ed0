//! Signing key resolution against a JSON Web Key Set endpoint.

use custom_error::custom_error;
use http::header::{ACCEPT, USER_AGENT};
use http::{HeaderMap, HeaderValue};
use jsonwebtoken::jwk::{Jwk, JwkSet};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

pub mod cache;

use cache::JwksCache;

/// How long fetched keys are trusted before the endpoint is consulted again.
pub const DEFAULT_KEY_TTL: Duration = Duration::from_secs(600);

/// After a fetch that did not contain the requested key id, further misses
/// fail without refetching for this long.
pub const DEFAULT_MISS_COOLDOWN: Duration = Duration::from_secs(30);

custom_error! {
    pub JwksError
        RequestFailed{source: reqwest::Error} = "the jwks request did fail: {source}",
        Status{status: u16} = "jwks endpoint responded with status {status}",
        ParseResponse{source: serde_json::Error} = "could not parse jwks response: {source}",
        UnknownKey{kid: String} = "no signing key found for kid {kid}",
}

/// Fetches signing keys by key id, consulting the cache first.
///
/// Concurrent misses for the same key id may each fetch the key set. The
/// cache only ever holds complete keys, so the duplicates are harmless.
///
/// Unknown key ids are throttled: once a fetch comes back without the
/// requested key, cache misses are answered with [`JwksError::UnknownKey`]
/// until the cooldown has passed. Clones share the cooldown.
#[derive(Clone, Debug)]
pub struct JwksClient {
    url: Url,
    headers: HeaderMap,
    http: reqwest::Client,
    cache: Arc<dyn JwksCache>,
    ttl: Duration,
    miss_cooldown: Duration,
    /// Unix timestamp before which cache misses do not refetch.
    refetch_after: Arc<AtomicI64>,
}

impl JwksClient {
    pub fn new(
        url: Url,
        headers: HeaderMap,
        user_agent: &str,
        http: reqwest::Client,
        cache: Arc<dyn JwksCache>,
    ) -> Self {
        let mut headers = headers;
        headers
            .entry(ACCEPT)
            .or_insert(HeaderValue::from_static("application/json"));
        if let Ok(user_agent) = HeaderValue::from_str(user_agent) {
            headers.entry(USER_AGENT).or_insert(user_agent);
        }

        Self {
            url,
            headers,
            http,
            cache,
            ttl: DEFAULT_KEY_TTL,
            miss_cooldown: DEFAULT_MISS_COOLDOWN,
            refetch_after: Arc::new(AtomicI64::new(0)),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_miss_cooldown(mut self, cooldown: Duration) -> Self {
        self.miss_cooldown = cooldown;
        self
    }

    pub async fn key(&self, kid: &str) -> Result<Jwk, JwksError> {
        if let Some(key) = self.cache.get(kid).await {
            return Ok(key);
        }

        let now = chrono::Utc::now().timestamp();
        if now < self.refetch_after.load(Ordering::Relaxed) {
            debug!(kid, "unknown key id within refetch cooldown");
            return Err(JwksError::UnknownKey {
                kid: kid.to_string(),
            });
        }

        let keys = self.fetch().await?;
        let expires_at = now + self.ttl.as_secs() as i64;

        let mut found = None;
        for key in keys.keys {
            let Some(key_id) = key.common.key_id.clone() else {
                continue;
            };
            if key_id == kid {
                found = Some(key.clone());
            }
            self.cache.set(&key_id, key, expires_at).await;
        }

        found.ok_or_else(|| {
            self.refetch_after
                .store(now + self.miss_cooldown.as_secs() as i64, Ordering::Relaxed);
            JwksError::UnknownKey {
                kid: kid.to_string(),
            }
        })
    }

    async fn fetch(&self) -> Result<JwkSet, JwksError> {
        let response = self
            .http
            .get(self.url.clone())
            .headers(self.headers.clone())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(JwksError::Status {
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await?;
        let keys: JwkSet = serde_json::from_slice(&body)?;
        debug!(url = %self.url, keys = keys.keys.len(), "fetched json web key set");

        Ok(keys)
    }
}
