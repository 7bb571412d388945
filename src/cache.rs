// src/cache.rs
//! Injected cache capability: get/set/remove/clear with per-key TTL.
//!
//! Used for fingerprint seen-marks (dedup short-circuit) and aggregate
//! snapshots. Constructed once per process and passed to the components
//! that need it; writes are idempotent so double-marking is harmless.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

#[async_trait]
pub trait Cache: Send + Sync {
    async fn get_json(&self, key: &str) -> Option<Value>;
    async fn set_json(&self, key: &str, value: Value, ttl: Duration);
    async fn remove(&self, key: &str);
    async fn clear(&self);
}

/// In-process cache with lazy expiry on read. The authoritative checks
/// (URL uniqueness) live in the store; losing this cache only costs a
/// recomputation.
pub struct MemoryCache {
    inner: Mutex<HashMap<String, (Instant, Value)>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get_json(&self, key: &str) -> Option<Value> {
        let mut map = self.inner.lock().await;
        match map.get(key) {
            Some((deadline, value)) if *deadline > Instant::now() => Some(value.clone()),
            Some(_) => {
                map.remove(key);
                None
            }
            None => None,
        }
    }

    async fn set_json(&self, key: &str, value: Value, ttl: Duration) {
        let mut map = self.inner.lock().await;
        map.insert(key.to_string(), (Instant::now() + ttl, value));
    }

    async fn remove(&self, key: &str) {
        self.inner.lock().await.remove(key);
    }

    async fn clear(&self) {
        self.inner.lock().await.clear();
    }
}
