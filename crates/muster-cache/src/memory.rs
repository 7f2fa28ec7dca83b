//! [`MemoryCache`] — a TTL key/value map with prefix eviction.
//!
//! Expiry is checked on read; an expired entry counts as a miss and is
//! removed on the spot. Lock-free atomic counters track hits, misses and
//! evictions; `metrics()` returns a snapshot.

use std::{
  collections::HashMap,
  sync::{
    Mutex,
    atomic::{AtomicU64, Ordering},
  },
  time::{Duration, Instant},
};

use muster_core::store::CacheStore;

struct Entry {
  value:      String,
  expires_at: Instant,
}

#[derive(Default)]
struct Metrics {
  hits:      AtomicU64,
  misses:    AtomicU64,
  evictions: AtomicU64,
}

/// Point-in-time view of the cache counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheMetricsSnapshot {
  pub hits:      u64,
  pub misses:    u64,
  pub evictions: u64,
}

/// An in-process cache. The mutex is held only for map access, never
/// across an await point.
#[derive(Default)]
pub struct MemoryCache {
  entries: Mutex<HashMap<String, Entry>>,
  metrics: Metrics,
}

impl MemoryCache {
  pub fn new() -> Self { Self::default() }

  pub fn metrics(&self) -> CacheMetricsSnapshot {
    CacheMetricsSnapshot {
      hits:      self.metrics.hits.load(Ordering::Relaxed),
      misses:    self.metrics.misses.load(Ordering::Relaxed),
      evictions: self.metrics.evictions.load(Ordering::Relaxed),
    }
  }

  /// Number of live (possibly expired, not yet collected) entries.
  pub fn len(&self) -> usize { self.entries.lock().unwrap().len() }

  pub fn is_empty(&self) -> bool { self.len() == 0 }
}

impl CacheStore for MemoryCache {
  async fn get(&self, key: &str) -> Option<String> {
    let mut entries = self.entries.lock().unwrap();
    match entries.get(key) {
      Some(entry) if entry.expires_at > Instant::now() => {
        self.metrics.hits.fetch_add(1, Ordering::Relaxed);
        Some(entry.value.clone())
      }
      Some(_) => {
        // Expired; collect it now so the map does not grow unbounded.
        entries.remove(key);
        self.metrics.misses.fetch_add(1, Ordering::Relaxed);
        self.metrics.evictions.fetch_add(1, Ordering::Relaxed);
        None
      }
      None => {
        self.metrics.misses.fetch_add(1, Ordering::Relaxed);
        None
      }
    }
  }

  async fn set(&self, key: &str, value: String, ttl: Duration) {
    let entry = Entry { value, expires_at: Instant::now() + ttl };
    self.entries.lock().unwrap().insert(key.to_owned(), entry);
  }

  async fn delete(&self, key: &str) {
    if self.entries.lock().unwrap().remove(key).is_some() {
      self.metrics.evictions.fetch_add(1, Ordering::Relaxed);
    }
  }

  async fn delete_by_prefix(&self, prefix: &str) {
    let mut entries = self.entries.lock().unwrap();
    let before = entries.len();
    entries.retain(|key, _| !key.starts_with(prefix));
    let evicted = (before - entries.len()) as u64;
    if evicted > 0 {
      self.metrics.evictions.fetch_add(evicted, Ordering::Relaxed);
      tracing::debug!(prefix, evicted, "bulk cache eviction");
    }
  }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  const TTL: Duration = Duration::from_secs(60);

  #[tokio::test]
  async fn set_then_get_hits() {
    let cache = MemoryCache::new();
    cache.set("k", "v".into(), TTL).await;
    assert_eq!(cache.get("k").await.as_deref(), Some("v"));
    assert_eq!(cache.metrics().hits, 1);
  }

  #[tokio::test]
  async fn expired_entry_is_a_miss() {
    let cache = MemoryCache::new();
    cache.set("k", "v".into(), Duration::ZERO).await;
    assert_eq!(cache.get("k").await, None);
    assert_eq!(cache.metrics().misses, 1);
    assert!(cache.is_empty());
  }

  #[tokio::test]
  async fn delete_removes_entry() {
    let cache = MemoryCache::new();
    cache.set("k", "v".into(), TTL).await;
    cache.delete("k").await;
    assert_eq!(cache.get("k").await, None);
  }

  #[tokio::test]
  async fn delete_by_prefix_spares_other_namespaces() {
    let cache = MemoryCache::new();
    cache.set("record-list:aaa", "1".into(), TTL).await;
    cache.set("record-list:bbb", "2".into(), TTL).await;
    cache.set("record:xyz", "3".into(), TTL).await;

    cache.delete_by_prefix("record-list:").await;

    assert_eq!(cache.get("record-list:aaa").await, None);
    assert_eq!(cache.get("record-list:bbb").await, None);
    assert_eq!(cache.get("record:xyz").await.as_deref(), Some("3"));
  }
}
