use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

#[derive(Clone, Debug)]
struct CacheEntry<V> {
    payload: V,
    inserted_at: Instant,
}

/// Query-keyed cache. Stale entries read as misses and are only removed by `sweep`.
#[derive(Debug)]
pub struct TtlCache<V> {
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
}

impl<V: Clone + Send + 'static> TtlCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, entries: Mutex::new(HashMap::new()) }
    }

    pub fn get(&self, query: &str) -> Option<V> {
        let now = Instant::now();
        self.entries()
            .get(&normalize_query(query))
            .filter(|entry| now.saturating_duration_since(entry.inserted_at) <= self.ttl)
            .map(|entry| entry.payload.clone())
    }

    pub fn set(&self, query: &str, payload: V) {
        let entry = CacheEntry { payload, inserted_at: Instant::now() };
        self.entries().insert(normalize_query(query), entry);
    }

    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|_, entry| now.saturating_duration_since(entry.inserted_at) <= self.ttl);
        before - entries.len()
    }

    pub fn clear(&self) {
        self.entries().clear();
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    pub fn spawn_sweeper(cache: &Arc<Self>, interval: Duration) -> JoinHandle<()>
    where
        V: Sync,
    {
        let weak: Weak<Self> = Arc::downgrade(cache);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(cache) = weak.upgrade() else {
                    break;
                };
                let removed = cache.sweep();
                if removed > 0 {
                    debug!(event_name = "agent.cache.sweep", removed, "stale cache entries dropped");
                }
            }
        })
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, CacheEntry<V>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Lowercased, trimmed, inner whitespace collapsed to single spaces.
pub fn normalize_query(query: &str) -> String {
    query.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::{normalize_query, TtlCache};

    #[tokio::test(start_paused = true)]
    async fn lookup_ignores_case_and_spacing() {
        let cache = TtlCache::new(Duration::from_secs(60));
        cache.set("Clima en  Lima", "soleado".to_owned());

        assert_eq!(cache.get("  clima EN lima "), Some("soleado".to_owned()));
        assert_eq!(cache.get("clima en cusco"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_entries_miss_until_swept() {
        let cache = TtlCache::new(Duration::from_secs(60));
        cache.set("museos", 3_u32);

        tokio::time::advance(Duration::from_secs(60)).await;
        assert_eq!(cache.get("museos"), Some(3));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(cache.get("museos"), None);
        assert_eq!(cache.len(), 1, "lazy expiry keeps the entry until a sweep");

        assert_eq!(cache.sweep(), 1);
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn set_overwrites_and_refreshes() {
        let cache = TtlCache::new(Duration::from_secs(60));
        cache.set("q", 1_u8);
        tokio::time::advance(Duration::from_secs(50)).await;
        cache.set("Q", 2_u8);
        tokio::time::advance(Duration::from_secs(50)).await;

        assert_eq!(cache.get("q"), Some(2));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn background_sweeper_removes_stale_entries() {
        let cache = Arc::new(TtlCache::new(Duration::from_secs(60)));
        let _sweeper = TtlCache::spawn_sweeper(&cache, Duration::from_secs(300));
        cache.set("eventos", "feria".to_owned());

        tokio::time::sleep(Duration::from_secs(301)).await;
        assert!(cache.is_empty());
    }

    #[test]
    fn normalization_collapses_whitespace() {
        assert_eq!(normalize_query("  Qué\tHACER \n en Lima "), "qué hacer en lima");
    }
}
