// Fetch cache - get-or-fetch by source title with a time-to-live
use crate::application::dashboard_repository::RepositoryError;
use crate::domain::render_shape::Row;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tokio::time::{Duration, Instant};

#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct FetchError(pub String);

impl From<RepositoryError> for FetchError {
    fn from(e: RepositoryError) -> Self {
        FetchError(e.to_string())
    }
}

pub type FetchResult = Result<Arc<Vec<Row>>, FetchError>;

struct Entry {
    stored_at: Instant,
    generation: u64,
    fetch: Shared<BoxFuture<'static, FetchResult>>,
}

/// Requests for the same key inside the TTL share one fetch, including one still in flight.
/// Failed fetches are evicted so the next request tries again.
pub struct FetchCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, Entry>>,
    generation: Mutex<u64>,
}

impl FetchCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
            generation: Mutex::new(0),
        }
    }

    pub async fn get_or_fetch<F, Fut>(&self, key: &str, fetch: F) -> FetchResult
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<Row>, FetchError>> + Send + 'static,
    {
        let (shared, generation) = {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            match entries.get(key) {
                Some(entry) if entry.stored_at.elapsed() < self.ttl => {
                    tracing::debug!("Fetch cache hit for {}", key);
                    (entry.fetch.clone(), entry.generation)
                }
                _ => {
                    let generation = self.next_generation();
                    let shared = fetch().map(|r| r.map(Arc::new)).boxed().shared();
                    entries.insert(
                        key.to_string(),
                        Entry {
                            stored_at: Instant::now(),
                            generation,
                            fetch: shared.clone(),
                        },
                    );
                    (shared, generation)
                }
            }
        };

        let result = shared.await;
        if result.is_err() {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            if entries.get(key).is_some_and(|e| e.generation == generation) {
                entries.remove(key);
            }
        }
        result
    }

    pub fn invalidate(&self, key: &str) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }

    fn next_generation(&self) -> u64 {
        let mut generation = self.generation.lock().unwrap_or_else(PoisonError::into_inner);
        *generation += 1;
        *generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::dashboard_repository::QueryDirectory;
    use crate::application::testing::{rows, FakeBackend};
    use serde_json::json;

    fn fetcher(
        backend: &Arc<FakeBackend>,
        title: &'static str,
    ) -> impl FnOnce() -> BoxFuture<'static, Result<Vec<Row>, FetchError>> {
        let backend = backend.clone();
        move || async move { backend.run_query(title).await.map_err(FetchError::from) }.boxed()
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_requests_share_one_fetch() {
        let backend = Arc::new(FakeBackend::new());
        backend.script("Sales", Duration::from_millis(50), Ok(rows(json!([{"value": 1}]))));
        let cache = FetchCache::new(Duration::from_secs(5));

        let (a, b) = tokio::join!(
            cache.get_or_fetch("Sales", fetcher(&backend, "Sales")),
            cache.get_or_fetch("Sales", fetcher(&backend, "Sales")),
        );
        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(backend.query_calls("Sales"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entries_are_refetched() {
        let backend = Arc::new(FakeBackend::new());
        backend.set_rows("Sales", rows(json!([{"value": 1}])));
        let cache = FetchCache::new(Duration::from_secs(5));

        cache.get_or_fetch("Sales", fetcher(&backend, "Sales")).await.unwrap();
        tokio::time::advance(Duration::from_secs(2)).await;
        cache.get_or_fetch("Sales", fetcher(&backend, "Sales")).await.unwrap();
        assert_eq!(backend.query_calls("Sales"), 1);

        tokio::time::advance(Duration::from_secs(4)).await;
        cache.get_or_fetch("Sales", fetcher(&backend, "Sales")).await.unwrap();
        assert_eq!(backend.query_calls("Sales"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_are_not_cached() {
        let backend = Arc::new(FakeBackend::new());
        backend.script("Sales", Duration::ZERO, Err("boom".into()));
        backend.set_rows("Sales", rows(json!([{"value": 2}])));
        let cache = FetchCache::new(Duration::from_secs(5));

        assert!(cache.get_or_fetch("Sales", fetcher(&backend, "Sales")).await.is_err());
        let rows = cache.get_or_fetch("Sales", fetcher(&backend, "Sales")).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(backend.query_calls("Sales"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_forces_refetch() {
        let backend = Arc::new(FakeBackend::new());
        let cache = FetchCache::new(Duration::from_secs(60));

        cache.get_or_fetch("Ops", fetcher(&backend, "Ops")).await.unwrap();
        cache.invalidate("Ops");
        cache.get_or_fetch("Ops", fetcher(&backend, "Ops")).await.unwrap();
        assert_eq!(backend.query_calls("Ops"), 2);
    }
}
