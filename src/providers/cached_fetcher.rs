//! A time-to-live cache around one remote catalog call.
//!
//! Provider adapters create one [`CachedFetcher`] per vendor endpoint they
//! probe (e.g. Ollama's `/api/tags`). Status sweeps over many specs from the
//! same vendor would otherwise hit that endpoint once per spec; the fetcher
//! collapses them into at most one outstanding request, and keeps the result
//! (or the failure, as `None`) for one TTL window.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt, Shared};
use tokio::time::Instant;
use tracing::debug;

use crate::providers::Error;

pub(crate) const DEFAULT_TTL: Duration = Duration::from_secs(60);
pub(crate) const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1000);

/// Freshness window and per-call timeout shared by the fetchers of one adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CacheSettings {
    pub ttl: Duration,
    pub timeout: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        CacheSettings {
            ttl: DEFAULT_TTL,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

type FetchFn<T> = dyn Fn() -> BoxFuture<'static, Result<T, Error>> + Send + Sync;
type Pending<T> = Shared<BoxFuture<'static, Option<T>>>;

struct State<T> {
    last_fetch: Option<Instant>,
    value: Option<T>,
    in_flight: Option<Pending<T>>,
}

pub(crate) struct CachedFetcher<T> {
    endpoint: String,
    fetch: Arc<FetchFn<T>>,
    settings: CacheSettings,
    state: Arc<Mutex<State<T>>>,
}

fn lock<T>(state: &Mutex<State<T>>) -> MutexGuard<'_, State<T>> {
    // The guarded section never panics, but a poisoned cache is still usable.
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl<T: Clone + Send + Sync + 'static> CachedFetcher<T> {
    /// `endpoint` only names the fetcher in logs.
    pub(crate) fn new<S, F, Fut>(endpoint: S, settings: CacheSettings, fetch: F) -> CachedFetcher<T>
    where
        S: Into<String>,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, Error>> + Send + 'static,
    {
        CachedFetcher {
            endpoint: endpoint.into(),
            fetch: Arc::new(move || fetch().boxed()),
            settings,
            state: Arc::new(Mutex::new(State {
                last_fetch: None,
                value: None,
                in_flight: None,
            })),
        }
    }

    /// Returns the cached value while it is fresh, joins the outstanding
    /// request if there is one, and otherwise starts a new request.
    ///
    /// `None` means the last request failed. Failures are never raised.
    pub(crate) async fn get(&self) -> Option<T> {
        let pending = {
            let mut state = lock(&self.state);

            if let Some(last_fetch) = state.last_fetch {
                if last_fetch.elapsed() < self.settings.ttl {
                    return state.value.clone();
                }
            }

            if let Some(pending) = state.in_flight.clone() {
                pending
            } else {
                let pending = self.start();
                state.in_flight = Some(pending.clone());
                pending
            }
        };

        pending.await
    }

    /// Spawns the request so that it settles, and clears the in-flight
    /// marker, even if every waiting caller goes away.
    fn start(&self) -> Pending<T> {
        let request = (self.fetch)();
        let state = Arc::clone(&self.state);
        let timeout = self.settings.timeout;
        let endpoint = self.endpoint.clone();

        let task = tokio::spawn(async move {
            let value = match tokio::time::timeout(timeout, request).await {
                Ok(Ok(value)) => Some(value),
                Ok(Err(err)) => {
                    debug!(endpoint = %endpoint, error = %err, "fetch failed, caching the failure");
                    None
                }
                Err(_) => {
                    debug!(endpoint = %endpoint, ?timeout, "fetch timed out, caching the failure");
                    None
                }
            };

            let mut state = lock(&state);

            state.value = value.clone();
            state.last_fetch = Some(Instant::now());
            state.in_flight = None;

            value
        });

        async move { task.await.ok().flatten() }.boxed().shared()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ErrorKind;
    use futures_util::future::join_all;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn settings() -> CacheSettings {
        CacheSettings {
            ttl: Duration::from_secs(60),
            timeout: Duration::from_secs(1),
        }
    }

    fn counting_fetcher(
        calls: &Arc<AtomicUsize>,
        result: Result<Vec<String>, ErrorKind>,
    ) -> CachedFetcher<Vec<String>> {
        let calls = Arc::clone(calls);

        CachedFetcher::new("test", settings(), move || {
            calls.fetch_add(1, Ordering::SeqCst);
            let result = result.clone().map_err(Error::from_kind);

            async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                result
            }
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_calls_share_one_request() {
        let calls = Arc::new(AtomicUsize::new(0));
        let fetcher = counting_fetcher(&calls, Ok(vec!["llama3".to_string()]));

        let results = join_all((0..10).map(|_| fetcher.get())).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(results.len(), 10);
        for result in results {
            assert_eq!(result, Some(vec!["llama3".to_string()]));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fresh_value_is_served_from_cache() {
        let calls = Arc::new(AtomicUsize::new(0));
        let fetcher = counting_fetcher(&calls, Ok(vec!["a".to_string()]));

        assert!(fetcher.get().await.is_some());
        tokio::time::advance(Duration::from_secs(30)).await;
        assert!(fetcher.get().await.is_some());

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_value_is_refetched() {
        let calls = Arc::new(AtomicUsize::new(0));
        let fetcher = counting_fetcher(&calls, Ok(vec!["a".to_string()]));

        fetcher.get().await;
        tokio::time::advance(Duration::from_secs(61)).await;
        fetcher.get().await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_are_throttled_per_window() {
        let calls = Arc::new(AtomicUsize::new(0));
        let fetcher = counting_fetcher(&calls, Err(ErrorKind::Connection));

        for _ in 0..5 {
            assert_eq!(fetcher.get().await, None);
            tokio::time::advance(Duration::from_secs(5)).await;
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(60)).await;
        assert_eq!(fetcher.get().await, None);

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_degrades_to_none() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let fetcher: CachedFetcher<u32> = CachedFetcher::new("slow", settings(), move || {
            counter.fetch_add(1, Ordering::SeqCst);

            async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(7)
            }
        });

        assert_eq!(fetcher.get().await, None);
        assert_eq!(fetcher.get().await, None);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_caller_does_not_wedge_the_fetcher() {
        let calls = Arc::new(AtomicUsize::new(0));
        let fetcher = counting_fetcher(&calls, Ok(vec!["a".to_string()]));

        // Poll once to start the request, then abandon it.
        let abandoned = fetcher.get();
        let _ = tokio::time::timeout(Duration::from_millis(1), abandoned).await;

        tokio::time::advance(Duration::from_millis(20)).await;

        assert_eq!(fetcher.get().await, Some(vec!["a".to_string()]));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
