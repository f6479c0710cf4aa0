//! Rate-limited, retrying decorator over a pool of [`IRemoteTree`]s
//!
//! [`RateLimitedRemote`] holds one or more equivalent endpoints and hands
//! each call to the next one in a weighted round-robin rotation. Every call
//! goes through three layers, outermost first:
//!
//! 1. [`with_retry`] - transient failures are retried with backoff; each
//!    attempt takes the next endpoint in the rotation
//! 2. [`EndpointCooldown`] - one cooldown per endpoint, so each respects its
//!    own throttle while the pool as a whole runs faster
//! 3. [`SlidingWindowLimiter`] - shared call budget across all endpoints

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tracing::trace;

use strmsync_core::config::RateLimitingConfig;
use strmsync_core::domain::{RemoteEntry, RemoteId, RemotePath};
use strmsync_core::ports::{IRemoteTree, ListOptions, ListPage};

use crate::rate_limit::{EndpointCooldown, SlidingWindowLimiter};
use crate::retry::{with_retry, RetryPolicy};
use crate::RemoteError;

/// One member of an endpoint pool, before it is wrapped
#[derive(Debug, Clone)]
pub struct PoolEndpoint<R> {
    /// Name used in logs
    pub name: String,
    pub remote: R,
    /// Minimum spacing between calls to this endpoint
    pub cooldown: Duration,
    /// Slots this endpoint takes per rotation cycle; 0 counts as 1
    pub weight: u32,
}

struct Endpoint<R> {
    remote: R,
    cooldown: EndpointCooldown,
}

/// Interleaves endpoint indexes by weight
///
/// Weights `[2, 2, 1]` give `[0, 1, 2, 0, 1]`.
fn rotation(weights: &[u32]) -> Vec<usize> {
    let rounds = weights.iter().copied().map(|w| w.max(1)).max().unwrap_or(0);
    let mut order = Vec::new();
    for round in 0..rounds {
        for (index, &weight) in weights.iter().enumerate() {
            if weight.max(1) > round {
                order.push(index);
            }
        }
    }
    order
}

/// [`IRemoteTree`] decorator applying rate limits, retries and endpoint
/// rotation
pub struct RateLimitedRemote<R> {
    endpoints: Vec<Endpoint<R>>,
    rotation: Vec<usize>,
    cursor: AtomicUsize,
    limiter: Arc<SlidingWindowLimiter>,
    retry: RetryPolicy,
}

impl<R> std::fmt::Debug for RateLimitedRemote<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.endpoints.iter().map(|e| e.cooldown.name()).collect();
        f.debug_struct("RateLimitedRemote")
            .field("endpoints", &names)
            .field("rotation", &self.rotation)
            .field("limiter", &self.limiter)
            .field("retry", &self.retry)
            .finish()
    }
}

impl<R: IRemoteTree> RateLimitedRemote<R> {
    /// Wraps a single remote with an explicit limiter, cooldown and retry
    /// policy
    pub fn new(
        inner: R,
        limiter: Arc<SlidingWindowLimiter>,
        cooldown: Duration,
        retry: RetryPolicy,
    ) -> Self {
        let endpoint = Endpoint {
            remote: inner,
            cooldown: EndpointCooldown::new("primary", cooldown),
        };
        Self {
            endpoints: vec![endpoint],
            rotation: vec![0],
            cursor: AtomicUsize::new(0),
            limiter,
            retry,
        }
    }

    /// Wraps a pool of equivalent remotes sharing one limiter
    ///
    /// # Errors
    /// Returns [`RemoteError::NoEndpoints`] when `endpoints` is empty
    pub fn pool(
        endpoints: Vec<PoolEndpoint<R>>,
        limiter: Arc<SlidingWindowLimiter>,
        retry: RetryPolicy,
    ) -> Result<Self, RemoteError> {
        if endpoints.is_empty() {
            return Err(RemoteError::NoEndpoints);
        }
        let weights: Vec<u32> = endpoints.iter().map(|e| e.weight).collect();
        let endpoints = endpoints
            .into_iter()
            .map(|e| Endpoint {
                remote: e.remote,
                cooldown: EndpointCooldown::new(e.name, e.cooldown),
            })
            .collect();
        Ok(Self {
            endpoints,
            rotation: rotation(&weights),
            cursor: AtomicUsize::new(0),
            limiter,
            retry,
        })
    }

    /// Wraps a single remote using the `rate_limiting` configuration section
    pub fn from_config(inner: R, config: &RateLimitingConfig) -> Self {
        let cooldown = Duration::from_secs_f64(config.endpoint_cooldown_secs.max(0.0));
        Self::new(
            inner,
            limiter_from_config(config),
            cooldown,
            RetryPolicy::with_max_retries(config.max_retries),
        )
    }

    /// Wraps a pool using the limiter and retry settings of `config`
    ///
    /// # Errors
    /// Returns [`RemoteError::NoEndpoints`] when `endpoints` is empty
    pub fn pool_from_config(
        endpoints: Vec<PoolEndpoint<R>>,
        config: &RateLimitingConfig,
    ) -> Result<Self, RemoteError> {
        Self::pool(
            endpoints,
            limiter_from_config(config),
            RetryPolicy::with_max_retries(config.max_retries),
        )
    }

    /// The shared sliding-window limiter
    pub fn limiter(&self) -> &Arc<SlidingWindowLimiter> {
        &self.limiter
    }

    /// The first remote of the pool
    pub fn primary(&self) -> &R {
        &self.endpoints[0].remote
    }

    /// Number of endpoints in the pool
    pub fn endpoint_count(&self) -> usize {
        self.endpoints.len()
    }

    fn next_endpoint(&self) -> &Endpoint<R> {
        let turn = self.cursor.fetch_add(1, Ordering::Relaxed);
        let endpoint = &self.endpoints[self.rotation[turn % self.rotation.len()]];
        trace!(endpoint = endpoint.cooldown.name(), turn, "Dispatching remote call");
        endpoint
    }
}

fn limiter_from_config(config: &RateLimitingConfig) -> Arc<SlidingWindowLimiter> {
    Arc::new(SlidingWindowLimiter::from_secs_f64(
        config.max_calls,
        config.time_window_secs,
    ))
}

#[async_trait]
impl<R: IRemoteTree> IRemoteTree for RateLimitedRemote<R> {
    async fn resolve_path_to_id(&self, path: &RemotePath) -> Result<Option<RemoteId>> {
        with_retry("resolve_path_to_id", self.retry, || async {
            let endpoint = self.next_endpoint();
            endpoint
                .cooldown
                .call(|| async {
                    self.limiter.acquire().await;
                    endpoint.remote.resolve_path_to_id(path).await
                })
                .await
        })
        .await
    }

    async fn list_children(
        &self,
        id: RemoteId,
        offset: u64,
        page_size: u32,
        options: &ListOptions,
    ) -> Result<ListPage> {
        with_retry("list_children", self.retry, || async {
            let endpoint = self.next_endpoint();
            endpoint
                .cooldown
                .call(|| async {
                    self.limiter.acquire().await;
                    endpoint.remote.list_children(id, offset, page_size, options).await
                })
                .await
        })
        .await
    }

    async fn list_children_with_ancestors(
        &self,
        id: RemoteId,
        offset: u64,
        page_size: u32,
        options: &ListOptions,
    ) -> Result<ListPage> {
        with_retry("list_children_with_ancestors", self.retry, || async {
            let endpoint = self.next_endpoint();
            endpoint
                .cooldown
                .call(|| async {
                    self.limiter.acquire().await;
                    endpoint
                        .remote
                        .list_children_with_ancestors(id, offset, page_size, options)
                        .await
                })
                .await
        })
        .await
    }

    async fn get_item_metadata(&self, id: RemoteId) -> Result<RemoteEntry> {
        with_retry("get_item_metadata", self.retry, || async {
            let endpoint = self.next_endpoint();
            endpoint
                .cooldown
                .call(|| async {
                    self.limiter.acquire().await;
                    endpoint.remote.get_item_metadata(id).await
                })
                .await
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU32;
    use std::sync::Mutex;
    use std::time::Instant;

    use strmsync_core::domain::ItemKind;

    use super::*;

    /// Remote that fails with a server error a fixed number of times
    struct FlakyRemote {
        label: &'static str,
        failures_left: AtomicU32,
        calls: AtomicU32,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    impl FlakyRemote {
        fn new(failures: u32) -> Self {
            Self::labelled("primary", failures, Arc::default())
        }

        fn labelled(label: &'static str, failures: u32, log: Arc<Mutex<Vec<&'static str>>>) -> Self {
            Self {
                label,
                failures_left: AtomicU32::new(failures),
                calls: AtomicU32::new(0),
                log,
            }
        }

        fn tick(&self) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.log.lock().unwrap().push(self.label);
            let left = self.failures_left.load(Ordering::SeqCst);
            if left > 0 {
                self.failures_left.store(left - 1, Ordering::SeqCst);
                return Err(RemoteError::ServerError("503".into()).into());
            }
            Ok(())
        }
    }

    #[async_trait]
    impl IRemoteTree for FlakyRemote {
        async fn resolve_path_to_id(&self, path: &RemotePath) -> Result<Option<RemoteId>> {
            self.tick()?;
            if path.as_str() == "/Missing" {
                return Err(RemoteError::NotFound(path.to_string()).into());
            }
            Ok(Some(RemoteId::new(5)))
        }

        async fn list_children(
            &self,
            _id: RemoteId,
            _offset: u64,
            _page_size: u32,
            _options: &ListOptions,
        ) -> Result<ListPage> {
            self.tick()?;
            Ok(ListPage {
                entries: vec![],
                total: 0,
                ancestors: None,
            })
        }

        async fn list_children_with_ancestors(
            &self,
            id: RemoteId,
            offset: u64,
            page_size: u32,
            options: &ListOptions,
        ) -> Result<ListPage> {
            self.list_children(id, offset, page_size, options).await
        }

        async fn get_item_metadata(&self, id: RemoteId) -> Result<RemoteEntry> {
            self.tick()?;
            Ok(RemoteEntry {
                id,
                parent_id: RemoteId::ROOT,
                name: "a.mkv".into(),
                modify_time: 0,
                kind: ItemKind::Directory,
            })
        }
    }

    fn wrap(inner: FlakyRemote) -> RateLimitedRemote<FlakyRemote> {
        RateLimitedRemote::new(
            inner,
            Arc::new(SlidingWindowLimiter::new(100, Duration::from_secs(1))),
            Duration::ZERO,
            RetryPolicy {
                max_retries: 3,
                base_delay: Duration::from_millis(1),
            },
        )
    }

    #[tokio::test]
    async fn retries_transient_failures() {
        let remote = wrap(FlakyRemote::new(2));
        let id = remote
            .resolve_path_to_id(&RemotePath::new("/Movies").unwrap())
            .await
            .unwrap();
        assert_eq!(id, Some(RemoteId::new(5)));
        assert_eq!(remote.primary().calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn not_found_passes_through_without_retry() {
        let remote = wrap(FlakyRemote::new(0));
        let err = remote
            .resolve_path_to_id(&RemotePath::new("/Missing").unwrap())
            .await
            .unwrap_err();
        assert!(RemoteError::is_not_found(&err));
        assert_eq!(remote.primary().calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn every_attempt_consumes_a_limiter_slot() {
        let remote = wrap(FlakyRemote::new(1));
        remote
            .list_children(RemoteId::ROOT, 0, 10, &ListOptions::default())
            .await
            .unwrap();
        remote.get_item_metadata(RemoteId::new(9)).await.unwrap();
        assert_eq!(remote.limiter().in_window(), 3);
    }

    #[tokio::test]
    async fn from_config_uses_section_values() {
        let config = RateLimitingConfig {
            max_calls: 7,
            time_window_secs: 2.0,
            ..RateLimitingConfig::default()
        };
        let remote = RateLimitedRemote::from_config(FlakyRemote::new(0), &config);
        assert_eq!(remote.limiter().max_calls(), 7);
        assert_eq!(remote.limiter().window(), Duration::from_secs(2));
    }

    fn pool(
        members: Vec<(&'static str, u32, u32, Duration)>,
        log: &Arc<Mutex<Vec<&'static str>>>,
    ) -> RateLimitedRemote<FlakyRemote> {
        let endpoints = members
            .into_iter()
            .map(|(label, weight, failures, cooldown)| PoolEndpoint {
                name: label.to_string(),
                remote: FlakyRemote::labelled(label, failures, Arc::clone(log)),
                cooldown,
                weight,
            })
            .collect();
        RateLimitedRemote::pool(
            endpoints,
            Arc::new(SlidingWindowLimiter::new(100, Duration::from_secs(1))),
            RetryPolicy {
                max_retries: 3,
                base_delay: Duration::from_millis(1),
            },
        )
        .unwrap()
    }

    #[test]
    fn rotation_interleaves_by_weight() {
        assert_eq!(rotation(&[1]), vec![0]);
        assert_eq!(rotation(&[2, 2, 1]), vec![0, 1, 2, 0, 1]);
        assert_eq!(rotation(&[1, 3]), vec![0, 1, 1, 1]);
        assert_eq!(rotation(&[0, 1]), vec![0, 1]);
    }

    #[test]
    fn empty_pool_is_rejected() {
        let result = RateLimitedRemote::<FlakyRemote>::pool(
            Vec::new(),
            Arc::new(SlidingWindowLimiter::new(1, Duration::from_secs(1))),
            RetryPolicy::default(),
        );
        assert!(matches!(result, Err(RemoteError::NoEndpoints)));
    }

    #[tokio::test]
    async fn calls_rotate_through_the_pool() {
        let log = Arc::default();
        let remote = pool(
            vec![
                ("http", 2, 0, Duration::ZERO),
                ("https", 2, 0, Duration::ZERO),
                ("api", 1, 0, Duration::ZERO),
            ],
            &log,
        );
        assert_eq!(remote.endpoint_count(), 3);

        for _ in 0..7 {
            remote
                .list_children(RemoteId::ROOT, 0, 10, &ListOptions::default())
                .await
                .unwrap();
        }
        assert_eq!(
            *log.lock().unwrap(),
            vec!["http", "https", "api", "http", "https", "http", "https"]
        );
    }

    #[tokio::test]
    async fn retry_moves_to_the_next_endpoint() {
        let log = Arc::default();
        let remote = pool(
            vec![("down", 1, 100, Duration::ZERO), ("up", 1, 0, Duration::ZERO)],
            &log,
        );

        let id = remote
            .resolve_path_to_id(&RemotePath::new("/Movies").unwrap())
            .await
            .unwrap();
        assert_eq!(id, Some(RemoteId::new(5)));
        assert_eq!(*log.lock().unwrap(), vec!["down", "up"]);
    }

    #[tokio::test]
    async fn each_endpoint_keeps_its_own_cooldown() {
        let log = Arc::default();
        let cooldown = Duration::from_millis(100);
        let remote = pool(vec![("a", 1, 0, cooldown), ("b", 1, 0, cooldown)], &log);

        let start = Instant::now();
        for _ in 0..4 {
            remote.get_item_metadata(RemoteId::new(1)).await.unwrap();
        }
        let elapsed = start.elapsed();

        // a, b, a, b: one cooldown per endpoint, not three in sequence
        assert!(elapsed >= Duration::from_millis(95), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(280), "{elapsed:?}");
        assert_eq!(*log.lock().unwrap(), vec!["a", "b", "a", "b"]);
    }
}
