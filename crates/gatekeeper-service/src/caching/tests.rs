use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures::FutureExt;
use futures::future::{BoxFuture, join_all};

use super::*;

/// How long every fetch in these tests takes.
const FETCH_TIME: Duration = Duration::from_millis(100);

fn cache(ttl: Duration) -> TtlCache<String> {
    let config = CacheConfig {
        default_ttl: ttl,
        ..Default::default()
    };
    TtlCache::new("test", &config)
}

/// Hands out fetchers and counts how often one of them was invoked.
#[derive(Clone, Default)]
struct Fetches(Arc<AtomicUsize>);

type Fetcher = Box<dyn FnOnce() -> BoxFuture<'static, anyhow::Result<String>> + Send>;

impl Fetches {
    fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    fn respond(&self, value: &'static str) -> Fetcher {
        let count = Arc::clone(&self.0);
        Box::new(move || {
            count.fetch_add(1, Ordering::SeqCst);
            async move {
                tokio::time::sleep(FETCH_TIME).await;
                Ok(value.to_owned())
            }
            .boxed()
        })
    }

    fn fail(&self, message: &'static str) -> Fetcher {
        let count = Arc::clone(&self.0);
        Box::new(move || {
            count.fetch_add(1, Ordering::SeqCst);
            async move {
                tokio::time::sleep(FETCH_TIME).await;
                Err(anyhow::anyhow!(message).context("document store unavailable"))
            }
            .boxed()
        })
    }
}

#[tokio::test(start_paused = true)]
async fn test_fresh_hit_does_not_fetch() {
    gatekeeper_test::setup();
    let cache = cache(Duration::from_secs(60));
    let fetches = Fetches::default();

    let first = cache.get("pages", fetches.respond("v1")).await;
    assert_eq!(first.as_deref(), Ok("v1"));

    let second = cache.get("pages", fetches.respond("v2")).await;
    assert_eq!(second.as_deref(), Ok("v1"));
    assert_eq!(fetches.count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_many_hits_single_fetch() {
    gatekeeper_test::setup();
    let cache = cache(Duration::from_secs(60));
    let fetches = Fetches::default();

    for _ in 0..100 {
        let value = cache.get("pages", fetches.respond("v1")).await;
        assert_eq!(value.as_deref(), Ok("v1"));
    }
    assert_eq!(fetches.count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cold_miss_coalesces() {
    gatekeeper_test::setup();
    let cache = cache(Duration::from_secs(60));
    let fetches = Fetches::default();

    let requests = (0..10).map(|_| cache.get("pages", fetches.respond("v1")));
    let results = join_all(requests).await;

    assert_eq!(fetches.count(), 1);
    for result in results {
        assert_eq!(result.as_deref(), Ok("v1"));
    }
}

#[tokio::test(start_paused = true)]
async fn test_cold_miss_failure_is_shared_and_not_stored() {
    gatekeeper_test::setup();
    let cache = cache(Duration::from_secs(60));
    let fetches = Fetches::default();

    let requests = (0..5).map(|_| cache.get("pages", fetches.fail("connection reset")));
    let results = join_all(requests).await;

    assert_eq!(fetches.count(), 1);
    let expected = CacheError::Fetch {
        key: "pages".into(),
        details: "document store unavailable: connection reset".into(),
    };
    for result in results {
        assert_eq!(result, Err(expected.clone()));
    }

    // Nothing was stored, so the next call fetches again.
    let value = cache.get("pages", fetches.respond("v1")).await;
    assert_eq!(value.as_deref(), Ok("v1"));
    assert_eq!(fetches.count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_stale_while_revalidate() {
    gatekeeper_test::setup();
    let cache = cache(Duration::from_secs(1));
    let fetches = Fetches::default();

    let value = cache.get("pages", fetches.respond("v1")).await;
    assert_eq!(value.as_deref(), Ok("v1"));

    tokio::time::advance(Duration::from_secs(2)).await;

    // The stale value is returned without waiting for the refresh.
    let stale = cache.get("pages", fetches.respond("v2")).now_or_never();
    assert_eq!(stale, Some(Ok("v1".to_owned())));
    assert_eq!(fetches.count(), 2);

    // A refresh is already running, so no second one is started.
    let stale = cache.get("pages", fetches.respond("v3")).now_or_never();
    assert_eq!(stale, Some(Ok("v1".to_owned())));
    assert_eq!(fetches.count(), 2);

    tokio::time::sleep(FETCH_TIME * 2).await;

    let refreshed = cache.get("pages", fetches.respond("v4")).await;
    assert_eq!(refreshed.as_deref(), Ok("v2"));
    assert_eq!(fetches.count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_failed_refresh_keeps_stale_value() {
    gatekeeper_test::setup();
    let cache = cache(Duration::from_secs(1));
    let fetches = Fetches::default();

    cache.get("pages", fetches.respond("v1")).await.unwrap();
    tokio::time::advance(Duration::from_secs(2)).await;

    let stale = cache.get("pages", fetches.fail("timeout")).await;
    assert_eq!(stale.as_deref(), Ok("v1"));
    tokio::time::sleep(FETCH_TIME * 2).await;

    // The failed refresh did not replace the entry and did not leave a marker behind.
    let stale = cache.get("pages", fetches.respond("v2")).await;
    assert_eq!(stale.as_deref(), Ok("v1"));
    assert_eq!(fetches.count(), 3);

    tokio::time::sleep(FETCH_TIME * 2).await;
    let refreshed = cache.get("pages", fetches.respond("v3")).await;
    assert_eq!(refreshed.as_deref(), Ok("v2"));
}

#[tokio::test(start_paused = true)]
async fn test_ttl_override() {
    gatekeeper_test::setup();
    let cache = cache(Duration::from_secs(1));
    let fetches = Fetches::default();

    let ttl = Duration::from_secs(600);
    cache
        .get_with_ttl("pages", ttl, fetches.respond("v1"))
        .await
        .unwrap();
    tokio::time::advance(Duration::from_secs(60)).await;

    let value = cache.get("pages", fetches.respond("v2")).await;
    assert_eq!(value.as_deref(), Ok("v1"));
    assert_eq!(fetches.count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_invalidate() {
    gatekeeper_test::setup();
    let cache = cache(Duration::from_secs(60));
    let fetches = Fetches::default();

    cache.get("pages", fetches.respond("v1")).await.unwrap();
    cache.get("posts", fetches.respond("p1")).await.unwrap();
    cache.invalidate("pages");

    let value = cache.get("pages", fetches.respond("v2")).await;
    assert_eq!(value.as_deref(), Ok("v2"));
    let value = cache.get("posts", fetches.respond("p2")).await;
    assert_eq!(value.as_deref(), Ok("p1"));
    assert_eq!(fetches.count(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_invalidate_all() {
    gatekeeper_test::setup();
    let cache = cache(Duration::from_secs(60));
    let fetches = Fetches::default();

    cache.get("pages", fetches.respond("v1")).await.unwrap();
    cache.get("posts", fetches.respond("p1")).await.unwrap();
    cache.invalidate_all();

    let value = cache.get("pages", fetches.respond("v2")).await;
    assert_eq!(value.as_deref(), Ok("v2"));
    let value = cache.get("posts", fetches.respond("p2")).await;
    assert_eq!(value.as_deref(), Ok("p2"));
    assert_eq!(fetches.count(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_invalidate_discards_running_fetch() {
    gatekeeper_test::setup();
    let cache = cache(Duration::from_secs(60));
    let fetches = Fetches::default();

    let outdated = tokio::spawn({
        let cache = cache.clone();
        let fetcher = fetches.respond("outdated");
        async move { cache.get("pages", fetcher).await }
    });
    tokio::time::sleep(FETCH_TIME / 2).await;
    assert_eq!(fetches.count(), 1);

    cache.invalidate("pages");
    let current = cache.get("pages", fetches.respond("current")).await;
    assert_eq!(current.as_deref(), Ok("current"));

    // The outdated fetch still resolves for its own waiters, but was never stored.
    let outdated = outdated.await.unwrap();
    assert_eq!(outdated.as_deref(), Ok("outdated"));

    let value = cache.get("pages", fetches.respond("unused")).await;
    assert_eq!(value.as_deref(), Ok("current"));
    assert_eq!(fetches.count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_dropped_caller_does_not_cancel_fetch() {
    gatekeeper_test::setup();
    let cache = cache(Duration::from_secs(60));
    let fetches = Fetches::default();

    let impatient = cache.get("pages", fetches.respond("v1")).now_or_never();
    assert!(impatient.is_none());

    let value = cache.get("pages", fetches.respond("v2")).await;
    assert_eq!(value.as_deref(), Ok("v1"));
    assert_eq!(fetches.count(), 1);
}

async fn explode() -> anyhow::Result<String> {
    panic!("fetcher exploded");
}

#[tokio::test(start_paused = true)]
async fn test_panicking_fetcher() {
    gatekeeper_test::setup();
    let cache = cache(Duration::from_secs(60));
    let fetches = Fetches::default();

    let result = cache.get("pages", explode).await;
    assert_eq!(result, Err(CacheError::InternalError));

    // The marker of the panicked fetch was cleared.
    let value = cache.get("pages", fetches.respond("v1")).await;
    assert_eq!(value.as_deref(), Ok("v1"));
    assert_eq!(fetches.count(), 1);
}

fn explode_before_fetching() -> futures::future::Ready<anyhow::Result<String>> {
    panic!("no document store handle");
}

#[tokio::test(start_paused = true)]
async fn test_fetcher_panicking_before_returning_a_future() {
    gatekeeper_test::setup();
    let cache = cache(Duration::from_secs(1));
    let fetches = Fetches::default();

    let result = cache.get("pages", explode_before_fetching).await;
    assert_eq!(result, Err(CacheError::InternalError));

    // The cache stays usable and no marker was left behind.
    cache.invalidate("posts");
    let value = cache.get("pages", fetches.respond("v1")).await;
    assert_eq!(value.as_deref(), Ok("v1"));
    assert_eq!(fetches.count(), 1);

    tokio::time::advance(Duration::from_secs(2)).await;

    // A refresh that panics right away keeps serving the stale value.
    let stale = cache.get("pages", explode_before_fetching).await;
    assert_eq!(stale.as_deref(), Ok("v1"));

    let stale = cache.get("pages", fetches.respond("v2")).now_or_never();
    assert_eq!(stale, Some(Ok("v1".to_owned())));
    assert_eq!(fetches.count(), 2);

    tokio::time::sleep(FETCH_TIME * 2).await;
    let refreshed = cache.get("pages", fetches.respond("unused")).await;
    assert_eq!(refreshed.as_deref(), Ok("v2"));
}

#[test]
fn test_error_messages() {
    let err = CacheError::fetch("pages", &anyhow::anyhow!("connection refused"));
    insta::assert_snapshot!(err, @"failed to fetch `pages`: connection refused");
    insta::assert_snapshot!(CacheError::InternalError, @"internal error");
}
