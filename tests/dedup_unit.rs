use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use renderiq::dedup::RequestDeduplicator;

fn counting_call(
    calls: &Arc<AtomicUsize>,
    result: Result<u32, String>,
) -> impl FnOnce() -> BoxFuture<'static, Result<u32, String>> {
    let calls = Arc::clone(calls);
    move || -> BoxFuture<'static, Result<u32, String>> {
        Box::pin(async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(30)).await;
            result
        })
    }
}

#[tokio::test]
async fn concurrent_callers_share_one_execution() {
    let dedup: RequestDeduplicator<u32, String> = RequestDeduplicator::new();
    let calls = Arc::new(AtomicUsize::new(0));

    let (a, b, c) = tokio::join!(
        dedup.deduplicate("credits:u1", counting_call(&calls, Ok(7))),
        dedup.deduplicate("credits:u1", counting_call(&calls, Ok(8))),
        dedup.deduplicate("credits:u1", counting_call(&calls, Ok(9))),
    );

    assert_eq!((a, b, c), (Ok(7), Ok(7), Ok(7)));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(dedup.pending_len(), 0);
    assert_eq!(dedup.cached_len(), 1);
}

#[tokio::test]
async fn different_keys_run_independently() {
    let dedup: RequestDeduplicator<u32, String> = RequestDeduplicator::new();
    let calls = Arc::new(AtomicUsize::new(0));

    let (a, b) = tokio::join!(
        dedup.deduplicate("credits:u1", counting_call(&calls, Ok(1))),
        dedup.deduplicate("credits:u2", counting_call(&calls, Ok(2))),
    );

    assert_eq!((a, b), (Ok(1), Ok(2)));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn fresh_results_are_served_from_cache() {
    let dedup: RequestDeduplicator<u32, String> = RequestDeduplicator::new();
    let calls = Arc::new(AtomicUsize::new(0));

    assert_eq!(dedup.deduplicate("k", counting_call(&calls, Ok(1))).await, Ok(1));
    assert_eq!(dedup.deduplicate("k", counting_call(&calls, Ok(2))).await, Ok(1));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    dedup.invalidate("k");
    assert_eq!(dedup.deduplicate("k", counting_call(&calls, Ok(3))).await, Ok(3));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn failures_are_shared_but_not_cached() {
    let dedup: RequestDeduplicator<u32, String> = RequestDeduplicator::new();
    let calls = Arc::new(AtomicUsize::new(0));

    let (a, b) = tokio::join!(
        dedup.deduplicate("k", counting_call(&calls, Err("db down".into()))),
        dedup.deduplicate("k", counting_call(&calls, Ok(5))),
    );
    assert_eq!(a, Err("db down".to_string()));
    assert_eq!(b, Err("db down".to_string()));
    assert_eq!(dedup.cached_len(), 0);

    assert_eq!(dedup.deduplicate("k", counting_call(&calls, Ok(5))).await, Ok(5));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn expired_entries_are_recomputed_and_swept() {
    let dedup: RequestDeduplicator<u32, String> =
        RequestDeduplicator::with_timeouts(Duration::from_millis(20), Duration::from_secs(30));
    let calls = Arc::new(AtomicUsize::new(0));

    dedup.deduplicate("k", counting_call(&calls, Ok(1))).await.unwrap();
    tokio::time::sleep(Duration::from_millis(40)).await;

    dedup.sweep();
    assert_eq!(dedup.cached_len(), 0);

    assert_eq!(dedup.deduplicate("k", counting_call(&calls, Ok(2))).await, Ok(2));
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    dedup.clear();
    assert_eq!(dedup.cached_len(), 0);
}
