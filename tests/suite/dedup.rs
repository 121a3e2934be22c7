//! At most one execution per (entity, version, analyzer, analyzer set).

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use vigil_analyzers::{Analyzer, CancellationToken};

use crate::common::{Counting, Gated, Harness, reference, rust};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_callers_share_one_execution() {
    let (gated, open) = Gated::new("gated");
    let counting = Counting::new("counting", "fn");
    let harness = Harness::new(vec![reference(
        "fixtures",
        &rust(),
        &[
            Arc::clone(&gated) as Arc<dyn Analyzer>,
            Arc::clone(&counting) as Arc<dyn Analyzer>,
        ],
    )]);
    let id = harness.open("lib.rs", rust(), "fn main() {}\n");

    let callers: Vec<_> = (0..16)
        .map(|_| {
            let service = harness.service.clone();
            let id = id.clone();
            tokio::spawn(async move { service.analyze(&id, &CancellationToken::new()).await })
        })
        .collect();

    tokio::time::sleep(Duration::from_millis(50)).await;
    open.send_replace(true);

    let results: Vec<_> = join_all(callers)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();

    assert_eq!(gated.runs(), 1);
    assert_eq!(counting.runs(), 1);
    let first = &results[0];
    assert_eq!(first.diagnostics.len(), 2);
    for result in &results[1..] {
        assert_eq!(result, first);
    }
}

#[tokio::test]
async fn repeated_calls_hit_the_cache() {
    let counting = Counting::new("counting", "fn");
    let harness = Harness::new(vec![reference(
        "fixtures",
        &rust(),
        &[Arc::clone(&counting) as Arc<dyn Analyzer>],
    )]);
    let id = harness.open("lib.rs", rust(), "fn a() {}\nfn b() {}\n");
    let cancel = CancellationToken::new();

    let first = harness.service.analyze(&id, &cancel).await.unwrap();
    let second = harness.service.analyze(&id, &cancel).await.unwrap();

    assert_eq!(counting.runs(), 1);
    assert_eq!(first, second);
    assert_eq!(harness.service.cache_stats().completed, 1);
}

#[tokio::test]
async fn analyze_all_shares_work_with_direct_callers() {
    let counting = Counting::new("counting", "fn");
    let harness = Harness::new(vec![reference(
        "fixtures",
        &rust(),
        &[Arc::clone(&counting) as Arc<dyn Analyzer>],
    )]);
    let a = harness.open("a.rs", rust(), "fn a() {}\n");
    harness.open("b.rs", rust(), "fn b() {}\n");
    let cancel = CancellationToken::new();

    harness.service.analyze(&a, &cancel).await.unwrap();
    let all = harness.service.analyze_all(&cancel).await.unwrap();

    assert_eq!(all.len(), 2);
    assert_eq!(counting.runs(), 2);
}
