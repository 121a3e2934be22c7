//! Cancelling one caller detaches it without aborting shared work.

use std::sync::Arc;
use std::time::Duration;

use vigil_analyzers::{Analyzer, CancellationToken};
use vigil_engine::AnalyzeError;

use crate::common::{Gated, Harness, reference, rust};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancelled_waiter_detaches_and_work_continues() {
    let (gated, open) = Gated::new("gated");
    let harness = Harness::new(vec![reference(
        "fixtures",
        &rust(),
        &[Arc::clone(&gated) as Arc<dyn Analyzer>],
    )]);
    let id = harness.open("lib.rs", rust(), "text\n");

    let first_cancel = CancellationToken::new();
    let first = {
        let service = harness.service.clone();
        let id = id.clone();
        let cancel = first_cancel.clone();
        tokio::spawn(async move { service.analyze(&id, &cancel).await })
    };
    let second = {
        let service = harness.service.clone();
        let id = id.clone();
        tokio::spawn(async move { service.analyze(&id, &CancellationToken::new()).await })
    };

    tokio::time::sleep(Duration::from_millis(30)).await;
    first_cancel.cancel();
    let first = first.await.unwrap();
    assert!(matches!(first, Err(AnalyzeError::Cancelled)));

    open.send_replace(true);
    let second = second.await.unwrap().unwrap();
    assert_eq!(second.diagnostics.len(), 1);
    assert_eq!(gated.runs(), 1);
    assert_eq!(gated.observed_cancel(), 0);

    // The detached caller's work is reusable.
    let third = harness
        .service
        .analyze(&id, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(third, second);
    assert_eq!(gated.runs(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn sole_caller_cancelling_leaves_computation_running() {
    let (gated, open) = Gated::new("gated");
    let harness = Harness::new(vec![reference(
        "fixtures",
        &rust(),
        &[Arc::clone(&gated) as Arc<dyn Analyzer>],
    )]);
    let id = harness.open("lib.rs", rust(), "text\n");

    let cancel = CancellationToken::new();
    let pending = {
        let service = harness.service.clone();
        let id = id.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { service.analyze(&id, &cancel).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    cancel.cancel();
    assert!(pending.await.unwrap().unwrap_err().is_cancelled());

    open.send_replace(true);
    let result = harness
        .service
        .analyze(&id, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(result.diagnostics.len(), 1);
    assert_eq!(gated.runs(), 1);
}

#[tokio::test]
async fn already_cancelled_token_runs_nothing() {
    let (gated, _open) = Gated::new("gated");
    let harness = Harness::new(vec![reference(
        "fixtures",
        &rust(),
        &[Arc::clone(&gated) as Arc<dyn Analyzer>],
    )]);
    let id = harness.open("lib.rs", rust(), "text\n");
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = harness.service.analyze(&id, &cancel).await.unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(gated.runs(), 0);
    assert!(harness.faults.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn shutdown_cancels_shared_computations() {
    let (gated, _open) = Gated::new("gated");
    let harness = Harness::new(vec![reference(
        "fixtures",
        &rust(),
        &[Arc::clone(&gated) as Arc<dyn Analyzer>],
    )]);
    let id = harness.open("lib.rs", rust(), "text\n");

    let pending = {
        let service = harness.service.clone();
        let id = id.clone();
        tokio::spawn(async move { service.analyze(&id, &CancellationToken::new()).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    harness.service.shutdown();

    let err = pending.await.unwrap().unwrap_err();
    assert!(matches!(err, AnalyzeError::ShutDown));
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(gated.observed_cancel(), 1);
    assert!(harness.faults.is_empty());
    assert!(matches!(
        harness
            .service
            .analyze(&id, &CancellationToken::new())
            .await,
        Err(AnalyzeError::ShutDown)
    ));
}
