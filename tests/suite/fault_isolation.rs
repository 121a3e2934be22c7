//! A faulting analyzer never disturbs the others.

use std::sync::Arc;
use std::time::Duration;

use vigil_analyzers::{Analyzer, CancellationToken};
use vigil_engine::{EngineSettings, FAULT_DIAGNOSTIC_ID, FaultKind};
use vigil_types::{AnalyzerId, Severity};

use crate::common::{Counting, FaultStyle, Faulting, Gated, Harness, reference, rust};

const SOURCE: &str = "fn a() {}\nlet x = 1;\nfn b() {}\n";

async fn solo_output(analyzer: Arc<dyn Analyzer>) -> Vec<vigil_types::Diagnostic> {
    let harness = Harness::new(vec![reference("solo", &rust(), &[analyzer])]);
    let id = harness.open("lib.rs", rust(), SOURCE);
    let merged = harness
        .service
        .analyze(&id, &CancellationToken::new())
        .await
        .unwrap();
    merged.diagnostics.to_vec()
}

async fn assert_isolated(style: FaultStyle, kind: FaultKind) {
    let healthy: Arc<dyn Analyzer> = Counting::new("healthy", "fn");
    let faulty = Faulting::new("faulty", style);
    let harness = Harness::new(vec![reference(
        "mixed",
        &rust(),
        &[Arc::clone(&healthy), Arc::clone(&faulty) as Arc<dyn Analyzer>],
    )]);
    let id = harness.open("lib.rs", rust(), SOURCE);
    let cancel = CancellationToken::new();

    let first = harness.service.analyze(&id, &cancel).await.unwrap();
    let second = harness.service.analyze(&id, &cancel).await.unwrap();

    let expected = solo_output(Counting::new("healthy", "fn")).await;
    assert_eq!(first.diagnostics.to_vec(), expected);
    assert_eq!(second, first);
    assert_eq!(first.faulted, vec![AnalyzerId::new("faulty")]);

    let faults = harness.service.query_faults();
    assert_eq!(faults.len(), 1);
    let record = &faults[&AnalyzerId::new("faulty")];
    assert_eq!(record.kind, kind);
    assert_eq!(record.entity, id);
    assert_eq!(record.diagnostic.id(), FAULT_DIAGNOSTIC_ID);
    assert_eq!(record.diagnostic.severity(), Severity::Warning);
    assert!(
        first
            .diagnostics
            .iter()
            .all(|d| d.id() != FAULT_DIAGNOSTIC_ID)
    );
}

#[tokio::test]
async fn returned_error_is_isolated() {
    assert_isolated(FaultStyle::Error, FaultKind::Failed).await;
}

#[tokio::test]
async fn panic_is_isolated() {
    assert_isolated(FaultStyle::Panic, FaultKind::Panicked).await;
}

#[tokio::test]
async fn faulted_result_is_cached_for_the_version() {
    let faulty = Faulting::new("faulty", FaultStyle::Error);
    let harness = Harness::new(vec![reference(
        "only",
        &rust(),
        &[Arc::clone(&faulty) as Arc<dyn Analyzer>],
    )]);
    let id = harness.open("lib.rs", rust(), SOURCE);
    let cancel = CancellationToken::new();

    harness.service.analyze(&id, &cancel).await.unwrap();
    harness.service.analyze(&id, &cancel).await.unwrap();
    assert_eq!(faulty.runs(), 1);

    harness.workspace.edit_document(&id, "fn c() {}\n").unwrap();
    harness.service.analyze(&id, &cancel).await.unwrap();
    assert_eq!(faulty.runs(), 2);
    assert_eq!(harness.faults.len(), 1);
}

#[tokio::test]
async fn slow_analyzer_times_out_without_blocking_others() {
    let (gated, _never_opened) = Gated::new("stuck");
    let settings = EngineSettings {
        analyzer_timeout: Some(Duration::from_millis(30)),
        ..EngineSettings::default()
    };
    let harness = Harness::with_settings(
        vec![reference(
            "mixed",
            &rust(),
            &[
                Counting::new("healthy", "fn") as Arc<dyn Analyzer>,
                gated as Arc<dyn Analyzer>,
            ],
        )],
        settings,
    );
    let id = harness.open("lib.rs", rust(), SOURCE);

    let merged = harness
        .service
        .analyze(&id, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(merged.diagnostics.len(), 2);
    assert_eq!(merged.faulted, vec![AnalyzerId::new("stuck")]);
    let faults = harness.service.query_faults();
    assert_eq!(faults[&AnalyzerId::new("stuck")].kind, FaultKind::TimedOut);
}
