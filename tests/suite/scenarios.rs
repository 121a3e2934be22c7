//! End-to-end scenarios against the public service API.

use std::sync::Arc;

use vigil_analyzers::{Analyzer, CancellationToken};
use vigil_types::{EntityId, LanguageTag, Severity};

use crate::common::{AlwaysWarns, Counting, Harness, MemberCount, reference, rust, workspace_reference};

#[tokio::test]
async fn always_warns_is_stable_across_calls() {
    let test_lang = LanguageTag::parse("TestLang");
    let harness = Harness::new(vec![reference(
        "test-lang",
        &test_lang,
        &[AlwaysWarns::new() as Arc<dyn Analyzer>],
    )]);
    let id = harness.open("sample.test", test_lang, "fixed content\n");
    let cancel = CancellationToken::new();

    let first = harness.service.analyze(&id, &cancel).await.unwrap();
    let second = harness.service.analyze(&id, &cancel).await.unwrap();

    assert_eq!(first.diagnostics.len(), 1);
    let warning = &first.diagnostics[0];
    assert_eq!(warning.id(), AlwaysWarns::DIAGNOSTIC_ID);
    assert_eq!(warning.severity(), Severity::Warning);
    assert_eq!(second.version, first.version);
    assert_eq!(second.diagnostics[0].span(), warning.span());
}

#[tokio::test]
async fn removing_a_reference_forces_recomputation() {
    let kept = Counting::new("kept", "fn");
    let dropped = Counting::new("dropped", "fn");
    let harness = Harness::new(vec![
        reference("kept", &rust(), &[Arc::clone(&kept) as Arc<dyn Analyzer>]),
        reference("dropped", &rust(), &[Arc::clone(&dropped) as Arc<dyn Analyzer>]),
    ]);
    let id = harness.open("lib.rs", rust(), "fn main() {}\n");
    let cancel = CancellationToken::new();

    let before = harness.service.analyze(&id, &cancel).await.unwrap();
    assert_eq!(before.diagnostics.len(), 2);

    let old_fingerprint = harness.service.map().fingerprint();
    assert!(harness.service.remove_reference(&"dropped".into()));
    assert_ne!(harness.service.map().fingerprint(), old_fingerprint);

    let after = harness.service.analyze(&id, &cancel).await.unwrap();
    assert_eq!(kept.runs(), 2);
    assert_eq!(dropped.runs(), 1);
    assert_eq!(after.diagnostics.len(), 1);
    assert_eq!(after.diagnostics[0].id(), "KEPT-HIT");
    assert_ne!(after, before);
}

#[tokio::test]
async fn replacing_a_reference_with_the_same_origin_recomputes() {
    let old = Counting::new("len", "OLD");
    let new = Counting::new("len", "NEW");
    let harness = Harness::new(vec![reference(
        "builtin:text",
        &rust(),
        &[Arc::clone(&old) as Arc<dyn Analyzer>],
    )]);
    let id = harness.open("lib.rs", rust(), "OLD NEW\n");
    let cancel = CancellationToken::new();

    let before = harness.service.analyze(&id, &cancel).await.unwrap();
    assert_eq!(before.diagnostics[0].message(), "found 'OLD'");

    harness.service.set_references(vec![reference(
        "builtin:text",
        &rust(),
        &[Arc::clone(&new) as Arc<dyn Analyzer>],
    )]);
    let after = harness.service.analyze(&id, &cancel).await.unwrap();
    assert_eq!(after.diagnostics.len(), 1);
    assert_eq!(after.diagnostics[0].message(), "found 'NEW'");
    assert_eq!((old.runs(), new.runs()), (1, 1));
}

#[tokio::test]
async fn adding_a_reference_extends_results() {
    let harness = Harness::new(vec![reference(
        "base",
        &rust(),
        &[Counting::new("base", "fn") as Arc<dyn Analyzer>],
    )]);
    let id = harness.open("lib.rs", rust(), "fn main() {}\n");
    let cancel = CancellationToken::new();
    assert_eq!(
        harness.service.analyze(&id, &cancel).await.unwrap().diagnostics.len(),
        1
    );

    harness.service.add_reference(reference(
        "extra",
        &rust(),
        &[AlwaysWarns::new() as Arc<dyn Analyzer>],
    ));
    let ids: Vec<String> = harness
        .service
        .reference_ids()
        .iter()
        .map(ToString::to_string)
        .collect();
    assert_eq!(ids, vec!["base", "extra"]);

    let merged = harness.service.analyze(&id, &cancel).await.unwrap();
    let found: Vec<&str> = merged.diagnostics.iter().map(|d| d.id()).collect();
    assert_eq!(found, vec!["BASE-HIT", AlwaysWarns::DIAGNOSTIC_ID]);
}

#[tokio::test]
async fn project_sees_its_members() {
    let harness = Harness::new(vec![workspace_reference(
        "workspace",
        &[MemberCount::new() as Arc<dyn Analyzer>],
    )]);
    let project = EntityId::new("app");
    harness
        .workspace
        .add_project(project.clone(), rust())
        .unwrap();
    for name in ["a.rs", "b.rs"] {
        harness
            .workspace
            .open_document(Some(&project), EntityId::new(name), rust(), "fn x() {}\n")
            .unwrap();
    }

    let all = harness
        .service
        .analyze_all(&CancellationToken::new())
        .await
        .unwrap();
    let entities: Vec<&str> = all.iter().map(|m| m.entity.as_str()).collect();
    assert_eq!(entities, vec!["a.rs", "app", "b.rs"]);

    let app = all.iter().find(|m| m.entity == project).unwrap();
    assert_eq!(app.diagnostics.len(), 1);
    assert_eq!(app.diagnostics[0].message(), "2 members");
    assert!(all.iter().filter(|m| m.entity != project).all(|m| m.diagnostics.is_empty()));
}
