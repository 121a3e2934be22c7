//! Analyzer lookup across references.

use std::sync::Arc;

use vigil_analyzers::{Analyzer, AnalyzerMap};
use vigil_types::LanguageTag;

use crate::common::{AlwaysWarns, Counting, reference, sorted_ids};

#[test]
fn unregistered_language_yields_nothing() {
    let map = AnalyzerMap::new(vec![reference(
        "lang-a",
        &LanguageTag::Rust,
        &[AlwaysWarns::new() as Arc<dyn Analyzer>],
    )]);

    assert!(map.analyzers_for(&LanguageTag::parse("cobol")).is_empty());
    assert!(map.analyzers_for(&LanguageTag::Go).is_empty());
    assert!(AnalyzerMap::empty().analyzers_for(&LanguageTag::Rust).is_empty());
}

#[test]
fn all_languages_is_the_union_of_every_language() {
    let a1: Arc<dyn Analyzer> = Counting::new("a1", "x");
    let a2: Arc<dyn Analyzer> = Counting::new("a2", "y");
    let a3: Arc<dyn Analyzer> = Counting::new("a3", "z");
    let lang_a = LanguageTag::parse("LangA");
    let lang_b = LanguageTag::parse("LangB");

    let map = AnalyzerMap::new(vec![
        reference("ref-a", &lang_a, &[Arc::clone(&a1), Arc::clone(&a2)]),
        reference("ref-b", &lang_b, &[Arc::clone(&a3)]),
    ]);

    let all = map.analyzers_for_all_languages();
    assert_eq!(all.len(), 3);
    assert_eq!(sorted_ids(&all), vec!["a1", "a2", "a3"]);
    assert_eq!(sorted_ids(&map.analyzers_for(&lang_a)), vec!["a1", "a2"]);
}

#[test]
fn fingerprint_changes_with_every_reference_change() {
    let warns: Arc<dyn Analyzer> = AlwaysWarns::new();
    let first = reference("first", &LanguageTag::Rust, &[Arc::clone(&warns)]);
    let second = reference("second", &LanguageTag::Rust, &[warns]);

    let one = AnalyzerMap::new(vec![Arc::clone(&first)]);
    let both = one.with_reference(Arc::clone(&second));
    assert_ne!(one.fingerprint(), both.fingerprint());

    let back = both.without_reference(second.id());
    assert_eq!(back.reference_ids(), one.reference_ids());
    assert_ne!(back.fingerprint(), one.fingerprint());
    assert_ne!(back.fingerprint(), both.fingerprint());
    assert!(!back.contains_reference(second.id()));
}
