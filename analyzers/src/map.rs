//! Per-language view over an ordered list of analyzer references.
//!
//! The map is immutable; adding, removing or replacing references produces
//! a new map with a new [`Fingerprint`]. Cache entries are keyed by
//! fingerprint, so a configuration change forces recomputation.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use sha2::{Digest, Sha256};
use vigil_types::{AnalyzerId, LanguageTag};

use crate::{Analyzer, AnalyzerReference, ReferenceId};

static NEXT_GENERATION: AtomicU64 = AtomicU64::new(0);

/// Digest of a map's ordered reference identities and its generation.
///
/// Every map gets a process-unique generation, so a rebuilt map never shares
/// a fingerprint with an earlier one, even when a reference with the same
/// id now carries different analyzers.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    fn of(generation: u64, references: &[Arc<dyn AnalyzerReference>]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(generation.to_le_bytes());
        hasher.update((references.len() as u64).to_le_bytes());
        for reference in references {
            let id = reference.id().as_str();
            hasher.update((id.len() as u64).to_le_bytes());
            hasher.update(id.as_bytes());
        }
        Self(hasher.finalize().into())
    }

    /// Short hex form for logs.
    #[must_use]
    pub fn short(&self) -> String {
        self.0[..6].iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.short())
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.short())
    }
}

/// Aggregates analyzer references into one deterministic per-language view.
#[derive(Clone)]
pub struct AnalyzerMap {
    references: Vec<Arc<dyn AnalyzerReference>>,
    fingerprint: Fingerprint,
}

impl AnalyzerMap {
    /// Build a map from references in registration order.
    ///
    /// A reference whose id repeats an earlier one is skipped with a warning;
    /// the first registration wins.
    #[must_use]
    pub fn new(references: Vec<Arc<dyn AnalyzerReference>>) -> Self {
        let mut seen = HashSet::new();
        let mut kept = Vec::with_capacity(references.len());
        for reference in references {
            if seen.insert(reference.id().clone()) {
                kept.push(reference);
            } else {
                tracing::warn!(
                    reference = %reference.id(),
                    "Duplicate analyzer reference ignored; keeping the first registration"
                );
            }
        }
        let generation = NEXT_GENERATION.fetch_add(1, Ordering::Relaxed);
        let fingerprint = Fingerprint::of(generation, &kept);
        Self {
            references: kept,
            fingerprint,
        }
    }

    #[must_use]
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    #[must_use]
    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    #[must_use]
    pub fn references(&self) -> &[Arc<dyn AnalyzerReference>] {
        &self.references
    }

    #[must_use]
    pub fn reference_ids(&self) -> Vec<ReferenceId> {
        self.references.iter().map(|r| r.id().clone()).collect()
    }

    /// Analyzers for `language` across all references, in reference order
    /// then per-reference registration order. The first occurrence of an
    /// analyzer id wins.
    #[must_use]
    pub fn analyzers_for(&self, language: &LanguageTag) -> Vec<Arc<dyn Analyzer>> {
        Self::dedup(
            self.references
                .iter()
                .flat_map(|reference| reference.analyzers_for(language)),
        )
    }

    /// Union of every reference's analyzers, deduplicated by analyzer id.
    ///
    /// Callers should treat the result as a set; it happens to come back in
    /// registration order.
    #[must_use]
    pub fn analyzers_for_all_languages(&self) -> Vec<Arc<dyn Analyzer>> {
        Self::dedup(
            self.references
                .iter()
                .flat_map(|reference| reference.analyzers_for_all_languages()),
        )
    }

    /// Ids of every analyzer reachable through this map.
    #[must_use]
    pub fn analyzer_ids(&self) -> HashSet<AnalyzerId> {
        self.analyzers_for_all_languages()
            .iter()
            .map(|analyzer| analyzer.id().clone())
            .collect()
    }

    #[must_use]
    pub fn contains_reference(&self, id: &ReferenceId) -> bool {
        self.references.iter().any(|r| r.id() == id)
    }

    /// A new map with `reference` appended.
    #[must_use]
    pub fn with_reference(&self, reference: Arc<dyn AnalyzerReference>) -> Self {
        let mut references = self.references.clone();
        references.push(reference);
        Self::new(references)
    }

    /// A new map without the reference identified by `id`.
    #[must_use]
    pub fn without_reference(&self, id: &ReferenceId) -> Self {
        let references = self
            .references
            .iter()
            .filter(|r| r.id() != id)
            .cloned()
            .collect();
        Self::new(references)
    }

    fn dedup(analyzers: impl Iterator<Item = Arc<dyn Analyzer>>) -> Vec<Arc<dyn Analyzer>> {
        let mut seen = HashSet::new();
        analyzers
            .filter(|analyzer| seen.insert(analyzer.id().clone()))
            .collect()
    }
}

impl fmt::Debug for AnalyzerMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalyzerMap")
            .field("references", &self.reference_ids())
            .field("fingerprint", &self.fingerprint)
            .finish()
    }
}

impl Default for AnalyzerMap {
    fn default() -> Self {
        Self::empty()
    }
}
