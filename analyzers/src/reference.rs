//! Analyzer references - sources of analyzers.
//!
//! A reference resolves a language to its ordered analyzer set. Where the
//! analyzers come from (static registration, a loaded module) is the
//! implementor's business; the engine only sees this trait and the
//! reference's identity, which feeds cache fingerprints.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use vigil_types::{AnalyzerId, LanguageTag};

use crate::Analyzer;

/// Opaque identity of a reference (origin path or registration name).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReferenceId(Arc<str>);

impl ReferenceId {
    #[must_use]
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReferenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ReferenceId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReferenceError {
    #[error("analyzer '{analyzer}' registered twice for {language} in reference '{reference}'")]
    DuplicateAnalyzer {
        reference: ReferenceId,
        analyzer: AnalyzerId,
        language: String,
    },
}

/// A source of analyzers.
pub trait AnalyzerReference: Send + Sync {
    fn id(&self) -> &ReferenceId;

    /// Analyzers for `language`, in registration order. Empty for a
    /// language this reference knows nothing about.
    fn analyzers_for(&self, language: &LanguageTag) -> Vec<Arc<dyn Analyzer>>;

    /// Every analyzer this reference owns, deduplicated by analyzer id.
    fn analyzers_for_all_languages(&self) -> Vec<Arc<dyn Analyzer>>;
}

impl std::fmt::Debug for dyn AnalyzerReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalyzerReference")
            .field("id", self.id())
            .finish_non_exhaustive()
    }
}

/// Which languages a registration applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Applicability {
    Language(LanguageTag),
    AllLanguages,
}

impl Applicability {
    fn matches(&self, language: &LanguageTag) -> bool {
        match self {
            Self::Language(tag) => tag == language,
            Self::AllLanguages => true,
        }
    }

    fn overlaps(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Language(a), Self::Language(b)) => a == b,
            _ => true,
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::Language(tag) => format!("language '{tag}'"),
            Self::AllLanguages => "all languages".to_string(),
        }
    }
}

struct Registration {
    applies_to: Applicability,
    analyzer: Arc<dyn Analyzer>,
}

/// Reference populated at startup from a declarative list of registrations.
pub struct StaticAnalyzerReference {
    id: ReferenceId,
    registrations: Vec<Registration>,
}

impl StaticAnalyzerReference {
    #[must_use]
    pub fn builder(origin: impl AsRef<str>) -> StaticReferenceBuilder {
        StaticReferenceBuilder {
            id: ReferenceId::new(origin),
            registrations: Vec::new(),
        }
    }

    /// Number of registrations (an analyzer registered for two languages
    /// counts twice).
    #[must_use]
    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }
}

impl fmt::Debug for StaticAnalyzerReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticAnalyzerReference")
            .field("id", &self.id)
            .field("registrations", &self.registrations.len())
            .finish()
    }
}

impl AnalyzerReference for StaticAnalyzerReference {
    fn id(&self) -> &ReferenceId {
        &self.id
    }

    fn analyzers_for(&self, language: &LanguageTag) -> Vec<Arc<dyn Analyzer>> {
        let mut seen = HashSet::new();
        self.registrations
            .iter()
            .filter(|reg| reg.applies_to.matches(language))
            .filter(|reg| seen.insert(reg.analyzer.id().clone()))
            .map(|reg| Arc::clone(&reg.analyzer))
            .collect()
    }

    fn analyzers_for_all_languages(&self) -> Vec<Arc<dyn Analyzer>> {
        let mut seen = HashSet::new();
        self.registrations
            .iter()
            .filter(|reg| seen.insert(reg.analyzer.id().clone()))
            .map(|reg| Arc::clone(&reg.analyzer))
            .collect()
    }
}

/// Builder for [`StaticAnalyzerReference`]. Validation happens in `build`.
pub struct StaticReferenceBuilder {
    id: ReferenceId,
    registrations: Vec<Registration>,
}

impl StaticReferenceBuilder {
    pub fn register(mut self, language: LanguageTag, analyzer: Arc<dyn Analyzer>) -> Self {
        self.registrations.push(Registration {
            applies_to: Applicability::Language(language),
            analyzer,
        });
        self
    }

    /// Register for every language, including ones the host does not know.
    pub fn register_all_languages(mut self, analyzer: Arc<dyn Analyzer>) -> Self {
        self.registrations.push(Registration {
            applies_to: Applicability::AllLanguages,
            analyzer,
        });
        self
    }

    pub fn build(self) -> Result<StaticAnalyzerReference, ReferenceError> {
        for (index, reg) in self.registrations.iter().enumerate() {
            let duplicate = self.registrations[..index].iter().find(|earlier| {
                earlier.analyzer.id() == reg.analyzer.id()
                    && earlier.applies_to.overlaps(&reg.applies_to)
            });
            if duplicate.is_some() {
                return Err(ReferenceError::DuplicateAnalyzer {
                    reference: self.id.clone(),
                    analyzer: reg.analyzer.id().clone(),
                    language: reg.applies_to.describe(),
                });
            }
        }

        Ok(StaticAnalyzerReference {
            id: self.id,
            registrations: self.registrations,
        })
    }
}
