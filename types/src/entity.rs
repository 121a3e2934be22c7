use serde::{Deserialize, Serialize};

use crate::{EntityId, LanguageTag, VersionStamp};

/// Granularity of a code entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Document,
    Project,
}

impl EntityKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Project => "project",
        }
    }
}

/// A document or project as seen by the analysis engine.
///
/// Only the identity and version matter here; content is resolved through
/// the compilation provider when an analyzer actually runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CodeEntity {
    id: EntityId,
    kind: EntityKind,
    language: LanguageTag,
    version: VersionStamp,
}

impl CodeEntity {
    #[must_use]
    pub fn document(id: EntityId, language: LanguageTag, version: VersionStamp) -> Self {
        Self {
            id,
            kind: EntityKind::Document,
            language,
            version,
        }
    }

    #[must_use]
    pub fn project(id: EntityId, language: LanguageTag, version: VersionStamp) -> Self {
        Self {
            id,
            kind: EntityKind::Project,
            language,
            version,
        }
    }

    #[must_use]
    pub fn id(&self) -> &EntityId {
        &self.id
    }

    #[must_use]
    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    #[must_use]
    pub fn language(&self) -> &LanguageTag {
        &self.language
    }

    #[must_use]
    pub fn version(&self) -> VersionStamp {
        self.version
    }

    /// The same entity at a different version.
    #[must_use]
    pub fn at_version(&self, version: VersionStamp) -> Self {
        Self {
            version,
            ..self.clone()
        }
    }
}
