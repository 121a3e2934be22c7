use std::sync::Arc;

use vigil_types::CodeEntity;

/// A document belonging to a project, as handed to project-scope analyzers.
#[derive(Debug, Clone)]
pub struct MemberDocument {
    entity: CodeEntity,
    source: Arc<str>,
}

impl MemberDocument {
    #[must_use]
    pub fn new(entity: CodeEntity, source: Arc<str>) -> Self {
        Self { entity, source }
    }

    #[must_use]
    pub fn entity(&self) -> &CodeEntity {
        &self.entity
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }
}

/// Everything an analyzer may look at for one entity at one version.
///
/// Produced by the compilation provider; the engine never inspects it.
#[derive(Debug, Clone)]
pub struct AnalysisContext {
    entity: CodeEntity,
    source: Arc<str>,
    members: Vec<MemberDocument>,
}

impl AnalysisContext {
    #[must_use]
    pub fn document(entity: CodeEntity, source: impl Into<Arc<str>>) -> Self {
        Self {
            entity,
            source: source.into(),
            members: Vec::new(),
        }
    }

    #[must_use]
    pub fn project(entity: CodeEntity, members: Vec<MemberDocument>) -> Self {
        Self {
            entity,
            source: Arc::from(""),
            members,
        }
    }

    #[must_use]
    pub fn entity(&self) -> &CodeEntity {
        &self.entity
    }

    /// Source text. Empty for projects.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Number of lines in the source, counting a trailing partial line.
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.source.lines().count()
    }

    /// Member documents. Empty for documents.
    #[must_use]
    pub fn members(&self) -> &[MemberDocument] {
        &self.members
    }
}
