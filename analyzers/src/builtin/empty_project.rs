use vigil_types::{AnalyzerId, Diagnostic, Severity, Span};

use crate::{AnalysisContext, Analyzer, AnalyzerFut, AnalyzerScope, CancellationToken};

/// Project-level check: a project with no documents is almost always a
/// loading problem rather than an intentional state.
pub struct EmptyProject {
    id: AnalyzerId,
}

impl EmptyProject {
    pub const NAME: &'static str = "empty-project";
    pub const DIAGNOSTIC_ID: &'static str = "PROJ001";

    #[must_use]
    pub fn new() -> Self {
        Self {
            id: AnalyzerId::new(Self::NAME),
        }
    }
}

impl Default for EmptyProject {
    fn default() -> Self {
        Self::new()
    }
}

impl Analyzer for EmptyProject {
    fn id(&self) -> &AnalyzerId {
        &self.id
    }

    fn description(&self) -> &str {
        "Flags projects that contain no documents"
    }

    fn scope(&self) -> AnalyzerScope {
        AnalyzerScope::Project
    }

    fn analyze<'a>(
        &'a self,
        ctx: &'a AnalysisContext,
        _cancel: &'a CancellationToken,
    ) -> AnalyzerFut<'a> {
        Box::pin(async move {
            if !ctx.members().is_empty() {
                return Ok(Vec::new());
            }
            Ok(vec![Diagnostic::new(
                Self::DIAGNOSTIC_ID,
                Severity::Warning,
                "project",
                Span::point(0, 0),
                format!("Project '{}' contains no documents", ctx.entity().id()),
            )])
        })
    }
}
