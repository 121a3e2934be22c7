use std::sync::LazyLock;

use regex::Regex;
use vigil_types::{AnalyzerId, Diagnostic, Severity, Span};

use super::{char_col, check_cancelled};
use crate::{AnalysisContext, Analyzer, AnalyzerFut, CancellationToken};

static TODO_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(TODO|FIXME|XXX)\b").expect("static regex is valid"));

/// Reports TODO / FIXME / XXX markers.
pub struct TodoComment {
    id: AnalyzerId,
}

impl TodoComment {
    pub const NAME: &'static str = "todo-comment";
    pub const DIAGNOSTIC_ID: &'static str = "TODO001";

    #[must_use]
    pub fn new() -> Self {
        Self {
            id: AnalyzerId::new(Self::NAME),
        }
    }
}

impl Default for TodoComment {
    fn default() -> Self {
        Self::new()
    }
}

impl Analyzer for TodoComment {
    fn id(&self) -> &AnalyzerId {
        &self.id
    }

    fn description(&self) -> &str {
        "Flags TODO, FIXME and XXX markers left in the source"
    }

    fn analyze<'a>(
        &'a self,
        ctx: &'a AnalysisContext,
        cancel: &'a CancellationToken,
    ) -> AnalyzerFut<'a> {
        Box::pin(async move {
            let mut found = Vec::new();
            for (index, line) in ctx.source().lines().enumerate() {
                check_cancelled(index, cancel)?;
                for m in TODO_PATTERN.find_iter(line) {
                    found.push(Diagnostic::new(
                        Self::DIAGNOSTIC_ID,
                        Severity::Info,
                        "maintainability",
                        Span::on_line(
                            index as u32,
                            char_col(line, m.start()),
                            char_col(line, m.end()),
                        ),
                        format!("{} marker", m.as_str()),
                    ));
                }
            }
            Ok(found)
        })
    }
}
