use vigil_types::{AnalyzerId, Diagnostic, Severity, Span};

use super::{char_col, check_cancelled};
use crate::{AnalysisContext, Analyzer, AnalyzerFut, CancellationToken};

/// Reports lines whose leading whitespace mixes tabs and spaces.
pub struct MixedIndentation {
    id: AnalyzerId,
}

impl MixedIndentation {
    pub const NAME: &'static str = "mixed-indentation";
    pub const DIAGNOSTIC_ID: &'static str = "INDENT001";

    #[must_use]
    pub fn new() -> Self {
        Self {
            id: AnalyzerId::new(Self::NAME),
        }
    }
}

impl Default for MixedIndentation {
    fn default() -> Self {
        Self::new()
    }
}

impl Analyzer for MixedIndentation {
    fn id(&self) -> &AnalyzerId {
        &self.id
    }

    fn description(&self) -> &str {
        "Flags indentation that mixes tabs and spaces"
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
                let indent_len = line.len() - line.trim_start_matches([' ', '\t']).len();
                let indent = &line[..indent_len];
                if !(indent.contains(' ') && indent.contains('\t')) {
                    continue;
                }
                found.push(Diagnostic::new(
                    Self::DIAGNOSTIC_ID,
                    Severity::Warning,
                    "style",
                    Span::on_line(index as u32, 0, char_col(line, indent_len)),
                    "Indentation mixes tabs and spaces",
                ));
            }
            Ok(found)
        })
    }
}
