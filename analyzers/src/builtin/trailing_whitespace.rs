use vigil_types::{AnalyzerId, Diagnostic, Severity, Span};

use super::{char_col, check_cancelled};
use crate::{AnalysisContext, Analyzer, AnalyzerFut, CancellationToken};

/// Reports whitespace at the end of a line.
pub struct TrailingWhitespace {
    id: AnalyzerId,
}

impl TrailingWhitespace {
    pub const NAME: &'static str = "trailing-whitespace";
    pub const DIAGNOSTIC_ID: &'static str = "TRAIL001";

    #[must_use]
    pub fn new() -> Self {
        Self {
            id: AnalyzerId::new(Self::NAME),
        }
    }
}

impl Default for TrailingWhitespace {
    fn default() -> Self {
        Self::new()
    }
}

impl Analyzer for TrailingWhitespace {
    fn id(&self) -> &AnalyzerId {
        &self.id
    }

    fn description(&self) -> &str {
        "Flags lines that end in spaces or tabs"
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
                let trimmed = line.trim_end_matches([' ', '\t']);
                if trimmed.len() == line.len() {
                    continue;
                }
                let line_no = index as u32;
                found.push(Diagnostic::new(
                    Self::DIAGNOSTIC_ID,
                    Severity::Info,
                    "style",
                    Span::on_line(
                        line_no,
                        char_col(line, trimmed.len()),
                        char_col(line, line.len()),
                    ),
                    "Trailing whitespace",
                ));
            }
            Ok(found)
        })
    }
}
