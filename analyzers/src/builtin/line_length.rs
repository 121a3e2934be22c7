use serde::Deserialize;
use vigil_types::{AnalyzerId, Diagnostic, Severity, Span};

use super::check_cancelled;
use crate::{AnalysisContext, Analyzer, AnalyzerFut, CancellationToken};

const DEFAULT_MAX_LINE_LENGTH: u32 = 120;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(super) struct Options {
    #[serde(default = "default_max")]
    pub(super) max: u32,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            max: DEFAULT_MAX_LINE_LENGTH,
        }
    }
}

fn default_max() -> u32 {
    DEFAULT_MAX_LINE_LENGTH
}

/// Reports lines longer than a configured number of characters.
pub struct LineLength {
    id: AnalyzerId,
    max: u32,
}

impl LineLength {
    pub const NAME: &'static str = "line-length";
    pub const DIAGNOSTIC_ID: &'static str = "LEN001";

    #[must_use]
    pub fn new(max: u32) -> Self {
        Self {
            id: AnalyzerId::new(Self::NAME),
            max: max.max(1),
        }
    }

    #[must_use]
    pub fn max(&self) -> u32 {
        self.max
    }
}

impl Default for LineLength {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LINE_LENGTH)
    }
}

impl Analyzer for LineLength {
    fn id(&self) -> &AnalyzerId {
        &self.id
    }

    fn description(&self) -> &str {
        "Flags lines longer than the configured maximum"
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
                let width = line.chars().count() as u32;
                if width <= self.max {
                    continue;
                }
                found.push(Diagnostic::new(
                    Self::DIAGNOSTIC_ID,
                    Severity::Warning,
                    "style",
                    Span::on_line(index as u32, self.max, width),
                    format!("Line is {width} characters long (maximum {})", self.max),
                ));
            }
            Ok(found)
        })
    }
}
