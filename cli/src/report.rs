//! Renders a finished check as text or JSON.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::Serialize;
use vigil_engine::{FaultRecord, MergedDiagnostics};
use vigil_types::AnalyzerId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Everything one `vigil check` run produced.
#[derive(Debug, Serialize)]
pub struct Report {
    pub diagnostics: Vec<MergedDiagnostics>,
    pub faults: BTreeMap<AnalyzerId, FaultRecord>,
    /// Subscriber-side summary, `E:n W:m`.
    #[serde(skip)]
    pub status: String,
}

impl Report {
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .flat_map(|merged| merged.diagnostics.iter())
            .any(|d| d.severity().is_error())
    }

    pub fn render(&self, format: OutputFormat) -> anyhow::Result<String> {
        match format {
            OutputFormat::Text => Ok(self.render_text()),
            OutputFormat::Json => Ok(serde_json::to_string_pretty(self)?),
        }
    }

    fn render_text(&self) -> String {
        let mut out = String::new();
        let mut total = 0usize;
        for merged in &self.diagnostics {
            for diagnostic in merged.diagnostics.iter() {
                total += 1;
                let _ = writeln!(out, "{}", diagnostic.display_at(merged.entity.as_str()));
            }
        }

        if !self.faults.is_empty() {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str("analyzer faults:\n");
            for record in self.faults.values() {
                let _ = writeln!(out, "  [{}] {}", record.kind, record.diagnostic.message());
            }
        }

        if total == 0 && self.faults.is_empty() {
            out.push_str("no diagnostics\n");
        } else {
            let status = if self.status.is_empty() {
                String::new()
            } else {
                format!(" ({})", self.status)
            };
            let _ = writeln!(
                out,
                "\n{total} diagnostic{}{status}, {} analyzer fault{}",
                if total == 1 { "" } else { "s" },
                self.faults.len(),
                if self.faults.len() == 1 { "" } else { "s" },
            );
        }
        out
    }
}
