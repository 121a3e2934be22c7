//! Runs one analyzer against one entity inside a fault boundary.
//!
//! Panics, returned errors, timeouts and out-of-range spans all become a
//! [`FaultRecord`] in the [`ExceptionDiagnosticUpdateSource`]; none of them
//! reach the caller as an error. The driver does no caching.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use vigil_analyzers::{AnalysisContext, Analyzer, AnalyzerError, CancellationToken};
use vigil_types::{Diagnostic, EntityKind, Severity, Span};

use crate::faults::{
    ExceptionDiagnosticUpdateSource, FAULT_CATEGORY, FAULT_DIAGNOSTIC_ID, FaultKind, FaultRecord,
};
use crate::settings::{EngineSettings, SeverityOverrides};

/// Result of a single analyzer run.
#[derive(Debug)]
pub enum DriverOutcome {
    Completed(Vec<Diagnostic>),
    Faulted(FaultRecord),
    /// The caller's token fired and the analyzer honoured it.
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct AnalyzerDriver {
    faults: Arc<ExceptionDiagnosticUpdateSource>,
    timeout: Option<Duration>,
    overrides: Arc<SeverityOverrides>,
}

impl AnalyzerDriver {
    #[must_use]
    pub fn new(faults: Arc<ExceptionDiagnosticUpdateSource>, settings: &EngineSettings) -> Self {
        Self {
            faults,
            timeout: settings.analyzer_timeout,
            overrides: Arc::new(settings.severity_overrides.clone()),
        }
    }

    pub async fn run(
        &self,
        analyzer: &dyn Analyzer,
        ctx: &AnalysisContext,
        cancel: &CancellationToken,
    ) -> DriverOutcome {
        if cancel.is_cancelled() {
            return DriverOutcome::Cancelled;
        }

        // Build the future inside the boundary too: `analyze` itself may
        // panic before returning it.
        let guarded = AssertUnwindSafe(async { analyzer.analyze(ctx, cancel).await }).catch_unwind();
        let result = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, guarded).await {
                Ok(result) => result,
                Err(_) => {
                    return self.fault(
                        analyzer,
                        ctx,
                        FaultKind::TimedOut,
                        format!("did not finish within {}ms", limit.as_millis()),
                    );
                }
            },
            None => guarded.await,
        };

        match result {
            Err(payload) => self.fault(
                analyzer,
                ctx,
                FaultKind::Panicked,
                format!("panicked: {}", panic_payload_to_string(&payload)),
            ),
            Ok(Err(AnalyzerError::Cancelled)) if cancel.is_cancelled() => {
                tracing::debug!(
                    analyzer = %analyzer.id(),
                    entity = %ctx.entity().id(),
                    "Analyzer cancelled"
                );
                DriverOutcome::Cancelled
            }
            Ok(Err(AnalyzerError::Cancelled)) => self.fault(
                analyzer,
                ctx,
                FaultKind::Failed,
                "reported cancellation that was not requested".to_string(),
            ),
            Ok(Err(err)) => self.fault(analyzer, ctx, FaultKind::Failed, err.to_string()),
            Ok(Ok(diagnostics)) => {
                if let Some(bad) = invalid_span(ctx, &diagnostics) {
                    let detail = format!(
                        "reported [{}] at {}:{} outside the source ({} lines)",
                        bad.id(),
                        bad.span().start.line + 1,
                        bad.span().start.col + 1,
                        ctx.line_count()
                    );
                    return self.fault(analyzer, ctx, FaultKind::InvalidDiagnostic, detail);
                }
                self.faults.clear(analyzer.id());
                let diagnostics = diagnostics
                    .into_iter()
                    .filter_map(|d| self.overrides.apply(d))
                    .collect();
                DriverOutcome::Completed(diagnostics)
            }
        }
    }

    fn fault(
        &self,
        analyzer: &dyn Analyzer,
        ctx: &AnalysisContext,
        kind: FaultKind,
        detail: String,
    ) -> DriverOutcome {
        let entity = ctx.entity();
        let message = format!(
            "Analyzer '{}' failed on '{}' ({}): {detail}",
            analyzer.id(),
            entity.id(),
            entity.version()
        );
        let record = FaultRecord {
            analyzer: analyzer.id().clone(),
            entity: entity.id().clone(),
            version: entity.version(),
            kind,
            diagnostic: Diagnostic::new(
                FAULT_DIAGNOSTIC_ID,
                Severity::Warning,
                FAULT_CATEGORY,
                Span::point(0, 0),
                message,
            ),
        };
        self.faults.report(record.clone());
        DriverOutcome::Faulted(record)
    }
}

/// Project diagnostics have no source of their own to check against.
fn invalid_span<'d>(ctx: &AnalysisContext, diagnostics: &'d [Diagnostic]) -> Option<&'d Diagnostic> {
    if ctx.entity().kind() != EntityKind::Document {
        return None;
    }
    let lines = ctx.line_count();
    diagnostics.iter().find(|d| !d.span().fits_within(lines))
}

pub(crate) fn panic_payload_to_string(payload: &Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
