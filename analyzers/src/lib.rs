//! Analyzer framework - the capability trait, analyzer references, and the
//! per-language analyzer map.
//!
//! Analyzers are opaque, potentially faulty black boxes. Nothing in this
//! crate runs them; the engine's driver does, inside a fault boundary.

pub mod builtin;
mod cancellation;
mod context;
mod map;
mod reference;

pub use cancellation::CancellationToken;
pub use context::{AnalysisContext, MemberDocument};
pub use map::{AnalyzerMap, Fingerprint};
pub use reference::{AnalyzerReference, ReferenceError, ReferenceId, StaticAnalyzerReference};

use std::future::Future;
use std::pin::Pin;

use vigil_types::{AnalyzerId, Diagnostic, EntityKind};

/// Analyzer execution future type alias.
pub type AnalyzerFut<'a> =
    Pin<Box<dyn Future<Output = Result<Vec<Diagnostic>, AnalyzerError>> + Send + 'a>>;

/// Error types an analyzer may return.
///
/// Returning an error is a fault just like panicking; the driver converts
/// both into a fault record.
#[derive(Debug, thiserror::Error)]
pub enum AnalyzerError {
    #[error("analysis failed: {message}")]
    Failed { message: String },
    #[error("analysis cancelled")]
    Cancelled,
}

impl AnalyzerError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }
}

/// Which entity kinds an analyzer runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnalyzerScope {
    #[default]
    Document,
    Project,
    Both,
}

impl AnalyzerScope {
    #[must_use]
    pub fn applies_to(self, kind: EntityKind) -> bool {
        matches!(
            (self, kind),
            (Self::Both, _)
                | (Self::Document, EntityKind::Document)
                | (Self::Project, EntityKind::Project)
        )
    }
}

/// A pluggable diagnostic analyzer.
///
/// `analyze` must be cancellation-aware: implementations are expected to poll
/// `cancel` and return [`AnalyzerError::Cancelled`] when it fires. The engine
/// cannot preempt an analyzer that ignores it.
pub trait Analyzer: Send + Sync {
    fn id(&self) -> &AnalyzerId;
    fn description(&self) -> &str {
        ""
    }
    fn scope(&self) -> AnalyzerScope {
        AnalyzerScope::Document
    }
    fn analyze<'a>(
        &'a self,
        ctx: &'a AnalysisContext,
        cancel: &'a CancellationToken,
    ) -> AnalyzerFut<'a>;
}

impl std::fmt::Debug for dyn Analyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Analyzer")
            .field("id", self.id())
            .field("scope", &self.scope())
            .finish_non_exhaustive()
    }
}
