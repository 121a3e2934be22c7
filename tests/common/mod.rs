//! Shared test utilities and fixtures
//!
//! Fixture analyzers and a small harness wiring an in-memory workspace to a
//! service.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::watch;
use vigil_analyzers::{
    AnalysisContext, Analyzer, AnalyzerError, AnalyzerFut, AnalyzerReference, AnalyzerScope,
    CancellationToken, StaticAnalyzerReference,
};
use vigil_engine::{
    DiagnosticAnalyzerService, EngineSettings, ExceptionDiagnosticUpdateSource, InMemoryWorkspace,
};
use vigil_types::{AnalyzerId, Diagnostic, EntityId, LanguageTag, Severity, Span};

/// Reports one warning per line containing `needle`, counting its runs.
pub struct Counting {
    id: AnalyzerId,
    needle: &'static str,
    runs: AtomicUsize,
}

impl Counting {
    pub fn new(id: &str, needle: &'static str) -> Arc<Self> {
        Arc::new(Self {
            id: AnalyzerId::new(id),
            needle,
            runs: AtomicUsize::new(0),
        })
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

impl Analyzer for Counting {
    fn id(&self) -> &AnalyzerId {
        &self.id
    }

    fn analyze<'a>(
        &'a self,
        ctx: &'a AnalysisContext,
        _cancel: &'a CancellationToken,
    ) -> AnalyzerFut<'a> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            let found: Vec<Diagnostic> = ctx
                .source()
                .lines()
                .enumerate()
                .filter_map(|(line, text)| {
                    let col = text.find(self.needle)?;
                    Some(Diagnostic::new(
                        format!("{}-HIT", self.id.as_str().to_uppercase()),
                        Severity::Warning,
                        "fixture",
                        Span::on_line(line as u32, col as u32, (col + self.needle.len()) as u32),
                        format!("found '{}'", self.needle),
                    ))
                })
                .collect();
            Ok(found)
        })
    }
}

/// Always reports the same single warning.
pub struct AlwaysWarns {
    id: AnalyzerId,
}

impl AlwaysWarns {
    pub const DIAGNOSTIC_ID: &'static str = "WARN001";

    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            id: AnalyzerId::new("always-warns"),
        })
    }
}

impl Analyzer for AlwaysWarns {
    fn id(&self) -> &AnalyzerId {
        &self.id
    }

    fn analyze<'a>(
        &'a self,
        _ctx: &'a AnalysisContext,
        _cancel: &'a CancellationToken,
    ) -> AnalyzerFut<'a> {
        Box::pin(async move {
            Ok(vec![Diagnostic::new(
                Self::DIAGNOSTIC_ID,
                Severity::Warning,
                "fixture",
                Span::on_line(0, 0, 4),
                "always warns",
            )])
        })
    }
}

pub enum FaultStyle {
    Error,
    Panic,
}

/// Faults on every run.
pub struct Faulting {
    id: AnalyzerId,
    style: FaultStyle,
    runs: AtomicUsize,
}

impl Faulting {
    pub fn new(id: &str, style: FaultStyle) -> Arc<Self> {
        Arc::new(Self {
            id: AnalyzerId::new(id),
            style,
            runs: AtomicUsize::new(0),
        })
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

impl Analyzer for Faulting {
    fn id(&self) -> &AnalyzerId {
        &self.id
    }

    fn analyze<'a>(
        &'a self,
        _ctx: &'a AnalysisContext,
        _cancel: &'a CancellationToken,
    ) -> AnalyzerFut<'a> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            if matches!(self.style, FaultStyle::Panic) {
                panic!("fixture panic");
            }
            Err::<Vec<Diagnostic>, _>(AnalyzerError::failed("fixture failure"))
        })
    }
}

/// Blocks until its gate opens, polling the cancellation token meanwhile.
/// Reports one warning on line 0 once released.
pub struct Gated {
    id: AnalyzerId,
    gate: watch::Receiver<bool>,
    runs: AtomicUsize,
    observed_cancel: AtomicUsize,
}

impl Gated {
    pub fn new(id: &str) -> (Arc<Self>, watch::Sender<bool>) {
        let (open, gate) = watch::channel(false);
        let analyzer = Arc::new(Self {
            id: AnalyzerId::new(id),
            gate,
            runs: AtomicUsize::new(0),
            observed_cancel: AtomicUsize::new(0),
        });
        (analyzer, open)
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    pub fn observed_cancel(&self) -> usize {
        self.observed_cancel.load(Ordering::SeqCst)
    }
}

impl Analyzer for Gated {
    fn id(&self) -> &AnalyzerId {
        &self.id
    }

    fn analyze<'a>(
        &'a self,
        _ctx: &'a AnalysisContext,
        cancel: &'a CancellationToken,
    ) -> AnalyzerFut<'a> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            loop {
                if cancel.is_cancelled() {
                    self.observed_cancel.fetch_add(1, Ordering::SeqCst);
                    return Err(AnalyzerError::Cancelled);
                }
                if *self.gate.borrow() {
                    return Ok(vec![Diagnostic::new(
                        "GATE001",
                        Severity::Warning,
                        "fixture",
                        Span::on_line(0, 0, 1),
                        "released",
                    )]);
                }
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
    }
}

/// While churning, edits the document it analyzes on every run, so no run
/// ever matches the current version.
pub struct Churning {
    id: AnalyzerId,
    workspace: Arc<InMemoryWorkspace>,
    churning: AtomicBool,
    runs: AtomicUsize,
}

impl Churning {
    pub fn new(id: &str, workspace: Arc<InMemoryWorkspace>) -> Arc<Self> {
        Arc::new(Self {
            id: AnalyzerId::new(id),
            workspace,
            churning: AtomicBool::new(false),
            runs: AtomicUsize::new(0),
        })
    }

    pub fn set_churning(&self, churning: bool) {
        self.churning.store(churning, Ordering::SeqCst);
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

impl Analyzer for Churning {
    fn id(&self) -> &AnalyzerId {
        &self.id
    }

    fn analyze<'a>(
        &'a self,
        ctx: &'a AnalysisContext,
        _cancel: &'a CancellationToken,
    ) -> AnalyzerFut<'a> {
        let run = self.runs.fetch_add(1, Ordering::SeqCst);
        if self.churning.load(Ordering::SeqCst) {
            self.workspace
                .edit_document(ctx.entity().id(), format!("edit {run}\n"))
                .unwrap();
        }
        Box::pin(async move {
            Ok(vec![Diagnostic::new(
                "CHURN001",
                Severity::Warning,
                "fixture",
                Span::on_line(0, 0, 1),
                "analyzed",
            )])
        })
    }
}

/// A project-scope analyzer that counts member documents.
pub struct MemberCount {
    id: AnalyzerId,
}

impl MemberCount {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            id: AnalyzerId::new("member-count"),
        })
    }
}

impl Analyzer for MemberCount {
    fn id(&self) -> &AnalyzerId {
        &self.id
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
            Ok(vec![Diagnostic::new(
                "MEMBERS",
                Severity::Info,
                "fixture",
                Span::point(0, 0),
                format!("{} members", ctx.members().len()),
            )])
        })
    }
}

/// A reference registering every analyzer for `language`.
pub fn reference(
    origin: &str,
    language: &LanguageTag,
    analyzers: &[Arc<dyn Analyzer>],
) -> Arc<dyn AnalyzerReference> {
    let mut builder = StaticAnalyzerReference::builder(origin);
    for analyzer in analyzers {
        builder = builder.register(language.clone(), Arc::clone(analyzer));
    }
    Arc::new(builder.build().unwrap())
}

/// A reference registering every analyzer for every language.
pub fn workspace_reference(
    origin: &str,
    analyzers: &[Arc<dyn Analyzer>],
) -> Arc<dyn AnalyzerReference> {
    let mut builder = StaticAnalyzerReference::builder(origin);
    for analyzer in analyzers {
        builder = builder.register_all_languages(Arc::clone(analyzer));
    }
    Arc::new(builder.build().unwrap())
}

pub struct Harness {
    pub workspace: Arc<InMemoryWorkspace>,
    pub faults: Arc<ExceptionDiagnosticUpdateSource>,
    pub service: DiagnosticAnalyzerService,
}

impl Harness {
    pub fn new(references: Vec<Arc<dyn AnalyzerReference>>) -> Self {
        Self::with_settings(references, EngineSettings::default())
    }

    pub fn with_settings(
        references: Vec<Arc<dyn AnalyzerReference>>,
        settings: EngineSettings,
    ) -> Self {
        let workspace = Arc::new(InMemoryWorkspace::new());
        let faults = Arc::new(ExceptionDiagnosticUpdateSource::new());
        let service = DiagnosticAnalyzerService::new(
            references,
            Arc::clone(&faults),
            Arc::<InMemoryWorkspace>::clone(&workspace),
            Arc::<InMemoryWorkspace>::clone(&workspace),
            settings,
        );
        Self {
            workspace,
            faults,
            service,
        }
    }

    /// Open a standalone document and return its id.
    pub fn open(&self, id: &str, language: LanguageTag, text: &str) -> EntityId {
        let id = EntityId::new(id);
        self.workspace
            .open_document(None, id.clone(), language, text)
            .unwrap();
        id
    }
}

pub fn rust() -> LanguageTag {
    LanguageTag::Rust
}

/// Analyzer ids as strings, for order-insensitive comparisons.
pub fn sorted_ids(analyzers: &[Arc<dyn Analyzer>]) -> Vec<String> {
    let mut ids: Vec<String> = analyzers.iter().map(|a| a.id().to_string()).collect();
    ids.sort();
    ids
}
