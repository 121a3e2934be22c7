//! Analysis engine for Vigil - scheduling, caching and fault isolation.
//!
//! [`DiagnosticAnalyzerService`] is the entry point. It owns the diagnostic
//! cache and is handed an [`ExceptionDiagnosticUpdateSource`] at
//! construction; everything it needs to know about the code itself comes
//! through [`ProjectProvider`] and [`CompilationProvider`].

mod cache;
mod driver;
mod error;
mod faults;
mod mirror;
mod provider;
mod service;
mod settings;
mod subscription;
mod workspace;


pub use cache::{AnalyzerResult, CacheStats};
pub use driver::{AnalyzerDriver, DriverOutcome};
pub use error::AnalyzeError;
pub use faults::{
    ExceptionDiagnosticUpdateSource, FAULT_CATEGORY, FAULT_DIAGNOSTIC_ID, FaultKind, FaultRecord,
};
pub use mirror::DiagnosticsMirror;
pub use provider::{CompilationProvider, ProjectProvider, ProviderError};
pub use service::{DiagnosticAnalyzerService, MergedDiagnostics};
pub use settings::{DEFAULT_MAX_CONCURRENT_ENTITIES, EngineSettings, SeverityOverrides};
pub use subscription::{DiagnosticsEvent, DiagnosticsListener, SubscriptionHandle};
pub use workspace::{InMemoryWorkspace, WorkspaceError};
