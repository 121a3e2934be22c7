//! Validated engine settings.

use std::collections::HashMap;
use std::time::Duration;

use vigil_types::{Diagnostic, Severity};

/// Default bound on how many entities `analyze_all` runs at once.
pub const DEFAULT_MAX_CONCURRENT_ENTITIES: usize = 8;

/// Per diagnostic-id severity overrides. `None` suppresses the diagnostic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeverityOverrides(HashMap<String, Option<Severity>>);

impl SeverityOverrides {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, diagnostic_id: impl Into<String>, severity: Severity) {
        self.0.insert(diagnostic_id.into(), Some(severity));
    }

    pub fn suppress(&mut self, diagnostic_id: impl Into<String>) {
        self.0.insert(diagnostic_id.into(), None);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The diagnostic as it should be reported, or `None` if suppressed.
    #[must_use]
    pub fn apply(&self, diagnostic: Diagnostic) -> Option<Diagnostic> {
        match self.0.get(diagnostic.id()) {
            None => Some(diagnostic),
            Some(None) => None,
            Some(Some(severity)) if *severity == diagnostic.severity() => Some(diagnostic),
            Some(Some(severity)) => Some(diagnostic.with_severity(*severity)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub max_concurrent_entities: usize,
    /// Upper bound on a single analyzer run. `None` waits indefinitely.
    pub analyzer_timeout: Option<Duration>,
    pub severity_overrides: SeverityOverrides,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_concurrent_entities: DEFAULT_MAX_CONCURRENT_ENTITIES,
            analyzer_timeout: None,
            severity_overrides: SeverityOverrides::default(),
        }
    }
}
