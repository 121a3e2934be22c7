//! Fault records: a diagnostics channel about the analyzers themselves.
//!
//! Kept apart from ordinary diagnostics so a host can tell "the code has a
//! problem" from "the tool looking at the code is broken".

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use dashmap::DashMap;
use serde::Serialize;
use vigil_types::{AnalyzerId, Diagnostic, EntityId, VersionStamp};

/// Diagnostic id used for every synthetic fault diagnostic.
pub const FAULT_DIAGNOSTIC_ID: &str = "AD0001";
/// Category used for every synthetic fault diagnostic.
pub const FAULT_CATEGORY: &str = "analyzer-fault";

/// How an analyzer run ended abnormally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    Panicked,
    /// Returned an error, or reported cancellation nobody asked for.
    Failed,
    TimedOut,
    /// Produced a diagnostic the engine could not accept (span out of range).
    InvalidDiagnostic,
}

impl FaultKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Panicked => "panicked",
            Self::Failed => "failed",
            Self::TimedOut => "timed_out",
            Self::InvalidDiagnostic => "invalid_diagnostic",
        }
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The most recent failure of one analyzer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FaultRecord {
    pub analyzer: AnalyzerId,
    pub entity: EntityId,
    pub version: VersionStamp,
    pub kind: FaultKind,
    pub diagnostic: Diagnostic,
}

/// Keyed table from analyzer identity to its latest [`FaultRecord`].
///
/// Explicitly constructed and handed to the service; there is no global
/// instance.
#[derive(Debug, Default)]
pub struct ExceptionDiagnosticUpdateSource {
    records: DashMap<AnalyzerId, FaultRecord>,
}

impl ExceptionDiagnosticUpdateSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a fault, replacing any earlier record for the same analyzer.
    pub fn report(&self, record: FaultRecord) {
        tracing::warn!(
            analyzer = %record.analyzer,
            entity = %record.entity,
            version = %record.version,
            kind = %record.kind,
            "{}",
            record.diagnostic.message()
        );
        self.records.insert(record.analyzer.clone(), record);
    }

    /// Drop the record for `analyzer`. Returns whether one existed.
    pub fn clear(&self, analyzer: &AnalyzerId) -> bool {
        let removed = self.records.remove(analyzer).is_some();
        if removed {
            tracing::debug!(analyzer = %analyzer, "Analyzer recovered; fault cleared");
        }
        removed
    }

    /// Read-only copy, ordered by analyzer id.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<AnalyzerId, FaultRecord> {
        self.records
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    #[must_use]
    pub fn get(&self, analyzer: &AnalyzerId) -> Option<FaultRecord> {
        self.records.get(analyzer).map(|entry| entry.value().clone())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Forget analyzers that are no longer registered.
    pub fn retain_analyzers(&self, registered: &HashSet<AnalyzerId>) {
        self.records
            .retain(|analyzer, _| registered.contains(analyzer));
    }
}
