//! Subscriber-side diagnostics store.
//!
//! Applying the same event twice leaves the store unchanged, and events for
//! versions older than the one already held are ignored, so a listener can
//! feed every event it receives straight into [`DiagnosticsMirror::apply`].
//! An entity whose diagnostics went empty keeps its version, so a late
//! update for an older version cannot bring them back.

use std::collections::HashMap;
use std::sync::Arc;

use vigil_types::{Diagnostic, EntityId, Severity, VersionStamp};

use crate::subscription::DiagnosticsEvent;

#[derive(Debug, Clone)]
struct Entry {
    version: VersionStamp,
    diagnostics: Arc<[Diagnostic]>,
}

#[derive(Debug, Default)]
pub struct DiagnosticsMirror {
    data: HashMap<EntityId, Entry>,
}

impl DiagnosticsMirror {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply an event. Returns `true` only if the observable state changed.
    pub fn apply(&mut self, event: &DiagnosticsEvent) -> bool {
        match event {
            DiagnosticsEvent::Cleared { entity } => self
                .data
                .remove(entity)
                .is_some_and(|entry| !entry.diagnostics.is_empty()),
            DiagnosticsEvent::Updated {
                entity,
                version,
                diagnostics,
            } => {
                if let Some(current) = self.data.get(entity)
                    && (current.version > *version
                        || (current.version == *version && current.diagnostics == *diagnostics))
                {
                    return false;
                }
                let previous = self.data.insert(
                    entity.clone(),
                    Entry {
                        version: *version,
                        diagnostics: Arc::clone(diagnostics),
                    },
                );
                match previous {
                    Some(prev) => prev.diagnostics != *diagnostics,
                    None => !diagnostics.is_empty(),
                }
            }
        }
    }

    #[must_use]
    pub fn get(&self, entity: &EntityId) -> Option<&[Diagnostic]> {
        self.data
            .get(entity)
            .filter(|entry| !entry.diagnostics.is_empty())
            .map(|entry| &*entry.diagnostics)
    }

    /// Per-entity diagnostics, entities with errors first, then by id.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(EntityId, Arc<[Diagnostic]>)> {
        let mut entities: Vec<(EntityId, Arc<[Diagnostic]>)> = self
            .data
            .iter()
            .filter(|(_, entry)| !entry.diagnostics.is_empty())
            .map(|(id, entry)| (id.clone(), Arc::clone(&entry.diagnostics)))
            .collect();

        entities.sort_by(|a, b| {
            let a_has_errors = a.1.iter().any(|d| d.severity().is_error());
            let b_has_errors = b.1.iter().any(|d| d.severity().is_error());
            b_has_errors.cmp(&a_has_errors).then_with(|| a.0.cmp(&b.0))
        });
        entities
    }

    /// Whether no entity currently has diagnostics.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.values().all(|entry| entry.diagnostics.is_empty())
    }

    fn count_by_severity(&self, severity: Severity) -> usize {
        self.data
            .values()
            .flat_map(|entry| entry.diagnostics.iter())
            .filter(|d| d.severity() == severity)
            .count()
    }

    #[must_use]
    pub fn error_count(&self) -> usize {
        self.count_by_severity(Severity::Error)
    }

    #[must_use]
    pub fn warning_count(&self) -> usize {
        self.count_by_severity(Severity::Warning)
    }

    /// Compact status like "E:3 W:5"; empty when there is nothing to show.
    #[must_use]
    pub fn status_string(&self) -> String {
        if self.is_empty() {
            return String::new();
        }
        format!("E:{} W:{}", self.error_count(), self.warning_count())
    }
}
