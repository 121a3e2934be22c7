use vigil_types::EntityId;

use crate::provider::ProviderError;

/// Errors from the analysis API itself.
///
/// Analyzer misbehaviour never shows up here; it becomes a fault record.
#[derive(Debug, thiserror::Error)]
pub enum AnalyzeError {
    #[error("entity '{0}' is not part of the workspace")]
    UnknownEntity(EntityId),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("analysis cancelled")]
    Cancelled,
    #[error("analysis service has shut down")]
    ShutDown,
    /// The entity changed under every attempt to analyze it.
    #[error("entity '{entity}' kept changing; gave up after {attempts} attempts")]
    Unsettled { entity: EntityId, attempts: usize },
}

impl AnalyzeError {
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
