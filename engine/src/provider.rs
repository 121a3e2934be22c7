//! Capabilities the engine consumes from its collaborators.
//!
//! Project structure (which entities exist, their languages and versions)
//! and compilation (turning an entity into something an analyzer can look
//! at) are owned elsewhere; the engine only calls through these traits.

use vigil_analyzers::AnalysisContext;
use vigil_types::{CodeEntity, EntityId, VersionStamp};

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("entity '{0}' not found")]
    NotFound(EntityId),
    /// The requested version is no longer (or not yet) the one the provider
    /// can serve. The engine treats this as supersession and re-resolves.
    #[error("entity '{entity}' is at {current}, requested {requested}")]
    VersionUnavailable {
        entity: EntityId,
        requested: VersionStamp,
        current: VersionStamp,
    },
    #[error("compilation failed for '{entity}': {message}")]
    Failed { entity: EntityId, message: String },
}

/// Supplies the set of entities with their languages and version stamps.
pub trait ProjectProvider: Send + Sync {
    /// Current view of one entity, or `None` if it does not exist.
    fn entity(&self, id: &EntityId) -> Option<CodeEntity>;

    /// Every entity currently known, projects and documents alike.
    fn entities(&self) -> Vec<CodeEntity>;
}

/// Produces the analysis context for an entity at an exact version.
pub trait CompilationProvider: Send + Sync {
    fn context(&self, entity: &CodeEntity) -> Result<AnalysisContext, ProviderError>;
}
