//! In-memory workspace: a project/document graph with versioned text.
//!
//! Implements both provider traits so a host (or a test) can drive the
//! engine without a build system or a real compiler behind it. Every edit
//! bumps the document's version and its owning project's version; versions
//! keep counting across remove/re-open so an id never reuses a stamp.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use vigil_analyzers::{AnalysisContext, MemberDocument};
use vigil_types::{CodeEntity, EntityId, EntityKind, LanguageTag, VersionStamp};

use crate::provider::{CompilationProvider, ProjectProvider, ProviderError};

#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    #[error("entity '{0}' already exists")]
    AlreadyExists(EntityId),
    #[error("project '{0}' not found")]
    UnknownProject(EntityId),
    #[error("document '{0}' not found")]
    UnknownDocument(EntityId),
}

#[derive(Debug)]
struct DocumentState {
    project: Option<EntityId>,
    language: LanguageTag,
    version: VersionStamp,
    text: Arc<str>,
}

#[derive(Debug)]
struct ProjectState {
    language: LanguageTag,
    version: VersionStamp,
    members: BTreeSet<EntityId>,
}

#[derive(Debug, Default)]
struct WorkspaceState {
    documents: BTreeMap<EntityId, DocumentState>,
    projects: BTreeMap<EntityId, ProjectState>,
    /// Last version handed out for ids that have since been removed.
    retired: HashMap<EntityId, VersionStamp>,
}

impl WorkspaceState {
    fn contains(&self, id: &EntityId) -> bool {
        self.documents.contains_key(id) || self.projects.contains_key(id)
    }

    fn first_version(&mut self, id: &EntityId) -> VersionStamp {
        self.retired
            .remove(id)
            .map_or(VersionStamp::INITIAL, VersionStamp::next)
    }

    fn bump_project(&mut self, project: Option<&EntityId>) {
        if let Some(state) = project.and_then(|id| self.projects.get_mut(id)) {
            state.version = state.version.next();
        }
    }

    fn document_entity(id: &EntityId, doc: &DocumentState) -> CodeEntity {
        CodeEntity::document(id.clone(), doc.language.clone(), doc.version)
    }

    fn project_entity(id: &EntityId, project: &ProjectState) -> CodeEntity {
        CodeEntity::project(id.clone(), project.language.clone(), project.version)
    }
}

/// Thread-safe in-memory workspace.
#[derive(Debug, Default)]
pub struct InMemoryWorkspace {
    state: RwLock<WorkspaceState>,
}

impl InMemoryWorkspace {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, WorkspaceState> {
        self.state.read().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, WorkspaceState> {
        self.state
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub fn add_project(
        &self,
        id: EntityId,
        language: LanguageTag,
    ) -> Result<CodeEntity, WorkspaceError> {
        let mut state = self.write();
        if state.contains(&id) {
            return Err(WorkspaceError::AlreadyExists(id));
        }
        let version = state.first_version(&id);
        let project = ProjectState {
            language,
            version,
            members: BTreeSet::new(),
        };
        let entity = WorkspaceState::project_entity(&id, &project);
        state.projects.insert(id, project);
        Ok(entity)
    }

    /// Add a document, optionally as a member of an existing project.
    pub fn open_document(
        &self,
        project: Option<&EntityId>,
        id: EntityId,
        language: LanguageTag,
        text: impl Into<Arc<str>>,
    ) -> Result<CodeEntity, WorkspaceError> {
        let mut state = self.write();
        if state.contains(&id) {
            return Err(WorkspaceError::AlreadyExists(id));
        }
        if let Some(project_id) = project {
            let Some(project_state) = state.projects.get_mut(project_id) else {
                return Err(WorkspaceError::UnknownProject(project_id.clone()));
            };
            project_state.members.insert(id.clone());
            project_state.version = project_state.version.next();
        }
        let version = state.first_version(&id);
        let doc = DocumentState {
            project: project.cloned(),
            language,
            version,
            text: text.into(),
        };
        let entity = WorkspaceState::document_entity(&id, &doc);
        state.documents.insert(id, doc);
        Ok(entity)
    }

    /// Replace a document's text. Returns the new version.
    pub fn edit_document(
        &self,
        id: &EntityId,
        text: impl Into<Arc<str>>,
    ) -> Result<VersionStamp, WorkspaceError> {
        let mut state = self.write();
        let Some(doc) = state.documents.get_mut(id) else {
            return Err(WorkspaceError::UnknownDocument(id.clone()));
        };
        doc.text = text.into();
        doc.version = doc.version.next();
        let version = doc.version;
        let project = doc.project.clone();
        state.bump_project(project.as_ref());
        Ok(version)
    }

    pub fn remove_document(&self, id: &EntityId) -> Result<(), WorkspaceError> {
        let mut state = self.write();
        let Some(doc) = state.documents.remove(id) else {
            return Err(WorkspaceError::UnknownDocument(id.clone()));
        };
        state.retired.insert(id.clone(), doc.version);
        if let Some(project_id) = &doc.project
            && let Some(project) = state.projects.get_mut(project_id)
        {
            project.members.remove(id);
            project.version = project.version.next();
        }
        Ok(())
    }

    /// Current text of a document.
    #[must_use]
    pub fn text(&self, id: &EntityId) -> Option<Arc<str>> {
        self.read().documents.get(id).map(|doc| Arc::clone(&doc.text))
    }
}

impl ProjectProvider for InMemoryWorkspace {
    fn entity(&self, id: &EntityId) -> Option<CodeEntity> {
        let state = self.read();
        if let Some(doc) = state.documents.get(id) {
            return Some(WorkspaceState::document_entity(id, doc));
        }
        state
            .projects
            .get(id)
            .map(|project| WorkspaceState::project_entity(id, project))
    }

    fn entities(&self) -> Vec<CodeEntity> {
        let state = self.read();
        let projects = state
            .projects
            .iter()
            .map(|(id, project)| WorkspaceState::project_entity(id, project));
        let documents = state
            .documents
            .iter()
            .map(|(id, doc)| WorkspaceState::document_entity(id, doc));
        projects.chain(documents).collect()
    }
}

impl CompilationProvider for InMemoryWorkspace {
    fn context(&self, entity: &CodeEntity) -> Result<AnalysisContext, ProviderError> {
        let state = self.read();
        match entity.kind() {
            EntityKind::Document => {
                let doc = state
                    .documents
                    .get(entity.id())
                    .ok_or_else(|| ProviderError::NotFound(entity.id().clone()))?;
                if doc.version != entity.version() {
                    return Err(ProviderError::VersionUnavailable {
                        entity: entity.id().clone(),
                        requested: entity.version(),
                        current: doc.version,
                    });
                }
                Ok(AnalysisContext::document(
                    entity.clone(),
                    Arc::clone(&doc.text),
                ))
            }
            EntityKind::Project => {
                let project = state
                    .projects
                    .get(entity.id())
                    .ok_or_else(|| ProviderError::NotFound(entity.id().clone()))?;
                if project.version != entity.version() {
                    return Err(ProviderError::VersionUnavailable {
                        entity: entity.id().clone(),
                        requested: entity.version(),
                        current: project.version,
                    });
                }
                let members = project
                    .members
                    .iter()
                    .filter_map(|member_id| {
                        state.documents.get(member_id).map(|doc| {
                            MemberDocument::new(
                                WorkspaceState::document_entity(member_id, doc),
                                Arc::clone(&doc.text),
                            )
                        })
                    })
                    .collect();
                Ok(AnalysisContext::project(entity.clone(), members))
            }
        }
    }
}
