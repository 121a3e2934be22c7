//! The analysis scheduler.
//!
//! [`DiagnosticAnalyzerService`] resolves which analyzers apply to an
//! entity, reuses or attaches to cached work where it can, runs the rest
//! through the [`AnalyzerDriver`] and merges the contributions in analyzer
//! order. Each computation runs as its own task so that a caller who stops
//! waiting never takes the work away from anyone else.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures_util::future::join_all;
use futures_util::{StreamExt, stream};
use serde::Serialize;
use vigil_analyzers::{
    AnalysisContext, Analyzer, AnalyzerMap, AnalyzerReference, CancellationToken, ReferenceId,
};
use vigil_types::{AnalyzerId, CodeEntity, Diagnostic, EntityId, EntityKind, VersionStamp};

use crate::cache::{AnalyzerResult, CacheKey, CacheStats, Claim, DiagnosticCache, InFlightSlot, Waiter};
use crate::driver::{AnalyzerDriver, DriverOutcome};
use crate::error::AnalyzeError;
use crate::faults::{ExceptionDiagnosticUpdateSource, FaultRecord};
use crate::provider::{CompilationProvider, ProjectProvider, ProviderError};
use crate::settings::EngineSettings;
use crate::subscription::{DiagnosticsEvent, DiagnosticsListener, SubscriptionHandle, Subscribers};

/// Attempts before `analyze` gives up on an entity that keeps changing.
const MAX_ATTEMPTS: usize = 8;

/// The merged diagnostics for one entity at one version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergedDiagnostics {
    pub entity: EntityId,
    pub version: VersionStamp,
    /// Analyzer registration order, then span.
    pub diagnostics: Arc<[Diagnostic]>,
    /// Analyzers whose contribution is missing because they faulted.
    pub faulted: Vec<AnalyzerId>,
}

#[derive(Debug)]
struct Published {
    version: VersionStamp,
    diagnostics: Arc<[Diagnostic]>,
    faulted: Vec<AnalyzerId>,
}

enum Pending {
    Ready(AnalyzerResult),
    Waiting(Waiter),
}

impl Pending {
    async fn resolve(self) -> Option<AnalyzerResult> {
        match self {
            Self::Ready(result) => Some(result),
            Self::Waiting(waiter) => waiter.wait().await,
        }
    }
}

struct ServiceInner {
    map: RwLock<Arc<AnalyzerMap>>,
    cache: DiagnosticCache,
    faults: Arc<ExceptionDiagnosticUpdateSource>,
    driver: AnalyzerDriver,
    projects: Arc<dyn ProjectProvider>,
    compilation: Arc<dyn CompilationProvider>,
    subscribers: Subscribers,
    published: DashMap<EntityId, Published>,
    max_concurrent_entities: usize,
    /// Handed to every shared computation; fired by `shutdown`.
    shutdown: CancellationToken,
}

/// Top-level analysis API. Clones share state.
///
/// `analyze` spawns onto the ambient tokio runtime.
#[derive(Clone)]
pub struct DiagnosticAnalyzerService {
    inner: Arc<ServiceInner>,
}

impl DiagnosticAnalyzerService {
    pub fn new(
        references: Vec<Arc<dyn AnalyzerReference>>,
        faults: Arc<ExceptionDiagnosticUpdateSource>,
        projects: Arc<dyn ProjectProvider>,
        compilation: Arc<dyn CompilationProvider>,
        settings: EngineSettings,
    ) -> Self {
        let map = AnalyzerMap::new(references);
        tracing::info!(
            references = map.references().len(),
            fingerprint = %map.fingerprint(),
            "Analyzer service started"
        );
        let driver = AnalyzerDriver::new(Arc::clone(&faults), &settings);
        let cache = DiagnosticCache::new();
        cache.retain_fingerprint(map.fingerprint());
        Self {
            inner: Arc::new(ServiceInner {
                map: RwLock::new(Arc::new(map)),
                cache,
                faults,
                driver,
                projects,
                compilation,
                subscribers: Subscribers::default(),
                published: DashMap::new(),
                max_concurrent_entities: settings.max_concurrent_entities.max(1),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// The analyzer map currently in effect.
    #[must_use]
    pub fn map(&self) -> Arc<AnalyzerMap> {
        Arc::clone(&self.inner.map.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Analyze the current version of `id`.
    ///
    /// Cancelling `cancel` detaches this caller only; computations other
    /// callers are waiting on keep running.
    ///
    /// If the entity changes under every attempt, the last published set is
    /// returned with the version it was computed for. An entity that never
    /// published anything yields [`AnalyzeError::Unsettled`].
    pub async fn analyze(
        &self,
        id: &EntityId,
        cancel: &CancellationToken,
    ) -> Result<MergedDiagnostics, AnalyzeError> {
        for attempt in 1..=MAX_ATTEMPTS {
            self.ensure_running()?;
            if cancel.is_cancelled() {
                return Err(AnalyzeError::Cancelled);
            }
            let entity = self
                .inner
                .projects
                .entity(id)
                .ok_or_else(|| AnalyzeError::UnknownEntity(id.clone()))?;
            let map = self.map();

            if let Some(merged) = self.attempt(&entity, &map, cancel).await? {
                self.publish(&merged);
                return Ok(merged);
            }
            tracing::debug!(
                entity = %id,
                version = %entity.version(),
                attempt,
                "Analysis superseded; retrying"
            );
        }

        if let Some(last) = self.last_published(id) {
            tracing::warn!(
                entity = %id,
                version = %last.version,
                attempts = MAX_ATTEMPTS,
                "Entity kept changing; returning last published diagnostics"
            );
            return Ok(last);
        }
        Err(AnalyzeError::Unsettled {
            entity: id.clone(),
            attempts: MAX_ATTEMPTS,
        })
    }

    fn last_published(&self, id: &EntityId) -> Option<MergedDiagnostics> {
        self.inner.published.get(id).map(|entry| MergedDiagnostics {
            entity: id.clone(),
            version: entry.version,
            diagnostics: Arc::clone(&entry.diagnostics),
            faulted: entry.faulted.clone(),
        })
    }

    /// Analyze every entity the project provider knows, at most
    /// `max_concurrent_entities` at a time. Results are ordered by entity id.
    pub async fn analyze_all(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<MergedDiagnostics>, AnalyzeError> {
        let mut entities = self.inner.projects.entities();
        entities.sort_by(|a, b| a.id().cmp(b.id()));

        let outcomes: Vec<Result<MergedDiagnostics, AnalyzeError>> = stream::iter(entities)
            .map(|entity| async move { self.analyze(entity.id(), cancel).await })
            .buffer_unordered(self.inner.max_concurrent_entities)
            .collect()
            .await;

        let mut merged = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            match outcome {
                Ok(result) => merged.push(result),
                Err(AnalyzeError::UnknownEntity(id)) => {
                    tracing::debug!(entity = %id, "Entity removed while analyzing the workspace");
                }
                Err(err) => return Err(err),
            }
        }
        merged.sort_by(|a, b| a.entity.cmp(&b.entity));
        Ok(merged)
    }

    /// One pass over the applicable analyzers. `Ok(None)` means the entity
    /// or the analyzer set moved on and the caller should start over.
    async fn attempt(
        &self,
        entity: &CodeEntity,
        map: &AnalyzerMap,
        cancel: &CancellationToken,
    ) -> Result<Option<MergedDiagnostics>, AnalyzeError> {
        let analyzers = applicable_analyzers(map, entity);
        let mut pending = Vec::with_capacity(analyzers.len());
        let mut owned = Vec::new();

        for analyzer in &analyzers {
            let key = CacheKey {
                entity: entity.id().clone(),
                version: entity.version(),
                analyzer: analyzer.id().clone(),
                fingerprint: map.fingerprint(),
            };
            match self.inner.cache.claim(key) {
                Claim::Hit(result) => pending.push(Pending::Ready(result)),
                Claim::Wait(waiter) => pending.push(Pending::Waiting(waiter)),
                Claim::Owner(slot) => {
                    pending.push(Pending::Waiting(slot.waiter()));
                    owned.push((Arc::clone(analyzer), slot));
                }
            }
        }

        if !owned.is_empty() {
            let ctx = match self.inner.compilation.context(entity) {
                Ok(ctx) => Arc::new(ctx),
                Err(ProviderError::VersionUnavailable { .. }) => return Ok(None),
                Err(err) => return Err(err.into()),
            };
            for (analyzer, slot) in owned {
                self.spawn_computation(analyzer, Arc::clone(&ctx), slot);
            }
        }

        let results = tokio::select! {
            results = join_all(pending.into_iter().map(Pending::resolve)) => results,
            () = cancel.cancelled() => return Err(AnalyzeError::Cancelled),
            () = self.inner.shutdown.cancelled() => return Err(AnalyzeError::ShutDown),
        };
        let Some(results) = results.into_iter().collect::<Option<Vec<_>>>() else {
            return Ok(None);
        };
        if self.is_superseded(entity, map) {
            return Ok(None);
        }

        let mut diagnostics = Vec::new();
        let mut faulted = Vec::new();
        for (analyzer, result) in analyzers.iter().zip(&results) {
            if result.is_faulted() {
                faulted.push(analyzer.id().clone());
            }
            diagnostics.extend_from_slice(result.diagnostics());
        }
        Ok(Some(MergedDiagnostics {
            entity: entity.id().clone(),
            version: entity.version(),
            diagnostics: diagnostics.into(),
            faulted,
        }))
    }

    fn spawn_computation(
        &self,
        analyzer: Arc<dyn Analyzer>,
        ctx: Arc<AnalysisContext>,
        slot: InFlightSlot,
    ) {
        let driver = self.inner.driver.clone();
        let token = self.inner.shutdown.clone();
        tracing::debug!(
            analyzer = %analyzer.id(),
            entity = %ctx.entity().id(),
            version = %slot.version(),
            "Running analyzer"
        );
        tokio::spawn(async move {
            match driver.run(analyzer.as_ref(), &ctx, &token).await {
                DriverOutcome::Completed(diagnostics) => {
                    slot.complete(AnalyzerResult::completed(diagnostics));
                }
                DriverOutcome::Faulted(_) => slot.complete(AnalyzerResult::faulted()),
                DriverOutcome::Cancelled => drop(slot),
            }
        });
    }

    fn is_superseded(&self, entity: &CodeEntity, map: &AnalyzerMap) -> bool {
        if self.map().fingerprint() != map.fingerprint() {
            return true;
        }
        self.inner
            .projects
            .entity(entity.id())
            .is_some_and(|current| current.version() > entity.version())
    }

    /// Record `merged` as the entity's published set and notify subscribers
    /// if it differs from what was published before.
    fn publish(&self, merged: &MergedDiagnostics) {
        let published = Published {
            version: merged.version,
            diagnostics: Arc::clone(&merged.diagnostics),
            faulted: merged.faulted.clone(),
        };
        match self.inner.published.entry(merged.entity.clone()) {
            Entry::Occupied(mut entry) => {
                if entry.get().version > merged.version {
                    return;
                }
                if entry.get().diagnostics == merged.diagnostics {
                    let current = entry.get_mut();
                    current.version = merged.version;
                    current.faulted.clone_from(&merged.faulted);
                    return;
                }
                entry.insert(published);
            }
            Entry::Vacant(entry) => {
                entry.insert(published);
                if merged.diagnostics.is_empty() {
                    return;
                }
            }
        }

        self.inner.subscribers.notify(&DiagnosticsEvent::Updated {
            entity: merged.entity.clone(),
            version: merged.version,
            diagnostics: Arc::clone(&merged.diagnostics),
        });
    }

    /// Forget an entity: evict its cache entries and tell subscribers to
    /// clear it. Returns whether anything was known about it.
    pub fn remove_entity(&self, id: &EntityId) -> bool {
        let cached = self.inner.cache.remove_entity(id);
        let published = self.inner.published.remove(id).is_some();
        if published {
            self.inner
                .subscribers
                .notify(&DiagnosticsEvent::Cleared { entity: id.clone() });
        }
        cached || published
    }

    /// Diagnostics last published for `id`.
    #[must_use]
    pub fn published(&self, id: &EntityId) -> Option<Arc<[Diagnostic]>> {
        self.inner
            .published
            .get(id)
            .map(|entry| Arc::clone(&entry.diagnostics))
    }

    /// Replace the whole reference set.
    pub fn set_references(&self, references: Vec<Arc<dyn AnalyzerReference>>) {
        self.update_map(|_| AnalyzerMap::new(references));
    }

    pub fn add_reference(&self, reference: Arc<dyn AnalyzerReference>) {
        self.update_map(|map| map.with_reference(reference));
    }

    /// Returns `false` if no reference with that id was registered.
    pub fn remove_reference(&self, id: &ReferenceId) -> bool {
        if !self.map().contains_reference(id) {
            return false;
        }
        self.update_map(|map| map.without_reference(id));
        true
    }

    #[must_use]
    pub fn reference_ids(&self) -> Vec<ReferenceId> {
        self.map().reference_ids()
    }

    fn update_map(&self, change: impl FnOnce(&AnalyzerMap) -> AnalyzerMap) {
        let next = {
            let mut guard = self
                .inner
                .map
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            let next = Arc::new(change(&guard));
            *guard = Arc::clone(&next);
            next
        };
        self.inner.cache.retain_fingerprint(next.fingerprint());
        self.inner.faults.retain_analyzers(&next.analyzer_ids());
        tracing::info!(
            references = next.references().len(),
            fingerprint = %next.fingerprint(),
            "Analyzer references changed"
        );
    }

    pub fn subscribe(&self, listener: impl DiagnosticsListener + 'static) -> SubscriptionHandle {
        self.inner.subscribers.subscribe(Arc::new(listener))
    }

    pub fn unsubscribe(&self, handle: SubscriptionHandle) -> bool {
        self.inner.subscribers.unsubscribe(handle)
    }

    /// Current fault records, keyed by analyzer.
    #[must_use]
    pub fn query_faults(&self) -> BTreeMap<AnalyzerId, FaultRecord> {
        self.inner.faults.snapshot()
    }

    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.inner.cache.stats()
    }

    /// Versions of `id` that currently hold cache entries.
    #[must_use]
    pub fn cached_versions(&self, id: &EntityId) -> Vec<VersionStamp> {
        self.inner.cache.cached_versions(id)
    }

    /// Cancel shared computations and refuse further requests.
    pub fn shutdown(&self) {
        if !self.inner.shutdown.is_cancelled() {
            tracing::info!("Analyzer service shutting down");
            self.inner.shutdown.cancel();
        }
    }

    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }

    fn ensure_running(&self) -> Result<(), AnalyzeError> {
        if self.is_shut_down() {
            return Err(AnalyzeError::ShutDown);
        }
        Ok(())
    }
}

impl std::fmt::Debug for DiagnosticAnalyzerService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiagnosticAnalyzerService")
            .field("map", &self.map())
            .field("cache", &self.inner.cache.stats())
            .field("faults", &self.inner.faults.len())
            .field("subscribers", &self.inner.subscribers.len())
            .finish_non_exhaustive()
    }
}

/// Documents get their language's document-scope analyzers; projects get
/// every project-scope analyzer regardless of language.
fn applicable_analyzers(map: &AnalyzerMap, entity: &CodeEntity) -> Vec<Arc<dyn Analyzer>> {
    let candidates = match entity.kind() {
        EntityKind::Document => map.analyzers_for(entity.language()),
        EntityKind::Project => map.analyzers_for_all_languages(),
    };
    candidates
        .into_iter()
        .filter(|analyzer| analyzer.scope().applies_to(entity.kind()))
        .collect()
}
