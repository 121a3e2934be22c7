//! Per-key diagnostic cache with in-flight deduplication.
//!
//! Keys are `(entity, version, analyzer, fingerprint)`. A slot is either a
//! completed result or an in-flight computation that later callers attach
//! to through a `watch` channel, so each key runs at most once at a time.
//! Slots are grouped per entity; there is no table-wide lock.
//!
//! Observing a newer version of an entity evicts every slot for older
//! versions. A computation that finishes for a superseded version, or under
//! an analyzer-set fingerprint that is no longer current, is evicted on
//! completion: callers already waiting on it still receive the result.

use std::sync::{Arc, PoisonError, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::watch;
use vigil_analyzers::Fingerprint;
use vigil_types::{AnalyzerId, Diagnostic, EntityId, VersionStamp};

/// One analyzer's contribution for one entity at one version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyzerResult {
    diagnostics: Arc<[Diagnostic]>,
    faulted: bool,
}

impl AnalyzerResult {
    /// A successful run. Diagnostics are ordered by span; ties keep the
    /// analyzer's own order.
    #[must_use]
    pub fn completed(mut diagnostics: Vec<Diagnostic>) -> Self {
        diagnostics.sort_by_key(Diagnostic::span);
        Self {
            diagnostics: diagnostics.into(),
            faulted: false,
        }
    }

    /// A faulted run contributes nothing.
    #[must_use]
    pub fn faulted() -> Self {
        Self {
            diagnostics: Arc::from(Vec::new()),
            faulted: true,
        }
    }

    #[must_use]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    #[must_use]
    pub fn is_faulted(&self) -> bool {
        self.faulted
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub entity: EntityId,
    pub version: VersionStamp,
    pub analyzer: AnalyzerId,
    pub fingerprint: Fingerprint,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SlotKey {
    version: VersionStamp,
    analyzer: AnalyzerId,
    fingerprint: Fingerprint,
}

type ResultRx = watch::Receiver<Option<AnalyzerResult>>;

#[derive(Debug)]
enum Slot {
    InFlight { token: u64, rx: ResultRx },
    Completed(AnalyzerResult),
}

#[derive(Debug, Default)]
struct EntityCache {
    /// Highest version any caller has claimed for this entity.
    latest: AtomicU64,
    slots: DashMap<SlotKey, Slot>,
}

impl EntityCache {
    /// Record that `version` is current and evict slots for older versions.
    fn observe(&self, entity: &EntityId, version: VersionStamp) {
        let previous = self.latest.fetch_max(version.value(), Ordering::SeqCst);
        if previous >= version.value() {
            return;
        }
        let before = self.slots.len();
        self.slots.retain(|key, _| key.version >= version);
        let evicted = before.saturating_sub(self.slots.len());
        if evicted > 0 {
            tracing::debug!(
                entity = %entity,
                version = %version,
                evicted,
                "Evicted superseded cache entries"
            );
        }
    }

    fn is_stale(&self, version: VersionStamp) -> bool {
        version.value() < self.latest.load(Ordering::SeqCst)
    }

    fn remove_in_flight(&self, key: &SlotKey, token: u64) {
        self.slots
            .remove_if(key, |_, slot| matches!(slot, Slot::InFlight { token: t, .. } if *t == token));
    }
}

/// Outcome of claiming a key.
#[derive(Debug)]
pub enum Claim {
    Hit(AnalyzerResult),
    /// Someone else is computing this key.
    Wait(Waiter),
    /// The caller must compute this key and complete the slot.
    Owner(InFlightSlot),
}

/// Handle on a pending computation.
#[derive(Debug, Clone)]
pub struct Waiter {
    rx: ResultRx,
}

impl Waiter {
    /// The computation's result, or `None` if it was abandoned without one.
    pub async fn wait(mut self) -> Option<AnalyzerResult> {
        match self.rx.wait_for(Option::is_some).await {
            Ok(result) => result.clone(),
            Err(_) => None,
        }
    }
}

/// Ownership of an in-flight slot.
///
/// Dropping it without calling [`InFlightSlot::complete`] abandons the slot:
/// it is removed and current waiters see `None`.
#[derive(Debug)]
pub struct InFlightSlot {
    cache: Arc<EntityCache>,
    fingerprint: Arc<CurrentFingerprint>,
    entity: EntityId,
    key: SlotKey,
    token: u64,
    tx: watch::Sender<Option<AnalyzerResult>>,
    done: bool,
}

impl InFlightSlot {
    #[must_use]
    pub fn waiter(&self) -> Waiter {
        Waiter {
            rx: self.tx.subscribe(),
        }
    }

    #[must_use]
    pub fn version(&self) -> VersionStamp {
        self.key.version
    }

    /// Store the result unless superseded, then hand it to waiters.
    pub fn complete(mut self, result: AnalyzerResult) {
        self.done = true;

        if self.is_superseded() {
            self.cache.remove_in_flight(&self.key, self.token);
            tracing::debug!(
                entity = %self.entity,
                version = %self.key.version,
                analyzer = %self.key.analyzer,
                "Discarded superseded result"
            );
        } else {
            if let Some(mut slot) = self.cache.slots.get_mut(&self.key)
                && matches!(&*slot, Slot::InFlight { token, .. } if *token == self.token)
            {
                *slot = Slot::Completed(result.clone());
            }
            // An edit or a reference change may have landed between the
            // check and the store.
            if self.is_superseded() {
                self.cache.slots.remove(&self.key);
            }
        }

        self.tx.send_replace(Some(result));
    }

    fn is_superseded(&self) -> bool {
        self.cache.is_stale(self.key.version) || !self.fingerprint.is_current(self.key.fingerprint)
    }
}

impl Drop for InFlightSlot {
    fn drop(&mut self) {
        if !self.done {
            self.cache.remove_in_flight(&self.key, self.token);
            tracing::debug!(
                entity = %self.entity,
                version = %self.key.version,
                analyzer = %self.key.analyzer,
                "In-flight computation abandoned"
            );
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entities: usize,
    pub completed: usize,
    pub in_flight: usize,
}

/// The analyzer-set fingerprint results may be stored under. `None` until
/// the first `retain_fingerprint`, accepting any.
#[derive(Debug, Default)]
struct CurrentFingerprint(RwLock<Option<Fingerprint>>);

impl CurrentFingerprint {
    fn set(&self, fingerprint: Fingerprint) {
        *self.0.write().unwrap_or_else(PoisonError::into_inner) = Some(fingerprint);
    }

    fn is_current(&self, fingerprint: Fingerprint) -> bool {
        let current = *self.0.read().unwrap_or_else(PoisonError::into_inner);
        current.is_none_or(|current| current == fingerprint)
    }
}

#[derive(Debug, Default)]
struct CacheInner {
    entities: DashMap<EntityId, Arc<EntityCache>>,
    fingerprint: Arc<CurrentFingerprint>,
    next_token: AtomicU64,
}

/// Shared handle to the cache. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticCache {
    inner: Arc<CacheInner>,
}

impl DiagnosticCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn entity(&self, id: &EntityId) -> Arc<EntityCache> {
        if let Some(existing) = self.inner.entities.get(id) {
            return Arc::clone(existing.value());
        }
        Arc::clone(
            self.inner
                .entities
                .entry(id.clone())
                .or_default()
                .value(),
        )
    }

    /// Reuse, attach to, or take ownership of the slot for `key`.
    pub fn claim(&self, key: CacheKey) -> Claim {
        let cache = self.entity(&key.entity);
        cache.observe(&key.entity, key.version);

        let slot_key = SlotKey {
            version: key.version,
            analyzer: key.analyzer,
            fingerprint: key.fingerprint,
        };
        match cache.slots.entry(slot_key.clone()) {
            Entry::Occupied(entry) => match entry.get() {
                Slot::Completed(result) => {
                    tracing::debug!(
                        entity = %key.entity,
                        version = %slot_key.version,
                        analyzer = %slot_key.analyzer,
                        "Cache hit"
                    );
                    Claim::Hit(result.clone())
                }
                Slot::InFlight { rx, .. } => Claim::Wait(Waiter { rx: rx.clone() }),
            },
            Entry::Vacant(entry) => {
                let token = self.inner.next_token.fetch_add(1, Ordering::Relaxed);
                let (tx, rx) = watch::channel(None);
                entry.insert(Slot::InFlight { token, rx });
                Claim::Owner(InFlightSlot {
                    cache: Arc::clone(&cache),
                    fingerprint: Arc::clone(&self.inner.fingerprint),
                    entity: key.entity,
                    key: slot_key,
                    token,
                    tx,
                    done: false,
                })
            }
        }
    }

    /// Make `fingerprint` current and drop every slot computed under a
    /// different analyzer set. Computations still in flight under an old
    /// fingerprint are discarded when they complete.
    pub fn retain_fingerprint(&self, fingerprint: Fingerprint) {
        self.inner.fingerprint.set(fingerprint);
        for entry in &self.inner.entities {
            entry
                .value()
                .slots
                .retain(|key, _| key.fingerprint == fingerprint);
        }
    }

    /// Forget an entity entirely. Returns whether anything was cached.
    pub fn remove_entity(&self, id: &EntityId) -> bool {
        self.inner.entities.remove(id).is_some()
    }

    /// Versions that currently hold a slot for `entity`, ascending.
    #[must_use]
    pub fn cached_versions(&self, entity: &EntityId) -> Vec<VersionStamp> {
        let Some(cache) = self.inner.entities.get(entity).map(|e| Arc::clone(e.value())) else {
            return Vec::new();
        };
        let mut versions: Vec<VersionStamp> =
            cache.slots.iter().map(|slot| slot.key().version).collect();
        versions.sort_unstable();
        versions.dedup();
        versions
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let mut stats = CacheStats {
            entities: self.inner.entities.len(),
            ..CacheStats::default()
        };
        for entry in &self.inner.entities {
            for slot in &entry.value().slots {
                match slot.value() {
                    Slot::InFlight { .. } => stats.in_flight += 1,
                    Slot::Completed(_) => stats.completed += 1,
                }
            }
        }
        stats
    }
}
