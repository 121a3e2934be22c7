//! Push-based change notifications.

use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use vigil_types::{Diagnostic, EntityId, VersionStamp};

use crate::driver::panic_payload_to_string;

/// A change to the diagnostics last published for an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticsEvent {
    Updated {
        entity: EntityId,
        version: VersionStamp,
        diagnostics: Arc<[Diagnostic]>,
    },
    /// The entity is gone; drop whatever was shown for it.
    Cleared { entity: EntityId },
}

impl DiagnosticsEvent {
    #[must_use]
    pub fn entity(&self) -> &EntityId {
        match self {
            Self::Updated { entity, .. } | Self::Cleared { entity } => entity,
        }
    }

    /// The new diagnostic set; empty for [`DiagnosticsEvent::Cleared`].
    #[must_use]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            Self::Updated { diagnostics, .. } => &**diagnostics,
            Self::Cleared { .. } => &[],
        }
    }
}

/// Receives [`DiagnosticsEvent`]s. Implemented for plain closures.
///
/// Called synchronously on the publishing task; keep it cheap.
pub trait DiagnosticsListener: Send + Sync {
    fn on_event(&self, event: &DiagnosticsEvent);
}

impl<F> DiagnosticsListener for F
where
    F: Fn(&DiagnosticsEvent) + Send + Sync,
{
    fn on_event(&self, event: &DiagnosticsEvent) {
        self(event);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionHandle(u64);

#[derive(Default)]
pub(crate) struct Subscribers {
    next: AtomicU64,
    listeners: DashMap<u64, Arc<dyn DiagnosticsListener>>,
}

impl Subscribers {
    pub(crate) fn subscribe(&self, listener: Arc<dyn DiagnosticsListener>) -> SubscriptionHandle {
        let id = self.next.fetch_add(1, Ordering::Relaxed);
        self.listeners.insert(id, listener);
        SubscriptionHandle(id)
    }

    pub(crate) fn unsubscribe(&self, handle: SubscriptionHandle) -> bool {
        self.listeners.remove(&handle.0).is_some()
    }

    pub(crate) fn len(&self) -> usize {
        self.listeners.len()
    }

    /// Deliver to every listener in subscription order. A panicking listener
    /// is logged and skipped.
    pub(crate) fn notify(&self, event: &DiagnosticsEvent) {
        let listeners: BTreeMap<u64, Arc<dyn DiagnosticsListener>> = self
            .listeners
            .iter()
            .map(|entry| (*entry.key(), Arc::clone(entry.value())))
            .collect();

        for (id, listener) in listeners {
            let delivered =
                std::panic::catch_unwind(AssertUnwindSafe(|| listener.on_event(event)));
            if let Err(payload) = delivered {
                tracing::warn!(
                    subscription = id,
                    entity = %event.entity(),
                    "Diagnostics listener panicked: {}",
                    panic_payload_to_string(&payload)
                );
            }
        }
    }
}

impl std::fmt::Debug for Subscribers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscribers")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
