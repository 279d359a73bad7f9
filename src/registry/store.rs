use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwap;

use super::RegistrySnapshot;

/// Holds the currently active [`RegistrySnapshot`].
///
/// Reads are lock-free loads of an `Arc`; a reader keeps the exact snapshot it
/// loaded for as long as it holds the `Arc`, regardless of later replacements.
/// Clones share the same underlying slot.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    current: Arc<ArcSwap<RegistrySnapshot>>,
    generation: Arc<AtomicU64>,
}

impl SnapshotStore {
    /// Create a store holding an empty snapshot.
    pub fn new() -> Self {
        Self::with_snapshot(RegistrySnapshot::default())
    }

    /// Create a store with an initial snapshot installed as generation 1.
    pub fn with_snapshot(snapshot: RegistrySnapshot) -> Self {
        Self {
            current: Arc::new(ArcSwap::from_pointee(snapshot.with_generation(1))),
            generation: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Install `snapshot` as current and return its generation.
    pub fn replace(&self, snapshot: RegistrySnapshot) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.current
            .store(Arc::new(snapshot.with_generation(generation)));
        generation
    }

    /// The snapshot active at call time.
    #[inline]
    pub fn current(&self) -> Arc<RegistrySnapshot> {
        self.current.load_full()
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}
