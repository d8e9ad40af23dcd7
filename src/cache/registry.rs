use smol_str::SmolStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use crate::layout::FastMap;

// ─── Scope ──────────────────────────────────────────────────────────────────

static NEXT_SCOPE_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug)]
struct ScopeCore {
    id: u64,
}

/// An opaque isolation identity. Implementations installed under one scope
/// are invisible to every other scope. Handles are cheap clones of one
/// shared identity; when the last handle drops, the scope is unreachable and
/// its registry entries are pruned on the next registry access.
#[derive(Debug, Clone)]
pub struct Scope {
    core: Arc<ScopeCore>,
}

impl Scope {
    pub fn new() -> Self {
        Self {
            core: Arc::new(ScopeCore {
                id: NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed),
            }),
        }
    }

    #[inline]
    pub fn id(&self) -> u64 {
        self.core.id
    }
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Registry ───────────────────────────────────────────────────────────────

#[derive(Debug)]
struct ScopeSlot<A> {
    live: Weak<ScopeCore>,
    entries: FastMap<SmolStr, Arc<A>>,
}

/// The installed-implementation registry: scope id first, produced name
/// second. One coarse lock guards every scope; all operations under it are
/// O(1) map work, so hold times stay short. An entry is created on the first
/// successful install for its (scope, name) pair, never mutated afterwards,
/// and removed only when its scope dies.
#[derive(Debug)]
pub struct Registry<A> {
    scopes: Mutex<FastMap<u64, ScopeSlot<A>>>,
}

impl<A> Default for Registry<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> Registry<A> {
    pub fn new() -> Self {
        Self {
            scopes: Mutex::new(FastMap::default()),
        }
    }

    /// Lock and drop every slot whose scope has no live handles left.
    fn lock(&self) -> MutexGuard<'_, FastMap<u64, ScopeSlot<A>>> {
        let mut guard = self.scopes.lock().expect("registry lock poisoned");
        guard.retain(|_, slot| slot.live.strong_count() > 0);
        guard
    }

    /// Fast-path lookup.
    pub fn get(&self, scope: &Scope, name: &str) -> Option<Arc<A>> {
        self.lock()
            .get(&scope.id())
            .and_then(|slot| slot.entries.get(name))
            .map(Arc::clone)
    }

    pub fn contains(&self, scope: &Scope, name: &str) -> bool {
        self.lock()
            .get(&scope.id())
            .is_some_and(|slot| slot.entries.contains_key(name))
    }

    /// Make sure the scope has a (possibly empty) slot.
    pub fn ensure_scope(&self, scope: &Scope) {
        self.lock().entry(scope.id()).or_insert_with(|| ScopeSlot {
            live: Arc::downgrade(&scope.core),
            entries: FastMap::default(),
        });
    }

    /// Register `artifact` for (scope, name) unless a concurrent caller beat
    /// us to it; either way, return the installed one. This is the
    /// at-most-once guarantee: the loser's artifact is discarded here.
    pub fn insert_if_absent(&self, scope: &Scope, name: &str, artifact: Arc<A>) -> Arc<A> {
        let mut guard = self.lock();
        let slot = guard.entry(scope.id()).or_insert_with(|| ScopeSlot {
            live: Arc::downgrade(&scope.core),
            entries: FastMap::default(),
        });
        Arc::clone(
            slot.entries
                .entry(SmolStr::from(name))
                .or_insert(artifact),
        )
    }

    /// Drop dead scopes now instead of waiting for the next access.
    pub fn purge(&self) {
        drop(self.lock());
    }

    /// Number of live scopes with a slot.
    pub fn scope_count(&self) -> usize {
        self.lock().len()
    }

    /// Number of installed implementations under `scope`.
    pub fn entry_count(&self, scope: &Scope) -> usize {
        self.lock()
            .get(&scope.id())
            .map_or(0, |slot| slot.entries.len())
    }
}
