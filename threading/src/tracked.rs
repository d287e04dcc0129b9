//! The set of in-flight background operations.

use std::{
    collections::BTreeSet,
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use tokio::sync::watch;

/// Ids are unique for the whole process, so reports from a context that was
/// replaced never share an id with the current one.
static NEXT_OPERATION_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OperationId(u64);

impl OperationId {
    #[must_use]
    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "op-{}", self.0)
    }
}

/// Tracked operations, shared across threads.
///
/// Registration hands out a [`TrackedGuard`]; dropping the guard is the only
/// way an entry leaves the set, so every entry is removed exactly once no
/// matter how the operation ends. Waiters observe emptiness through a `watch`
/// channel, which does its own locking.
#[derive(Clone)]
pub struct TrackedOperations {
    inner: Arc<Inner>,
}

struct Inner {
    active: watch::Sender<BTreeSet<OperationId>>,
}

impl TrackedOperations {
    #[must_use]
    pub fn new() -> Self {
        let (active, _) = watch::channel(BTreeSet::new());
        Self {
            inner: Arc::new(Inner { active }),
        }
    }

    pub fn track(&self) -> TrackedGuard {
        let id = OperationId(NEXT_OPERATION_ID.fetch_add(1, Ordering::Relaxed));
        self.inner.active.send_modify(|active| {
            active.insert(id);
        });
        tracing::debug!(operation = %id, "Tracking operation");
        TrackedGuard {
            id,
            owner: self.clone(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.active.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.active.borrow().is_empty()
    }

    #[must_use]
    pub fn contains(&self, id: OperationId) -> bool {
        self.inner.active.borrow().contains(&id)
    }

    /// Snapshot of the ids currently tracked, in registration order.
    #[must_use]
    pub fn pending(&self) -> Vec<OperationId> {
        self.inner.active.borrow().iter().copied().collect()
    }

    /// Resolves once the set is empty. Operations may keep arriving while this
    /// waits; it only returns on an observed empty state.
    pub async fn wait_until_empty(&self) {
        let mut active = self.inner.active.subscribe();
        loop {
            let drained = active.borrow_and_update().is_empty();
            if drained {
                return;
            }
            // `self` keeps the sender alive, so this only fails if the set is gone.
            if active.changed().await.is_err() {
                return;
            }
        }
    }

    fn release(&self, id: OperationId) {
        self.inner.active.send_modify(|active| {
            active.remove(&id);
        });
        tracing::debug!(operation = %id, "Operation untracked");
    }
}

impl Default for TrackedOperations {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TrackedOperations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackedOperations")
            .field("pending", &self.len())
            .finish()
    }
}

/// Membership of one operation in a [`TrackedOperations`] set.
#[must_use = "dropping the guard untracks the operation immediately"]
pub struct TrackedGuard {
    id: OperationId,
    owner: TrackedOperations,
}

impl TrackedGuard {
    #[must_use]
    pub fn id(&self) -> OperationId {
        self.id
    }
}

impl Drop for TrackedGuard {
    fn drop(&mut self) {
        self.owner.release(self.id);
    }
}

impl fmt::Debug for TrackedGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TrackedGuard").field(&self.id).finish()
    }
}
