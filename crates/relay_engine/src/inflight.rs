use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use relay_core::JobId;
use tokio::task::AbortHandle;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Entry {
    ticket: u64,
    abort: AbortHandle,
}

/// Registry of jobs whose worker task is currently running.
///
/// Each registration gets a ticket; removal only succeeds for the matching
/// ticket, so a late cleanup from a task that `stop()` already discarded
/// cannot evict a newer registration.
pub(crate) struct InFlight {
    entries: Mutex<HashMap<JobId, Entry>>,
    next_ticket: AtomicU64,
}

impl InFlight {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            next_ticket: AtomicU64::new(1),
        }
    }

    pub fn issue_ticket(&self) -> u64 {
        self.next_ticket.fetch_add(1, Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn insert(&self, id: JobId, ticket: u64, abort: AbortHandle) {
        lock(&self.entries).insert(id, Entry { ticket, abort });
    }

    pub fn remove(&self, id: &JobId, ticket: u64) -> bool {
        let mut entries = lock(&self.entries);
        match entries.get(id) {
            Some(entry) if entry.ticket == ticket => {
                entries.remove(id);
                true
            }
            _ => false,
        }
    }

    /// Abort every registered task and forget them all. Returns their ids.
    pub fn abort_all(&self) -> Vec<JobId> {
        let drained: Vec<_> = lock(&self.entries).drain().collect();
        drained
            .into_iter()
            .map(|(id, entry)| {
                entry.abort.abort();
                id
            })
            .collect()
    }
}

/// Ids accepted by the bridge and not yet finished. A second submission with
/// an id in this set is dropped as a duplicate.
pub(crate) struct Reservations {
    ids: Mutex<HashSet<JobId>>,
}

impl Reservations {
    pub fn new() -> Self {
        Self {
            ids: Mutex::new(HashSet::new()),
        }
    }

    /// `false` when the id is already reserved.
    pub fn reserve(&self, id: &JobId) -> bool {
        lock(&self.ids).insert(id.clone())
    }

    pub fn release(&self, id: &JobId) {
        lock(&self.ids).remove(id);
    }

    pub fn release_all<'a>(&self, ids: impl IntoIterator<Item = &'a JobId>) {
        let mut reserved = lock(&self.ids);
        for id in ids {
            reserved.remove(id);
        }
    }
}
