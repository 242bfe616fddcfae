//! In-flight thread registry
//!
//! Maps thread ids to the latest published snapshot and a runner lease.
//! Snapshots are immutable `Arc`s replaced wholesale by the lease holder, so
//! readers never block the runner and never see a half-applied cycle.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::watch;

use crate::state::ThreadRecord;

struct Entry {
    snapshot: watch::Sender<Arc<ThreadRecord>>,
    leased: AtomicBool,
    /// Insertion order, breaks ties between equal creation times
    seq: u64,
}

/// Why a lease could not be taken
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaseError {
    NotFound,
    Held,
}

/// Exclusive right to mutate one thread; released on drop
pub struct ThreadLease {
    entry: Arc<Entry>,
    held: bool,
}

impl ThreadLease {
    fn new(entry: Arc<Entry>) -> Self {
        Self { entry, held: true }
    }

    pub fn snapshot(&self) -> Arc<ThreadRecord> {
        self.entry.snapshot.borrow().clone()
    }

    /// Replace the published snapshot
    pub fn publish(&self, record: ThreadRecord) {
        self.entry.snapshot.send_replace(Arc::new(record));
    }

    /// Release the lease, then publish the final snapshot of this run
    ///
    /// Anyone who observes the final snapshot can take the lease.
    pub fn finish(mut self, record: ThreadRecord) {
        self.held = false;
        self.entry.leased.store(false, Ordering::Release);
        self.entry.snapshot.send_replace(Arc::new(record));
    }
}

impl Drop for ThreadLease {
    fn drop(&mut self) {
        if self.held {
            self.entry.leased.store(false, Ordering::Release);
        }
    }
}

/// Concurrent map of thread id to snapshot and lease
#[derive(Default)]
pub struct ThreadRegistry {
    threads: RwLock<HashMap<String, Arc<Entry>>>,
    next_seq: AtomicU64,
}

impl ThreadRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<Entry>>> {
        self.threads.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<Entry>>> {
        self.threads.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn entry(&self, leased: bool, record: ThreadRecord) -> Arc<Entry> {
        let (snapshot, _) = watch::channel(Arc::new(record));
        Arc::new(Entry {
            snapshot,
            leased: AtomicBool::new(leased),
            seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
        })
    }

    /// Add a new thread with its lease already held
    ///
    /// Returns None when the id is already registered.
    pub fn register(&self, record: ThreadRecord) -> Option<ThreadLease> {
        let mut threads = self.write();
        if threads.contains_key(&record.thread_id) {
            return None;
        }

        let id = record.thread_id.clone();
        let entry = self.entry(true, record);
        threads.insert(id, entry.clone());
        Some(ThreadLease::new(entry))
    }

    /// Add a thread with no runner; returns false when the id is already registered
    pub fn insert(&self, record: ThreadRecord) -> bool {
        let mut threads = self.write();
        if threads.contains_key(&record.thread_id) {
            return false;
        }

        let id = record.thread_id.clone();
        let entry = self.entry(false, record);
        threads.insert(id, entry);
        true
    }

    /// Forget a thread whose creation could not be persisted
    pub fn remove(&self, thread_id: &str) {
        self.write().remove(thread_id);
    }

    pub fn contains(&self, thread_id: &str) -> bool {
        self.read().contains_key(thread_id)
    }

    /// Take the runner lease for a thread
    pub fn try_lease(&self, thread_id: &str) -> Result<ThreadLease, LeaseError> {
        let entry = self.read().get(thread_id).cloned().ok_or(LeaseError::NotFound)?;

        entry
            .leased
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| LeaseError::Held)?;

        Ok(ThreadLease::new(entry))
    }

    pub fn is_leased(&self, thread_id: &str) -> bool {
        self.read()
            .get(thread_id)
            .is_some_and(|e| e.leased.load(Ordering::Acquire))
    }

    pub fn snapshot(&self, thread_id: &str) -> Option<Arc<ThreadRecord>> {
        self.read()
            .get(thread_id)
            .map(|e| e.snapshot.borrow().clone())
    }

    /// Receiver that observes every snapshot published for the thread
    pub fn subscribe(&self, thread_id: &str) -> Option<watch::Receiver<Arc<ThreadRecord>>> {
        self.read().get(thread_id).map(|e| e.snapshot.subscribe())
    }

    /// Latest snapshots, most recently created first
    pub fn list(&self) -> Vec<Arc<ThreadRecord>> {
        let mut entries: Vec<(u64, Arc<ThreadRecord>)> = self
            .read()
            .values()
            .map(|e| (e.seq, e.snapshot.borrow().clone()))
            .collect();

        entries.sort_by(|(seq_a, a), (seq_b, b)| {
            b.created_at.cmp(&a.created_at).then(seq_b.cmp(seq_a))
        });
        entries.into_iter().map(|(_, record)| record).collect()
    }

    /// Threads currently held by a runner
    pub fn active_count(&self) -> usize {
        self.read()
            .values()
            .filter(|e| e.leased.load(Ordering::Acquire))
            .count()
    }
}
