//! Keyed caches with request coalescing.
//!
//! Each entry stores a shared computation rather than a finished value: the first caller for a
//! key spawns the computation on a worker thread, every further caller for the same key awaits
//! the same result. A failed computation is delivered to all waiters that joined it and then
//! evicted, so the next caller recomputes. Invalidation removes entries from the map without
//! cancelling in-flight work (a waiter that already joined still gets its answer); a later
//! lookup for the same key performs a fresh computation.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use anyhow::Result;

/// A cloneable error so that one failure can be handed to every waiter.
#[derive(Clone)]
pub struct SharedError(Arc<anyhow::Error>);

impl SharedError {
    fn new(error: anyhow::Error) -> Self {
        SharedError(Arc::new(error))
    }
}

impl fmt::Display for SharedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Debug for SharedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl std::error::Error for SharedError {}

enum EntryState<V> {
    Computing,
    Ready(Result<V, SharedError>),
}

struct Entry<V> {
    state: Mutex<EntryState<V>>,
    done: Condvar,
}

impl<V: Clone> Entry<V> {
    fn new() -> Arc<Self> {
        Arc::new(Entry {
            state: Mutex::new(EntryState::Computing),
            done: Condvar::new(),
        })
    }

    fn complete(&self, result: Result<V, SharedError>) {
        *self.state.lock().unwrap() = EntryState::Ready(result);
        self.done.notify_all();
    }

    fn wait(&self) -> Result<V, SharedError> {
        let mut state = self.state.lock().unwrap();
        loop {
            if let EntryState::Ready(result) = &*state {
                return result.clone();
            }
            state = self.done.wait(state).unwrap();
        }
    }

    fn wait_timeout(&self, timeout: Duration) -> Option<Result<V, SharedError>> {
        let deadline = std::time::Instant::now() + timeout;
        let mut state = self.state.lock().unwrap();
        loop {
            if let EntryState::Ready(result) = &*state {
                return Some(result.clone());
            }
            let now = std::time::Instant::now();
            if now >= deadline {
                return None;
            }
            let (next, _) = self.done.wait_timeout(state, deadline - now).unwrap();
            state = next;
        }
    }
}

struct CacheInner<K, V> {
    entries: Mutex<HashMap<K, Arc<Entry<V>>>>,
}

pub struct RequestCache<K, V> {
    inner: Arc<CacheInner<K, V>>,
}

impl<K, V> Default for RequestCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        RequestCache::new()
    }
}

impl<K, V> RequestCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        RequestCache {
            inner: Arc::new(CacheInner {
                entries: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Await the value for `key`, computing it if no computation exists yet. The computation
    /// runs on its own thread so that a caller abandoning the wait (e.g. on a timeout) does not
    /// cancel it for everybody else.
    pub fn get_or_compute(
        &self,
        key: K,
        compute: impl FnOnce() -> Result<V> + Send + 'static,
    ) -> Result<V> {
        self.entry_for(key, compute)
            .wait()
            .map_err(anyhow::Error::new)
    }

    /// Like [`RequestCache::get_or_compute`], but gives up waiting after `timeout`. The
    /// computation keeps running; `on_late_result` is invoked with the eventual value from the
    /// computing thread.
    pub fn get_or_compute_with_timeout(
        &self,
        key: K,
        timeout: Duration,
        compute: impl FnOnce() -> Result<V> + Send + 'static,
        on_late_result: impl FnOnce(Result<V, SharedError>) + Send + 'static,
    ) -> Option<Result<V>> {
        let entry = self.entry_for(key, compute);
        match entry.wait_timeout(timeout) {
            Some(result) => Some(result.map_err(anyhow::Error::new)),
            None => {
                std::thread::spawn(move || on_late_result(entry.wait()));
                None
            }
        }
    }

    fn entry_for(
        &self,
        key: K,
        compute: impl FnOnce() -> Result<V> + Send + 'static,
    ) -> Arc<Entry<V>> {
        let mut entries = self.inner.entries.lock().unwrap();
        if let Some(entry) = entries.get(&key) {
            return Arc::clone(entry);
        }

        let entry = Entry::new();
        entries.insert(key.clone(), Arc::clone(&entry));
        drop(entries);

        let inner = Arc::clone(&self.inner);
        let worker_entry = Arc::clone(&entry);
        std::thread::spawn(move || {
            let result = compute().map_err(SharedError::new);
            if result.is_err() {
                // Evict so the next caller recomputes, unless the entry was already
                // invalidated and replaced by a fresh computation.
                let mut entries = inner.entries.lock().unwrap();
                if let Some(current) = entries.get(&key) {
                    if Arc::ptr_eq(current, &worker_entry) {
                        entries.remove(&key);
                    }
                }
            }
            worker_entry.complete(result);
        });
        entry
    }

    /// A waiter for an already-present (possibly still computing) entry. Does not insert.
    pub fn get_existing(&self, key: &K) -> Option<Result<V>> {
        let entry = {
            let entries = self.inner.entries.lock().unwrap();
            entries.get(key).map(Arc::clone)?
        };
        Some(entry.wait().map_err(anyhow::Error::new))
    }

    /// The keys currently present, pending or completed.
    pub fn keys(&self) -> Vec<K> {
        self.inner.entries.lock().unwrap().keys().cloned().collect()
    }

    pub fn invalidate_where(&self, pred: impl Fn(&K) -> bool) {
        self.inner
            .entries
            .lock()
            .unwrap()
            .retain(|key, _| !pred(key));
    }

    pub fn clear(&self) {
        self.inner.entries.lock().unwrap().clear();
    }
}
