//! Keyed snapshot store shared by every hook.
//!
//! An entry is created by its first subscriber and removed when the last
//! subscription drops. Writers hold the entry's async lock, so fetches and
//! mutations for one key run one at a time.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use tokio::sync::watch;

use crate::ids::ResourceKey;
use crate::snapshot::PlaygroundSnapshot;

#[derive(Debug, Default)]
pub struct SnapshotCache {
    entries: Mutex<HashMap<ResourceKey, Arc<CacheEntry>>>,
}

impl SnapshotCache {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Attach to `key`, creating the entry on first use.
    pub fn subscribe(self: &Arc<Self>, key: &ResourceKey) -> CacheSubscription {
        let mut entries = self.lock();
        let entry = entries
            .entry(key.clone())
            .or_insert_with(|| {
                tracing::debug!(key = %key, "cache entry created");
                Arc::new(CacheEntry::new(key.clone()))
            })
            .clone();
        entry.subscribers.fetch_add(1, Ordering::SeqCst);
        CacheSubscription {
            cache: Arc::clone(self),
            entry,
        }
    }

    pub fn peek(&self, key: &ResourceKey) -> Option<Arc<PlaygroundSnapshot>> {
        self.lock().get(key).and_then(|e| e.current())
    }

    pub fn contains(&self, key: &ResourceKey) -> bool {
        self.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ResourceKey, Arc<CacheEntry>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug)]
pub struct CacheEntry {
    key: ResourceKey,
    tx: watch::Sender<Option<Arc<PlaygroundSnapshot>>>,
    write_lock: tokio::sync::Mutex<()>,
    subscribers: AtomicUsize,
    detached: AtomicBool,
}

impl CacheEntry {
    fn new(key: ResourceKey) -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            key,
            tx,
            write_lock: tokio::sync::Mutex::new(()),
            subscribers: AtomicUsize::new(0),
            detached: AtomicBool::new(false),
        }
    }

    pub fn key(&self) -> &ResourceKey {
        &self.key
    }

    pub fn current(&self) -> Option<Arc<PlaygroundSnapshot>> {
        self.tx.borrow().clone()
    }

    pub fn changes(&self) -> watch::Receiver<Option<Arc<PlaygroundSnapshot>>> {
        self.tx.subscribe()
    }

    /// Serializes fetches and mutations on this key.
    pub async fn write_lock(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.write_lock.lock().await
    }

    pub fn is_detached(&self) -> bool {
        self.detached.load(Ordering::SeqCst)
    }

    /// Store `snapshot` unless it equals the current value or the entry has
    /// been torn down. Returns whether subscribers were notified.
    pub fn publish(&self, snapshot: Arc<PlaygroundSnapshot>) -> bool {
        if self.is_detached() {
            tracing::debug!(key = %self.key, "dropping publish into detached cache entry");
            return false;
        }
        let published = self.tx.send_if_modified(|current| match current {
            Some(existing) if Arc::ptr_eq(existing, &snapshot) || **existing == *snapshot => false,
            _ => {
                *current = Some(snapshot);
                true
            }
        });
        if published {
            tracing::debug!(key = %self.key, "snapshot published");
        }
        published
    }
}

/// Keeps a cache entry alive. Dropping the last subscription removes it.
#[derive(Debug)]
pub struct CacheSubscription {
    cache: Arc<SnapshotCache>,
    entry: Arc<CacheEntry>,
}

impl CacheSubscription {
    pub fn entry(&self) -> &Arc<CacheEntry> {
        &self.entry
    }
}

impl Drop for CacheSubscription {
    fn drop(&mut self) {
        let mut entries = self.cache.lock();
        if self.entry.subscribers.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.entry.detached.store(true, Ordering::SeqCst);
            if entries
                .get(&self.entry.key)
                .is_some_and(|e| Arc::ptr_eq(e, &self.entry))
            {
                entries.remove(&self.entry.key);
                tracing::debug!(key = %self.entry.key, "cache entry removed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::test_support::two_variant_snapshot;

    #[test]
    fn entry_lives_while_subscribed() {
        let cache = SnapshotCache::new();
        let key = ResourceKey::variants("app", "proj");

        let first = cache.subscribe(&key);
        let second = cache.subscribe(&key);
        assert!(Arc::ptr_eq(first.entry(), second.entry()));
        assert_eq!(cache.len(), 1);

        drop(first);
        assert!(cache.contains(&key));
        drop(second);
        assert!(cache.is_empty());
    }

    #[test]
    fn publish_skips_equal_snapshots() {
        let cache = SnapshotCache::new();
        let key = ResourceKey::variants("app", "proj");
        let sub = cache.subscribe(&key);
        let mut rx = sub.entry().changes();

        assert!(sub.entry().publish(Arc::new(two_variant_snapshot())));
        assert!(rx.has_changed().unwrap());
        rx.borrow_and_update();

        let same = (*sub.entry().current().unwrap()).clone();
        assert!(!sub.entry().publish(Arc::new(same)));
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn detached_entry_ignores_late_publish() {
        let cache = SnapshotCache::new();
        let key = ResourceKey::variants("app", "proj");
        let sub = cache.subscribe(&key);
        let entry = Arc::clone(sub.entry());
        drop(sub);

        assert!(entry.is_detached());
        assert!(!entry.publish(Arc::new(two_variant_snapshot())));
        assert!(cache.peek(&key).is_none());
    }
}
