use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

/// Idle entries are pruned once the table grows past this many keys
const PRUNE_THRESHOLD: usize = 1024;

/// One async mutex per key, created on first use.
///
/// Holding the guard for key `k` excludes every other holder of `k` and
/// nobody else: two rooms never contend with each other. Composite keys
/// are tuples, never joined strings.
pub struct KeyedLocks<K = String> {
    locks: Mutex<HashMap<K, Arc<Mutex<()>>>>,
}

impl<K> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }
}

impl<K: Eq + Hash> KeyedLocks<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `key`. Released when the guard drops.
    pub async fn acquire<Q>(&self, key: &Q) -> OwnedMutexGuard<()>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
    {
        let lock = {
            let mut locks = self.locks.lock().await;

            if locks.len() >= PRUNE_THRESHOLD {
                // strong_count == 1 means only the table references it: no holder, no waiter
                let before = locks.len();
                locks.retain(|_, lock| Arc::strong_count(lock) > 1);
                debug!(pruned = before - locks.len(), "Pruned idle keyed locks");
            }

            match locks.get(key) {
                Some(lock) => Arc::clone(lock),
                None => {
                    let lock = Arc::new(Mutex::new(()));
                    locks.insert(key.to_owned(), Arc::clone(&lock));
                    lock
                }
            }
        };

        lock.lock_owned().await
    }

    pub async fn len(&self) -> usize {
        self.locks.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
