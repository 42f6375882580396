//! MutexKV - Named locks keyed by arbitrary strings
//!
//! Lets otherwise independent resource operations serialize on a shared
//! remote key (for example, several sub-resources mutating the same parent).
//! Locks are created lazily on first use and never removed.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Guard holding a named lock; the lock is released when it is dropped
#[derive(Debug)]
pub struct MutexKVGuard {
    key: String,
    _guard: OwnedMutexGuard<()>,
}

impl MutexKVGuard {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for MutexKVGuard {
    fn drop(&mut self) {
        log::debug!("Unlocked {:?}", self.key);
    }
}

/// Table of named async mutexes
#[derive(Debug, Default)]
pub struct MutexKV {
    store: DashMap<String, Arc<Mutex<()>>>,
}

impl MutexKV {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `key`, waiting while another holder has it
    pub async fn lock(&self, key: &str) -> MutexKVGuard {
        log::debug!("Locking {:?}", key);
        let guard = self.get(key).lock_owned().await;
        log::debug!("Locked {:?}", key);
        MutexKVGuard {
            key: key.to_string(),
            _guard: guard,
        }
    }

    /// Acquire the lock for `key` only if it is free
    pub fn try_lock(&self, key: &str) -> Option<MutexKVGuard> {
        let guard = self.get(key).try_lock_owned().ok()?;
        log::debug!("Locked {:?}", key);
        Some(MutexKVGuard {
            key: key.to_string(),
            _guard: guard,
        })
    }

    /// Number of keys that have ever been locked
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    fn get(&self, key: &str) -> Arc<Mutex<()>> {
        self.store
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn same_key_is_exclusive() {
        let kv = MutexKV::new();
        let guard = kv.lock("cvpn-endpoint-1").await;
        assert_eq!(guard.key(), "cvpn-endpoint-1");
        assert!(kv.try_lock("cvpn-endpoint-1").is_none());
        drop(guard);
        assert!(kv.try_lock("cvpn-endpoint-1").is_some());
    }

    #[tokio::test]
    async fn different_keys_are_independent() {
        let kv = MutexKV::new();
        let _a = kv.lock("a").await;
        assert!(kv.try_lock("b").is_some());
        assert_eq!(kv.len(), 2);
    }

    #[tokio::test]
    async fn waiter_proceeds_after_release() {
        let kv = Arc::new(MutexKV::new());
        let guard = kv.lock("shared").await;

        let waiter = {
            let kv = kv.clone();
            tokio::spawn(async move {
                let _g = kv.lock("shared").await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter acquired the lock")
            .unwrap();
    }

    #[tokio::test]
    async fn keys_are_never_removed() {
        let kv = MutexKV::new();
        drop(kv.lock("k").await);
        drop(kv.lock("k").await);
        assert_eq!(kv.len(), 1);
    }
}
