//! Per-key async locks serialising read-modify-write sequences.

use std::{collections::HashMap, sync::Arc};

use tokio::sync::{Mutex, OwnedMutexGuard};

use super::ConfigKey;

/// Lazily-created mutex per [`ConfigKey`]. Cloning shares the lock table.
///
/// Entries no task holds or waits on are dropped on the next `lock` call, so
/// the table stays proportional to the keys in use.
#[derive(Debug, Clone, Default)]
pub struct KeyLocks {
    table: Arc<Mutex<HashMap<ConfigKey, Arc<Mutex<()>>>>>,
}

impl KeyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `key`. Released when the guard drops.
    pub async fn lock(&self, key: &ConfigKey) -> OwnedMutexGuard<()> {
        let entry = {
            let mut table = self.table.lock().await;
            // The table's own reference is the only one left for idle keys.
            table.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(table.entry(key.clone()).or_default())
        };
        entry.lock_owned().await
    }

    /// Number of keys currently tracked.
    pub async fn len(&self) -> usize {
        self.table.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_key_is_exclusive() {
        let locks = KeyLocks::new();
        let key = ConfigKey::user(1, "sent_alerts");

        let guard = locks.lock(&key).await;
        let contender = {
            let locks = locks.clone();
            let key = key.clone();
            tokio::spawn(async move {
                let _guard = locks.lock(&key).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        contender.await.unwrap();
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_block() {
        let locks = KeyLocks::new();
        let _a = locks.lock(&ConfigKey::user(1, "sent_alerts")).await;
        let _b = locks.lock(&ConfigKey::user(2, "sent_alerts")).await;
        assert_eq!(locks.len().await, 2);
    }

    #[tokio::test]
    async fn test_released_keys_are_pruned() {
        let locks = KeyLocks::new();
        for user_id in 0..100 {
            let _guard = locks.lock(&ConfigKey::user(user_id, "disclaimers")).await;
        }
        assert_eq!(locks.len().await, 1);

        let held = locks.lock(&ConfigKey::user(500, "disclaimers")).await;
        let _other = locks.lock(&ConfigKey::user(501, "disclaimers")).await;
        assert_eq!(locks.len().await, 2);
        drop(held);
    }
}
