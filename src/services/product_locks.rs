use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// In-process serialization of writers per product.
///
/// Locks are taken in sorted id order so two writers touching overlapping product sets cannot
/// deadlock. Cross-process safety comes from the optimistic version check on product cost.
#[derive(Debug, Default)]
pub struct ProductLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

/// Held for the duration of one ledger operation.
#[derive(Debug)]
pub struct ProductLockGuard {
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl ProductLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire<I, S>(&self, product_ids: I) -> ProductLockGuard
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut ids: Vec<String> = product_ids
            .into_iter()
            .map(|id| id.as_ref().to_string())
            .collect();
        ids.sort();
        ids.dedup();

        let mut guards = Vec::with_capacity(ids.len());
        for id in ids {
            let lock = self
                .locks
                .entry(id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone();
            guards.push(lock.lock_owned().await);
        }
        ProductLockGuard { _guards: guards }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_product_is_serialized() {
        let locks = Arc::new(ProductLocks::new());
        let guard = locks.acquire(["MP-1", "MP-2"]).await;

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _g = locks.acquire(["MP-2"]).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());
        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .expect("contender should acquire after release")
            .expect("task panicked");
    }

    #[tokio::test]
    async fn unrelated_products_do_not_block() {
        let locks = ProductLocks::new();
        let _a = locks.acquire(["MP-1"]).await;
        let b = tokio::time::timeout(Duration::from_millis(100), locks.acquire(["MP-3"])).await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn duplicate_ids_are_locked_once() {
        let locks = ProductLocks::new();
        let guard = locks.acquire(["MP-1", "MP-1"]).await;
        assert_eq!(guard._guards.len(), 1);
    }
}
