//! Per-key in-flight operation registry
//!
//! Serializes side-effecting creations per logical key (e.g. one order-edit
//! creation per order id) without a process-wide flag: each key gets its own
//! slot in a registry guarded by a single mutex, so concurrent requests for
//! different keys never contend and concurrent requests for the same key
//! either wait or observe the operation as already running.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// Registry of in-flight operations keyed by a logical identifier.
#[derive(Default)]
pub struct InFlightRegistry {
    inner: Arc<Mutex<HashMap<String, Arc<Notify>>>>,
}

impl InFlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the slot for `key`, waiting until any current holder releases
    /// it. The returned permit releases the slot on drop.
    pub async fn acquire(&self, key: &str) -> InFlightPermit {
        loop {
            let waiter = {
                let mut slots = self.inner.lock().expect("inflight registry poisoned");
                match slots.get(key) {
                    None => {
                        slots.insert(key.to_string(), Arc::new(Notify::new()));
                        return InFlightPermit {
                            key: key.to_string(),
                            registry: Arc::clone(&self.inner),
                        };
                    }
                    Some(notify) => Arc::clone(notify),
                }
            };
            // A release removes the slot before notifying, so waiting is only
            // safe while the slot still holds the same Notify we registered
            // against; otherwise the wakeup may already have fired.
            let notified = waiter.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            let same_holder = {
                let slots = self.inner.lock().expect("inflight registry poisoned");
                slots
                    .get(key)
                    .map(|n| Arc::ptr_eq(n, &waiter))
                    .unwrap_or(false)
            };
            if same_holder {
                notified.await;
            }
        }
    }

    /// Acquire the slot for `key` only if no operation holds it.
    pub fn try_acquire(&self, key: &str) -> Option<InFlightPermit> {
        let mut slots = self.inner.lock().expect("inflight registry poisoned");
        if slots.contains_key(key) {
            return None;
        }
        slots.insert(key.to_string(), Arc::new(Notify::new()));
        Some(InFlightPermit {
            key: key.to_string(),
            registry: Arc::clone(&self.inner),
        })
    }

    /// Whether an operation currently holds the slot for `key`.
    pub fn is_running(&self, key: &str) -> bool {
        self.inner
            .lock()
            .expect("inflight registry poisoned")
            .contains_key(key)
    }
}

/// Holds a key's in-flight slot; releases it (and wakes waiters) on drop.
pub struct InFlightPermit {
    key: String,
    registry: Arc<Mutex<HashMap<String, Arc<Notify>>>>,
}

impl Drop for InFlightPermit {
    fn drop(&mut self) {
        let notify = {
            let mut slots = self.registry.lock().expect("inflight registry poisoned");
            slots.remove(&self.key)
        };
        if let Some(notify) = notify {
            notify.notify_waiters();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn try_acquire_rejects_while_held() {
        let registry = InFlightRegistry::new();

        let permit = registry.try_acquire("order_1").unwrap();
        assert!(registry.try_acquire("order_1").is_none());
        assert!(registry.is_running("order_1"));

        drop(permit);
        assert!(registry.try_acquire("order_1").is_some());
    }

    #[tokio::test]
    async fn keys_are_independent() {
        let registry = InFlightRegistry::new();

        let _a = registry.try_acquire("order_1").unwrap();
        assert!(registry.try_acquire("order_2").is_some());
    }

    #[tokio::test]
    async fn acquire_waits_for_release() {
        let registry = Arc::new(InFlightRegistry::new());
        let counter = Arc::new(AtomicUsize::new(0));

        let permit = registry.acquire("order_1").await;

        let registry_clone = Arc::clone(&registry);
        let counter_clone = Arc::clone(&counter);
        let waiter = tokio::spawn(async move {
            let _permit = registry_clone.acquire("order_1").await;
            counter_clone.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        drop(permit);
        waiter.await.unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn serializes_many_contenders() {
        let registry = Arc::new(InFlightRegistry::new());
        let running = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let registry = Arc::clone(&registry);
            let running = Arc::clone(&running);
            handles.push(tokio::spawn(async move {
                let _permit = registry.acquire("order_1").await;
                let now = running.fetch_add(1, Ordering::SeqCst);
                assert_eq!(now, 0, "two holders of the same key");
                tokio::time::sleep(Duration::from_millis(2)).await;
                running.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
    }
}
