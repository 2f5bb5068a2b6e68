use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

/// Callback invoked on every layout pass delivered to a view.
type LayoutCallback = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct ObserverInner {
    next_id: AtomicU64,
    callbacks: Mutex<Vec<(u64, LayoutCallback)>>,
}

/// Per-view registry of layout callbacks.
///
/// Dispatch snapshots the registered callbacks before calling them, so a
/// callback may subscribe or drop subscriptions without deadlocking. Changes
/// made during a dispatch take effect on the next one.
#[derive(Clone, Default)]
pub struct LayoutObserver {
    inner: Arc<ObserverInner>,
}

impl LayoutObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback`; it stays registered until the returned guard drops.
    #[must_use = "dropping the subscription unregisters the callback"]
    pub fn subscribe<F>(&self, callback: F) -> LayoutSubscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut guard) = self.inner.callbacks.lock() {
            guard.push((id, Arc::new(callback)));
        }
        LayoutSubscription {
            observer: Arc::downgrade(&self.inner),
            id,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner
            .callbacks
            .lock()
            .map(|guard| guard.len())
            .unwrap_or(0)
    }

    /// Deliver one global-layout signal to every subscriber, in subscription order.
    pub fn dispatch_global_layout(&self) {
        let snapshot: Vec<LayoutCallback> = match self.inner.callbacks.lock() {
            Ok(guard) => guard.iter().map(|(_, cb)| Arc::clone(cb)).collect(),
            Err(_) => return,
        };
        for callback in snapshot {
            callback();
        }
    }
}

/// RAII guard returned by [`LayoutObserver::subscribe`].
pub struct LayoutSubscription {
    observer: Weak<ObserverInner>,
    id: u64,
}

impl Drop for LayoutSubscription {
    fn drop(&mut self) {
        if let Some(inner) = self.observer.upgrade() {
            if let Ok(mut guard) = inner.callbacks.lock() {
                guard.retain(|(id, _)| *id != self.id);
            }
        }
    }
}
