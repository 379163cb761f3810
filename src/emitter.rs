//! In-process change-notification source
//!
//! The coordinator only needs a `subscribe` closure, but hosts that have
//! no native change stream (and the test suite) need a concrete source
//! to fan notifications out from. `ChangeEmitter` is that source.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Callback registered with a change source; invoked once per change
pub type ChangeCallback = Arc<dyn Fn() + Send + Sync>;

/// Revokes a subscription; later notifications no longer reach the
/// callback
pub type Unsubscribe = Box<dyn FnOnce() + Send>;

/// Fan-out of discrete change notifications to subscribed callbacks
///
/// Callbacks run synchronously on the notifying thread, in registration
/// order.
#[derive(Clone, Default)]
pub struct ChangeEmitter {
    listeners: Arc<Mutex<HashMap<u64, ChangeCallback>>>,
    next_id: Arc<AtomicU64>,
}

impl ChangeEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback; the returned closure unsubscribes it
    pub fn subscribe(&self, callback: ChangeCallback) -> Unsubscribe {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        lock(&self.listeners).insert(id, callback);

        let listeners = Arc::clone(&self.listeners);
        Box::new(move || {
            lock(&listeners).remove(&id);
        })
    }

    /// Notify every subscribed callback of one change
    pub fn notify(&self) {
        let mut entries: Vec<(u64, ChangeCallback)> = {
            let listeners = lock(&self.listeners);
            listeners.iter().map(|(id, cb)| (*id, cb.clone())).collect()
        };
        entries.sort_by_key(|(id, _)| *id);
        for (_, callback) in entries {
            callback();
        }
    }

    /// Number of live subscriptions
    pub fn listener_count(&self) -> usize {
        lock(&self.listeners).len()
    }
}

fn lock<K, V>(map: &Mutex<HashMap<K, V>>) -> std::sync::MutexGuard<'_, HashMap<K, V>> {
    map.lock().unwrap_or_else(PoisonError::into_inner)
}
