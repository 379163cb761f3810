//! Host leave-intent surface
//!
//! Models the host's global "about to leave / shut down" event as a
//! registration surface with synchronous veto. Listener registration is
//! scoped to the registrant's lifetime: `add_listener` returns an
//! `Unlisten` that removes exactly the listener it added.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

/// Handler invoked for each leave attempt; may veto it
pub type LeaveHandler = Arc<dyn Fn(&LeaveIntent) + Send + Sync>;

/// Removes a previously added leave listener
pub type Unlisten = Box<dyn FnOnce() + Send>;

/// One attempt by the host to leave / tear down
///
/// Handlers observe the attempt and may `veto` it; the veto is sticky
/// for the lifetime of the intent.
pub struct LeaveIntent {
    vetoed: AtomicBool,
}

impl LeaveIntent {
    pub fn new() -> Self {
        Self {
            vetoed: AtomicBool::new(false),
        }
    }

    /// Block this leave attempt
    pub fn veto(&self) {
        self.vetoed.store(true, Ordering::SeqCst);
    }

    /// Whether any handler vetoed the attempt
    pub fn is_vetoed(&self) -> bool {
        self.vetoed.load(Ordering::SeqCst)
    }
}

impl Default for LeaveIntent {
    fn default() -> Self {
        Self::new()
    }
}

/// A host event surface that announces leave attempts to listeners
pub trait LeaveSurface: Send + Sync {
    /// Register a handler for future leave attempts
    fn add_listener(&self, handler: LeaveHandler) -> Unlisten;
}

/// In-process leave-intent broadcaster
///
/// Hosts without a native page-lifecycle event dispatch through this;
/// the test suite uses it to simulate unload attempts.
#[derive(Clone, Default)]
pub struct LeaveBroadcast {
    listeners: Arc<Mutex<HashMap<u64, LeaveHandler>>>,
    next_id: Arc<AtomicU64>,
}

impl LeaveBroadcast {
    pub fn new() -> Self {
        Self::default()
    }

    /// Announce a leave attempt to every listener
    ///
    /// Returns `true` when any listener vetoed it.
    pub fn dispatch(&self) -> bool {
        let intent = LeaveIntent::new();
        let handlers: Vec<LeaveHandler> = {
            let listeners = lock(&self.listeners);
            listeners.values().cloned().collect()
        };
        for handler in handlers {
            handler(&intent);
        }
        let vetoed = intent.is_vetoed();
        debug!("[LEAVE] Dispatched leave intent, vetoed: {}", vetoed);
        vetoed
    }

    /// Number of registered listeners
    pub fn listener_count(&self) -> usize {
        lock(&self.listeners).len()
    }
}

impl LeaveSurface for LeaveBroadcast {
    fn add_listener(&self, handler: LeaveHandler) -> Unlisten {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        lock(&self.listeners).insert(id, handler);

        let listeners = Arc::clone(&self.listeners);
        Box::new(move || {
            lock(&listeners).remove(&id);
        })
    }
}

fn lock<K, V>(map: &Mutex<HashMap<K, V>>) -> std::sync::MutexGuard<'_, HashMap<K, V>> {
    map.lock().unwrap_or_else(PoisonError::into_inner)
}
