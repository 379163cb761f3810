//! Sync coordination over an external change stream
//!
//! Turns discrete change notifications into managed sync runs with:
//! - Debounced triggering (coalescing window, delegated to `Debouncer`)
//! - Single-flight cancellation via `CancellationToken`
//! - Forced immediate execution bypassing the remaining wait
//! - Optional veto of host leave attempts while work is outstanding

use crate::debounce::Debouncer;
use crate::emitter::{ChangeCallback, Unsubscribe};
use crate::error::{Error, Result};
use crate::lifecycle::{LeaveHandler, LeaveSurface, Unlisten};
use crate::stats::{SyncStats, SyncStatsCollector};
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

/// The caller-supplied sync action
///
/// Receives a fresh cancellation token per run; the token is signalled
/// when a later run supersedes this one, and the action is expected to
/// observe it cooperatively.
pub type SyncFn = Arc<dyn Fn(CancellationToken) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Sync coordination configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Coalescing window in milliseconds; 0 dispatches on every change
    pub wait_ms: u64,
    /// Veto host leave attempts while a sync is pending or in flight
    pub notify_on_leave: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            wait_ms: 0,
            notify_on_leave: false,
        }
    }
}

impl SyncConfig {
    /// Create config from environment variables
    pub fn from_env() -> Self {
        Self {
            wait_ms: std::env::var("SYNCMATIC_WAIT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
            notify_on_leave: std::env::var("SYNCMATIC_NOTIFY_ON_LEAVE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
        }
    }

    /// Coalescing window as a Duration
    pub fn wait(&self) -> Duration {
        Duration::from_millis(self.wait_ms)
    }
}

/// Coordinator state shared with the dispatch path and the settlement
/// tasks
struct Shared {
    sync_fn: SyncFn,
    /// Token lent to the most recently started run; cancelled before a
    /// successor token is created
    current: Mutex<Option<CancellationToken>>,
    /// Run sequence; the settlement task clears the syncing flag only
    /// when its run is still the latest
    run_seq: AtomicU64,
    /// True strictly while the latest run's outcome is unsettled
    syncing: AtomicBool,
    stats: SyncStatsCollector,
}

impl Shared {
    /// Cancel the previous run's token, issue a fresh one, and start
    /// the sync action with it
    fn dispatch(self: &Arc<Self>) {
        let token = {
            let mut current = self
                .current
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if let Some(prev) = current.take() {
                prev.cancel();
                if self.syncing.load(Ordering::SeqCst) {
                    self.stats.record_superseded();
                }
            }
            let token = CancellationToken::new();
            *current = Some(token.clone());
            token
        };

        let run = self.run_seq.fetch_add(1, Ordering::SeqCst) + 1;
        self.syncing.store(true, Ordering::SeqCst);
        self.stats.record_started();
        debug!("[SYNC] Starting run {}", run);

        // Superseded runs are never awaited; they settle on their own
        // and only the latest run controls the syncing flag.
        let future = (self.sync_fn)(token);
        let shared = Arc::clone(self);
        tokio::spawn(async move {
            let outcome = future.await;
            if shared.run_seq.load(Ordering::SeqCst) == run {
                shared.syncing.store(false, Ordering::SeqCst);
            }
            match outcome {
                Ok(()) => {
                    shared.stats.record_completed();
                    debug!("[SYNC] Run {} completed", run);
                }
                Err(e) => {
                    shared.stats.record_failed();
                    error!("[SYNC] Run {} failed: {}", run, e);
                }
            }
        });
    }
}

/// Debounced, cancellable sync coordinator
///
/// States: idle (nothing outstanding), pending (coalescing window open),
/// syncing (action started, outcome unsettled). Change notifications
/// move idle to pending (or straight to syncing with no window), reset
/// an open window, and supersede an in-flight run by cancelling its
/// token before the next run starts.
pub struct SyncManager {
    shared: Arc<Shared>,
    debounce: Option<Debouncer<()>>,
    config: SyncConfig,
    unsubscribe: Option<Unsubscribe>,
    unlisten: Option<Unlisten>,
}

impl SyncManager {
    /// Subscribe to a change source and coordinate sync runs over it
    ///
    /// `subscribe` registers the coordinator's trigger with the change
    /// source and returns the unsubscribe capability; a wiring failure
    /// is fatal here. `notify_on_leave` requires a leave surface, use
    /// [`SyncManager::with_leave_surface`] for that.
    pub fn new<S, F, Fut>(subscribe: S, sync_fn: F, config: SyncConfig) -> Result<Self>
    where
        S: FnOnce(ChangeCallback) -> Result<Unsubscribe>,
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        if config.notify_on_leave {
            return Err(Error::config(
                "notify_on_leave requires a leave surface; use with_leave_surface",
            ));
        }
        Self::build(subscribe, sync_fn, config, None)
    }

    /// Like [`SyncManager::new`], with a host leave surface for the
    /// unload-veto policy
    ///
    /// The listener is registered only when `notify_on_leave` is set,
    /// and lives exactly as long as the coordinator (removed by
    /// `un_sync`).
    pub fn with_leave_surface<S, F, Fut>(
        subscribe: S,
        sync_fn: F,
        config: SyncConfig,
        surface: Arc<dyn LeaveSurface>,
    ) -> Result<Self>
    where
        S: FnOnce(ChangeCallback) -> Result<Unsubscribe>,
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        Self::build(subscribe, sync_fn, config, Some(surface))
    }

    fn build<S, F, Fut>(
        subscribe: S,
        sync_fn: F,
        config: SyncConfig,
        surface: Option<Arc<dyn LeaveSurface>>,
    ) -> Result<Self>
    where
        S: FnOnce(ChangeCallback) -> Result<Unsubscribe>,
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let sync_fn: SyncFn = Arc::new(move |token| sync_fn(token).boxed());
        let shared = Arc::new(Shared {
            sync_fn,
            current: Mutex::new(None),
            run_seq: AtomicU64::new(0),
            syncing: AtomicBool::new(false),
            stats: SyncStatsCollector::new(),
        });

        let debounce = if config.wait_ms > 0 {
            let dispatcher = Arc::clone(&shared);
            Some(Debouncer::new(config.wait(), move |()| {
                dispatcher.dispatch();
            }))
        } else {
            None
        };

        let trigger: ChangeCallback = {
            let shared = Arc::clone(&shared);
            let debounce = debounce.clone();
            Arc::new(move || match &debounce {
                Some(d) => d.run(()),
                None => shared.dispatch(),
            })
        };
        let unsubscribe = subscribe(trigger)?;

        let unlisten = match surface {
            Some(surface) if config.notify_on_leave => {
                Some(surface.add_listener(Self::leave_handler(&shared, debounce.as_ref())))
            }
            _ => None,
        };

        debug!(
            "[SYNC] Coordinator started (wait: {}ms, notify_on_leave: {})",
            config.wait_ms, config.notify_on_leave
        );

        Ok(Self {
            shared,
            debounce,
            config,
            unsubscribe: Some(unsubscribe),
            unlisten,
        })
    }

    /// Leave policy: veto while syncing (the run must settle on its
    /// own), veto and flush while pending, allow when idle
    ///
    /// A flushed action is only started, not completed, inside the
    /// synchronous leave window; a truly asynchronous action may still
    /// be interrupted by the host actually leaving.
    fn leave_handler(shared: &Arc<Shared>, debounce: Option<&Debouncer<()>>) -> LeaveHandler {
        let shared = Arc::clone(shared);
        let debounce = debounce.cloned();
        Arc::new(move |intent| {
            if shared.syncing.load(Ordering::SeqCst) {
                debug!("[SYNC] Vetoing leave: sync in flight");
                intent.veto();
            } else if let Some(d) = &debounce {
                if d.pending() {
                    debug!("[SYNC] Vetoing leave: flushing pending sync");
                    intent.veto();
                    d.flush_pending();
                }
            }
        })
    }

    /// Trigger an immediate sync run, bypassing any remaining wait
    ///
    /// Exactly one invocation of the sync action results, whether or
    /// not a debounced call was pending.
    pub fn force_sync(&self) {
        match &self.debounce {
            Some(d) => d.flush(()),
            None => self.shared.dispatch(),
        }
    }

    /// Terminal stop: flush a pending debounced intent, unsubscribe
    /// from the change source, and remove the leave listener
    ///
    /// Consumes the coordinator, so no operation can run after stop.
    /// An in-flight run is left to settle on its own.
    pub fn un_sync(mut self) {
        if let Some(d) = &self.debounce {
            d.flush_pending();
        }
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
        if let Some(unlisten) = self.unlisten.take() {
            unlisten();
        }
        debug!("[SYNC] Coordinator stopped");
    }

    /// Whether the latest run's outcome is still unsettled
    pub fn is_syncing(&self) -> bool {
        self.shared.syncing.load(Ordering::SeqCst)
    }

    /// Whether a debounced call is scheduled but has not fired
    pub fn pending(&self) -> bool {
        self.debounce.as_ref().is_some_and(Debouncer::pending)
    }

    /// Current sync operation counters
    pub fn stats(&self) -> SyncStats {
        self.shared.stats.snapshot()
    }

    /// Sync configuration
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emitter::ChangeEmitter;

    fn noop_subscribe(emitter: &ChangeEmitter) -> impl FnOnce(ChangeCallback) -> Result<Unsubscribe> + '_ {
        move |cb| Ok(emitter.subscribe(cb))
    }

    #[tokio::test]
    async fn test_notify_on_leave_without_surface_is_rejected() {
        let emitter = ChangeEmitter::new();
        let config = SyncConfig {
            wait_ms: 100,
            notify_on_leave: true,
        };

        let result = SyncManager::new(noop_subscribe(&emitter), |_token| async { Ok(()) }, config);

        assert!(matches!(result, Err(Error::Config { .. })));
        // Failed construction must not leave a live subscription behind
        assert_eq!(emitter.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_subscription_failure_propagates() {
        let result = SyncManager::new(
            |_cb| Err(Error::subscription("source closed")),
            |_token| async { Ok(()) },
            SyncConfig::default(),
        );

        assert!(matches!(result, Err(Error::Subscription { .. })));
    }

    #[test]
    fn test_config_default_has_no_window() {
        let config = SyncConfig::default();
        assert_eq!(config.wait_ms, 0);
        assert!(!config.notify_on_leave);
        assert!(config.wait().is_zero());
    }

    #[test]
    fn test_config_from_env() {
        std::env::set_var("SYNCMATIC_WAIT_MS", "250");
        std::env::set_var("SYNCMATIC_NOTIFY_ON_LEAVE", "true");

        let config = SyncConfig::from_env();
        assert_eq!(config.wait_ms, 250);
        assert!(config.notify_on_leave);

        std::env::remove_var("SYNCMATIC_WAIT_MS");
        std::env::remove_var("SYNCMATIC_NOTIFY_ON_LEAVE");
    }
}
