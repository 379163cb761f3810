//! Delay-and-coalesce debounce primitive
//!
//! Wraps an action so repeated triggers inside the delay window collapse
//! into a single invocation:
//! - `run` schedules (or reschedules) the action after the delay
//! - `flush` / `flush_pending` invoke synchronously, skipping the wait
//! - `cancel` discards a scheduled call without invoking it

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Generic debouncer around an action taking arguments of type `T`
///
/// Clones share one pending slot, so any handle can flush or cancel a
/// call scheduled through another. Scheduling requires a tokio runtime
/// (the timer is a spawned task racing a sleep against cancellation).
pub struct Debouncer<T: Send + 'static> {
    delay: Duration,
    action: Arc<dyn Fn(T) + Send + Sync>,
    slot: Arc<Mutex<Slot<T>>>,
}

/// Pending-invocation slot; holds at most one scheduled call
struct Slot<T> {
    pending: Option<Pending<T>>,
    /// Bumped on every schedule so a stale timer task cannot fire a
    /// slot that was replaced while it slept
    generation: u64,
}

struct Pending<T> {
    args: T,
    timer: CancellationToken,
    generation: u64,
}

impl<T: Send + 'static> Clone for Debouncer<T> {
    fn clone(&self) -> Self {
        Self {
            delay: self.delay,
            action: Arc::clone(&self.action),
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T: Send + 'static> Debouncer<T> {
    /// Create a debouncer with the given delay window
    ///
    /// A zero delay degrades to immediate invocation: `run` calls the
    /// action directly and nothing is ever pending.
    pub fn new(delay: Duration, action: impl Fn(T) + Send + Sync + 'static) -> Self {
        Self {
            delay,
            action: Arc::new(action),
            slot: Arc::new(Mutex::new(Slot {
                pending: None,
                generation: 0,
            })),
        }
    }

    /// Schedule the action with `args` after the delay window
    ///
    /// Replaces any previously scheduled call, resetting the window;
    /// only the last trigger's arguments survive.
    pub fn run(&self, args: T) {
        if self.delay.is_zero() {
            (self.action)(args);
            return;
        }

        // The window is measured from this call, not from when the
        // timer task first gets polled.
        let deadline = tokio::time::Instant::now() + self.delay;
        let timer = CancellationToken::new();
        let generation = {
            let mut slot = lock(&self.slot);
            if let Some(prev) = slot.pending.take() {
                prev.timer.cancel();
            }
            slot.generation = slot.generation.wrapping_add(1);
            let generation = slot.generation;
            slot.pending = Some(Pending {
                args,
                timer: timer.clone(),
                generation,
            });
            generation
        };

        let slot_handle = Arc::clone(&self.slot);
        let action = Arc::clone(&self.action);
        tokio::spawn(async move {
            tokio::select! {
                () = timer.cancelled() => {}
                () = tokio::time::sleep_until(deadline) => {
                    let fired = {
                        let mut slot = lock(&slot_handle);
                        let current = slot
                            .pending
                            .as_ref()
                            .is_some_and(|p| p.generation == generation);
                        if current { slot.pending.take() } else { None }
                    };
                    if let Some(p) = fired {
                        (action)(p.args);
                    }
                }
            }
        });
    }

    /// Cancel any pending call and invoke the action now with `args`
    pub fn flush(&self, args: T) {
        self.cancel();
        (self.action)(args);
    }

    /// Fire the pending call now with its stored arguments
    ///
    /// Returns `false` without invoking the action when nothing is
    /// pending.
    pub fn flush_pending(&self) -> bool {
        let fired = lock(&self.slot).pending.take();
        match fired {
            Some(p) => {
                p.timer.cancel();
                (self.action)(p.args);
                true
            }
            None => false,
        }
    }

    /// Discard a pending call without invoking it; idempotent
    pub fn cancel(&self) {
        if let Some(p) = lock(&self.slot).pending.take() {
            p.timer.cancel();
        }
    }

    /// Whether a scheduled-but-unfired call exists
    pub fn pending(&self) -> bool {
        lock(&self.slot).pending.is_some()
    }
}

fn lock<T>(slot: &Mutex<Slot<T>>) -> MutexGuard<'_, Slot<T>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}
