//! Syncmatic - debounced, cancellable sync coordination
//!
//! Coordinates repeated "sync" runs triggered by an external change
//! stream: notifications inside the coalescing window collapse into one
//! run, a run that starts supersedes the previous one by cancelling its
//! token, and an optional leave policy vetoes host teardown while work
//! is outstanding.
//!
//! ```no_run
//! use syncmatic::{ChangeEmitter, SyncConfig, SyncManager};
//!
//! #[tokio::main]
//! async fn main() -> syncmatic::Result<()> {
//!     let changes = ChangeEmitter::new();
//!
//!     let manager = SyncManager::new(
//!         |cb| Ok(changes.subscribe(cb)),
//!         |token| async move {
//!             tokio::select! {
//!                 () = token.cancelled() => {} // superseded, stop early
//!                 () = tokio::time::sleep(std::time::Duration::from_secs(1)) => {}
//!             }
//!             Ok(())
//!         },
//!         SyncConfig { wait_ms: 100, notify_on_leave: false },
//!     )?;
//!
//!     changes.notify(); // schedules a run 100ms out
//!     manager.force_sync(); // or start it right now
//!     manager.un_sync();
//!     Ok(())
//! }
//! ```

pub mod debounce;
pub mod emitter;
pub mod error;
pub mod lifecycle;
pub mod manager;
pub mod stats;

pub use debounce::Debouncer;
pub use emitter::{ChangeCallback, ChangeEmitter, Unsubscribe};
pub use error::{Error, Result};
pub use lifecycle::{LeaveBroadcast, LeaveHandler, LeaveIntent, LeaveSurface, Unlisten};
pub use manager::{SyncConfig, SyncFn, SyncManager};
pub use stats::{SyncStats, SyncStatsCollector};

/// Cancellation token handed to each sync run, re-exported so callers
/// can name it without depending on `tokio-util` directly
pub use tokio_util::sync::CancellationToken;
