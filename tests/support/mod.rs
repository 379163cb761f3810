//! Shared wiring for the coordinator integration tests

use futures::future::BoxFuture;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;
use syncmatic::CancellationToken;

static INIT: Once = Once::new();

/// Install the test tracing subscriber once per process
pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Let spawned timer and settlement tasks observe advanced time
pub async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}

/// Records every invocation of the sync action and the token it was
/// handed
#[derive(Default)]
pub struct SyncProbe {
    pub calls: Arc<AtomicUsize>,
    pub tokens: Arc<Mutex<Vec<CancellationToken>>>,
}

impl SyncProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sync action that records its token, then takes `duration` of
    /// virtual time to settle with `outcome`
    pub fn action(
        &self,
        duration: Duration,
        outcome: fn() -> syncmatic::Result<()>,
    ) -> impl Fn(CancellationToken) -> BoxFuture<'static, syncmatic::Result<()>> + Send + Sync + 'static
    {
        let calls = Arc::clone(&self.calls);
        let tokens = Arc::clone(&self.tokens);
        move |token| {
            calls.fetch_add(1, Ordering::SeqCst);
            tokens.lock().unwrap().push(token);
            Box::pin(async move {
                if !duration.is_zero() {
                    tokio::time::sleep(duration).await;
                }
                outcome()
            })
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn token(&self, index: usize) -> CancellationToken {
        self.tokens.lock().unwrap()[index].clone()
    }
}
