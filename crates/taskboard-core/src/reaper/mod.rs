use std::time::Duration;

use tokio::{
    task::JoinHandle,
    time::{Instant, MissedTickBehavior, interval_at},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};

use crate::{error::StoreError, state::TaskStateStore};

/// Periodic cleanup of aged completed/failed tasks.
///
/// Takes the same write lock as any other writer, so a tick may wait behind
/// in-flight saves.
pub struct Reaper {
    store: TaskStateStore,
    interval: Duration,
    max_age: Duration,
}

impl Reaper {
    pub fn new(store: TaskStateStore, interval: Duration, max_age: Duration) -> Self {
        Self {
            store,
            interval,
            max_age,
        }
    }

    /// Reaper using the interval and max age from the store's config.
    pub fn from_store(store: TaskStateStore) -> Self {
        let interval = store.config().reap_interval;
        let max_age = store.config().max_completed_age;
        Self::new(store, interval, max_age)
    }

    /// Start the loop on the current tokio runtime.
    ///
    /// Panics outside a runtime, and on a zero interval.
    pub fn spawn(self) -> ReaperHandle {
        let token = CancellationToken::new();
        let join = tokio::spawn(self.run(token.clone()));
        ReaperHandle {
            token,
            join: Some(join),
        }
    }

    /// Run until `token` is cancelled. The first pass happens one interval after start.
    pub async fn run(self, token: CancellationToken) {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval = ?self.interval, max_age = ?self.max_age, "task reaper started");

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => self.reap_once(),
            }
        }
        info!("task reaper stopped");
    }

    fn reap_once(&self) {
        match self.store.cleanup_older_than(self.max_age) {
            Ok(0) => trace!("reaper pass found nothing to evict"),
            Ok(removed) => debug!(removed, "reaper pass evicted aged tasks"),
            Err(e) => error!("reaper pass failed: {}", e),
        }
    }
}

/// Owner of a running [`Reaper`].
///
/// Dropping the handle cancels the reaper without waiting for it.
pub struct ReaperHandle {
    token: CancellationToken,
    join: Option<JoinHandle<()>>,
}

impl ReaperHandle {
    #[inline]
    pub fn cancel(&self) {
        self.token.cancel();
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn is_finished(&self) -> bool {
        self.join.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Cancel the reaper and wait for its loop to exit.
    pub async fn shutdown(mut self) -> Result<(), StoreError> {
        self.token.cancel();
        if let Some(join) = self.join.take() {
            join.await?;
        }
        Ok(())
    }
}

impl Drop for ReaperHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
