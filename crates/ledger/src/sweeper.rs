//! Background eviction of expired challenges.
//!
//! One interval task per store instead of one fire-and-forget timer per
//! token. The task is held as a `JoinHandle` so shutdown can cancel it.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, info};

use crate::ChallengeStore;

/// Periodically purges expired challenges from a [`ChallengeStore`].
pub struct ChallengeSweeper {
    store: Arc<dyn ChallengeStore>,
    period: Duration,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ChallengeSweeper {
    pub fn new(store: Arc<dyn ChallengeStore>, period: Duration) -> Self {
        Self {
            store,
            period: period.max(Duration::from_millis(100)),
            task: Mutex::new(None),
        }
    }

    /// Spawn the sweep loop. Idempotent: a second call is a no-op while a
    /// task is running.
    pub fn start(&self) {
        let mut task = self.task.lock();
        if task.is_some() {
            return;
        }

        let store = self.store.clone();
        let period = self.period;

        *task = Some(tokio::spawn(async move {
            let mut ticker = interval(period);
            loop {
                ticker.tick().await;
                let removed = store.purge_expired();
                if removed > 0 {
                    debug!("swept {removed} expired verification challenges");
                }
            }
        }));

        info!("challenge sweeper started (period {:?})", self.period);
    }

    /// Cancel the sweep loop.
    pub fn stop(&self) {
        if let Some(handle) = self.task.lock().take() {
            handle.abort();
            info!("challenge sweeper stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.lock().is_some()
    }
}

impl Drop for ChallengeSweeper {
    fn drop(&mut self) {
        if let Some(handle) = self.task.lock().take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryChallengeStore;
    use tokengate_types::{CommunityId, IdentityId};
    use tokio::time::sleep;

    #[tokio::test]
    async fn sweeper_evicts_expired_challenges() {
        let store = Arc::new(MemoryChallengeStore::with_ttl(Duration::from_millis(50)));
        store.issue(IdentityId::new("u"), CommunityId::new("c"));

        let sweeper = ChallengeSweeper::new(store.clone(), Duration::from_millis(100));
        sweeper.start();
        assert!(sweeper.is_running());

        sleep(Duration::from_millis(250)).await;
        assert_eq!(store.pending(), 0);

        sweeper.stop();
        assert!(!sweeper.is_running());
    }

    #[tokio::test]
    async fn start_twice_is_a_no_op() {
        let store = Arc::new(MemoryChallengeStore::new());
        let sweeper = ChallengeSweeper::new(store, Duration::from_millis(100));
        sweeper.start();
        sweeper.start();
        assert!(sweeper.is_running());
        sweeper.stop();
    }
}
