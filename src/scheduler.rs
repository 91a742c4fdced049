//! Background refresh of the article cache.
//!
//! One scheduler exists per process. `start` arms the timer at most once, and
//! a refresh that finds another one in flight is skipped rather than queued.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{error, info};

use crate::aggregator::NewsSource;
use crate::cache::CacheStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationState {
    Idle,
    Running,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Another refresh was already running
    Skipped,
    /// The cache was not stale
    Fresh,
    Refreshed(usize),
    /// Generation failed and the existing cache was kept
    Failed,
}

pub struct RefreshScheduler {
    source: Arc<dyn NewsSource>,
    cache: Arc<CacheStore>,
    interval: Duration,
    max_age: Duration,
    state: RwLock<GenerationState>,
    started: AtomicBool,
}

impl RefreshScheduler {
    pub fn new(
        source: Arc<dyn NewsSource>,
        cache: Arc<CacheStore>,
        interval: Duration,
        max_age: Duration,
    ) -> Self {
        Self {
            source,
            cache,
            // tokio intervals must have a non-zero period
            interval: interval.max(Duration::from_secs(1)),
            max_age,
            state: RwLock::new(GenerationState::Idle),
            started: AtomicBool::new(false),
        }
    }

    pub async fn is_running(&self) -> bool {
        *self.state.read().await == GenerationState::Running
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Arm the periodic refresh timer. Returns true only for the call that
    /// actually armed it.
    pub fn start(self: &Arc<Self>) -> bool {
        if self
            .started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }

        info!(
            "Starting background refresh every {} minutes",
            self.interval.as_secs() / 60
        );
        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + scheduler.interval, scheduler.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                info!("Starting scheduled refresh");
                scheduler.refresh_if_stale().await;
            }
        });
        true
    }

    /// Regenerate and save the cache if it is stale and no other refresh is
    /// running.
    pub async fn refresh_if_stale(&self) -> RefreshOutcome {
        {
            let mut state = self.state.write().await;
            if *state == GenerationState::Running {
                info!("Refresh already in progress, skipping");
                return RefreshOutcome::Skipped;
            }
            *state = GenerationState::Running;
        }

        // a panicking refresh comes back as a JoinError
        let task = tokio::spawn(do_refresh(
            Arc::clone(&self.source),
            Arc::clone(&self.cache),
            self.max_age,
        ));
        let outcome = match task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Background refresh aborted: {}", e);
                RefreshOutcome::Failed
            }
        };

        *self.state.write().await = GenerationState::Idle;
        outcome
    }
}

async fn do_refresh(
    source: Arc<dyn NewsSource>,
    cache: Arc<CacheStore>,
    max_age: Duration,
) -> RefreshOutcome {
    if !cache.is_stale(max_age).await {
        info!("Cache still fresh, skipping refresh");
        return RefreshOutcome::Fresh;
    }

    match source.generate().await {
        Ok(articles) => {
            cache.save(&articles).await;
            info!("Background refresh stored {} articles", articles.len());
            RefreshOutcome::Refreshed(articles.len())
        }
        Err(e) => {
            error!("Background refresh failed, keeping existing cache: {}", e);
            RefreshOutcome::Failed
        }
    }
}
