//! Gradual rollout worker.

use crate::error::{SchedulerError, SchedulerResult};
use aperture_core::{Clock, FlagStatus, RolloutStrategy};
use aperture_events::{ChangeNotifier, FlagChanged, FlagOperation};
use aperture_store::FlagStore;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Interval between recompute passes
    pub tick_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(3600),
        }
    }
}

/// Bookkeeping from the most recent tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickStats {
    /// Total ticks executed
    pub ticks: u64,
    /// Flags inspected during the last tick
    pub flags_checked: u64,
    /// Flags whose percentage was persisted during the last tick
    pub flags_updated: u64,
    /// Flags skipped due to per-flag failures during the last tick
    pub failures: u64,
    /// When the last tick ran
    pub last_tick: Option<DateTime<Utc>>,
}

/// Periodic worker that advances gradual rollouts.
///
/// Exactly one instance runs per process. Ticks are serialized (a slow
/// pass delays the next one rather than overlapping it) and a failure on
/// one flag never stops the walk over the rest.
pub struct GradualRolloutScheduler {
    store: Arc<dyn FlagStore>,
    notifier: Arc<dyn ChangeNotifier>,
    clock: Arc<dyn Clock>,
    config: SchedulerConfig,
    running: Arc<RwLock<bool>>,
    tick_lock: Arc<Mutex<()>>,
    stats: Arc<RwLock<TickStats>>,
    handle: Option<JoinHandle<()>>,
}

impl GradualRolloutScheduler {
    pub fn new(
        store: Arc<dyn FlagStore>,
        notifier: Arc<dyn ChangeNotifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self::with_config(store, notifier, clock, SchedulerConfig::default())
    }

    pub fn with_config(
        store: Arc<dyn FlagStore>,
        notifier: Arc<dyn ChangeNotifier>,
        clock: Arc<dyn Clock>,
        config: SchedulerConfig,
    ) -> Self {
        debug!(interval = ?config.tick_interval, "initializing gradual rollout scheduler");
        Self {
            store,
            notifier,
            clock,
            config,
            running: Arc::new(RwLock::new(false)),
            tick_lock: Arc::new(Mutex::new(())),
            stats: Arc::new(RwLock::new(TickStats::default())),
            handle: None,
        }
    }

    /// Start the periodic worker.
    pub async fn start(&mut self) -> SchedulerResult<()> {
        let mut running = self.running.write().await;
        if *running {
            return Err(SchedulerError::AlreadyRunning);
        }
        *running = true;
        drop(running);

        info!("gradual rollout scheduler started");

        let store = self.store.clone();
        let notifier = self.notifier.clone();
        let clock = self.clock.clone();
        let running = self.running.clone();
        let tick_lock = self.tick_lock.clone();
        let stats = self.stats.clone();
        let interval = self.config.tick_interval;

        let handle = tokio::spawn(async move {
            while *running.read().await {
                Self::tick(&store, &notifier, &clock, &tick_lock, &stats).await;
                tokio::time::sleep(interval).await;
            }
        });

        self.handle = Some(handle);
        Ok(())
    }

    /// Stop the worker. The current tick, if any, is abandoned.
    pub async fn stop(&mut self) -> SchedulerResult<()> {
        let mut running = self.running.write().await;
        if !*running {
            return Err(SchedulerError::NotRunning);
        }
        *running = false;
        drop(running);

        if let Some(handle) = self.handle.take() {
            handle.abort();
        }

        info!("gradual rollout scheduler stopped");
        Ok(())
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    /// Stats from the most recent tick.
    pub async fn stats(&self) -> TickStats {
        self.stats.read().await.clone()
    }

    /// Run one recompute pass immediately. Shares the tick lock with the
    /// periodic worker, so manual and scheduled passes never overlap.
    pub async fn run_once(&self) -> TickStats {
        Self::tick(
            &self.store,
            &self.notifier,
            &self.clock,
            &self.tick_lock,
            &self.stats,
        )
        .await;
        self.stats.read().await.clone()
    }

    async fn tick(
        store: &Arc<dyn FlagStore>,
        notifier: &Arc<dyn ChangeNotifier>,
        clock: &Arc<dyn Clock>,
        tick_lock: &Arc<Mutex<()>>,
        stats: &Arc<RwLock<TickStats>>,
    ) {
        let _guard = tick_lock.lock().await;
        let now = clock.now();

        let keys = match store.list_keys("").await {
            Ok(keys) => keys,
            Err(e) => {
                warn!(error = %e, "scheduler could not list flags");
                let mut stats = stats.write().await;
                stats.ticks += 1;
                stats.flags_checked = 0;
                stats.flags_updated = 0;
                stats.failures = 1;
                stats.last_tick = Some(now);
                return;
            }
        };

        let mut checked = 0;
        let mut updated = 0;
        let mut failures = 0;

        for key in keys {
            match Self::advance_flag(store, notifier, now, &key).await {
                Ok(advanced) => {
                    checked += 1;
                    if advanced {
                        updated += 1;
                    }
                }
                Err(e) => {
                    warn!(flag = %key, error = %e, "gradual rollout update failed");
                    failures += 1;
                }
            }
        }

        debug!(checked, updated, failures, "gradual rollout tick complete");

        let mut stats = stats.write().await;
        stats.ticks += 1;
        stats.flags_checked = checked;
        stats.flags_updated = updated;
        stats.failures = failures;
        stats.last_tick = Some(now);
    }

    /// Recompute one flag's percentage. Returns whether a new value was
    /// persisted.
    async fn advance_flag(
        store: &Arc<dyn FlagStore>,
        notifier: &Arc<dyn ChangeNotifier>,
        now: DateTime<Utc>,
        name: &str,
    ) -> SchedulerResult<bool> {
        let Some(mut flag) = store
            .get(name)
            .await
            .map_err(|e| SchedulerError::Store(e.to_string()))?
        else {
            return Ok(false);
        };

        if flag.status != FlagStatus::Active
            || flag.rollout.strategy != RolloutStrategy::Gradual
        {
            return Ok(false);
        }

        let Some(effective) = flag.rollout.gradual_percentage_at(now) else {
            return Ok(false);
        };

        let current = flag.rollout.percentage.unwrap_or(0.0);
        if (effective - current).abs() < 1e-9 {
            return Ok(false);
        }

        flag.rollout.percentage = Some(effective);
        flag.updated_at = now;
        store
            .put(flag)
            .await
            .map_err(|e| SchedulerError::Store(e.to_string()))?;

        notifier
            .publish(FlagChanged::new(name, FlagOperation::Updated))
            .await;

        info!(flag = %name, percentage = effective, "advanced gradual rollout");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aperture_core::{FeatureFlag, ManualClock, RolloutConfig};
    use aperture_events::InProcessNotifier;
    use aperture_store::{InMemoryFlagStore, StoreError, StoreResult};
    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;

    fn fixture(
        clock_start: DateTime<Utc>,
    ) -> (
        Arc<InMemoryFlagStore>,
        Arc<InProcessNotifier>,
        Arc<ManualClock>,
        GradualRolloutScheduler,
    ) {
        let store = Arc::new(InMemoryFlagStore::new());
        let notifier = Arc::new(InProcessNotifier::new());
        let clock = Arc::new(ManualClock::new(clock_start));
        let scheduler = GradualRolloutScheduler::new(
            store.clone(),
            notifier.clone(),
            clock.clone(),
        );
        (store, notifier, clock, scheduler)
    }

    #[tokio::test]
    async fn test_tick_advances_gradual_flags() {
        let now = Utc::now();
        let (store, _notifier, _clock, scheduler) = fixture(now);

        let flag = FeatureFlag::boolean("ramp", false)
            .with_rollout(RolloutConfig::gradual(now - ChronoDuration::days(5), 10.0));
        store.put(flag).await.unwrap();

        let stats = scheduler.run_once().await;
        assert_eq!(stats.flags_checked, 1);
        assert_eq!(stats.flags_updated, 1);
        assert_eq!(stats.failures, 0);

        let stored = store.get("ramp").await.unwrap().unwrap();
        assert_eq!(stored.rollout.percentage, Some(50.0));
    }

    #[tokio::test]
    async fn test_tick_is_idempotent_until_time_moves() {
        let now = Utc::now();
        let (store, _notifier, clock, scheduler) = fixture(now);

        let flag = FeatureFlag::boolean("ramp", false)
            .with_rollout(RolloutConfig::gradual(now - ChronoDuration::days(5), 10.0));
        store.put(flag).await.unwrap();

        scheduler.run_once().await;
        let stats = scheduler.run_once().await;
        assert_eq!(stats.flags_updated, 0);

        clock.advance(ChronoDuration::days(1));
        let stats = scheduler.run_once().await;
        assert_eq!(stats.flags_updated, 1);

        let stored = store.get("ramp").await.unwrap().unwrap();
        assert_eq!(stored.rollout.percentage, Some(60.0));
    }

    #[tokio::test]
    async fn test_caps_at_100() {
        let now = Utc::now();
        let (store, _notifier, _clock, scheduler) = fixture(now);

        let flag = FeatureFlag::boolean("done", false)
            .with_rollout(RolloutConfig::gradual(now - ChronoDuration::days(30), 10.0));
        store.put(flag).await.unwrap();

        scheduler.run_once().await;
        let stored = store.get("done").await.unwrap().unwrap();
        assert_eq!(stored.rollout.percentage, Some(100.0));
    }

    #[tokio::test]
    async fn test_non_gradual_and_inactive_flags_untouched() {
        let now = Utc::now();
        let (store, _notifier, _clock, scheduler) = fixture(now);

        store
            .put(FeatureFlag::boolean("plain", false))
            .await
            .unwrap();
        let inactive = FeatureFlag::boolean("paused", false)
            .with_status(aperture_core::FlagStatus::Inactive)
            .with_rollout(RolloutConfig::gradual(now - ChronoDuration::days(5), 10.0));
        store.put(inactive).await.unwrap();

        let stats = scheduler.run_once().await;
        assert_eq!(stats.flags_checked, 2);
        assert_eq!(stats.flags_updated, 0);

        let paused = store.get("paused").await.unwrap().unwrap();
        assert_eq!(paused.rollout.percentage, Some(0.0));
    }

    #[tokio::test]
    async fn test_update_publishes_change_event() {
        let now = Utc::now();
        let (store, notifier, _clock, scheduler) = fixture(now);

        struct SeenListener(std::sync::atomic::AtomicU32);

        #[async_trait]
        impl aperture_events::ChangeListener for SeenListener {
            async fn on_change(
                &self,
                event: &FlagChanged,
            ) -> Result<(), aperture_events::NotifyError> {
                assert_eq!(event.operation, FlagOperation::Updated);
                self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                Ok(())
            }
        }

        let listener = Arc::new(SeenListener(std::sync::atomic::AtomicU32::new(0)));
        notifier.subscribe(listener.clone());

        let flag = FeatureFlag::boolean("ramp", false)
            .with_rollout(RolloutConfig::gradual(now - ChronoDuration::days(3), 10.0));
        store.put(flag).await.unwrap();

        scheduler.run_once().await;
        assert_eq!(listener.0.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_per_flag_failure_does_not_stop_the_walk() {
        // Store that fails reads for one poisoned flag name.
        struct PoisonedStore {
            inner: InMemoryFlagStore,
            poisoned: String,
        }

        #[async_trait]
        impl FlagStore for PoisonedStore {
            async fn get(&self, name: &str) -> StoreResult<Option<FeatureFlag>> {
                if name == self.poisoned {
                    return Err(StoreError::Unavailable("poisoned".to_string()));
                }
                self.inner.get(name).await
            }

            async fn put(&self, flag: FeatureFlag) -> StoreResult<()> {
                self.inner.put(flag).await
            }

            async fn delete(&self, name: &str) -> StoreResult<bool> {
                self.inner.delete(name).await
            }

            async fn list_keys(&self, prefix: &str) -> StoreResult<Vec<String>> {
                self.inner.list_keys(prefix).await
            }
        }

        let now = Utc::now();
        let inner = InMemoryFlagStore::new();
        inner
            .put(
                FeatureFlag::boolean("bad", false)
                    .with_rollout(RolloutConfig::gradual(now - ChronoDuration::days(1), 10.0)),
            )
            .await
            .unwrap();
        inner
            .put(
                FeatureFlag::boolean("good", false)
                    .with_rollout(RolloutConfig::gradual(now - ChronoDuration::days(2), 10.0)),
            )
            .await
            .unwrap();

        let store: Arc<dyn FlagStore> = Arc::new(PoisonedStore {
            inner: inner.clone(),
            poisoned: "bad".to_string(),
        });
        let scheduler = GradualRolloutScheduler::new(
            store,
            Arc::new(InProcessNotifier::new()),
            Arc::new(ManualClock::new(now)),
        );

        let stats = scheduler.run_once().await;
        assert_eq!(stats.failures, 1);
        assert_eq!(stats.flags_updated, 1);

        let good = inner.get("good").await.unwrap().unwrap();
        assert_eq!(good.rollout.percentage, Some(20.0));
    }

    #[tokio::test]
    async fn test_start_stop() {
        let now = Utc::now();
        let (_store, _notifier, _clock, mut scheduler) = fixture(now);

        assert!(!scheduler.is_running().await);
        scheduler.start().await.unwrap();
        assert!(scheduler.is_running().await);
        assert!(matches!(
            scheduler.start().await,
            Err(SchedulerError::AlreadyRunning)
        ));

        scheduler.stop().await.unwrap();
        assert!(!scheduler.is_running().await);
        assert!(matches!(
            scheduler.stop().await,
            Err(SchedulerError::NotRunning)
        ));
    }
}
