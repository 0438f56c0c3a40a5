//! Flag service facade.
//!
//! One `FeatureFlagService` is constructed at process startup and handed
//! to every caller (API handlers, scheduler, CLI); there is no global
//! singleton. Administrative mutations validate, persist, publish a
//! change event, and invalidate the local cache. Evaluation is a pure
//! read path: store I/O is bounded by a timeout, failures degrade to a
//! cached or default answer, and usage recording is fire-and-forget.

use crate::bucketing::{bucket, random_bucket};
use crate::cache::{CacheStats, EvaluationCache, DEFAULT_CACHE_TTL};
use crate::rollout::RolloutEvaluator;
use crate::variants::VariantSelector;
use aperture_analytics::{AnalyticsRecorder, AnalyticsStore, FlagAnalytics, InMemoryAnalyticsStore};
use aperture_core::{
    validate_flag, Clock, EvaluationReason, FeatureFlag, FlagError, FlagEvaluation, FlagResult,
    FlagStatus, FlagValue, SystemClock, UsageRecord, UserContext,
};
use aperture_events::{
    ChangeListener, ChangeNotifier, FlagChanged, FlagOperation, InProcessNotifier, NotifyError,
};
use aperture_store::{FlagStore, StoreError};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Service tuning knobs.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Evaluation cache entry lifetime
    pub cache_ttl: Duration,

    /// Deadline for store reads on the evaluation path
    pub store_timeout: Duration,

    /// Record a usage entry for every evaluation
    pub record_usage: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            cache_ttl: DEFAULT_CACHE_TTL,
            store_timeout: Duration::from_secs(2),
            record_usage: true,
        }
    }
}

/// Filter for [`FeatureFlagService::list_flags`].
#[derive(Debug, Clone, Default)]
pub struct FlagFilter {
    pub status: Option<FlagStatus>,
    pub tag: Option<String>,
    pub environment: Option<String>,
    pub name_prefix: Option<String>,
}

impl FlagFilter {
    pub fn matches(&self, flag: &FeatureFlag) -> bool {
        if let Some(status) = self.status {
            if flag.status != status {
                return false;
            }
        }
        if let Some(tag) = &self.tag {
            if !flag.tags.iter().any(|t| t == tag) {
                return false;
            }
        }
        if let Some(environment) = &self.environment {
            if !flag.environments.contains(environment) {
                return false;
            }
        }
        true
    }
}

/// Invalidate cached evaluations when a change event arrives, locally
/// published or relayed from another instance.
struct CacheInvalidator {
    cache: Arc<EvaluationCache>,
}

#[async_trait]
impl ChangeListener for CacheInvalidator {
    async fn on_change(&self, event: &FlagChanged) -> Result<(), NotifyError> {
        let removed = self.cache.invalidate_flag(&event.flag_name);
        debug!(
            flag = %event.flag_name,
            removed,
            "invalidated cached evaluations"
        );
        Ok(())
    }
}

/// Builder wiring the service's collaborators.
pub struct FeatureFlagServiceBuilder {
    store: Arc<dyn FlagStore>,
    notifier: Option<Arc<dyn ChangeNotifier>>,
    analytics_store: Option<Arc<dyn AnalyticsStore>>,
    clock: Option<Arc<dyn Clock>>,
    config: ServiceConfig,
}

impl FeatureFlagServiceBuilder {
    pub fn new(store: Arc<dyn FlagStore>) -> Self {
        Self {
            store,
            notifier: None,
            analytics_store: None,
            clock: None,
            config: ServiceConfig::default(),
        }
    }

    /// Use a custom change notifier (e.g. one bridged to an external
    /// pub/sub transport).
    pub fn notifier(mut self, notifier: Arc<dyn ChangeNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Use a custom usage log backend.
    pub fn analytics_store(mut self, store: Arc<dyn AnalyticsStore>) -> Self {
        self.analytics_store = Some(store);
        self
    }

    /// Use a custom time source.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn config(mut self, config: ServiceConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> FeatureFlagService {
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let notifier = self
            .notifier
            .unwrap_or_else(|| Arc::new(InProcessNotifier::new()));
        let analytics_store = self
            .analytics_store
            .unwrap_or_else(|| Arc::new(InMemoryAnalyticsStore::new()));

        let cache = Arc::new(EvaluationCache::new(clock.clone(), self.config.cache_ttl));
        notifier.subscribe(Arc::new(CacheInvalidator {
            cache: cache.clone(),
        }));

        FeatureFlagService {
            inner: Arc::new(ServiceInner {
                store: self.store,
                cache,
                notifier,
                recorder: AnalyticsRecorder::new(analytics_store),
                clock,
                config: self.config,
            }),
        }
    }
}

struct ServiceInner {
    store: Arc<dyn FlagStore>,
    cache: Arc<EvaluationCache>,
    notifier: Arc<dyn ChangeNotifier>,
    recorder: AnalyticsRecorder,
    clock: Arc<dyn Clock>,
    config: ServiceConfig,
}

/// Thread-safe flag service; cheap to clone and share.
#[derive(Clone)]
pub struct FeatureFlagService {
    inner: Arc<ServiceInner>,
}

impl FeatureFlagService {
    /// Start building a service around a flag store.
    pub fn builder(store: Arc<dyn FlagStore>) -> FeatureFlagServiceBuilder {
        FeatureFlagServiceBuilder::new(store)
    }

    /// Service with default collaborators.
    pub fn new(store: Arc<dyn FlagStore>) -> Self {
        Self::builder(store).build()
    }

    /// The store this service persists to.
    pub fn store(&self) -> Arc<dyn FlagStore> {
        self.inner.store.clone()
    }

    /// The notifier mutations publish to.
    pub fn notifier(&self) -> Arc<dyn ChangeNotifier> {
        self.inner.notifier.clone()
    }

    /// Evaluation cache counters.
    pub fn cache_stats(&self) -> CacheStats {
        self.inner.cache.stats()
    }

    // ========== Administration ==========

    /// Create a flag.
    ///
    /// Validates the definition and stamps the audit timestamps. Returns
    /// the stored flag.
    pub async fn create_flag(&self, mut flag: FeatureFlag) -> FlagResult<FeatureFlag> {
        validate_flag(&flag)?;

        let now = self.inner.clock.now();
        flag.created_at = now;
        flag.updated_at = now;

        self.inner
            .store
            .put(flag.clone())
            .await
            .map_err(store_error)?;
        self.publish(&flag.name, FlagOperation::Created).await;
        Ok(flag)
    }

    /// Replace a flag definition (full-field update, last write wins).
    ///
    /// Creation metadata is preserved from the stored flag.
    pub async fn update_flag(&self, mut flag: FeatureFlag) -> FlagResult<FeatureFlag> {
        validate_flag(&flag)?;

        let existing = self
            .inner
            .store
            .get(&flag.name)
            .await
            .map_err(store_error)?
            .ok_or_else(|| FlagError::NotFound(flag.name.clone()))?;

        flag.created_at = existing.created_at;
        flag.created_by = existing.created_by;
        flag.updated_at = self.inner.clock.now();

        self.inner
            .store
            .put(flag.clone())
            .await
            .map_err(store_error)?;
        self.publish(&flag.name, FlagOperation::Updated).await;
        Ok(flag)
    }

    /// Delete a flag. Returns whether it existed.
    pub async fn delete_flag(&self, name: &str) -> FlagResult<bool> {
        let deleted = self.inner.store.delete(name).await.map_err(store_error)?;
        if deleted {
            self.publish(name, FlagOperation::Deleted).await;
        }
        Ok(deleted)
    }

    /// Fetch a flag definition.
    pub async fn get_flag(&self, name: &str) -> FlagResult<FeatureFlag> {
        self.inner
            .store
            .get(name)
            .await
            .map_err(store_error)?
            .ok_or_else(|| FlagError::NotFound(name.to_string()))
    }

    /// List flag definitions matching a filter.
    pub async fn list_flags(&self, filter: &FlagFilter) -> FlagResult<Vec<FeatureFlag>> {
        let prefix = filter.name_prefix.as_deref().unwrap_or("");
        let keys = self
            .inner
            .store
            .list_keys(prefix)
            .await
            .map_err(store_error)?;

        let mut flags = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(flag) = self.inner.store.get(&key).await.map_err(store_error)? {
                if filter.matches(&flag) {
                    flags.push(flag);
                }
            }
        }
        Ok(flags)
    }

    // ========== Evaluation ==========

    /// Evaluate a flag for a context in an environment.
    ///
    /// Never fails: a missing flag or unreachable store degrades to a
    /// disabled result with the matching reason code.
    pub async fn evaluate(
        &self,
        flag_name: &str,
        ctx: &UserContext,
        environment: &str,
    ) -> FlagEvaluation {
        self.evaluate_with_default(flag_name, ctx, environment, FlagValue::Bool(false))
            .await
    }

    /// Evaluate with a caller-supplied fallback value, returned when the
    /// flag does not exist or the store cannot be reached.
    pub async fn evaluate_with_default(
        &self,
        flag_name: &str,
        ctx: &UserContext,
        environment: &str,
        default: FlagValue,
    ) -> FlagEvaluation {
        let key = EvaluationCache::key(flag_name, ctx.user_id.as_deref(), environment);

        if let Some(cached) = self.inner.cache.get(&key) {
            self.spawn_usage(&cached, ctx, environment);
            return cached;
        }

        let fetched = tokio::time::timeout(
            self.inner.config.store_timeout,
            self.inner.store.get(flag_name),
        )
        .await;

        let now = self.inner.clock.now();
        let evaluation = match fetched {
            Ok(Ok(Some(flag))) => self.evaluate_flag(&flag, ctx, environment),
            Ok(Ok(None)) => FlagEvaluation::disabled(
                flag_name,
                default,
                EvaluationReason::FlagNotFound,
                now,
            ),
            Ok(Err(e)) => self.store_fallback(flag_name, &key, default, &e.to_string()),
            Err(_) => self.store_fallback(flag_name, &key, default, "timed out"),
        };

        // Transient failures and not-found results carry caller-specific
        // defaults; only real evaluations are worth a TTL.
        if evaluation.reason != EvaluationReason::StoreUnavailable
            && evaluation.reason != EvaluationReason::FlagNotFound
        {
            self.inner.cache.insert(key, evaluation.clone());
        }

        self.spawn_usage(&evaluation, ctx, environment);
        evaluation
    }

    /// Manually record a usage outcome (e.g. from an edge cache that
    /// evaluated locally). Failures are logged, never surfaced.
    pub async fn track_usage(
        &self,
        flag_name: &str,
        user_id: Option<String>,
        enabled: bool,
        variant: Option<String>,
        environment: &str,
        metadata: Option<serde_json::Value>,
    ) {
        let record = UsageRecord {
            flag_name: flag_name.to_string(),
            user_id,
            enabled,
            variant,
            environment: environment.to_string(),
            timestamp: self.inner.clock.now(),
            metadata,
        };

        if let Err(e) = self.inner.recorder.record(record).await {
            warn!(flag = flag_name, error = %e, "failed to track usage");
        }
    }

    /// Aggregate usage for a flag over an inclusive day range.
    pub async fn analytics(
        &self,
        flag_name: &str,
        from: NaiveDate,
        to: NaiveDate,
        environment: Option<&str>,
    ) -> FlagResult<FlagAnalytics> {
        self.inner
            .recorder
            .analytics(flag_name, from, to, environment)
            .await
            .map_err(|e| FlagError::Analytics(e.to_string()))
    }

    // ========== Internals ==========

    fn evaluate_flag(
        &self,
        flag: &FeatureFlag,
        ctx: &UserContext,
        environment: &str,
    ) -> FlagEvaluation {
        let now = self.inner.clock.now();
        let decision = RolloutEvaluator::evaluate(flag, ctx, environment, now);

        if !decision.enabled {
            return FlagEvaluation::disabled(
                &flag.name,
                flag.default_value.clone(),
                decision.reason,
                now,
            );
        }

        let (variant, value) = if flag.variants.is_empty() {
            (None, FlagValue::Bool(true))
        } else {
            // Reuse the rollout bucket so enablement and variant move
            // together; strategies that never bucketed get one now.
            let user_bucket = decision.bucket.unwrap_or_else(|| {
                match ctx.user_id.as_deref() {
                    Some(user_id) => bucket(&flag.name, user_id),
                    None => random_bucket(),
                }
            });
            match VariantSelector::select(&flag.variants, user_bucket) {
                Some(variant) => (Some(variant.name.clone()), variant.value.clone()),
                None => (None, FlagValue::Bool(true)),
            }
        };

        FlagEvaluation {
            flag_name: flag.name.clone(),
            enabled: true,
            variant,
            value,
            reason: decision.reason,
            evaluated_at: now,
        }
    }

    fn store_fallback(
        &self,
        flag_name: &str,
        key: &str,
        default: FlagValue,
        error: &str,
    ) -> FlagEvaluation {
        warn!(flag = flag_name, error, "store unavailable during evaluation");
        let now = self.inner.clock.now();

        match self.inner.cache.get_stale(key) {
            Some(stale) => FlagEvaluation {
                reason: EvaluationReason::StoreUnavailable,
                evaluated_at: now,
                ..stale
            },
            None => FlagEvaluation::disabled(
                flag_name,
                default,
                EvaluationReason::StoreUnavailable,
                now,
            ),
        }
    }

    fn spawn_usage(&self, evaluation: &FlagEvaluation, ctx: &UserContext, environment: &str) {
        if !self.inner.config.record_usage {
            return;
        }

        let recorder = self.inner.recorder.clone();
        let record = UsageRecord {
            flag_name: evaluation.flag_name.clone(),
            user_id: ctx.user_id.clone(),
            enabled: evaluation.enabled,
            variant: evaluation.variant.clone(),
            environment: environment.to_string(),
            timestamp: self.inner.clock.now(),
            metadata: None,
        };

        tokio::spawn(async move {
            if let Err(e) = recorder.record(record).await {
                warn!(error = %e, "failed to record usage");
            }
        });
    }

    async fn publish(&self, flag_name: &str, operation: FlagOperation) {
        self.inner
            .notifier
            .publish(FlagChanged::new(flag_name, operation))
            .await;
    }
}

fn store_error(e: StoreError) -> FlagError {
    FlagError::StoreUnavailable(e.to_string())
}
