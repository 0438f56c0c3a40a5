//! Change notifier implementation.

use crate::event::FlagChanged;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Listener error.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Listener failed: {0}")]
    ListenerFailed(String),
}

/// Handle returned by [`InProcessNotifier::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Receives change events.
#[async_trait]
pub trait ChangeListener: Send + Sync {
    async fn on_change(&self, event: &FlagChanged) -> Result<(), NotifyError>;
}

/// Publish hook invoked on every flag mutation.
///
/// Implementations bridge to whatever transport carries invalidations to
/// other service instances; [`InProcessNotifier`] fans out within one
/// process.
#[async_trait]
pub trait ChangeNotifier: Send + Sync {
    /// Publish an event to all listeners. Best-effort: listener failures
    /// are logged and do not propagate.
    async fn publish(&self, event: FlagChanged);

    /// Register a listener.
    fn subscribe(&self, listener: Arc<dyn ChangeListener>) -> SubscriptionId;

    /// Remove a previously registered listener.
    fn unsubscribe(&self, id: SubscriptionId);
}

/// In-process fanout notifier.
#[derive(Clone, Default)]
pub struct InProcessNotifier {
    listeners: Arc<DashMap<u64, Arc<dyn ChangeListener>>>,
    next_id: Arc<AtomicU64>,
}

impl InProcessNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

#[async_trait]
impl ChangeNotifier for InProcessNotifier {
    async fn publish(&self, event: FlagChanged) {
        debug!(
            flag = %event.flag_name,
            operation = ?event.operation,
            "publishing flag change"
        );

        let listeners: Vec<Arc<dyn ChangeListener>> = self
            .listeners
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        for listener in listeners {
            if let Err(e) = listener.on_change(&event).await {
                warn!(flag = %event.flag_name, error = %e, "change listener failed");
            }
        }
    }

    fn subscribe(&self, listener: Arc<dyn ChangeListener>) -> SubscriptionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.insert(id, listener);
        SubscriptionId(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.listeners.remove(&id.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::FlagOperation;
    use std::sync::atomic::AtomicU32;

    struct CountingListener {
        seen: AtomicU32,
    }

    #[async_trait]
    impl ChangeListener for Arc<CountingListener> {
        async fn on_change(&self, _event: &FlagChanged) -> Result<(), NotifyError> {
            self.seen.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FailingListener;

    #[async_trait]
    impl ChangeListener for FailingListener {
        async fn on_change(&self, _event: &FlagChanged) -> Result<(), NotifyError> {
            Err(NotifyError::ListenerFailed("boom".to_string()))
        }
    }

    #[tokio::test]
    async fn test_publish_reaches_listeners() {
        let notifier = InProcessNotifier::new();
        let listener = Arc::new(CountingListener {
            seen: AtomicU32::new(0),
        });
        notifier.subscribe(Arc::new(listener.clone()));

        notifier
            .publish(FlagChanged::new("new-ui", FlagOperation::Updated))
            .await;
        notifier
            .publish(FlagChanged::new("new-ui", FlagOperation::Deleted))
            .await;

        assert_eq!(listener.seen.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failing_listener_does_not_block_others() {
        let notifier = InProcessNotifier::new();
        notifier.subscribe(Arc::new(FailingListener));

        let listener = Arc::new(CountingListener {
            seen: AtomicU32::new(0),
        });
        notifier.subscribe(Arc::new(listener.clone()));

        notifier
            .publish(FlagChanged::new("new-ui", FlagOperation::Created))
            .await;

        assert_eq!(listener.seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unsubscribe() {
        let notifier = InProcessNotifier::new();
        let listener = Arc::new(CountingListener {
            seen: AtomicU32::new(0),
        });
        let id = notifier.subscribe(Arc::new(listener.clone()));
        assert_eq!(notifier.listener_count(), 1);

        notifier.unsubscribe(id);
        assert_eq!(notifier.listener_count(), 0);

        notifier
            .publish(FlagChanged::new("new-ui", FlagOperation::Updated))
            .await;
        assert_eq!(listener.seen.load(Ordering::SeqCst), 0);
    }
}
