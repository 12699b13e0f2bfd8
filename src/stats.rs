//! Notification statistics
//!
//! Counters folded from the pipeline and delivery outcomes, exposed through
//! the control plane.

use serde::Serialize;
use tokio::sync::RwLock;

/// Counter snapshot returned by the API
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub messages_received: u64,
    pub review_events: u64,
    pub legacy_events: u64,
    pub parse_errors: u64,
    pub suppressed: u64,
    pub notifications_sent: u64,
    pub image_updates: u64,
    pub deliveries_failed: u64,
    pub devices_skipped: u64,
}

/// Shared mutable counters
pub struct NotificationStats {
    inner: RwLock<StatsSnapshot>,
}

impl NotificationStats {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(StatsSnapshot::default()),
        }
    }

    pub async fn record_received(&self) {
        self.inner.write().await.messages_received += 1;
    }

    pub async fn record_review(&self) {
        self.inner.write().await.review_events += 1;
    }

    pub async fn record_legacy(&self) {
        self.inner.write().await.legacy_events += 1;
    }

    pub async fn record_parse_error(&self) {
        self.inner.write().await.parse_errors += 1;
    }

    pub async fn record_suppressed(&self) {
        self.inner.write().await.suppressed += 1;
    }

    pub async fn record_image_update(&self) {
        self.inner.write().await.image_updates += 1;
    }

    /// Fold one fan-out outcome into the counters
    pub async fn record_dispatch(&self, sent: u64, failed: u64, skipped: u64) {
        let mut inner = self.inner.write().await;
        inner.notifications_sent += sent;
        inner.deliveries_failed += failed;
        inner.devices_skipped += skipped;
    }

    pub async fn snapshot(&self) -> StatsSnapshot {
        self.inner.read().await.clone()
    }
}

impl Default for NotificationStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_counters_accumulate() {
        let stats = NotificationStats::new();
        stats.record_received().await;
        stats.record_received().await;
        stats.record_review().await;
        stats.record_parse_error().await;
        stats.record_dispatch(3, 1, 0).await;

        let snapshot = stats.snapshot().await;
        assert_eq!(snapshot.messages_received, 2);
        assert_eq!(snapshot.review_events, 1);
        assert_eq!(snapshot.parse_errors, 1);
        assert_eq!(snapshot.notifications_sent, 3);
        assert_eq!(snapshot.deliveries_failed, 1);
    }
}
