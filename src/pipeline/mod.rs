//! Notification pipeline
//!
//! The central loop wiring broker messages through filtering, the review
//! tracker, composition and dispatch. One message is processed at a time in
//! arrival order; delivery fan-out is spawned so it never blocks the inbound
//! path, and its outcome only feeds statistics.

use chrono::Utc;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::broker::InboundMessage;
use crate::composer::{compose, EventContext};
use crate::config_store::ConfigStore;
use crate::cooldown::CooldownGate;
use crate::device_directory::DeviceDirectory;
use crate::dispatch::Dispatcher;
use crate::events::{self, MessageKind, Severity};
use crate::review_tracker::{NotificationDecision, ReviewTracker};
use crate::stats::NotificationStats;

/// Pipeline instance
pub struct Pipeline {
    review_topic: String,
    legacy_topic: String,
    config_store: Arc<ConfigStore>,
    tracker: Arc<ReviewTracker>,
    cooldown: Arc<CooldownGate>,
    devices: Arc<DeviceDirectory>,
    dispatcher: Arc<Dispatcher>,
    stats: Arc<NotificationStats>,
}

impl Pipeline {
    pub fn new(
        review_topic: String,
        legacy_topic: String,
        config_store: Arc<ConfigStore>,
        tracker: Arc<ReviewTracker>,
        cooldown: Arc<CooldownGate>,
        devices: Arc<DeviceDirectory>,
        dispatcher: Arc<Dispatcher>,
        stats: Arc<NotificationStats>,
    ) -> Self {
        Self {
            review_topic,
            legacy_topic,
            config_store,
            tracker,
            cooldown,
            devices,
            dispatcher,
            stats,
        }
    }

    /// Consume the broker stream until it closes
    pub async fn run(&self, mut inbound: mpsc::Receiver<InboundMessage>) {
        tracing::info!(
            review_topic = %self.review_topic,
            legacy_topic = %self.legacy_topic,
            "Pipeline started"
        );
        while let Some(message) = inbound.recv().await {
            self.process(&message.topic, &message.payload).await;
        }
        tracing::info!("Broker stream closed, pipeline stopped");
    }

    /// Process one raw message; returns the spawned dispatch task, if any
    pub async fn process(&self, topic: &str, payload: &[u8]) -> Option<JoinHandle<()>> {
        self.stats.record_received().await;

        if topic == self.review_topic {
            self.handle_review(payload).await
        } else if topic == self.legacy_topic {
            self.handle_legacy(payload).await
        } else {
            tracing::debug!(topic = %topic, "Ignoring message on unexpected topic");
            None
        }
    }

    async fn handle_review(&self, payload: &[u8]) -> Option<JoinHandle<()>> {
        let event = match events::parse_review(payload) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, "Discarding malformed review message");
                self.stats.record_parse_error().await;
                return None;
            }
        };
        self.stats.record_review().await;

        let filter = self.config_store.snapshot().await;
        let decision = self.tracker.handle(&event, &filter).await;

        match decision {
            NotificationDecision::Suppressed => {
                self.stats.record_suppressed().await;
                None
            }
            NotificationDecision::SilentTrackingUpdate | NotificationDecision::Cleanup => None,
            _ => {
                if decision == NotificationDecision::UpdateImageOnly {
                    self.stats.record_image_update().await;
                }
                let context = EventContext::from_review(&event);
                Some(self.spawn_dispatch(decision, context).await)
            }
        }
    }

    async fn handle_legacy(&self, payload: &[u8]) -> Option<JoinHandle<()>> {
        let event = match events::parse_legacy(payload) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, "Discarding malformed legacy event");
                self.stats.record_parse_error().await;
                return None;
            }
        };
        self.stats.record_legacy().await;

        // Only `new` legacy messages notify; update/end carry no grouping
        // and would duplicate
        if event.kind != MessageKind::New {
            return None;
        }

        let filter = self.config_store.snapshot().await;
        let labels: Vec<String> = event.label.clone().into_iter().collect();
        // Legacy flat events predate severities and dispatch at high
        // priority, so they filter as alerts
        if !filter.allows(Some(Severity::Alert), event.camera.as_deref(), &labels) {
            self.stats.record_suppressed().await;
            return None;
        }

        let camera = event.camera.clone().unwrap_or_default();
        let label = event.label.clone().unwrap_or_default();
        let now = Utc::now();
        if self
            .cooldown
            .should_suppress(&camera, &label, now, filter.cooldown_seconds)
            .await
        {
            tracing::debug!(camera = %camera, label = %label, "Legacy event inside cooldown window");
            self.stats.record_suppressed().await;
            return None;
        }
        self.cooldown.record_sent(&camera, &label, now).await;

        let context = EventContext::from_legacy(&event);
        Some(self.spawn_dispatch(NotificationDecision::SendNew, context).await)
    }

    /// Compose per-device payloads and spawn the delivery fan-out
    async fn spawn_dispatch(
        &self,
        decision: NotificationDecision,
        context: EventContext,
    ) -> JoinHandle<()> {
        let devices = self.devices.list_all().await;
        let batch: Vec<_> = devices
            .into_iter()
            .filter_map(|device| {
                compose(decision, &context, &device.templates)
                    .map(|notification| (device, notification))
            })
            .collect();

        let dispatcher = self.dispatcher.clone();
        let stats = self.stats.clone();
        tokio::spawn(async move {
            if batch.is_empty() {
                return;
            }
            let outcome = dispatcher.dispatch_batch(batch).await;
            stats
                .record_dispatch(outcome.sent, outcome.failed, outcome.skipped)
                .await;
        })
    }
}
