//! End-to-end pipeline tests with a mock delivery path

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use camnotify::composer::Notification;
use camnotify::config_store::{ConfigRepository, ConfigStore};
use camnotify::cooldown::CooldownGate;
use camnotify::device_directory::{
    Device, DeviceDirectory, DeviceRepository, RegisterDeviceRequest,
};
use camnotify::dispatch::{Dispatcher, PushSender};
use camnotify::pipeline::Pipeline;
use camnotify::review_tracker::ReviewTracker;
use camnotify::stats::NotificationStats;

const REVIEW_TOPIC: &str = "frigate/reviews";
const LEGACY_TOPIC: &str = "frigate/events";

/// Records every delivered notification
struct RecordingSender {
    delivered: Mutex<Vec<(String, Notification)>>,
}

impl RecordingSender {
    fn new() -> Self {
        Self {
            delivered: Mutex::new(Vec::new()),
        }
    }

    fn delivered(&self) -> Vec<(String, Notification)> {
        self.delivered.lock().unwrap().clone()
    }
}

#[async_trait]
impl PushSender for RecordingSender {
    async fn send(&self, device: &Device, notification: &Notification) -> camnotify::Result<()> {
        self.delivered
            .lock()
            .unwrap()
            .push((device.push_token.clone(), notification.clone()));
        Ok(())
    }
}

struct Harness {
    pipeline: Pipeline,
    sender: Arc<RecordingSender>,
    stats: Arc<NotificationStats>,
    _data_dir: tempfile::TempDir,
}

async fn harness() -> Harness {
    let data_dir = tempfile::tempdir().unwrap();

    let config_store = Arc::new(
        ConfigStore::new(ConfigRepository::new(data_dir.path().join("filters.json")))
            .await
            .unwrap(),
    );
    let devices = Arc::new(
        DeviceDirectory::new(DeviceRepository::new(data_dir.path().join("devices.json")))
            .await
            .unwrap(),
    );
    devices
        .register(RegisterDeviceRequest {
            push_token: "ExponentPushToken[phone-1]".to_string(),
            templates: None,
        })
        .await
        .unwrap();

    let sender = Arc::new(RecordingSender::new());
    let dispatcher = Arc::new(Dispatcher::new(sender.clone(), sender.clone()));
    let stats = Arc::new(NotificationStats::new());

    let pipeline = Pipeline::new(
        REVIEW_TOPIC.to_string(),
        LEGACY_TOPIC.to_string(),
        config_store,
        Arc::new(ReviewTracker::new()),
        Arc::new(CooldownGate::new()),
        devices,
        dispatcher,
        stats.clone(),
    );

    Harness {
        pipeline,
        sender,
        stats,
        _data_dir: data_dir,
    }
}

async fn feed(harness: &Harness, topic: &str, payload: &str) {
    if let Some(handle) = harness.pipeline.process(topic, payload.as_bytes()).await {
        handle.await.unwrap();
    }
}

#[tokio::test]
async fn review_lifecycle_dispatches_once_then_updates_in_place() {
    let harness = harness().await;

    // Detection appears: tracked, nothing delivered
    feed(
        &harness,
        REVIEW_TOPIC,
        r#"{"type":"new","after":{"id":"R1","camera":"front_door","severity":"detection",
            "start_time":1718073600.0,
            "data":{"objects":["person"],"zones":["porch"],"detections":[]}}}"#,
    )
    .await;
    assert!(harness.sender.delivered().is_empty());

    // Escalates to alert: exactly one notification
    feed(
        &harness,
        REVIEW_TOPIC,
        r#"{"type":"update","after":{"id":"R1","camera":"front_door","severity":"alert",
            "start_time":1718073600.0,
            "data":{"objects":["person"],"zones":["porch"],"detections":[]}}}"#,
    )
    .await;
    let delivered = harness.sender.delivered();
    assert_eq!(delivered.len(), 1);
    let (token, notification) = &delivered[0];
    assert_eq!(token, "ExponentPushToken[phone-1]");
    assert_eq!(notification.title, "Person detected on front door");
    assert_eq!(notification.tag, "review_R1_alert");
    assert!(!notification.is_image_update);

    // Better image arrives: re-delivered into the same slot
    feed(
        &harness,
        REVIEW_TOPIC,
        r#"{"type":"update","after":{"id":"R1","camera":"front_door","severity":"alert",
            "thumb_path":"/clips/review/thumb-r1.webp",
            "data":{"objects":["person"],"zones":["porch"],"detections":[]}}}"#,
    )
    .await;
    let delivered = harness.sender.delivered();
    assert_eq!(delivered.len(), 2);
    let (_, update) = &delivered[1];
    assert!(update.is_image_update);
    assert_eq!(update.tag, "review_R1_alert");
    assert_eq!(update.image_url.as_deref(), Some("/clips/review/thumb-r1.webp"));

    // Segment ends: nothing delivered, tracking cleared
    feed(&harness, REVIEW_TOPIC, r#"{"type":"end","after":{"id":"R1"}}"#).await;
    assert_eq!(harness.sender.delivered().len(), 2);

    // Same id after end is fresh and re-triggers
    feed(
        &harness,
        REVIEW_TOPIC,
        r#"{"type":"new","after":{"id":"R1","camera":"front_door","severity":"alert",
            "data":{"objects":["person"],"zones":[],"detections":[]}}}"#,
    )
    .await;
    assert_eq!(harness.sender.delivered().len(), 3);

    let stats = harness.stats.snapshot().await;
    assert_eq!(stats.review_events, 5);
    assert_eq!(stats.notifications_sent, 3);
    assert_eq!(stats.image_updates, 1);
    assert_eq!(stats.deliveries_failed, 0);
}

#[tokio::test]
async fn duplicate_alert_updates_are_idempotent() {
    let harness = harness().await;
    let payload = r#"{"type":"new","after":{"id":"R2","camera":"yard","severity":"alert",
        "thumb_path":"/clips/t.webp",
        "data":{"objects":["dog"],"zones":[],"detections":[]}}}"#;

    feed(&harness, REVIEW_TOPIC, payload).await;
    feed(&harness, REVIEW_TOPIC, payload).await;
    let update = payload.replace("\"type\":\"new\"", "\"type\":\"update\"");
    feed(&harness, REVIEW_TOPIC, &update).await;

    assert_eq!(harness.sender.delivered().len(), 1);
}

#[tokio::test]
async fn legacy_events_respect_cooldown_window() {
    let harness = harness().await;
    let payload = r#"{"type":"new","after":{"id":"E1","label":"person","camera":"back_yard",
        "score":0.91,"start_time":1718073600.0,"current_zones":["lawn"]}}"#;

    feed(&harness, LEGACY_TOPIC, payload).await;
    // Identical event inside the window is suppressed
    let repeat = payload.replace("E1", "E2");
    feed(&harness, LEGACY_TOPIC, &repeat).await;

    let delivered = harness.sender.delivered();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].1.tag, "event_E1");
    assert_eq!(delivered[0].1.body, "Motion in lawn at 02:40:00 11-06-2024");

    let stats = harness.stats.snapshot().await;
    assert_eq!(stats.legacy_events, 2);
    assert_eq!(stats.suppressed, 1);
}

#[tokio::test]
async fn legacy_update_and_end_are_ignored() {
    let harness = harness().await;
    let update = r#"{"type":"update","after":{"id":"E1","label":"person","camera":"back_yard"}}"#;
    let end = r#"{"type":"end","after":{"id":"E1","label":"person","camera":"back_yard"}}"#;

    feed(&harness, LEGACY_TOPIC, update).await;
    feed(&harness, LEGACY_TOPIC, end).await;

    assert!(harness.sender.delivered().is_empty());
}

#[tokio::test]
async fn malformed_payloads_are_discarded_without_state_change() {
    let harness = harness().await;

    feed(&harness, REVIEW_TOPIC, "{ not json").await;
    feed(&harness, REVIEW_TOPIC, r#"{"type":"new","after":{"camera":"no-id"}}"#).await;
    feed(&harness, LEGACY_TOPIC, "[]").await;

    assert!(harness.sender.delivered().is_empty());
    let stats = harness.stats.snapshot().await;
    assert_eq!(stats.parse_errors, 3);
    assert_eq!(stats.messages_received, 3);

    // The stream keeps working afterwards
    feed(
        &harness,
        REVIEW_TOPIC,
        r#"{"type":"new","after":{"id":"R9","camera":"front","severity":"alert",
            "data":{"objects":["person"],"zones":[],"detections":[]}}}"#,
    )
    .await;
    assert_eq!(harness.sender.delivered().len(), 1);
}

#[tokio::test]
async fn messages_on_unknown_topics_are_ignored() {
    let harness = harness().await;
    feed(&harness, "frigate/stats", r#"{"cameras":{}}"#).await;
    assert!(harness.sender.delivered().is_empty());
    assert_eq!(harness.stats.snapshot().await.messages_received, 1);
}
