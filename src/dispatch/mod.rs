//! Delivery Dispatcher
//!
//! Routes composed notifications to the correct push delivery path per
//! device token kind and fans out across devices concurrently. A failure or
//! timeout on one device never affects the others; outcomes are collected
//! per device and folded into statistics by the caller.

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use crate::composer::{Notification, Priority};
use crate::device_directory::Device;
use crate::error::{Error, Result};

/// Push token kind, classified by shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushTokenKind {
    Expo,
    Fcm,
}

impl PushTokenKind {
    /// Classify a raw token; `None` means the shape is unrecognized and the
    /// device is skipped for delivery
    pub fn classify(token: &str) -> Option<Self> {
        let token = token.trim();
        if token.starts_with("ExponentPushToken[") || token.starts_with("ExpoPushToken[") {
            return Some(PushTokenKind::Expo);
        }
        // FCM registration tokens are long opaque strings, typically with a
        // colon-separated instance-id prefix
        if token.contains(':') || token.len() >= 100 {
            return Some(PushTokenKind::Fcm);
        }
        None
    }
}

/// Delivery path boundary: one implementation per provider, mocked in tests
#[async_trait]
pub trait PushSender: Send + Sync {
    async fn send(&self, device: &Device, notification: &Notification) -> Result<()>;
}

/// Expo push API sender
pub struct ExpoSender {
    client: reqwest::Client,
    endpoint: String,
}

impl ExpoSender {
    pub fn new(endpoint: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
        }
    }
}

#[async_trait]
impl PushSender for ExpoSender {
    async fn send(&self, device: &Device, notification: &Notification) -> Result<()> {
        let mut data = notification.data.clone();
        if let Some(obj) = data.as_object_mut() {
            obj.insert("tag".to_string(), json!(notification.tag));
            obj.insert("isImageUpdate".to_string(), json!(notification.is_image_update));
            if let Some(ref image) = notification.image_url {
                obj.insert("image".to_string(), json!(image));
            }
        }

        let body = json!({
            "to": device.push_token,
            "title": notification.title,
            "body": notification.body,
            "priority": match notification.priority {
                Priority::High => "high",
                Priority::Normal => "default",
            },
            "channelId": "camera-alerts",
            "data": data,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::Delivery(format!(
                "expo push rejected: {}",
                response.status()
            )));
        }
        Ok(())
    }
}

/// FCM-style sender delivering through a configured proxy
pub struct FcmProxySender {
    client: reqwest::Client,
    proxy_url: String,
    auth_token: Option<String>,
}

impl FcmProxySender {
    pub fn new(proxy_url: String, auth_token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            proxy_url,
            auth_token,
        }
    }
}

#[async_trait]
impl PushSender for FcmProxySender {
    async fn send(&self, device: &Device, notification: &Notification) -> Result<()> {
        let body = json!({
            "token": device.push_token,
            "notification": {
                "title": notification.title,
                "body": notification.body,
                "image": notification.image_url,
            },
            "android": {
                "priority": match notification.priority {
                    Priority::High => "high",
                    Priority::Normal => "normal",
                },
                "notification": {
                    "tag": notification.tag,
                },
            },
            "data": notification.data,
        });

        let mut request = self.client.post(&self.proxy_url).json(&body);
        if let Some(ref token) = self.auth_token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;

        if !response.status().is_success() {
            return Err(Error::Delivery(format!(
                "fcm proxy rejected: {}",
                response.status()
            )));
        }
        Ok(())
    }
}

/// Sender for a delivery path that is not configured; every send fails and
/// is counted, devices on other paths are unaffected
pub struct DisabledSender {
    reason: &'static str,
}

impl DisabledSender {
    pub fn new(reason: &'static str) -> Self {
        Self { reason }
    }
}

#[async_trait]
impl PushSender for DisabledSender {
    async fn send(&self, _device: &Device, _notification: &Notification) -> Result<()> {
        Err(Error::Delivery(self.reason.to_string()))
    }
}

/// Per-batch delivery outcome
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub sent: u64,
    pub failed: u64,
    pub skipped: u64,
}

/// Fans composed notifications out to all registered devices
pub struct Dispatcher {
    expo: Arc<dyn PushSender>,
    fcm: Arc<dyn PushSender>,
    timeout: Duration,
}

impl Dispatcher {
    pub fn new(expo: Arc<dyn PushSender>, fcm: Arc<dyn PushSender>) -> Self {
        Self {
            expo,
            fcm,
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Deliver per-device notifications concurrently
    ///
    /// Each send is bounded by the dispatcher timeout. Per-device failures
    /// are logged and counted, never propagated. Notifications are composed
    /// per device upstream because templates are per-device.
    pub async fn dispatch_batch(
        &self,
        batch: Vec<(Device, Notification)>,
    ) -> DispatchOutcome {
        let mut handles = Vec::with_capacity(batch.len());
        let mut outcome = DispatchOutcome::default();

        for (device, notification) in batch {
            let sender = match PushTokenKind::classify(&device.push_token) {
                Some(PushTokenKind::Expo) => self.expo.clone(),
                Some(PushTokenKind::Fcm) => self.fcm.clone(),
                None => {
                    tracing::warn!(
                        device_id = %device.device_id,
                        "Unrecognized push token shape, skipping device"
                    );
                    outcome.skipped += 1;
                    continue;
                }
            };

            let timeout = self.timeout;
            handles.push(tokio::spawn(async move {
                let result =
                    tokio::time::timeout(timeout, sender.send(&device, &notification)).await;
                match result {
                    Ok(Ok(())) => {
                        tracing::debug!(device_id = %device.device_id, tag = %notification.tag, "Notification delivered");
                        Ok(())
                    }
                    Ok(Err(e)) => {
                        tracing::warn!(device_id = %device.device_id, error = %e, "Notification delivery failed");
                        Err(())
                    }
                    Err(_) => {
                        tracing::warn!(device_id = %device.device_id, "Notification delivery timed out");
                        Err(())
                    }
                }
            }));
        }

        for handle in handles {
            match handle.await {
                Ok(Ok(())) => outcome.sent += 1,
                _ => outcome.failed += 1,
            }
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device_directory::DeviceTemplates;
    use crate::review_tracker::NotificationDecision;
    use chrono::Utc;
    use std::sync::atomic::{AtomicU64, Ordering};

    struct MockSender {
        calls: AtomicU64,
        fail_tokens: Vec<String>,
    }

    impl MockSender {
        fn new() -> Self {
            Self {
                calls: AtomicU64::new(0),
                fail_tokens: vec![],
            }
        }

        fn failing_on(token: &str) -> Self {
            Self {
                calls: AtomicU64::new(0),
                fail_tokens: vec![token.to_string()],
            }
        }
    }

    #[async_trait]
    impl PushSender for MockSender {
        async fn send(&self, device: &Device, _notification: &Notification) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_tokens.contains(&device.push_token) {
                return Err(Error::Delivery("mock failure".to_string()));
            }
            Ok(())
        }
    }

    fn device(token: &str) -> Device {
        Device {
            device_id: format!("dev-{}", token.len()),
            push_token: token.to_string(),
            templates: DeviceTemplates::default(),
            registered_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn notification() -> Notification {
        crate::composer::compose(
            NotificationDecision::SendNew,
            &crate::composer::EventContext {
                event_id: "r1".to_string(),
                camera: Some("front".to_string()),
                labels: vec!["person".to_string()],
                zones: vec![],
                start_time: None,
                score: None,
                image_ref: None,
                source: crate::composer::EventSource::Review,
            },
            &DeviceTemplates::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_token_classification() {
        assert_eq!(
            PushTokenKind::classify("ExponentPushToken[abc123]"),
            Some(PushTokenKind::Expo)
        );
        assert_eq!(
            PushTokenKind::classify("dGVzdA:APA91bEXAMPLETOKEN"),
            Some(PushTokenKind::Fcm)
        );
        assert_eq!(PushTokenKind::classify(&"x".repeat(120)), Some(PushTokenKind::Fcm));
        assert_eq!(PushTokenKind::classify("short-token"), None);
    }

    #[tokio::test]
    async fn test_fan_out_counts_sent() {
        let expo = Arc::new(MockSender::new());
        let fcm = Arc::new(MockSender::new());
        let dispatcher = Dispatcher::new(expo.clone(), fcm.clone());

        let batch = vec![
            (device("ExponentPushToken[a]"), notification()),
            (device("abc:APA91longfcmtoken"), notification()),
        ];
        let outcome = dispatcher.dispatch_batch(batch).await;

        assert_eq!(outcome.sent, 2);
        assert_eq!(outcome.failed, 0);
        assert_eq!(expo.calls.load(Ordering::SeqCst), 1);
        assert_eq!(fcm.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_one_failure_does_not_block_others() {
        let expo = Arc::new(MockSender::failing_on("ExponentPushToken[bad]"));
        let fcm = Arc::new(MockSender::new());
        let dispatcher = Dispatcher::new(expo, fcm);

        let batch = vec![
            (device("ExponentPushToken[bad]"), notification()),
            (device("ExponentPushToken[good]"), notification()),
        ];
        let outcome = dispatcher.dispatch_batch(batch).await;

        assert_eq!(outcome.sent, 1);
        assert_eq!(outcome.failed, 1);
    }

    #[tokio::test]
    async fn test_unknown_token_skipped() {
        let dispatcher = Dispatcher::new(Arc::new(MockSender::new()), Arc::new(MockSender::new()));
        let outcome = dispatcher
            .dispatch_batch(vec![(device("bogus"), notification())])
            .await;

        assert_eq!(outcome.sent, 0);
        assert_eq!(outcome.skipped, 1);
    }
}
