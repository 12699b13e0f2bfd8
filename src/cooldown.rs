//! Cooldown gate for the legacy event path
//!
//! Suppresses repeat notifications for the same (camera, label) pair inside
//! a configurable window. Keys are stored as tuples, so camera or label
//! values containing separator-like characters cannot collide. The map holds
//! one entry per distinct pair ever seen, which is bounded by camera count
//! times the label vocabulary.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Tracks last-notified times per (camera, label)
pub struct CooldownGate {
    last_sent: RwLock<HashMap<(String, String), DateTime<Utc>>>,
}

impl CooldownGate {
    pub fn new() -> Self {
        Self {
            last_sent: RwLock::new(HashMap::new()),
        }
    }

    /// Whether a notification for this pair should be suppressed at `now`
    pub async fn should_suppress(
        &self,
        camera: &str,
        label: &str,
        now: DateTime<Utc>,
        cooldown_seconds: u64,
    ) -> bool {
        if cooldown_seconds == 0 {
            return false;
        }
        let last_sent = self.last_sent.read().await;
        match last_sent.get(&(camera.to_string(), label.to_string())) {
            Some(last) => {
                let elapsed = now.signed_duration_since(*last);
                elapsed < chrono::Duration::seconds(cooldown_seconds as i64)
            }
            None => false,
        }
    }

    /// Record a dispatched notification for this pair
    pub async fn record_sent(&self, camera: &str, label: &str, now: DateTime<Utc>) {
        self.last_sent
            .write()
            .await
            .insert((camera.to_string(), label.to_string()), now);
    }

    /// Number of tracked pairs
    pub async fn tracked_pairs(&self) -> usize {
        self.last_sent.read().await.len()
    }
}

impl Default for CooldownGate {
    fn default() -> Self {
        Self::new()
    }
}
