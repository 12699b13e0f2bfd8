//! Application state
//!
//! Holds all shared components and state

use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;

use crate::broker::ConnectionState;
use crate::config_store::ConfigStore;
use crate::cooldown::CooldownGate;
use crate::device_directory::DeviceDirectory;
use crate::dispatch::Dispatcher;
use crate::review_tracker::ReviewTracker;
use crate::stats::NotificationStats;

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Directory for persisted devices and filter config
    pub data_dir: PathBuf,
    /// MQTT broker host
    pub mqtt_host: String,
    /// MQTT broker port
    pub mqtt_port: u16,
    /// MQTT credentials
    pub mqtt_username: Option<String>,
    pub mqtt_password: Option<String>,
    /// MQTT client id
    pub mqtt_client_id: String,
    /// Topic carrying grouped review messages
    pub review_topic: String,
    /// Topic carrying legacy per-object events
    pub legacy_topic: String,
    /// Expo push API endpoint
    pub expo_endpoint: String,
    /// FCM proxy endpoint (FCM-style tokens are skipped when unset)
    pub fcm_proxy_url: Option<String>,
    /// Bearer token for the FCM proxy
    pub fcm_proxy_token: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8099),
            data_dir: std::env::var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("/var/lib/camnotify")),
            mqtt_host: std::env::var("MQTT_HOST").unwrap_or_else(|_| "localhost".to_string()),
            mqtt_port: std::env::var("MQTT_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(1883),
            mqtt_username: std::env::var("MQTT_USERNAME").ok(),
            mqtt_password: std::env::var("MQTT_PASSWORD").ok(),
            mqtt_client_id: std::env::var("MQTT_CLIENT_ID")
                .unwrap_or_else(|_| "camnotify".to_string()),
            review_topic: std::env::var("REVIEW_TOPIC")
                .unwrap_or_else(|_| "frigate/reviews".to_string()),
            legacy_topic: std::env::var("LEGACY_TOPIC")
                .unwrap_or_else(|_| "frigate/events".to_string()),
            expo_endpoint: std::env::var("EXPO_PUSH_URL")
                .unwrap_or_else(|_| "https://exp.host/--/api/v2/push/send".to_string()),
            fcm_proxy_url: std::env::var("FCM_PROXY_URL").ok(),
            fcm_proxy_token: std::env::var("FCM_PROXY_TOKEN").ok(),
        }
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Application config
    pub config: AppConfig,
    /// Runtime filter configuration (SSoT)
    pub config_store: Arc<ConfigStore>,
    /// Registered devices
    pub devices: Arc<DeviceDirectory>,
    /// Review segment tracking
    pub tracker: Arc<ReviewTracker>,
    /// Legacy-event dedup gate
    pub cooldown: Arc<CooldownGate>,
    /// Push delivery fan-out
    pub dispatcher: Arc<Dispatcher>,
    /// Pipeline/delivery counters
    pub stats: Arc<NotificationStats>,
    /// Broker connection signal
    pub broker_state: watch::Receiver<ConnectionState>,
    /// Process start time for uptime reporting
    pub started_at: DateTime<Utc>,
}
