//! camnotify
//!
//! Bridges a home-security camera platform's MQTT event stream to mobile
//! push notifications.
//!
//! ## Architecture
//!
//! 1. Broker - MQTT subscription, raw `(topic, payload)` stream
//! 2. Events - wire-shape adapters into canonical review/legacy events
//! 3. ConfigStore - runtime filter settings (SSoT)
//! 4. FilterConfig - pure allow/reject predicate
//! 5. ReviewTracker - review lifecycle state machine, send decisions
//! 6. CooldownGate - legacy-event dedup window
//! 7. Composer - per-device template rendering into payloads
//! 8. Dispatcher - Expo/FCM fan-out with per-device outcomes
//! 9. DeviceDirectory - registered devices + persistence
//! 10. Pipeline - the loop wiring 1-9 together
//! 11. WebAPI - registration and runtime-config control plane
//!
//! ## Design Principles
//!
//! - Normalize at the boundary: core logic never sees raw JSON or MQTT types
//! - Fail closed: incomplete events are never dispatched
//! - Best-effort delivery: failures are counted, never retried or retracted

pub mod broker;
pub mod composer;
pub mod config_store;
pub mod cooldown;
pub mod device_directory;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod filter;
pub mod models;
pub mod pipeline;
pub mod review_tracker;
pub mod state;
pub mod stats;
pub mod web_api;

pub use error::{Error, Result};
pub use state::AppState;
