//! Notification Composer
//!
//! Turns a tracker decision plus event data into a provider-agnostic
//! notification payload. Titles and bodies come from per-device templates
//! with placeholder substitution; recognized placeholders are `{label}`,
//! `{camera}`, `{zones}`, `{time}` and `{score}`, anything else is left
//! verbatim.

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::device_directory::DeviceTemplates;
use crate::events::{LegacyEvent, ReviewEvent};
use crate::review_tracker::NotificationDecision;

/// Notification priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Normal,
}

/// Provider-agnostic notification payload
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub image_url: Option<String>,
    /// Collapse/tag id: repeated sends for the same logical event replace
    /// each other on-device instead of stacking
    pub tag: String,
    pub priority: Priority,
    /// Signals the delivery layer to reuse the existing notification slot
    pub is_image_update: bool,
    /// Deep-link data for the mobile app
    pub data: serde_json::Value,
}

/// Normalized event data the composer renders from
#[derive(Debug, Clone)]
pub struct EventContext {
    pub event_id: String,
    pub camera: Option<String>,
    pub labels: Vec<String>,
    pub zones: Vec<String>,
    /// Epoch seconds
    pub start_time: Option<f64>,
    /// Review-derived events carry no score
    pub score: Option<f64>,
    pub image_ref: Option<String>,
    pub source: EventSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventSource {
    Review,
    Legacy,
}

impl EventContext {
    pub fn from_review(event: &ReviewEvent) -> Self {
        Self {
            event_id: event.review_id.clone(),
            camera: event.camera.clone(),
            labels: event.objects.clone(),
            zones: event.zones.clone(),
            start_time: event.start_time,
            score: None,
            image_ref: event.image_ref(),
            source: EventSource::Review,
        }
    }

    pub fn from_legacy(event: &LegacyEvent) -> Self {
        Self {
            event_id: event.id.clone(),
            camera: event.camera.clone(),
            labels: event.label.clone().into_iter().collect(),
            zones: event.zones.clone(),
            start_time: event.start_time,
            score: event.score,
            image_ref: event.image_ref(),
            source: EventSource::Legacy,
        }
    }

    /// Deterministic collapse id derived from the event id
    pub fn tag(&self) -> String {
        match self.source {
            EventSource::Review => format!("review_{}_alert", self.event_id),
            EventSource::Legacy => format!("event_{}", self.event_id),
        }
    }

    fn label_text(&self) -> String {
        if self.labels.is_empty() {
            return "Activity".to_string();
        }
        self.labels
            .iter()
            .map(|l| capitalize(l))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn camera_text(&self) -> String {
        self.camera
            .as_deref()
            .unwrap_or_default()
            .replace('_', " ")
    }

    fn zones_text(&self) -> String {
        self.zones.join(", ")
    }

    fn time_text(&self) -> String {
        let Some(epoch) = self.start_time else {
            return String::new();
        };
        match DateTime::from_timestamp(epoch as i64, 0) {
            Some(dt) => dt.format("%H:%M:%S %d-%m-%Y").to_string(),
            None => String::new(),
        }
    }

    fn score_text(&self) -> String {
        match self.score {
            Some(score) => format!("{}%", (score * 100.0).round() as i64),
            None => String::new(),
        }
    }

    /// Substitute recognized placeholders; unknown ones stay verbatim
    fn render(&self, template: &str) -> String {
        template
            .replace("{label}", &self.label_text())
            .replace("{camera}", &self.camera_text())
            .replace("{zones}", &self.zones_text())
            .replace("{time}", &self.time_text())
            .replace("{score}", &self.score_text())
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Compose a notification for a dispatch-worthy decision
///
/// Returns `None` for `Suppressed`, `SilentTrackingUpdate` and `Cleanup`.
pub fn compose(
    decision: NotificationDecision,
    context: &EventContext,
    templates: &DeviceTemplates,
) -> Option<Notification> {
    if !decision.dispatches() {
        return None;
    }

    let kind = match context.source {
        EventSource::Review => "review",
        EventSource::Legacy => "event",
    };

    Some(Notification {
        title: context.render(&templates.title_template),
        body: context.render(&templates.body_template),
        image_url: context.image_ref.clone(),
        tag: context.tag(),
        priority: Priority::High,
        is_image_update: decision == NotificationDecision::UpdateImageOnly,
        data: json!({
            "id": context.event_id,
            "camera": context.camera,
            "kind": kind,
        }),
    })
}
