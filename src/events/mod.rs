//! Inbound event model and wire-shape adapters
//!
//! ## Responsibilities
//!
//! - Normalize broker payloads into canonical events at the boundary
//! - Accept review fields both nested under `after` and at top level
//! - Fail closed: parse errors are surfaced, missing fields stay `None`
//!
//! Core modules (tracker, filter, composer) only ever see the canonical
//! shapes defined here, never raw JSON.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// Review severity, ordered: `Alert > Detection`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Detection,
    Alert,
}

/// Lifecycle message kind shared by review and legacy streams
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    New,
    Update,
    End,
}

/// Canonical review-segment event
#[derive(Debug, Clone)]
pub struct ReviewEvent {
    pub kind: MessageKind,
    pub review_id: String,
    pub severity: Option<Severity>,
    pub camera: Option<String>,
    /// Epoch seconds of segment start
    pub start_time: Option<f64>,
    /// Detected object labels
    pub objects: Vec<String>,
    /// Zone names the activity touched
    pub zones: Vec<String>,
    /// Detection ids grouped under this review segment
    pub detections: Vec<String>,
    pub thumb_path: Option<String>,
}

impl ReviewEvent {
    /// Image reference for notifications: the segment thumbnail when the
    /// platform provided one, otherwise a snapshot path derived from the
    /// first grouped detection.
    pub fn image_ref(&self) -> Option<String> {
        if let Some(ref thumb) = self.thumb_path {
            return Some(thumb.clone());
        }
        self.detections
            .first()
            .map(|d| format!("api/events/{}/snapshot.jpg", d))
    }
}

/// Canonical legacy per-object event
#[derive(Debug, Clone)]
pub struct LegacyEvent {
    pub kind: MessageKind,
    pub id: String,
    pub label: Option<String>,
    pub camera: Option<String>,
    pub score: Option<f64>,
    pub start_time: Option<f64>,
    pub zones: Vec<String>,
}

impl LegacyEvent {
    pub fn image_ref(&self) -> Option<String> {
        Some(format!("api/events/{}/snapshot.jpg", self.id))
    }
}

/// Review body fields as they appear on the wire (all optional; presence is
/// validated after shape selection)
#[derive(Debug, Default, Deserialize)]
struct ReviewBody {
    id: Option<String>,
    camera: Option<String>,
    severity: Option<Severity>,
    start_time: Option<f64>,
    thumb_path: Option<String>,
    #[serde(default)]
    data: ReviewData,
}

#[derive(Debug, Default, Deserialize)]
struct ReviewData {
    #[serde(default)]
    objects: Vec<String>,
    #[serde(default)]
    zones: Vec<String>,
    #[serde(default)]
    detections: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct LegacyBody {
    id: Option<String>,
    label: Option<String>,
    camera: Option<String>,
    score: Option<f64>,
    start_time: Option<f64>,
    #[serde(default)]
    current_zones: Vec<String>,
}

fn parse_kind(root: &Value) -> Result<MessageKind> {
    let kind = root
        .get("type")
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::Parse("missing message type".to_string()))?;
    match kind {
        "new" => Ok(MessageKind::New),
        "update" => Ok(MessageKind::Update),
        "end" => Ok(MessageKind::End),
        other => Err(Error::Parse(format!("unknown message type: {}", other))),
    }
}

/// Select the object carrying event fields: `after` when present, otherwise
/// the message root (both shapes occur in the wild)
fn select_body(root: &Value) -> &Value {
    match root.get("after") {
        Some(after) if after.is_object() => after,
        _ => root,
    }
}

/// Parse a raw broker payload from the review topic
pub fn parse_review(payload: &[u8]) -> Result<ReviewEvent> {
    let root: Value = serde_json::from_slice(payload)?;
    let kind = parse_kind(&root)?;
    let body: ReviewBody = serde_json::from_value(select_body(&root).clone())?;

    let review_id = body
        .id
        .ok_or_else(|| Error::Parse("review message missing id".to_string()))?;

    Ok(ReviewEvent {
        kind,
        review_id,
        severity: body.severity,
        camera: body.camera,
        start_time: body.start_time,
        objects: body.data.objects,
        zones: body.data.zones,
        detections: body.data.detections,
        thumb_path: body.thumb_path,
    })
}

/// Parse a raw broker payload from the legacy events topic
pub fn parse_legacy(payload: &[u8]) -> Result<LegacyEvent> {
    let root: Value = serde_json::from_slice(payload)?;
    let kind = parse_kind(&root)?;
    let body: LegacyBody = serde_json::from_value(select_body(&root).clone())?;

    let id = body
        .id
        .ok_or_else(|| Error::Parse("legacy event missing id".to_string()))?;

    Ok(LegacyEvent {
        kind,
        id,
        label: body.label,
        camera: body.camera,
        score: body.score,
        start_time: body.start_time,
        zones: body.current_zones,
    })
}
