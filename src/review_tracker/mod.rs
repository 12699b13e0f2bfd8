//! Review Tracker
//!
//! Tracks each review segment through its `new -> update -> end` lifecycle
//! and decides when a notification must be dispatched, updated in place, or
//! suppressed. Only transitions notify; duplicate broker deliveries of the
//! same message are no-ops.
//!
//! ## States per review id
//!
//! - Untracked (no entry)
//! - Tracked detection, unnotified
//! - Tracked alert, notified
//!
//! The notified flag is monotonic: once a notification went out for an id,
//! nothing un-sets it until `end` removes the entry. Downgrades
//! (alert -> detection) never retract a sent notification. Tracking state is
//! in-memory only and lost on restart.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::events::{MessageKind, ReviewEvent, Severity};
use crate::filter::FilterConfig;

/// Outcome of a tracker transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationDecision {
    /// No dispatch: filtered out, downgraded, or no meaningful change
    Suppressed,
    /// First notification for this review id
    SendNew,
    /// A tracked detection escalated to alert (or a missed `new` was
    /// recovered from an alert `update`)
    SendEscalation,
    /// Re-dispatch with a better image into the same notification slot
    UpdateImageOnly,
    /// Tracked state changed but nothing is dispatched
    SilentTrackingUpdate,
    /// The segment ended and its entry was removed
    Cleanup,
}

impl NotificationDecision {
    /// Whether this decision produces a device dispatch
    pub fn dispatches(&self) -> bool {
        matches!(
            self,
            NotificationDecision::SendNew
                | NotificationDecision::SendEscalation
                | NotificationDecision::UpdateImageOnly
        )
    }
}

/// Tracked state for one review segment
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedReview {
    pub severity: Severity,
    pub image_ref: Option<String>,
    pub notified: bool,
    pub last_seen_at: DateTime<Utc>,
}

/// Maps review-segment ids to tracked state and drives send decisions
pub struct ReviewTracker {
    tracked: RwLock<HashMap<String, TrackedReview>>,
}

impl ReviewTracker {
    pub fn new() -> Self {
        Self {
            tracked: RwLock::new(HashMap::new()),
        }
    }

    /// Apply one review message and return the dispatch decision
    ///
    /// The write lock is held across the whole read-modify-write, so
    /// per-id transitions are atomic even if messages arrive concurrently.
    pub async fn handle(
        &self,
        event: &ReviewEvent,
        filter: &FilterConfig,
    ) -> NotificationDecision {
        let mut tracked = self.tracked.write().await;
        let now = Utc::now();

        match event.kind {
            MessageKind::New => {
                // A `new` for an id already in the map is a duplicate or
                // reordered delivery; route it through the update logic so
                // the notified flag stays monotonic.
                if tracked.contains_key(&event.review_id) {
                    Self::apply_update(&mut tracked, event, filter, now)
                } else {
                    Self::apply_new(&mut tracked, event, filter, now)
                }
            }
            MessageKind::Update => Self::apply_update(&mut tracked, event, filter, now),
            MessageKind::End => {
                if tracked.remove(&event.review_id).is_some() {
                    tracing::debug!(review_id = %event.review_id, "Review segment ended, tracking cleared");
                    NotificationDecision::Cleanup
                } else {
                    NotificationDecision::Suppressed
                }
            }
        }
    }

    fn apply_new(
        tracked: &mut HashMap<String, TrackedReview>,
        event: &ReviewEvent,
        filter: &FilterConfig,
        now: DateTime<Utc>,
    ) -> NotificationDecision {
        let passes = filter.allows(event.severity, event.camera.as_deref(), &event.objects);

        let Some(severity) = event.severity else {
            // No severity, nothing worth tracking
            return NotificationDecision::Suppressed;
        };

        if !passes {
            // Still track the segment unnotified so a later escalation that
            // passes filters can be recognized
            tracked.insert(
                event.review_id.clone(),
                TrackedReview {
                    severity,
                    image_ref: event.image_ref(),
                    notified: false,
                    last_seen_at: now,
                },
            );
            return NotificationDecision::Suppressed;
        }

        match severity {
            Severity::Alert => {
                tracked.insert(
                    event.review_id.clone(),
                    TrackedReview {
                        severity: Severity::Alert,
                        image_ref: event.image_ref(),
                        notified: true,
                        last_seen_at: now,
                    },
                );
                tracing::info!(
                    review_id = %event.review_id,
                    camera = ?event.camera,
                    "New alert review, dispatching notification"
                );
                NotificationDecision::SendNew
            }
            Severity::Detection => {
                tracked.insert(
                    event.review_id.clone(),
                    TrackedReview {
                        severity: Severity::Detection,
                        image_ref: event.image_ref(),
                        notified: false,
                        last_seen_at: now,
                    },
                );
                NotificationDecision::SilentTrackingUpdate
            }
        }
    }

    fn apply_update(
        tracked: &mut HashMap<String, TrackedReview>,
        event: &ReviewEvent,
        filter: &FilterConfig,
        now: DateTime<Utc>,
    ) -> NotificationDecision {
        let Some(entry) = tracked.get_mut(&event.review_id) else {
            // Failsafe for a dropped or out-of-order `new`: an alert update
            // that passes filters notifies immediately. Anything else is not
            // tracked, since the prior state is unknown.
            if event.severity == Some(Severity::Alert)
                && filter.allows(event.severity, event.camera.as_deref(), &event.objects)
            {
                tracked.insert(
                    event.review_id.clone(),
                    TrackedReview {
                        severity: Severity::Alert,
                        image_ref: event.image_ref(),
                        notified: true,
                        last_seen_at: now,
                    },
                );
                tracing::warn!(
                    review_id = %event.review_id,
                    "Alert update for untracked review, dispatching as escalation"
                );
                return NotificationDecision::SendEscalation;
            }
            return NotificationDecision::Suppressed;
        };

        entry.last_seen_at = now;

        let Some(severity) = event.severity else {
            // Severity absent: no change is detectable, fail closed
            return NotificationDecision::Suppressed;
        };

        // Escalation: detection -> alert
        if entry.severity == Severity::Detection && severity == Severity::Alert {
            if !filter.allows(event.severity, event.camera.as_deref(), &event.objects) {
                entry.severity = Severity::Alert;
                return NotificationDecision::Suppressed;
            }
            entry.severity = Severity::Alert;
            if let Some(image) = event.image_ref() {
                entry.image_ref = Some(image);
            }
            entry.notified = true;
            tracing::info!(
                review_id = %event.review_id,
                camera = ?event.camera,
                "Review escalated to alert, dispatching notification"
            );
            return NotificationDecision::SendEscalation;
        }

        // Downgrade: alert -> detection. Never retracts a sent notification.
        if entry.severity == Severity::Alert && severity == Severity::Detection {
            entry.severity = Severity::Detection;
            return NotificationDecision::Suppressed;
        }

        // Severity unchanged: only an image change is meaningful
        let new_image = event.image_ref();
        let image_changed = match (&new_image, &entry.image_ref) {
            (Some(new), Some(old)) => new != old,
            (Some(_), None) => true,
            _ => false,
        };
        if !image_changed {
            return NotificationDecision::Suppressed;
        }

        entry.image_ref = new_image;
        if severity == Severity::Alert && entry.notified {
            tracing::debug!(
                review_id = %event.review_id,
                "Alert image improved, updating notification in place"
            );
            NotificationDecision::UpdateImageOnly
        } else {
            NotificationDecision::SilentTrackingUpdate
        }
    }

    /// Current tracked state for one id
    pub async fn snapshot(&self, review_id: &str) -> Option<TrackedReview> {
        self.tracked.read().await.get(review_id).cloned()
    }

    /// Number of tracked segments
    pub async fn tracked_count(&self) -> usize {
        self.tracked.read().await.len()
    }

    /// Drop entries not touched within `max_age`
    ///
    /// Guards the map against `end` messages the broker never delivered.
    /// Returns the number of removed entries.
    pub async fn sweep_stale(&self, max_age: Duration) -> usize {
        let cutoff = Utc::now() - max_age;
        let mut tracked = self.tracked.write().await;
        let before = tracked.len();
        tracked.retain(|_, entry| entry.last_seen_at >= cutoff);
        let removed = before - tracked.len();
        if removed > 0 {
            tracing::info!(removed = removed, "Swept stale review entries");
        }
        removed
    }
}

impl Default for ReviewTracker {
    fn default() -> Self {
        Self::new()
    }
}
