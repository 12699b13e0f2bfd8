//! Notification filter evaluation
//!
//! Pure predicate over an immutable `FilterConfig` snapshot. No state, safe
//! to call concurrently. Missing fields fail closed: an event without a
//! severity is never dispatched, and absent camera/labels fail any
//! non-empty allowlist.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::events::Severity;

/// Which severities are allowed to notify
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeverityFilter {
    Alert,
    Detection,
    All,
}

impl SeverityFilter {
    fn matches(&self, severity: Severity) -> bool {
        match self {
            SeverityFilter::All => true,
            SeverityFilter::Alert => severity == Severity::Alert,
            SeverityFilter::Detection => severity == Severity::Detection,
        }
    }
}

/// Runtime notification filter settings
///
/// Owned by the config store; the pipeline takes a snapshot per message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
    pub severity_filter: SeverityFilter,
    /// Empty = allow all labels
    #[serde(default)]
    pub label_allowlist: HashSet<String>,
    /// Empty = allow all cameras
    #[serde(default)]
    pub camera_allowlist: HashSet<String>,
    /// Legacy-event dedup window, seconds
    #[serde(default = "default_cooldown")]
    pub cooldown_seconds: u64,
}

fn default_cooldown() -> u64 {
    60
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            severity_filter: SeverityFilter::All,
            label_allowlist: HashSet::new(),
            camera_allowlist: HashSet::new(),
            cooldown_seconds: default_cooldown(),
        }
    }
}

impl FilterConfig {
    /// Evaluate the filter against event attributes
    ///
    /// Rejects when:
    /// - severity is absent, or present but not matched by `severity_filter`
    /// - `camera_allowlist` is non-empty and camera is absent or not listed
    /// - `label_allowlist` is non-empty and no label intersects it
    pub fn allows(
        &self,
        severity: Option<Severity>,
        camera: Option<&str>,
        labels: &[String],
    ) -> bool {
        let Some(severity) = severity else {
            return false;
        };
        if !self.severity_filter.matches(severity) {
            return false;
        }

        if !self.camera_allowlist.is_empty() {
            match camera {
                Some(camera) if self.camera_allowlist.contains(camera) => {}
                _ => return false,
            }
        }

        if !self.label_allowlist.is_empty()
            && !labels.iter().any(|l| self.label_allowlist.contains(l))
        {
            return false;
        }

        true
    }
}
