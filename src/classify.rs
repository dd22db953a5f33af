//! Splits the alerts of a notification into firing and resolved ones.

use std::fmt;

use chrono::DateTime;

use crate::alert::Alert;

/// status of a single alert, derived from its timestamps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlertStatus {
    Firing,
    Resolved,
}

impl AlertStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::Firing => "firing",
            AlertStatus::Resolved => "resolved",
        }
    }
}

impl fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An alert is resolved iff `endsAt` lies strictly after `startsAt`.
///
/// Timestamps that can't be parsed as RFC 3339 are taken as the zero time,
/// which is never after anything, so such alerts stay firing.
pub fn status(alert: &Alert) -> AlertStatus {
    let starts_at = DateTime::parse_from_rfc3339(&alert.starts_at);
    let ends_at = DateTime::parse_from_rfc3339(&alert.ends_at);

    match (starts_at, ends_at) {
        (Ok(starts_at), Ok(ends_at)) if ends_at > starts_at => AlertStatus::Resolved,
        _ => AlertStatus::Firing,
    }
}

/// Stable partition of `alerts` into `(firing, resolved)`.
pub fn classify(alerts: &[Alert]) -> (Vec<&Alert>, Vec<&Alert>) {
    alerts
        .iter()
        .partition(|alert| status(alert) == AlertStatus::Firing)
}
