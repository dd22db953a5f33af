//! Extracts the monitored instances of a group of alerts.

use crate::alert::{Alert, LabelError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instance {
    pub name: String,
    /// the `value` label, only if it is a string
    pub value: Option<String>,
}

impl Instance {
    /// Reads the `instance` label of `alert`. With `shorten` the name is cut at
    /// the first `.`, dropping the domain.
    pub fn from_alert(alert: &Alert, shorten: bool) -> Result<Self, LabelError> {
        let mut name = alert.label_str("instance")?;

        if shorten {
            name = short_name(name);
        }

        Ok(Self {
            name: name.to_owned(),
            value: alert.optional_label_str("value").map(str::to_owned),
        })
    }
}

fn short_name(name: &str) -> &str {
    name.split('.').next().unwrap_or(name)
}

/// One [Instance] per alert in input order, duplicates are kept. Alerts without
/// a usable `instance` label are skipped.
pub fn aggregate(alerts: &[&Alert], shorten: bool) -> Vec<Instance> {
    alerts
        .iter()
        .filter_map(|alert| match Instance::from_alert(alert, shorten) {
            Ok(instance) => Some(instance),
            Err(err) => {
                tracing::warn!(labels = ?alert.labels, "skipping alert: {err}");
                None
            }
        })
        .collect()
}
