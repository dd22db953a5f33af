//! data structures for deserializing incoming alerts
use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// label and annotation maps of an alert
pub type Labels = BTreeMap<String, LabelValue>;

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
/// data from prometheus received by the alertmanager webhook receiver
#[allow(clippy::missing_docs_in_private_items)]
pub struct NotificationPayload {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub group_key: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub receiver: String,
    #[serde(default)]
    pub group_labels: Labels,
    #[serde(default)]
    pub common_labels: Labels,
    #[serde(default)]
    pub common_annotations: Labels,
    #[serde(default, rename = "externalURL")]
    pub external_url: String,
    #[serde(default)]
    pub alerts: Vec<Alert>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
#[allow(clippy::missing_docs_in_private_items)]
pub struct Alert {
    #[serde(default)]
    pub labels: Labels,
    #[serde(default)]
    pub annotations: Labels,
    /// kept verbatim, parsed during classification
    #[serde(default)]
    pub starts_at: String,
    #[serde(default)]
    pub ends_at: String,
}

/// A label or annotation value. Alertmanager only sends strings, but other
/// webhook producers put scalars in there as well.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum LabelValue {
    String(String),
    Number(serde_json::Number),
    Bool(bool),
    Null,
}

impl LabelValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            LabelValue::String(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for LabelValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LabelValue::String(s) => f.write_str(s),
            LabelValue::Number(n) => write!(f, "{n}"),
            LabelValue::Bool(b) => write!(f, "{b}"),
            LabelValue::Null => Ok(()),
        }
    }
}

impl From<&str> for LabelValue {
    fn from(s: &str) -> Self {
        LabelValue::String(s.to_owned())
    }
}

/// Error returned by the typed label accessors of [Alert]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LabelError {
    #[error("label `{0}` is missing")]
    Missing(String),
    #[error("label `{0}` is not a string")]
    NotAString(String),
}

impl Alert {
    /// string value of label `key`
    pub fn label_str(&self, key: &str) -> Result<&str, LabelError> {
        match self.labels.get(key) {
            Some(value) => value
                .as_str()
                .ok_or_else(|| LabelError::NotAString(key.to_owned())),
            None => Err(LabelError::Missing(key.to_owned())),
        }
    }

    /// string value of label `key`, [None] if it's absent or of another type
    pub fn optional_label_str(&self, key: &str) -> Option<&str> {
        self.labels.get(key).and_then(LabelValue::as_str)
    }

    pub fn label(&self, key: &str) -> Option<&LabelValue> {
        self.labels.get(key)
    }

    pub fn annotation(&self, key: &str) -> Option<&LabelValue> {
        self.annotations.get(key)
    }
}
