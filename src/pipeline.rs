//! Turns a webhook notification into the ordered irc lines announcing it.
//!
//! Firing alerts are always rendered before resolved ones, each non-empty group
//! as a header line followed by its instance list.

use serde::Deserialize;

use crate::{
    alert::{Alert, NotificationPayload},
    alert_renderer::{render_header, render_instance_list, RenderContext},
    classify::{classify, AlertStatus},
    instance::aggregate,
};

/// Which alert the `alertname` and `description` of a group header come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RepresentativeAlert {
    /// the first alert of the whole notification, for every group
    PayloadFirst,
    /// the first alert of the group being rendered
    GroupFirst,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotifySettings {
    /// cut instance names at the first `.`
    pub shorten_instances: bool,
    pub representative_alert: RepresentativeAlert,
}

/// header and instance list of one status group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedGroup {
    pub status: AlertStatus,
    pub header: String,
    pub instances: String,
}

#[derive(Debug, Clone)]
pub struct NotificationPipeline {
    shorten: bool,
    representative: RepresentativeAlert,
}

impl NotificationPipeline {
    pub fn new(settings: &NotifySettings) -> Self {
        Self {
            shorten: settings.shorten_instances,
            representative: settings.representative_alert,
        }
    }

    /// Renders the firing group, then the resolved group. Groups without
    /// instances are left out.
    pub fn render(&self, payload: &NotificationPayload) -> Vec<RenderedGroup> {
        let (firing, resolved) = classify(&payload.alerts);

        [(AlertStatus::Firing, firing), (AlertStatus::Resolved, resolved)]
            .into_iter()
            .filter_map(|(status, group)| self.render_group(payload, status, &group))
            .collect()
    }

    /// all lines for `payload`, in sending order
    pub fn handle(&self, payload: &NotificationPayload) -> Vec<String> {
        self.render(payload)
            .into_iter()
            .flat_map(|group| {
                tracing::debug!("rendered {} group: {}", group.status, group.instances);
                [group.header, group.instances]
            })
            .collect()
    }

    fn render_group(
        &self,
        payload: &NotificationPayload,
        status: AlertStatus,
        group: &[&Alert],
    ) -> Option<RenderedGroup> {
        let instances = aggregate(group, self.shorten);
        if instances.is_empty() {
            return None;
        }

        let alert = match self.representative {
            RepresentativeAlert::PayloadFirst => payload.alerts.first(),
            RepresentativeAlert::GroupFirst => group.first().copied(),
        }?;

        let ctx = RenderContext::new(alert, payload, status, instances.len());

        Some(RenderedGroup {
            status,
            header: render_header(&ctx),
            instances: render_instance_list(&instances),
        })
    }
}
