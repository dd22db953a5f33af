//! Renders classified alert groups into irc lines.
//!
//! Every non-empty group becomes two lines, a header
//!
//! `[<color>FIRING<reset>:2] HighCPU - CPU > 90%`
//!
//! and the list of affected instances
//!
//! `→ web1 (93%), web2`

use std::fmt::Write;

use crate::{
    alert::{Alert, NotificationPayload},
    classify::AlertStatus,
    instance::Instance,
};

/// irc color code for red
pub const COLOR_RED: &str = "\x0305";
/// irc color code for green
pub const COLOR_GREEN: &str = "\x0303";
/// irc color code for white, used for unknown states
pub const COLOR_NEUTRAL: &str = "\x0300";
/// terminates any of the color codes above
pub const COLOR_RESET: &str = "\x03";

/// everything the header of one alert group is built from
#[derive(Debug, Clone)]
pub struct RenderContext<'a> {
    /// source of `alertname` and `description`
    pub alert: &'a Alert,
    pub notification: &'a NotificationPayload,
    pub status: &'a str,
    pub instance_count: usize,
    pub color_start: &'static str,
    pub color_end: &'static str,
}

impl<'a> RenderContext<'a> {
    pub fn new(
        alert: &'a Alert,
        notification: &'a NotificationPayload,
        status: AlertStatus,
        instance_count: usize,
    ) -> Self {
        let status = status.as_str();

        Self {
            alert,
            notification,
            status,
            instance_count,
            color_start: color_code(status),
            color_end: COLOR_RESET,
        }
    }
}

pub fn color_code(status: &str) -> &'static str {
    match status {
        "firing" => COLOR_RED,
        "resolved" => COLOR_GREEN,
        _ => COLOR_NEUTRAL,
    }
}

/// Header line of an alert group. Resolved groups only name the alert, every
/// other status carries the description as well.
pub fn render_header(ctx: &RenderContext<'_>) -> String {
    let alertname = ctx
        .alert
        .label("alertname")
        .or_else(|| ctx.notification.common_labels.get("alertname"))
        .map(ToString::to_string)
        .unwrap_or_default();

    let mut line = format!(
        "[{}{}{}:{}]",
        ctx.color_start,
        ctx.status.to_uppercase(),
        ctx.color_end,
        ctx.instance_count
    );

    if ctx.status == AlertStatus::Resolved.as_str() {
        line.push_str("  ");
        line.push_str(&alertname);
    } else {
        let description = ctx
            .alert
            .annotation("description")
            .or_else(|| ctx.notification.common_annotations.get("description"))
            .map(ToString::to_string)
            .unwrap_or_default();

        line.push(' ');
        line.push_str(&alertname);
        line.push_str(" - ");
        line.push_str(&description);
    }

    line
}

/// `→ name (value), name, ...`
pub fn render_instance_list(instances: &[Instance]) -> String {
    let mut line = String::from("→ ");

    for (i, instance) in instances.iter().enumerate() {
        if i > 0 {
            line.push_str(", ");
        }

        line.push_str(&instance.name);

        if let Some(value) = &instance.value {
            // writing into a String can't fail
            let _ = write!(line, " ({value})");
        }
    }

    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::{tests::alert, LabelValue};

    fn high_cpu() -> Alert {
        let mut a = alert(&[("alertname", "HighCPU"), ("instance", "web1")], "", "");
        a.annotations
            .insert("description".into(), LabelValue::from("CPU > 90%"));
        a
    }

    #[test]
    fn firing_header() {
        let a = high_cpu();
        let payload = NotificationPayload::default();
        let ctx = RenderContext::new(&a, &payload, AlertStatus::Firing, 2);

        assert_eq!(
            render_header(&ctx),
            "[\x0305FIRING\x03:2] HighCPU - CPU > 90%"
        );
    }

    #[test]
    fn resolved_header_has_no_description() {
        let a = high_cpu();
        let payload = NotificationPayload::default();
        let ctx = RenderContext::new(&a, &payload, AlertStatus::Resolved, 1);

        assert_eq!(render_header(&ctx), "[\x0303RESOLVED\x03:1]  HighCPU");
    }

    #[test]
    fn unknown_status_is_neutral() {
        let a = high_cpu();
        let payload = NotificationPayload::default();
        let ctx = RenderContext {
            status: "pending",
            color_start: color_code("pending"),
            ..RenderContext::new(&a, &payload, AlertStatus::Firing, 3)
        };

        assert_eq!(
            render_header(&ctx),
            "[\x0300PENDING\x03:3] HighCPU - CPU > 90%"
        );
    }

    #[test]
    fn missing_metadata_renders_empty() {
        let a = alert(&[("instance", "web1")], "", "");
        let payload = NotificationPayload::default();
        let ctx = RenderContext::new(&a, &payload, AlertStatus::Firing, 1);

        assert_eq!(render_header(&ctx), "[\x0305FIRING\x03:1]  - ");
    }

    #[test]
    fn falls_back_to_common_metadata() {
        let a = alert(&[("instance", "web1")], "", "");
        let mut payload = NotificationPayload::default();
        payload
            .common_labels
            .insert("alertname".into(), LabelValue::from("Disk"));
        payload
            .common_annotations
            .insert("description".into(), LabelValue::from("low space"));
        let ctx = RenderContext::new(&a, &payload, AlertStatus::Firing, 1);

        assert_eq!(render_header(&ctx), "[\x0305FIRING\x03:1] Disk - low space");
    }

    #[test]
    fn instance_list() {
        let instances = [
            Instance {
                name: "host1".into(),
                value: Some("12".into()),
            },
            Instance {
                name: "host2".into(),
                value: None,
            },
            Instance {
                name: "host3".into(),
                value: Some("3.5".into()),
            },
        ];

        assert_eq!(
            render_instance_list(&instances),
            "→ host1 (12), host2, host3 (3.5)"
        );
        assert_eq!(render_instance_list(&instances[1..2]), "→ host2");
    }

    #[test]
    fn rendering_is_deterministic() {
        let a = high_cpu();
        let payload = NotificationPayload::default();
        let ctx = RenderContext::new(&a, &payload, AlertStatus::Firing, 2);

        assert_eq!(render_header(&ctx), render_header(&ctx.clone()));
    }
}
