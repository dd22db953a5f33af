//! prometheus meters for the relay

use prometheus::{
	exponential_buckets, histogram_opts, opts, Histogram, IntCounter, IntCounterVec, Registry,
};
use tokio::time::Instant;

/// prometheus namespace of all meters
const NAMESPACE: &str = "promirc";

#[derive(Debug, Clone)]
/// prometheus meters, registered on the [Registry] served by the
/// [telemetry endpoint](crate::telemetry_endpoint)
pub struct Metrics {
	/// webhook requests by outcome (accepted, rejected, dropped)
	received_notifications: IntCounterVec,
	/// rendered lines
	rendered_lines: IntCounter,
	/// lines handed to the irc connection by result (ok, error)
	delivered_lines: IntCounterVec,
	/// time between receiving a notification and sending its last line
	delivery_latency: Histogram,
	/// number of (re)connection attempts to the irc server
	connection_attempts: IntCounter,
}

impl Metrics {
	/// construct prometheus meters and register them on `registry`
	pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
		let received_notifications = IntCounterVec::new(
			opts!("received_notifications_total", "webhook notifications by outcome")
				.namespace(NAMESPACE)
				.subsystem("webhook"),
			&["outcome"],
		)?;

		let rendered_lines = IntCounter::with_opts(
			opts!("rendered_lines_total", "lines rendered from notifications")
				.namespace(NAMESPACE)
				.subsystem("pipeline"),
		)?;

		let delivered_lines = IntCounterVec::new(
			opts!("delivered_lines_total", "lines sent to the irc channel by result")
				.namespace(NAMESPACE)
				.subsystem("irc"),
			&["result"],
		)?;

		let delivery_latency = Histogram::with_opts(
			histogram_opts!(
				"delivery_latency_seconds",
				"time from receiving a notification until its last line was sent",
				exponential_buckets(0.01, 2., 12)?
			)
			.namespace(NAMESPACE)
			.subsystem("irc"),
		)?;

		let connection_attempts = IntCounter::with_opts(
			opts!("connection_attempts_total", "connection attempts to the irc server")
				.namespace(NAMESPACE)
				.subsystem("irc"),
		)?;

		registry.register(Box::new(received_notifications.clone()))?;
		registry.register(Box::new(rendered_lines.clone()))?;
		registry.register(Box::new(delivered_lines.clone()))?;
		registry.register(Box::new(delivery_latency.clone()))?;
		registry.register(Box::new(connection_attempts.clone()))?;

		Ok(Self {
			received_notifications,
			rendered_lines,
			delivered_lines,
			delivery_latency,
			connection_attempts,
		})
	}

	pub fn record_notification(&self, outcome: &str) {
		self.received_notifications.with_label_values(&[outcome]).inc();
	}

	pub fn record_rendered(&self, lines: usize) {
		self.rendered_lines.inc_by(lines as u64);
	}

	pub fn record_line(&self, ok: bool) {
		let result = if ok { "ok" } else { "error" };
		self.delivered_lines.with_label_values(&[result]).inc();
	}

	pub fn observe_delivery(&self, arrival: Instant) {
		self.delivery_latency.observe(arrival.elapsed().as_secs_f64());
	}

	pub fn record_connection_attempt(&self) {
		self.connection_attempts.inc();
	}
}
