//! prometheus alertmanager receiver that relays alerts into an irc channel
//!
//! Features:
//! - firing and resolved alerts of a notification announced as colored header and instance lines
//! - one persistent irc connection with reconnect backoff, tls and custom CA support
//! - prometheus metrics about received notifications and delivered lines

use std::{sync::Arc, time::Duration};

use alertmanager_webhook_receiver::State;
use anyhow::{Context, Result};
use delivery::Outbox;
use irc::IrcClient;
use metrics::Metrics;
use pipeline::NotificationPipeline;
use prometheus::Registry;
use settings::Settings;
use tokio::sync::watch;

mod alert;
mod alert_renderer;
mod alertmanager_webhook_receiver;
mod classify;
mod delivery;
mod instance;
mod irc;
mod log;
mod metrics;
mod pipeline;
mod settings;
mod telemetry_endpoint;

/// time the irc client gets to flush its queue and quit after shutdown
const IRC_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// exit the complete program if one thread panics
fn setup_panic_handler() {
	let default_panic = std::panic::take_hook();
	std::panic::set_hook(Box::new(move |info| {
		default_panic(info);
		std::process::exit(1);
	}));
}

/// resolves once the shutdown signal was broadcast
async fn shutdown_signal(mut rx: watch::Receiver<bool>) {
	while !*rx.borrow() {
		if rx.changed().await.is_err() {
			return;
		}
	}
}

/// the entry point of the program
#[tokio::main]
pub async fn main() -> Result<()> {
	setup_panic_handler();

	let settings = Settings::load()?;

	log::setup_logging(&settings.log).context("could not setup logging")?;

	let registry = Registry::new();
	let metrics =
		Arc::new(Metrics::new(&registry).context("failed to register prometheus meters")?);

	let (outbox, rx_outbox) = Outbox::new(settings.irc.queue_capacity);

	let irc_client = IrcClient::new(settings.irc.clone(), metrics.clone())
		.context("failed to construct irc client")?;
	let irc_task = tokio::spawn(irc_client.run(rx_outbox));

	let state = Arc::new(State::new(
		NotificationPipeline::new(&settings.notify),
		outbox,
		settings.irc.channel.clone(),
		metrics,
	));

	let (tx_shutdown, rx_shutdown) = watch::channel(false);

	tokio::spawn(async move {
		if let Err(err) = tokio::signal::ctrl_c().await {
			tracing::error!("failed to listen for ctrl-c: {err}");
			return;
		}
		tracing::info!("shutting down");
		let _ = tx_shutdown.send(true);
	});

	let telemetry = tokio::spawn({
		let settings = settings.telemetry_endpoint.clone();
		let shutdown = shutdown_signal(rx_shutdown.clone());
		async move {
			telemetry_endpoint::run_telemetry_endpoint(&settings, registry, shutdown).await
		}
	});

	// dropping the receiver state closes the outbox, which makes the irc client quit
	alertmanager_webhook_receiver::run_prometheus_receiver(
		&settings.alert_webhook_receiver,
		state,
		shutdown_signal(rx_shutdown),
	)
	.await
	.context("prometheus alertmanager receiver endpoint failed to start or crashed")?;

	telemetry
		.await
		.context("telemetry endpoint panicked")?
		.context("telemetry endpoint failed to start or crashed")?;

	if tokio::time::timeout(IRC_SHUTDOWN_GRACE, irc_task).await.is_err() {
		tracing::warn!("irc client did not quit in time");
	}

	Ok(())
}
