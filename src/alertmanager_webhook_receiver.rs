//! http endpoint alertmanager posts its notifications to
use std::{
    future::Future,
    net::{IpAddr, SocketAddr},
    sync::Arc,
};

use anyhow::{Context, Result};
use axum::{
    extract::{rejection::JsonRejection, Extension, Json},
    http::StatusCode,
    routing::post,
    Router,
};
use serde::Deserialize;
use tokio::time::Instant;

use crate::{
    alert::NotificationPayload,
    delivery::{Outbox, RenderedNotification},
    metrics::Metrics,
    pipeline::NotificationPipeline,
};

#[derive(Debug, Deserialize, Clone)]
pub struct AlertReceiverSettings {
    pub bind_address: IpAddr,
    pub port: u16,
    /// url path the webhook is served on
    pub path: String,
}

impl AlertReceiverSettings {
    pub fn to_socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }
}

pub struct State {
    pipeline: NotificationPipeline,
    outbox: Outbox,
    /// channel (or nickname) the lines go to
    target: String,
    metrics: Arc<Metrics>,
}

impl State {
    pub fn new(
        pipeline: NotificationPipeline,
        outbox: Outbox,
        target: String,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            pipeline,
            outbox,
            target,
            metrics,
        }
    }
}

async fn prometheus_receiver(
    Extension(state): Extension<Arc<State>>,
    payload: Result<Json<NotificationPayload>, JsonRejection>,
) -> StatusCode {
    let arrival = Instant::now();

    let State {
        pipeline,
        outbox,
        target,
        metrics,
    } = &*state;

    let payload = match payload {
        Ok(Json(payload)) => payload,
        Err(err) => {
            tracing::debug!("failed to deserialize notification: {:?}", err);
            metrics.record_notification("rejected");
            return StatusCode::BAD_REQUEST;
        }
    };

    if tracing::enabled!(tracing::Level::DEBUG) {
        match serde_json::to_string(&payload) {
            Ok(json) => tracing::debug!(group_key = %payload.group_key, "received {json}"),
            Err(err) => tracing::debug!("could not serialize notification: {err}"),
        }
    }

    let lines = pipeline.handle(&payload);
    metrics.record_rendered(lines.len());

    if lines.is_empty() {
        metrics.record_notification("empty");
        return StatusCode::OK;
    }

    match outbox.submit(RenderedNotification::new(target.clone(), lines, arrival)) {
        Ok(()) => metrics.record_notification("accepted"),
        Err(err) => {
            tracing::warn!(group_key = %payload.group_key, "dropping notification: {err}");
            metrics.record_notification("dropped");
        }
    }

    // delivery is best-effort and doesn't change the response
    StatusCode::OK
}

pub fn router(path: &str, state: Arc<State>) -> Router {
    Router::new()
        .route(path, post(prometheus_receiver))
        .layer(Extension(state))
}

pub async fn run_prometheus_receiver(
    settings: &AlertReceiverSettings,
    state: Arc<State>,
    shutdown: impl Future<Output = ()>,
) -> Result<()> {
    let addr = settings.to_socket_addr();
    let app = router(&settings.path, state);

    tracing::info!(
        "listening for alertmanager notifications on http://{addr}{}",
        settings.path
    );

    axum::Server::try_bind(&addr)
        .with_context(|| format!("could not bind {addr}"))?
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown)
        .await
        .context("prometheus endpoint crashed")?;

    Ok(())
}
