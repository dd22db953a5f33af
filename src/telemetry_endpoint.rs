//! Here we expose prometheus metrics about the relay
use std::{
    future::Future,
    net::{IpAddr, SocketAddr},
};

use anyhow::{Context, Result};
use axum::{
    extract::Extension,
    http::{header::CONTENT_TYPE, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use prometheus::{Encoder, Registry, TextEncoder};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct TelemetryEndpointSettings {
    pub bind_address: IpAddr,
    pub port: u16,
}

impl TelemetryEndpointSettings {
    pub fn to_socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }
}

async fn metrics_handler(Extension(registry): Extension<Registry>) -> Response {
    let mut buffer = vec![];
    let encoder = TextEncoder::new();
    let metric_families = registry.gather();

    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!("failed to encode metrics: {err}");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    ([(CONTENT_TYPE, encoder.format_type().to_owned())], buffer).into_response()
}

pub fn router(registry: Registry) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .layer(Extension(registry))
}

pub async fn run_telemetry_endpoint(
    settings: &TelemetryEndpointSettings,
    registry: Registry,
    shutdown: impl Future<Output = ()>,
) -> Result<()> {
    let addr = settings.to_socket_addr();
    tracing::info!("serving metrics on http://{addr}/metrics");

    axum::Server::try_bind(&addr)
        .with_context(|| format!("could not bind {addr}"))?
        .serve(router(registry).into_make_service())
        .with_graceful_shutdown(shutdown)
        .await
        .context("telemetry endpoint crashed")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use axum::{body::Body, http::Request};
    use tower::ServiceExt;

    use super::*;
    use crate::metrics::Metrics;

    #[tokio::test]
    async fn serves_text_format() {
        let registry = Registry::new();
        let metrics = Metrics::new(&registry).unwrap();
        metrics.record_notification("accepted");

        let response = router(registry)
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
        let body = String::from_utf8(body.to_vec()).unwrap();
        assert!(
            body.contains("promirc_webhook_received_notifications_total{outcome=\"accepted\"} 1")
        );
    }
}
