use anyhow::{Context, Result};
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the process-wide Prometheus recorder. Fails if one is already set.
    pub fn init() -> Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        describe_pass_metrics();
        Ok(Self { handle })
    }

    /// Recorder that is not installed globally; renders only what is recorded through it.
    pub fn detached() -> Self {
        let recorder = PrometheusBuilder::new().build_recorder();
        Self {
            handle: recorder.handle(),
        }
    }

    /// `/metrics` in Prometheus exposition format plus a plain `/health`.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new()
            .route(
                "/metrics",
                get(move || {
                    let h = handle.clone();
                    async move { h.render() }
                }),
            )
            .route("/health", get(|| async { "ok" }))
    }

    pub async fn serve(self, addr: SocketAddr) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("binding metrics listener on {addr}"))?;
        tracing::info!(%addr, "metrics endpoint listening");
        axum::serve(listener, self.router())
            .await
            .context("metrics server")
    }
}

fn describe_pass_metrics() {
    describe_counter!("digest_passes_total", "Scheduled digest passes started.");
    describe_counter!(
        "digest_delivery_errors_total",
        "Digests that could not be delivered."
    );
    describe_counter!(
        "digest_watermarks_advanced_total",
        "Source watermarks moved forward after delivery."
    );
    describe_gauge!(
        "digest_last_pass_ts",
        "Unix time of the last pass that completed."
    );
}
