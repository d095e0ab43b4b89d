use axum::{routing::get, Router};
use futures::future::ready;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub async fn index() -> String {
    format!("telemetry-ingestor {}", env!("CARGO_PKG_VERSION"))
}

/// Operational router: readiness/liveness probes plus the Prometheus scrape
/// endpoint.
pub fn operational_router() -> Router {
    let recorder_handle = setup_metrics_recorder();

    Router::new()
        .route("/", get(index))
        .route("/_readiness", get(index))
        .route("/_liveness", get(|| ready("ok")))
        .route(
            "/metrics",
            get(move || ready(recorder_handle.render())),
        )
}

/// Bind a `TcpListener` on the provided bind address to serve the router.
pub async fn serve(router: Router, bind: &str) -> Result<(), std::io::Error> {
    let listener = tokio::net::TcpListener::bind(bind).await?;

    axum::serve(listener, router).await?;

    Ok(())
}

fn setup_metrics_recorder() -> PrometheusHandle {
    PrometheusBuilder::new().install_recorder().unwrap()
}
