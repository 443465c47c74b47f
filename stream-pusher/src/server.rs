use std::future::ready;

use axum::routing::get;
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::trace::TraceLayer;

use crate::prometheus::track_metrics;

/// The liveness router, plus `/metrics` when a recorder handle is given.
///
/// The handle is passed in rather than installed here: the global recorder can
/// only be installed once per process, which doesn't play well with tests.
pub fn router(metrics: Option<PrometheusHandle>) -> Router {
    let router = health::router().layer(TraceLayer::new_for_http());

    match metrics {
        Some(recorder_handle) => router
            .route("/metrics", get(move || ready(recorder_handle.render())))
            .layer(axum::middleware::from_fn(track_metrics)),
        None => router,
    }
}
