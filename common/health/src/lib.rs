//! Liveness reporting for the stream services.
//!
//! The probe answers the question "is the process up and serving", nothing more.
//! Once the listener is bound, `GET /health` returns `200 OK` regardless of the
//! state of the stream, the producer or any other downstream resource: a process
//! whose stream failed to provision keeps answering, and operators are expected to
//! look at the logs for the provisioning outcome.
//!
//! Readiness is not modelled here, callers that need it can mount their own
//! route next to this one.

use std::future::Future;

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tracing::info;

pub const HEALTH_PATH: &str = "/health";

const HEALTH_BODY: &str = "OK";

/// Process liveness, rendered as a plain text `OK`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Liveness;

impl IntoResponse for Liveness {
    fn into_response(self) -> Response {
        (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            HEALTH_BODY,
        )
            .into_response()
    }
}

pub async fn liveness() -> Liveness {
    Liveness
}

/// Router serving only `GET /health`. Callers can merge more routes into it.
pub fn router() -> Router {
    Router::new().route(HEALTH_PATH, get(liveness))
}

/// Serve `router` on an already bound listener until `shutdown` resolves.
pub async fn serve<F>(router: Router, listener: TcpListener, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    info!("health endpoint listening on {:?}", listener.local_addr()?);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Method, Request};
    use http_body_util::BodyExt; // for `collect`
    use tower::ServiceExt; // for `oneshot`

    async fn call(method: Method, uri: &str) -> Response {
        router()
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn health_returns_plain_ok() {
        let response = call(Method::GET, "/health").await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/plain; charset=utf-8"
        );

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"OK");
    }

    #[tokio::test]
    async fn other_verbs_are_rejected() {
        let response = call(Method::POST, "/health").await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);

        let response = call(Method::DELETE, "/health").await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn other_paths_are_not_served() {
        let response = call(Method::GET, "/").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = call(Method::GET, "/_liveness").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn serve_stops_on_shutdown() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();

        let server = tokio::spawn(serve(router(), listener, async move {
            drop(rx.await);
        }));

        tx.send(()).unwrap();
        server.await.unwrap().unwrap();
    }
}
