//! Admin HTTP server for health checks, metrics and buffer state

use crate::audit;
use crate::cache::HotCache;
use crate::metrics;
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Request, Response, Server, StatusCode};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

/// Serve /healthz, /readyz, /metrics and /buffers until `shutdown` resolves.
pub async fn serve_admin(
    addr: SocketAddr,
    cache: Arc<HotCache>,
    shutdown: impl Future<Output = ()>,
) -> Result<(), hyper::Error> {
    let make_svc = make_service_fn(move |_| {
        let cache = cache.clone();
        async move {
            Ok::<_, hyper::Error>(service_fn(move |req: Request<Body>| {
                let cache = cache.clone();
                async move { Ok::<_, hyper::Error>(handle(req, &cache)) }
            }))
        }
    });

    tracing::info!("Admin HTTP server listening on {}", addr);
    Server::bind(&addr)
        .serve(make_svc)
        .with_graceful_shutdown(shutdown)
        .await
}

fn handle(req: Request<Body>, cache: &HotCache) -> Response<Body> {
    let path = req.uri().path();
    let (status, content_type, body) = match path {
        "/healthz" => (StatusCode::OK, "text/plain", "ok\n".to_string()),

        "/readyz" => {
            if cache.is_accepting() {
                (StatusCode::OK, "text/plain", "ready\n".to_string())
            } else {
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "text/plain",
                    "shutting down\n".to_string(),
                )
            }
        }

        "/metrics" => (
            StatusCode::OK,
            "text/plain; version=0.0.4",
            metrics::encode_metrics(),
        ),

        "/buffers" => match serde_json::to_string_pretty(&cache.snapshot()) {
            Ok(json) => (StatusCode::OK, "application/json", json),
            Err(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "text/plain",
                format!("{}\n", e),
            ),
        },

        _ => (StatusCode::NOT_FOUND, "text/plain", "not found\n".to_string()),
    };

    if status != StatusCode::NOT_FOUND {
        audit::admin_http_request(path, status.as_u16());
    }

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    if let Ok(value) = hyper::header::HeaderValue::from_str(content_type) {
        response
            .headers_mut()
            .insert(hyper::header::CONTENT_TYPE, value);
    }
    response
}
