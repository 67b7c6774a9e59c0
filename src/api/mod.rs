use crate::repo::EventStore;
pub mod error;
pub mod events;
pub mod request;
pub mod response;
pub mod schema;
use axum::http::{HeaderName, HeaderValue, Method};
use bytes::Bytes;
use eyre::Result;
use std::sync::{Arc, OnceLock};
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{
    MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer,
};
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn EventStore>,
}

static REQ_ID_HEADER: OnceLock<HeaderName> = OnceLock::new();

pub fn request_id_header() -> &'static HeaderName {
    REQ_ID_HEADER.get_or_init(|| {
        std::env::var("REQ_ID_HEADER")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(|| HeaderName::from_static("x-request-id"))
    })
}

fn cors_layer() -> CorsLayer {
    let base = match std::env::var("CORS_ALLOW_ORIGIN").ok() {
        Some(o) if o != "*" => {
            // comma separated list
            o.split(',')
                .filter_map(|s| s.trim().parse::<HeaderValue>().ok())
                .fold(CorsLayer::new(), |layer, hv| layer.allow_origin(hv))
        }
        _ => CorsLayer::new().allow_origin(Any),
    };
    base.allow_headers(Any)
        .allow_methods([Method::GET])
        .expose_headers([request_id_header().clone()])
}

/// The read API with request-id, tracing and CORS layers applied.
pub fn router(state: AppState) -> axum::Router {
    let log_body = std::env::var("LOG_HTTP_BODY")
        .ok()
        .is_some_and(|v| v == "1");
    let req_id_for_span = request_id_header().clone();
    let trace = TraceLayer::new_for_http()
        .make_span_with(move |req: &axum::http::Request<_>| {
            let rid = req
                .headers()
                .get(&req_id_for_span)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("");
            tracing::info_span!(
                "http.request",
                method = %req.method(),
                uri = %req.uri(),
                request_id = %rid,
            )
        })
        .on_response(
            |res: &axum::http::Response<_>,
             latency: std::time::Duration,
             _span: &tracing::Span| {
                tracing::info!(status = res.status().as_u16(), ?latency, "http response");
            },
        )
        .on_body_chunk(
            move |chunk: &Bytes,
                  _latency: std::time::Duration,
                  _span: &tracing::Span| {
                if log_body {
                    tracing::debug!(size = chunk.len(), "http body chunk");
                }
            },
        );

    axum::Router::new()
        .route(
            "/events/{integrator}",
            axum::routing::get(events::events_by_integrator),
        )
        // outermost last: Propagate (inner) -> Trace -> Cors -> Set (outer)
        .layer(PropagateRequestIdLayer::new(request_id_header().clone()))
        .layer(trace)
        .layer(cors_layer())
        .layer(SetRequestIdLayer::new(
            request_id_header().clone(),
            MakeRequestUuid::default(),
        ))
        .with_state(state)
}

/// Serve the read API on `bind` until `shutdown` fires.
pub async fn listen_app(
    bind: &str,
    state: AppState,
    shutdown: CancellationToken,
) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!(%bind, "Listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    Ok(())
}
