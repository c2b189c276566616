use crate::metrics::Metrics;
use crate::snapshot::Snapshot;
use axum::body::Body;
use axum::extract::State;
use axum::http::{header::CONTENT_TYPE, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{routing::get, Json, Router};
use std::io;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub type LatestSnapshot = Arc<RwLock<Option<Snapshot>>>;

#[derive(Clone)]
pub struct HttpAppState {
    pub metrics: Arc<Metrics>,
    pub latest: LatestSnapshot,
}

pub fn build_router(metrics: Arc<Metrics>, latest: LatestSnapshot) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics_handler))
        .route("/api/snapshot", get(snapshot_handler))
        .with_state(HttpAppState { metrics, latest })
}

pub async fn bind(listen: &str) -> io::Result<TcpListener> {
    let listener = TcpListener::bind(listen).await?;
    info!(listen = %listener.local_addr()?, "serving metrics");
    Ok(listener)
}

pub async fn serve(
    listener: TcpListener,
    router: Router,
    shutdown: CancellationToken,
) -> io::Result<()> {
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            shutdown.cancelled().await;
        })
        .await
}

async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn metrics_handler(State(state): State<HttpAppState>) -> Response {
    state.metrics.inc_scrape_count();
    match state.metrics.encode_metrics() {
        Ok(encoded) => {
            let mut response = Response::new(Body::from(encoded));
            response.headers_mut().insert(
                CONTENT_TYPE,
                HeaderValue::from_static("text/plain; version=0.0.4"),
            );
            response
        }
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("failed to encode metrics: {err}"),
        )
            .into_response(),
    }
}

async fn snapshot_handler(State(state): State<HttpAppState>) -> Response {
    let guard = state.latest.read().await;
    match guard.as_ref() {
        Some(snapshot) => Json(snapshot.clone()).into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "no snapshot collected yet").into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::Collector;
    use crate::sources::mock::MockSource;
    use axum::body::to_bytes;
    use axum::http::Request;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tower::ServiceExt;

    async fn get_text(app: Router, uri: &str) -> (StatusCode, String) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn healthz_returns_ok() {
        let metrics = Metrics::new().expect("metrics init");
        let app = build_router(metrics, LatestSnapshot::default());

        let (status, body) = get_text(app, "/healthz").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ok");
    }

    #[tokio::test]
    async fn metrics_counts_scrapes() {
        let metrics = Metrics::new().expect("metrics init");
        let app = build_router(metrics.clone(), LatestSnapshot::default());

        let (status, body) = get_text(app, "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("sysmon_scrape_count_total 1"));
    }

    #[tokio::test]
    async fn snapshot_is_unavailable_before_first_collection() {
        let metrics = Metrics::new().expect("metrics init");
        let app = build_router(metrics, LatestSnapshot::default());

        let (status, _) = get_text(app, "/api/snapshot").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn snapshot_returns_latest_json() {
        let metrics = Metrics::new().expect("metrics init");
        let latest = LatestSnapshot::default();
        *latest.write().await = Some(Collector::new(MockSource::default()).collect_once());
        let app = build_router(metrics, latest);

        let (status, body) = get_text(app, "/api/snapshot").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("\"per_core\""));
        assert!(body.contains("\"interface\":\"eth0\""));
    }

    #[tokio::test]
    async fn serves_on_a_named_host_until_shutdown() {
        let listener = bind("localhost:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = CancellationToken::new();
        let server = tokio::spawn(serve(
            listener,
            build_router(Metrics::new().unwrap(), LatestSnapshot::default()),
            shutdown.clone(),
        ));

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /healthz HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        assert!(response.starts_with("HTTP/1.1 200"), "{response}");
        assert!(response.ends_with("ok"));

        shutdown.cancel();
        server.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn bind_rejects_unresolvable_hosts() {
        assert!(bind("no-such-host.invalid:9108").await.is_err());
    }
}
