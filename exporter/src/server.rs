//! HTTP endpoint serving the metrics sink.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use dirstat_directory_watcher::PrometheusSink;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::timeout::TimeoutLayer;
use tracing::{error, info};

/// Upper bound on handling one request, body included.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(3);

/// Router exposing `GET /metrics`.
pub fn router(sink: Arc<PrometheusSink>) -> Router {
    Router::new()
        .route("/metrics", get(metrics))
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .with_state(sink)
}

/// Serve metrics on `listener` until `cancel` fires.
pub async fn serve(
    listener: TcpListener,
    sink: Arc<PrometheusSink>,
    cancel: CancellationToken,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("Serving metrics on http://{addr}/metrics");
    }

    axum::serve(listener, router(sink))
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await
}

async fn metrics(State(sink): State<Arc<PrometheusSink>>) -> Response {
    match sink.encode() {
        Ok(body) => ([(header::CONTENT_TYPE, sink.content_type())], body).into_response(),
        Err(e) => {
            error!("Failed to encode metrics: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dirstat_directory_watcher::{MetricsSink, ScanResult};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    async fn http_get(addr: std::net::SocketAddr, path: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let request =
            format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let sink = Arc::new(PrometheusSink::new().unwrap());
        sink.record_error("/data", 2);
        // `DateTime::default()` is the unix epoch.
        sink.publish("/data", &ScanResult::default(), Default::default());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let cancel = CancellationToken::new();
        let server = tokio::spawn(serve(listener, sink, cancel.clone()));

        let response = http_get(addr, "/metrics").await;
        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.contains("text/plain"));
        assert!(response.contains("directory_exporter_errors_total{dir=\"/data\"} 2"));

        let missing = http_get(addr, "/other").await;
        assert!(missing.starts_with("HTTP/1.1 404"));

        cancel.cancel();
        server.await.unwrap().unwrap();
    }
}
