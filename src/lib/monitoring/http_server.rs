//! HTTP server for exposing monitoring data using Axum

use std::{
    future::Future,
    net::SocketAddr,
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tracing::{debug, error, info};

use super::prometheus_metrics::{self, CONTENT_TYPE};
use crate::{aggregator::StatsAggregator, error::PingMonitorErrorKind};

/// Shared state for all HTTP handlers
#[derive(Clone)]
struct ServerState {
    aggregator: Arc<StatsAggregator>,
}

/// HTTP server exposing `/metrics` and `/health`.
pub struct MonitoringServer {
    bind_address: SocketAddr,
    listener: TcpListener,
    state: ServerState,
}

impl MonitoringServer {
    /// Binds the listener.
    ///
    /// Binding happens up front so a taken port is reported as a startup failure rather than
    /// after the poller has started.
    pub async fn bind(
        bind_address: SocketAddr,
        aggregator: Arc<StatsAggregator>,
    ) -> Result<Self, PingMonitorErrorKind> {
        let listener = TcpListener::bind(bind_address)
            .await
            .map_err(|e| PingMonitorErrorKind::Bind(bind_address, e))?;
        let bind_address = listener.local_addr().unwrap_or(bind_address);

        Ok(Self {
            bind_address,
            listener,
            state: ServerState { aggregator },
        })
    }

    /// Address the server is actually listening on.
    pub fn local_addr(&self) -> SocketAddr {
        self.bind_address
    }

    /// Serves requests until `shutdown_signal` completes.
    pub async fn run(
        self,
        shutdown_signal: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), PingMonitorErrorKind> {
        info!("Starting monitoring server on http://{}", self.bind_address);
        info!(
            "Prometheus metrics available at http://{}/metrics",
            self.bind_address
        );
        info!("Health check available at http://{}/health", self.bind_address);

        let app = build_router(self.state);

        let result = axum::serve(self.listener, app)
            .with_graceful_shutdown(async move {
                shutdown_signal.await;
                info!("Monitoring server received shutdown signal, stopping...");
            })
            .await;

        info!("Monitoring server stopped");
        result.map_err(PingMonitorErrorKind::Server)
    }
}

/// Builds the router serving `aggregator`.
pub fn router(aggregator: Arc<StatsAggregator>) -> Router {
    build_router(ServerState { aggregator })
}

fn build_router(state: ServerState) -> Router {
    Router::new()
        .route("/metrics", get(handle_prometheus_metrics))
        .route("/health", get(handle_health))
        .with_state(state)
}

#[derive(serde::Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: u64,
}

#[derive(serde::Serialize)]
struct ErrorResponse {
    error: String,
}

/// Liveness check. Answers as long as the process serves requests, whatever the dish does.
async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        timestamp: SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs(),
    })
}

/// Handler for Prometheus metrics endpoint
async fn handle_prometheus_metrics(State(state): State<ServerState>) -> Response {
    let snapshot = state.aggregator.record_scrape();
    let uptime = snapshot.uptime();
    debug!("Serving scrape #{}", snapshot.scrapes_total);

    match prometheus_metrics::encode(&snapshot, uptime) {
        Ok(metrics_text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, CONTENT_TYPE)],
            metrics_text,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to render metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::{DishSample, PollOutcome, SampleReading};
    use axum::{body::Body, http::Request};
    use std::time::{Duration, Instant};
    use tower::ServiceExt;

    async fn get_body(app: Router, uri: &str) -> (StatusCode, Option<String>, String) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .map(|v| v.to_str().unwrap().to_string());
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, content_type, String::from_utf8(body.to_vec()).unwrap())
    }

    fn scrapes_in(listing: &str) -> u64 {
        listing
            .lines()
            .find_map(|line| line.strip_prefix("starlink_monitor_scrapes_total "))
            .unwrap()
            .parse()
            .unwrap()
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let aggregator = Arc::new(StatsAggregator::new(Duration::from_secs(2)));
        aggregator.ingest(PollOutcome::Reading(SampleReading::from_sample(
            DishSample::new(0.2, Some(10)),
            Instant::now(),
            SystemTime::now(),
        )));

        let (status, content_type, body) = get_body(router(aggregator.clone()), "/metrics").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type.as_deref(), Some(CONTENT_TYPE));
        assert!(body.contains("starlink_ping_drop_rate_current 0.2"));
        assert!(body.contains("starlink_ping_samples_total 10"));
        assert_eq!(scrapes_in(&body), 1);
        assert_eq!(aggregator.snapshot().scrapes_total, 1);
    }

    #[tokio::test]
    async fn test_each_scrape_is_counted_once() {
        let aggregator = Arc::new(StatsAggregator::new(Duration::from_secs(2)));
        let app = router(aggregator.clone());

        for expected in 1..=3 {
            let (_, _, body) = get_body(app.clone(), "/metrics").await;
            assert_eq!(scrapes_in(&body), expected);
        }
        // Health checks are not scrapes.
        get_body(app.clone(), "/health").await;
        assert_eq!(aggregator.snapshot().scrapes_total, 3);
    }

    #[tokio::test]
    async fn test_concurrent_scrapes() {
        const REQUESTS: u64 = 32;
        let aggregator = Arc::new(StatsAggregator::new(Duration::from_secs(2)));
        let app = router(aggregator.clone());

        let handles: Vec<_> = (0..REQUESTS)
            .map(|_| {
                let app = app.clone();
                tokio::spawn(async move { scrapes_in(&get_body(app, "/metrics").await.2) })
            })
            .collect();

        let mut seen = Vec::new();
        for handle in handles {
            seen.push(handle.await.unwrap());
        }
        seen.sort_unstable();

        assert_eq!(seen, (1..=REQUESTS).collect::<Vec<_>>());
        assert_eq!(aggregator.snapshot().scrapes_total, REQUESTS);
    }

    #[tokio::test]
    async fn test_health_ignores_dish_state() {
        let aggregator = Arc::new(StatsAggregator::new(Duration::from_secs(2)));
        aggregator.ingest(PollOutcome::Failed);

        let (status, _, body) = get_body(router(aggregator), "/health").await;
        assert_eq!(status, StatusCode::OK);

        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["status"], "healthy");
        assert!(json["timestamp"].as_u64().unwrap() > 0);
    }

    #[tokio::test]
    async fn test_unknown_path_is_not_found() {
        let aggregator = Arc::new(StatsAggregator::new(Duration::from_secs(2)));
        let (status, _, _) = get_body(router(aggregator), "/status").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_bind_conflict_is_reported() {
        let aggregator = Arc::new(StatsAggregator::new(Duration::from_secs(2)));
        let first = MonitoringServer::bind("127.0.0.1:0".parse().unwrap(), aggregator.clone())
            .await
            .unwrap();

        let second = MonitoringServer::bind(first.local_addr(), aggregator).await;
        assert!(matches!(second, Err(PingMonitorErrorKind::Bind(_, _))));
    }
}
