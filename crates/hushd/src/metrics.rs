//! Prometheus /metrics + health check HTTP endpoints
//!
//! Endpoints:
//!   GET /metrics  Prometheus text format
//!   GET /healthz  Liveness probe (always 200 if process is running)
//!   GET /readyz   Readiness probe (200 if the data directory is usable)

use anyhow::Result;
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Router};
use prometheus_client::{
    encoding::text::encode,
    metrics::{counter::Counter, family::Family},
    registry::Registry,
};
use std::sync::Arc;

use hush_core::Outcome;
use hush_store::{AtomicRecordStore, SweepReport};

type Labels = Vec<(String, String)>;

/// Counters shared by the HTTP handlers and the reaper
#[derive(Clone, Default)]
pub struct HushMetrics {
    secrets_created: Counter,
    reveals: Family<Labels, Counter>,
    reaped: Family<Labels, Counter>,
}

impl HushMetrics {
    pub fn register(registry: &mut Registry) -> Self {
        let metrics = Self::default();
        registry.register(
            "hush_secrets_created",
            "Secrets stored",
            metrics.secrets_created.clone(),
        );
        registry.register(
            "hush_reveals",
            "Reveal attempts by outcome",
            metrics.reveals.clone(),
        );
        registry.register(
            "hush_reaped",
            "Records removed by the reaper",
            metrics.reaped.clone(),
        );
        metrics
    }

    pub fn record_created(&self) {
        self.secrets_created.inc();
    }

    pub fn record_reveal(&self, outcome: &Outcome) {
        self.reveal_label(outcome.label());
    }

    pub fn record_reveal_error(&self) {
        self.reveal_label("error");
    }

    pub fn record_sweep(&self, report: &SweepReport) {
        for (reason, count) in [("expired", report.expired), ("orphaned", report.orphaned)] {
            self.reaped
                .get_or_create(&vec![("reason".to_string(), reason.to_string())])
                .inc_by(count as u64);
        }
    }

    fn reveal_label(&self, outcome: &str) {
        self.reveals
            .get_or_create(&vec![("outcome".to_string(), outcome.to_string())])
            .inc();
    }
}

/// Shared health state updated by the daemon
#[derive(Clone)]
pub struct HealthState {
    pub registry: Arc<Registry>,
    pub store: Arc<dyn AtomicRecordStore>,
}

pub fn router(state: HealthState) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(healthz_handler))
        .route("/readyz", get(readyz_handler))
        .with_state(state)
}

/// Serve Prometheus metrics and health endpoints on `addr` (e.g. "127.0.0.1:9100")
pub async fn serve(addr: String, state: HealthState) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow::anyhow!("metrics bind {addr}: {e}"))?;

    tracing::info!(addr = %addr, "metrics: listening on /metrics, /healthz, /readyz");

    axum::serve(listener, router(state))
        .await
        .map_err(|e| anyhow::anyhow!("metrics server: {e}"))
}

async fn metrics_handler(State(state): State<HealthState>) -> impl IntoResponse {
    let mut body = String::new();
    match encode(&mut body, &state.registry) {
        Ok(()) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4")],
            body,
        ),
        Err(e) => {
            tracing::error!("metrics encode failed: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                e.to_string(),
            )
        }
    }
}

/// Liveness probe: returns 200 if the process is running.
async fn healthz_handler() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// Readiness probe: returns 200 if the store accepts records, 503 otherwise.
async fn readyz_handler(State(state): State<HealthState>) -> impl IntoResponse {
    match state.store.check_health() {
        Ok(()) => (StatusCode::OK, "ready".to_string()),
        Err(e) => (StatusCode::SERVICE_UNAVAILABLE, e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use hush_store::MemoryRecordStore;
    use tower::ServiceExt;

    fn state() -> (HealthState, HushMetrics) {
        let mut registry = Registry::default();
        let metrics = HushMetrics::register(&mut registry);
        let state = HealthState {
            registry: Arc::new(registry),
            store: Arc::new(MemoryRecordStore::new(8)),
        };
        (state, metrics)
    }

    async fn get_text(app: Router, path: &str) -> (StatusCode, String) {
        let resp = app
            .oneshot(Request::get(path).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_metrics_exposes_counters() {
        let (state, metrics) = state();
        metrics.record_created();
        metrics.record_reveal(&Outcome::WrongCredential);
        metrics.record_sweep(&SweepReport {
            expired: 2,
            ..Default::default()
        });

        let (status, body) = get_text(router(state), "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("hush_secrets_created_total 1"), "{body}");
        assert!(
            body.contains("hush_reveals_total{outcome=\"wrong_credential\"} 1"),
            "{body}"
        );
        assert!(body.contains("hush_reaped_total{reason=\"expired\"} 2"), "{body}");
    }

    #[tokio::test]
    async fn test_readyz_reports_unusable_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = hush_store::FsRecordStore::open(dir.path().join("data"), 8, 1).unwrap();
        std::fs::remove_dir(store.root()).unwrap();
        let (mut state, _) = state();
        state.store = Arc::new(store);

        let (status, _) = get_text(router(state), "/readyz").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_health_endpoints() {
        let (state, _) = state();
        let app = router(state);
        assert_eq!(get_text(app.clone(), "/healthz").await.0, StatusCode::OK);
        assert_eq!(get_text(app, "/readyz").await.0, StatusCode::OK);
    }
}
