use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;

use crate::pass::{PassKind, PassReport};

/// Counters for one pass type.
#[derive(Debug, Default)]
pub struct PassMetrics {
    /// Passes that ran to completion, including ones aborted by enumeration failure.
    pub runs_total: AtomicU64,
    /// Triggers dropped because the same pass was still in flight.
    pub skipped_total: AtomicU64,
    pub nodes_updated_total: AtomicU64,
    pub nodes_failed_total: AtomicU64,
    pub enumeration_errors_total: AtomicU64,
    /// Unix millis of the last completed run (gauge).
    pub last_completed_ms: AtomicU64,
}

const FAMILIES: usize = 6;

impl PassMetrics {
    /// `(name, type, help, value)` for each metric family.
    fn samples(&self) -> [(&'static str, &'static str, &'static str, u64); FAMILIES] {
        let load = |v: &AtomicU64| v.load(Ordering::Relaxed);
        [
            ("runs_total", "counter", "Completed reconciliation passes.", load(&self.runs_total)),
            ("skipped_total", "counter", "Triggers dropped while the same pass was in flight.", load(&self.skipped_total)),
            ("nodes_updated_total", "counter", "Nodes written by a pass.", load(&self.nodes_updated_total)),
            ("nodes_failed_total", "counter", "Nodes skipped after a probe or write failure.", load(&self.nodes_failed_total)),
            ("enumeration_errors_total", "counter", "Passes aborted because active nodes could not be listed.", load(&self.enumeration_errors_total)),
            ("last_completed_ms", "gauge", "Unix millis of the last completed pass.", load(&self.last_completed_ms)),
        ]
    }
}

/// Shared metrics for the reconciler, safe for concurrent access.
#[derive(Debug, Default)]
pub struct SharedMetrics {
    pub full: PassMetrics,
    pub status: PassMetrics,
    pub detail: PassMetrics,
}

impl SharedMetrics {
    pub fn pass(&self, kind: PassKind) -> &PassMetrics {
        match kind {
            PassKind::Full => &self.full,
            PassKind::Status => &self.status,
            PassKind::Detail => &self.detail,
        }
    }

    pub fn record_report<T>(&self, report: &PassReport<T>) {
        let m = self.pass(report.kind);
        m.runs_total.fetch_add(1, Ordering::Relaxed);
        m.nodes_updated_total
            .fetch_add(report.updated.len() as u64, Ordering::Relaxed);
        m.nodes_failed_total
            .fetch_add(report.failed as u64, Ordering::Relaxed);
        m.last_completed_ms.store(
            report.finished_at.timestamp_millis().max(0) as u64,
            Ordering::Relaxed,
        );
    }

    pub fn record_enumeration_error(&self, kind: PassKind) {
        let m = self.pass(kind);
        m.runs_total.fetch_add(1, Ordering::Relaxed);
        m.enumeration_errors_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped(&self, kind: PassKind) {
        self.pass(kind).skipped_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Prometheus text exposition format.
    pub fn render(&self) -> String {
        let per_pass = PassKind::ALL.map(|kind| (kind, self.pass(kind).samples()));

        let mut body = String::new();
        for family in 0..FAMILIES {
            let (name, kind, help, _) = per_pass[0].1[family];
            let _ = writeln!(body, "# HELP flute_ipmi_pass_{name} {help}");
            let _ = writeln!(body, "# TYPE flute_ipmi_pass_{name} {kind}");
            for (pass, samples) in &per_pass {
                let value = samples[family].3;
                let _ = writeln!(body, "flute_ipmi_pass_{name}{{pass=\"{pass}\"}} {value}");
            }
        }
        body
    }
}

/// GET /metrics: Prometheus text exposition format.
pub async fn metrics_handler(State(metrics): State<Arc<SharedMetrics>>) -> impl IntoResponse {
    (axum::http::StatusCode::OK, metrics.render())
}

/// GET /healthz: liveness probe.
pub async fn healthz_handler() -> impl IntoResponse {
    (axum::http::StatusCode::OK, "ok")
}

pub fn router(metrics: Arc<SharedMetrics>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(healthz_handler))
        .with_state(metrics)
}
