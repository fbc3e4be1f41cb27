use std::sync::OnceLock;
use std::time::Instant;

use axum::extract::{MatchedPath, Request};
use axum::middleware::Next;
use axum::response::Response;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};

/// Global metrics registry and the handful of counters/histograms every
/// component records into, built as a process-wide `OnceLock<Registry>`
/// rather than threading a registry handle through every call site.
pub struct Metrics {
    pub registry: Registry,
    pub http_requests_total: IntCounterVec,
    pub http_request_duration_seconds: HistogramVec,
    pub cache_ops_total: IntCounterVec,
    pub rate_limit_rejections_total: IntCounterVec,
    pub breaker_state_changes_total: IntCounterVec,
    pub exec_outcomes_total: IntCounterVec,
}

static METRICS: OnceLock<Metrics> = OnceLock::new();

impl Metrics {
    fn new() -> Self {
        let registry = Registry::new();

        let http_requests_total = IntCounterVec::new(
            Opts::new(
                "mcp_http_requests_total",
                "Total HTTP requests by method, route, and status",
            ),
            &["method", "route", "status"],
        )
        .expect("metric construction");
        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "mcp_http_request_duration_seconds",
                "HTTP request latency in seconds",
            ),
            &["method", "route"],
        )
        .expect("metric construction");
        let cache_ops_total = IntCounterVec::new(
            Opts::new("mcp_cache_ops_total", "Cache operations by outcome"),
            &["outcome"],
        )
        .expect("metric construction");
        let rate_limit_rejections_total = IntCounterVec::new(
            Opts::new(
                "mcp_rate_limit_rejections_total",
                "Requests rejected by the rate limiter, by window",
            ),
            &["window"],
        )
        .expect("metric construction");
        let breaker_state_changes_total = IntCounterVec::new(
            Opts::new(
                "mcp_breaker_state_changes_total",
                "Circuit breaker state transitions by dependency and new state",
            ),
            &["dependency", "state"],
        )
        .expect("metric construction");
        let exec_outcomes_total = IntCounterVec::new(
            Opts::new("mcp_exec_outcomes_total", "Sandboxed execution outcomes"),
            &["outcome"],
        )
        .expect("metric construction");

        for c in [
            &http_requests_total,
            &cache_ops_total,
            &rate_limit_rejections_total,
            &breaker_state_changes_total,
            &exec_outcomes_total,
        ] {
            registry
                .register(Box::new(c.clone()))
                .expect("metric registration");
        }
        registry
            .register(Box::new(http_request_duration_seconds.clone()))
            .expect("metric registration");

        Self {
            registry,
            http_requests_total,
            http_request_duration_seconds,
            cache_ops_total,
            rate_limit_rejections_total,
            breaker_state_changes_total,
            exec_outcomes_total,
        }
    }
}

/// Returns the process-wide metrics instance, creating and registering it on
/// first access.
pub fn metrics() -> &'static Metrics {
    METRICS.get_or_init(Metrics::new)
}

/// Render the registry in Prometheus text exposition format for the
/// `/metrics` endpoint.
pub fn render() -> String {
    let encoder = TextEncoder::new();
    let families = metrics().registry.gather();
    encoder.encode_to_string(&families).unwrap_or_default()
}

/// Tower-friendly middleware recording request count and latency per route.
pub async fn metrics_layer(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());

    let start = Instant::now();
    let response = next.run(req).await;
    let elapsed = start.elapsed().as_secs_f64();

    let m = metrics();
    m.http_requests_total
        .with_label_values(&[method.as_str(), &route, response.status().as_str()])
        .inc();
    m.http_request_duration_seconds
        .with_label_values(&[method.as_str(), &route])
        .observe(elapsed);

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_without_panicking() {
        metrics().cache_ops_total.with_label_values(&["hit"]).inc();
        let text = render();
        assert!(text.contains("mcp_cache_ops_total"));
    }
}
