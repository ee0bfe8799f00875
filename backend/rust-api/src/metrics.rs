use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec, IntCounterVec,
    TextEncoder,
};

lazy_static! {
    // HTTP Metrics
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"]
    )
    .unwrap();

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .unwrap();

    // Database Metrics (MongoDB)
    pub static ref DB_OPERATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "db_operations_total",
        "Total number of database operations",
        &["operation", "collection", "status"]
    )
    .unwrap();

    pub static ref DB_OPERATION_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "db_operation_duration_seconds",
        "Database operation duration in seconds",
        &["operation", "collection"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .unwrap();

    // Redis (rate limits, login lockout)
    pub static ref REDIS_OPERATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "redis_operations_total",
        "Total number of Redis operations",
        &["operation", "status"]
    )
    .unwrap();

    pub static ref RATE_LIMIT_REJECTIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "rate_limit_rejections_total",
        "Requests rejected by a rate limit",
        &["scope"]
    )
    .unwrap();

    // Business Metrics
    pub static ref SURVEY_RESPONSES_SUBMITTED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "survey_responses_submitted_total",
        "Survey response submissions by outcome",
        &["result"]
    )
    .unwrap();

    pub static ref SURVEY_ANALYTICS_COMPUTED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "survey_analytics_computed_total",
        "Analytics aggregations computed",
        &["scope"]
    )
    .unwrap();

    pub static ref NARRATIVE_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "narrative_requests_total",
        "Narrative analysis requests sent to the language model",
        &["status"]
    )
    .unwrap();

    pub static ref LOGIN_ATTEMPTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "login_attempts_total",
        "Login attempts by outcome",
        &["result"]
    )
    .unwrap();
}

/// Renders all metrics in Prometheus text format
pub fn render_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer)
        .map_err(|e| prometheus::Error::Msg(format!("Failed to convert metrics to UTF-8: {}", e)))
}

/// Helper: track database operation with metrics
pub async fn track_db_operation<F, T>(
    operation: &str,
    collection: &str,
    future: F,
) -> Result<T, anyhow::Error>
where
    F: std::future::Future<Output = Result<T, anyhow::Error>>,
{
    let start = std::time::Instant::now();
    let result = future.await;
    let duration = start.elapsed().as_secs_f64();

    let status = if result.is_ok() { "success" } else { "error" };

    DB_OPERATIONS_TOTAL
        .with_label_values(&[operation, collection, status])
        .inc();

    DB_OPERATION_DURATION_SECONDS
        .with_label_values(&[operation, collection])
        .observe(duration);

    result
}

pub fn record_redis_operation(operation: &str, ok: bool) {
    let status = if ok { "success" } else { "error" };
    REDIS_OPERATIONS_TOTAL
        .with_label_values(&[operation, status])
        .inc();
}

pub fn record_submission(result: &str) {
    SURVEY_RESPONSES_SUBMITTED_TOTAL
        .with_label_values(&[result])
        .inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_registration() {
        let _ = HTTP_REQUESTS_TOTAL
            .with_label_values(&["GET", "/health", "200"])
            .get();
        let _ = SURVEY_ANALYTICS_COMPUTED_TOTAL
            .with_label_values(&["survey"])
            .get();
    }

    #[test]
    fn test_render_metrics() {
        record_submission("accepted");

        let output = render_metrics().unwrap();
        assert!(output.contains("survey_responses_submitted_total"));
    }

    #[tokio::test]
    async fn test_track_db_operation_passes_result_through() {
        let value = track_db_operation("find", "surveys", async { Ok::<_, anyhow::Error>(42) })
            .await
            .unwrap();
        assert_eq!(value, 42);

        let failed: Result<(), _> =
            track_db_operation("find", "surveys", async { Err(anyhow::anyhow!("boom")) }).await;
        assert!(failed.is_err());
    }
}
