//! Shared metrics recording for entity store backends.

use std::time::Instant;

/// Records count and latency metrics for one store operation.
///
/// - `entity_store_operations_total{backend, operation, status}`
/// - `entity_store_operation_duration_ms{backend, operation, status}`
///
/// `status` is `"success"` or `"error"` depending on `result`.
pub fn record_operation_metrics<T>(
    backend: &'static str,
    operation: &'static str,
    start: Instant,
    result: &crate::Result<T>,
) {
    let status = if result.is_ok() { "success" } else { "error" };
    metrics::counter!(
        "entity_store_operations_total",
        "backend" => backend,
        "operation" => operation,
        "status" => status
    )
    .increment(1);
    metrics::histogram!(
        "entity_store_operation_duration_ms",
        "backend" => backend,
        "operation" => operation,
        "status" => status
    )
    .record(start.elapsed().as_secs_f64() * 1000.0);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use metrics_exporter_prometheus::PrometheusBuilder;

    #[test]
    fn test_records_status_labels() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        metrics::with_local_recorder(&recorder, || {
            let start = Instant::now();
            record_operation_metrics("sqlite", "fetch", start, &Ok::<_, Error>(3));
            record_operation_metrics::<()>(
                "sqlite",
                "fetch",
                start,
                &Err(Error::not_found("entity")),
            );
        });

        let rendered = handle.render();
        assert!(rendered.contains("entity_store_operations_total"));
        assert!(rendered.contains("status=\"success\""));
        assert!(rendered.contains("status=\"error\""));
    }
}
