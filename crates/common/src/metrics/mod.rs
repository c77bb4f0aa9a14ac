//! Metrics and observability utilities
//!
//! Prometheus metrics for the gateways and the retrieval pipeline with
//! standardized naming conventions.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all ProtoLens metrics
pub const METRICS_PREFIX: &str = "protolens";

/// Buckets for retrieval latency (in seconds)
pub const RETRIEVAL_BUCKETS: &[f64] = &[
    0.010,  // 10ms
    0.050,  // 50ms
    0.100,  // 100ms
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.500,  // 2.5s
    5.000,  // 5s
    10.00,  // 10s
];

/// Buckets for gateway latency (local models are slow)
pub const GATEWAY_BUCKETS: &[f64] = &[
    0.100,  // 100ms
    0.500,  // 500ms
    1.000,  // 1s
    2.500,  // 2.5s
    5.000,  // 5s
    10.00,  // 10s
    20.00,  // 20s - quick preset
    45.00,  // 45s - reading preset
    60.00,  // 60s - warm-up
    120.0,  // 120s - embedding
];

/// Register all metric descriptions
pub fn register_metrics() {
    // Embedding metrics
    describe_counter!(
        format!("{}_embedding_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total embedding requests"
    );

    describe_histogram!(
        format!("{}_embedding_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Embedding latency in seconds"
    );

    // Generation metrics
    describe_counter!(
        format!("{}_generation_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total generation requests by call kind and outcome"
    );

    describe_histogram!(
        format!("{}_generation_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Generation latency in seconds"
    );

    describe_counter!(
        format!("{}_gateway_retries_total", METRICS_PREFIX),
        Unit::Count,
        "Gateway calls repeated after a timeout"
    );

    // Retrieval metrics
    describe_histogram!(
        format!("{}_retrieval_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Retrieval latency in seconds"
    );

    describe_histogram!(
        format!("{}_retrieval_candidates", METRICS_PREFIX),
        Unit::Count,
        "Candidates returned per retrieval"
    );

    // Answer and extraction metrics
    describe_counter!(
        format!("{}_answers_total", METRICS_PREFIX),
        Unit::Count,
        "Answers produced by status"
    );

    describe_counter!(
        format!("{}_sections_extracted_total", METRICS_PREFIX),
        Unit::Count,
        "Sections extracted by status"
    );

    // Ingestion metrics
    describe_counter!(
        format!("{}_pages_ingested_total", METRICS_PREFIX),
        Unit::Count,
        "Total pages ingested"
    );

    describe_counter!(
        format!("{}_chunks_created_total", METRICS_PREFIX),
        Unit::Count,
        "Total chunks created"
    );

    describe_histogram!(
        format!("{}_ingestion_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Document ingestion latency in seconds"
    );

    tracing::info!("Metrics registered");
}

/// Times one gateway call
pub struct GatewayTimer {
    start: Instant,
    kind: &'static str,
}

impl GatewayTimer {
    /// Start timing a generation call of the given kind
    pub fn generation(kind: &'static str) -> Self {
        Self {
            start: Instant::now(),
            kind,
        }
    }

    /// Record the outcome of the call
    pub fn finish(self, outcome: &str) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_generation_requests_total", METRICS_PREFIX),
            "kind" => self.kind,
            "outcome" => outcome.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_generation_duration_seconds", METRICS_PREFIX),
            "kind" => self.kind
        )
        .record(duration);
    }
}

/// Helper to record embedding metrics
pub fn record_embedding(duration_secs: f64, model: &str, batch_size: usize, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_embedding_requests_total", METRICS_PREFIX),
        "model" => model.to_string(),
        "status" => status
    )
    .increment(batch_size as u64);

    if success {
        histogram!(
            format!("{}_embedding_duration_seconds", METRICS_PREFIX),
            "model" => model.to_string()
        )
        .record(duration_secs);
    }
}

/// Helper to record a timeout retry
pub fn record_retry(operation: &str) {
    counter!(
        format!("{}_gateway_retries_total", METRICS_PREFIX),
        "operation" => operation.to_string()
    )
    .increment(1);
}

/// Helper to record retrieval metrics
pub fn record_retrieval(duration_secs: f64, candidate_count: usize) {
    histogram!(format!("{}_retrieval_duration_seconds", METRICS_PREFIX)).record(duration_secs);
    histogram!(format!("{}_retrieval_candidates", METRICS_PREFIX)).record(candidate_count as f64);
}

/// Helper to record an answer outcome
pub fn record_answer(status: &str) {
    counter!(
        format!("{}_answers_total", METRICS_PREFIX),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Helper to record a section extraction outcome
pub fn record_section(section: &str, status: &str) {
    counter!(
        format!("{}_sections_extracted_total", METRICS_PREFIX),
        "section" => section.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Helper to record ingestion metrics
pub fn record_ingestion(duration_secs: f64, pages: usize, chunks_created: usize) {
    counter!(format!("{}_pages_ingested_total", METRICS_PREFIX)).increment(pages as u64);
    counter!(format!("{}_chunks_created_total", METRICS_PREFIX)).increment(chunks_created as u64);
    histogram!(format!("{}_ingestion_duration_seconds", METRICS_PREFIX)).record(duration_secs);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buckets_sorted() {
        for buckets in [RETRIEVAL_BUCKETS, GATEWAY_BUCKETS] {
            let mut prev = 0.0;
            for &bucket in buckets {
                assert!(bucket > prev);
                prev = bucket;
            }
        }
        // Every preset timeout should land on a bucket edge
        assert!(GATEWAY_BUCKETS.contains(&45.0));
        assert!(GATEWAY_BUCKETS.contains(&120.0));
    }

    #[test]
    fn test_gateway_timer() {
        let timer = GatewayTimer::generation("reading");
        timer.finish("success");
        // No recorder installed, just verify it runs without panic
    }
}
