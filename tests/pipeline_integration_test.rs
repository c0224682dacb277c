//! End-to-end pipeline tests against the in-memory transport

use std::sync::Arc;
use std::time::Duration;

use txpipe::aggregator::Aggregator;
use txpipe::cache::ResultCache;
use txpipe::connection::{ConnectionPool, MemoryTransport, PoolConfig, Transport};
use txpipe::fee::FeeEstimator;
use txpipe::pipeline::{
    CongestionSource, FixedCongestion, PipelineOptions, SubmissionPipeline, SubmissionRequest,
};
use txpipe::signing::{MockSigner, SigningPool};
use txpipe::types::Transaction;
use txpipe::PipelineError;

const ENDPOINTS: [&str; 3] = ["mem://node-a", "mem://node-b", "mem://node-c"];

struct Harness {
    transport: Arc<MemoryTransport>,
    connections: Arc<ConnectionPool>,
    cache: Arc<ResultCache<u64>>,
    pipeline: SubmissionPipeline,
}

fn build_harness(congestion: Arc<dyn CongestionSource>, failure_threshold: u64) -> Harness {
    let transport = Arc::new(MemoryTransport::new());
    let pool_config = PoolConfig {
        failure_threshold,
        health_check_interval: Duration::from_secs(3600),
        reconnect_initial_backoff_ms: 5_000,
        reconnect_max_backoff_ms: 10_000,
    };
    let transport_dyn: Arc<dyn Transport> = transport.clone();
    let connections = Arc::new(
        ConnectionPool::new(
            ENDPOINTS.iter().map(|u| u.to_string()).collect(),
            transport_dyn,
            pool_config,
        )
        .unwrap(),
    );
    let cache = Arc::new(ResultCache::new(64));
    let signing = Arc::new(SigningPool::new(Arc::new(MockSigner::new([5; 32])), 2, 16));

    let options = PipelineOptions {
        sign_timeout: Duration::from_secs(1),
        max_submit_attempts: 3,
        retry_initial_backoff_ms: 1,
        retry_max_backoff_ms: 10,
    };

    let pipeline = SubmissionPipeline::new(
        Arc::clone(&connections),
        Arc::clone(&cache),
        signing,
        FeeEstimator::default(),
        Aggregator::default(),
        congestion,
        options,
    );

    Harness {
        transport,
        connections,
        cache,
        pipeline,
    }
}

fn request(sequence: u64, samples: Vec<u64>) -> SubmissionRequest {
    SubmissionRequest {
        transaction: Transaction::new(
            "demo-destination",
            sequence,
            b"sample transaction data".to_vec(),
        ),
        samples,
    }
}

#[tokio::test]
async fn end_to_end_submission() {
    let harness = build_harness(Arc::new(FixedCongestion(0.5)), 3);

    let report = harness
        .pipeline
        .submit(request(1, vec![500, 1_500, 2_500]))
        .await
        .unwrap();

    assert!(report.ack.starts_with("ack-"));
    assert!(ENDPOINTS.contains(&report.endpoint.as_str()));
    assert_eq!(report.aggregate, 4_000);
    // clamp(0.5 * 100, 1000, 10000)
    assert_eq!(report.priority_fee, 1_000);
    assert_eq!(
        report.signature,
        hex::encode(MockSigner::expected_signature(b"sample transaction data"))
    );
    assert_eq!(harness.transport.submission_count(&report.endpoint), 1);
}

#[tokio::test]
async fn low_congestion_clamps_to_floor_fee() {
    let harness = build_harness(Arc::new(FixedCongestion(0.05)), 3);

    let report = harness
        .pipeline
        .submit(request(1, vec![1_500]))
        .await
        .unwrap();
    assert_eq!(report.priority_fee, 1_000);
}

#[tokio::test]
async fn repeated_batches_are_memoized() {
    let harness = build_harness(Arc::new(FixedCongestion(0.5)), 3);
    let samples = vec![500, 1_500, 2_500, 3_500];

    let first = harness
        .pipeline
        .submit(request(1, samples.clone()))
        .await
        .unwrap();
    let second = harness
        .pipeline
        .submit(request(2, samples))
        .await
        .unwrap();

    assert_eq!(first.aggregate, second.aggregate);
    // Both submissions share one cached aggregate.
    assert_eq!(harness.cache.len(), 1);

    let third = harness
        .pipeline
        .submit(request(3, vec![2_000]))
        .await
        .unwrap();
    assert_eq!(third.aggregate, 2_000);
    assert_eq!(harness.cache.len(), 2);
}

#[tokio::test]
async fn submission_fails_over_to_healthy_endpoint() {
    let harness = build_harness(Arc::new(FixedCongestion(0.5)), 1);

    // node-a probes fine but drops every submission.
    harness.transport.fail_submissions(ENDPOINTS[0]);

    let report = harness.pipeline.submit(request(1, vec![1_500])).await.unwrap();

    assert_ne!(report.endpoint, ENDPOINTS[0]);
    assert!(ENDPOINTS.contains(&report.endpoint.as_str()));
    assert_eq!(harness.transport.submission_count(&report.endpoint), 1);

    // The dead endpoint is out of rotation for subsequent submissions.
    let next = harness.pipeline.submit(request(2, vec![1_500])).await.unwrap();
    assert_ne!(next.endpoint, ENDPOINTS[0]);
}

#[tokio::test]
async fn all_endpoints_down_surfaces_connection_error() {
    let harness = build_harness(Arc::new(FixedCongestion(0.5)), 1);
    for endpoint in ENDPOINTS {
        harness.transport.fail_endpoint(endpoint);
    }

    let err = harness
        .pipeline
        .submit(request(1, vec![1_500]))
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::ConnectionUnavailable(_)));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn empty_payload_is_rejected_without_touching_the_wire() {
    let harness = build_harness(Arc::new(FixedCongestion(0.5)), 3);

    let err = harness
        .pipeline
        .submit(SubmissionRequest {
            transaction: Transaction::new("demo-destination", 1, vec![]),
            samples: vec![1_500],
        })
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::InvalidTransaction(_)));
    assert!(!err.is_retryable());
    for endpoint in ENDPOINTS {
        assert_eq!(harness.transport.submission_count(endpoint), 0);
    }
}

struct NanCongestion;

#[async_trait::async_trait]
impl CongestionSource for NanCongestion {
    async fn sample(&self) -> f64 {
        f64::NAN
    }
}

#[tokio::test]
async fn non_finite_congestion_is_a_permanent_error() {
    let harness = build_harness(Arc::new(NanCongestion), 3);

    let err = harness
        .pipeline
        .submit(request(1, vec![1_500]))
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::InvalidCongestion(_)));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn empty_sample_batch_aggregates_to_zero() {
    let harness = build_harness(Arc::new(FixedCongestion(0.5)), 3);

    let report = harness.pipeline.submit(request(1, vec![])).await.unwrap();
    assert_eq!(report.aggregate, 0);
}

#[tokio::test]
async fn acquire_only_hands_out_configured_endpoints() {
    let harness = build_harness(Arc::new(FixedCongestion(0.5)), 3);

    for _ in 0..8 {
        let conn = harness.connections.acquire().await.unwrap();
        assert!(ENDPOINTS.contains(&conn.endpoint()));
    }
}
