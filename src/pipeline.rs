//! Submission orchestration
//!
//! One `submit` call drives the full sequence: acquire a connection,
//! aggregate the input batch (memoized through the result cache), sign
//! off-thread, price against the live congestion signal, and send. Steps
//! run strictly in that order; transient transport failures retry with
//! bounded backoff against freshly acquired connections.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{info, instrument, warn};

use crate::aggregator::Aggregator;
use crate::cache::ResultCache;
use crate::connection::backoff::ExponentialBackoff;
use crate::connection::ConnectionPool;
use crate::error::PipelineError;
use crate::fee::FeeEstimator;
use crate::metrics::{metrics, Timer};
use crate::observability::CorrelationId;
use crate::signing::SigningPool;
use crate::types::Transaction;

/// External congestion signal, nominally in [0, 1]
#[async_trait]
pub trait CongestionSource: Send + Sync {
    async fn sample(&self) -> f64;
}

/// Fixed congestion level from configuration or tests
pub struct FixedCongestion(pub f64);

#[async_trait]
impl CongestionSource for FixedCongestion {
    async fn sample(&self) -> f64 {
        self.0
    }
}

/// One unit of work for the pipeline
#[derive(Debug, Clone)]
pub struct SubmissionRequest {
    pub transaction: Transaction,

    /// Sample batch feeding the critical-path aggregation
    pub samples: Vec<u64>,
}

/// Everything the caller learns about a completed submission
#[derive(Debug, Clone)]
pub struct SubmissionReport {
    pub request_id: CorrelationId,
    pub endpoint: String,
    pub ack: String,
    pub aggregate: u64,
    pub priority_fee: u64,
    pub signature: String,
    pub elapsed: Duration,
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Deadline for one signing round-trip
    pub sign_timeout: Duration,

    /// Total submit attempts before giving up on transient failures
    pub max_submit_attempts: u32,

    pub retry_initial_backoff_ms: u64,
    pub retry_max_backoff_ms: u64,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            sign_timeout: Duration::from_secs(2),
            max_submit_attempts: 3,
            retry_initial_backoff_ms: 100,
            retry_max_backoff_ms: 5_000,
        }
    }
}

pub struct SubmissionPipeline {
    connections: Arc<ConnectionPool>,
    cache: Arc<ResultCache<u64>>,
    signing: Arc<SigningPool>,
    fees: FeeEstimator,
    aggregator: Aggregator,
    congestion: Arc<dyn CongestionSource>,
    options: PipelineOptions,
}

impl SubmissionPipeline {
    pub fn new(
        connections: Arc<ConnectionPool>,
        cache: Arc<ResultCache<u64>>,
        signing: Arc<SigningPool>,
        fees: FeeEstimator,
        aggregator: Aggregator,
        congestion: Arc<dyn CongestionSource>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            connections,
            cache,
            signing,
            fees,
            aggregator,
            congestion,
            options,
        }
    }

    /// Drive one submission end to end.
    #[instrument(skip(self, request), fields(destination = %request.transaction.destination))]
    pub async fn submit(
        &self,
        request: SubmissionRequest,
    ) -> Result<SubmissionReport, PipelineError> {
        metrics().submissions_total.inc();
        let result = self.run(request).await;

        match &result {
            Ok(report) => {
                metrics().submissions_success.inc();
                metrics()
                    .submission_latency
                    .observe(report.elapsed.as_secs_f64());
            }
            Err(err) => {
                metrics().submissions_failed.inc();
                warn!(
                    category = err.category(),
                    retryable = err.is_retryable(),
                    error = %err,
                    "submission failed"
                );
            }
        }

        result
    }

    async fn run(&self, request: SubmissionRequest) -> Result<SubmissionReport, PipelineError> {
        let started = Instant::now();
        let request_id = CorrelationId::new();
        let SubmissionRequest {
            transaction,
            samples,
        } = request;

        if transaction.payload.is_empty() {
            return Err(PipelineError::InvalidTransaction(
                "empty payload".to_string(),
            ));
        }

        // 1. Connection
        let connection = self
            .connections
            .acquire()
            .await
            .map_err(|e| PipelineError::ConnectionUnavailable(e.to_string()))?;
        info!(
            request_id = %request_id,
            endpoint = connection.endpoint(),
            "acquired connection"
        );

        // 2. Critical-path aggregation, memoized by batch fingerprint
        let fingerprint = self.aggregator.fingerprint(&samples);
        let aggregate = match self.cache.get(&fingerprint) {
            Some(value) => {
                metrics().cache_hits.inc();
                value
            }
            None => {
                metrics().cache_misses.inc();
                let value = self.aggregator.aggregate(&samples);
                self.cache.insert(fingerprint, value);
                value
            }
        };
        info!(request_id = %request_id, aggregate, "critical path aggregated");

        // 3. Off-thread signing
        let sign_timer = Timer::new();
        let mut signed = self
            .signing
            .sign_with_timeout(transaction, self.options.sign_timeout)
            .await
            .map_err(|err| {
                metrics().sign_failures_total.inc();
                PipelineError::from(err)
            })?;
        sign_timer.observe_duration(&metrics().sign_latency);
        info!(
            request_id = %request_id,
            signature = %signed.signature_hex(),
            "transaction signed"
        );

        // 4. Priority fee from the live congestion signal
        let congestion = self.congestion.sample().await;
        if !congestion.is_finite() {
            return Err(PipelineError::InvalidCongestion(congestion));
        }
        let priority_fee = self.fees.estimate(congestion);
        signed.priority_fee = Some(priority_fee);
        info!(request_id = %request_id, congestion, priority_fee, "priority fee attached");

        // 5. Submission with bounded retry on transient transport failures
        let (ack, endpoint) = self
            .submit_with_retry(&request_id, &signed, connection)
            .await?;

        let elapsed = started.elapsed();
        info!(
            request_id = %request_id,
            endpoint = %endpoint,
            ack = %ack,
            elapsed_ms = elapsed.as_millis() as u64,
            "submission complete"
        );

        Ok(SubmissionReport {
            request_id,
            endpoint,
            ack,
            aggregate,
            priority_fee,
            signature: signed.signature_hex(),
            elapsed,
        })
    }

    async fn submit_with_retry(
        &self,
        request_id: &CorrelationId,
        signed: &crate::types::SignedTransaction,
        mut connection: crate::connection::Connection,
    ) -> Result<(String, String), PipelineError> {
        let attempts = self.options.max_submit_attempts.max(1);
        let mut backoff = ExponentialBackoff::new(
            self.options.retry_initial_backoff_ms,
            self.options.retry_max_backoff_ms,
        );
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match connection.submit(signed).await {
                Ok(ack) => return Ok((ack, connection.endpoint().to_string())),
                Err(err) if err.is_transient() => {
                    warn!(
                        request_id = %request_id,
                        endpoint = connection.endpoint(),
                        attempt,
                        error = %err,
                        "transient submit failure"
                    );
                    last_error = err.to_string();
                    if attempt == attempts {
                        break;
                    }
                    tokio::time::sleep(backoff.next_backoff()).await;
                    // The failed endpoint was penalized inside submit; a
                    // fresh acquire rotates to a healthy one.
                    connection = self
                        .connections
                        .acquire()
                        .await
                        .map_err(|e| PipelineError::ConnectionUnavailable(e.to_string()))?;
                }
                Err(err) => {
                    return Err(PipelineError::Transport {
                        endpoint: connection.endpoint().to_string(),
                        source: err,
                    })
                }
            }
        }

        Err(PipelineError::RetriesExhausted {
            attempts,
            last_error,
        })
    }
}
