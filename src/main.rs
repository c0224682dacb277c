//! txpipe - priority-fee-aware transaction submission pipeline
//!
//! Binary entry point: loads configuration, wires the connection pool,
//! signing pool, cache, and fee estimator into a pipeline, and drives one
//! demonstration submission end to end.

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use txpipe::aggregator::Aggregator;
use txpipe::cache::ResultCache;
use txpipe::config::Config;
use txpipe::connection::{ConnectionPool, HttpTransport, Transport};
use txpipe::endpoints::metrics_server;
use txpipe::fee::FeeEstimator;
use txpipe::pipeline::{FixedCongestion, SubmissionPipeline, SubmissionRequest};
use txpipe::signing::{LocalSigner, SigningPool, TransactionSigner};
use txpipe::types::Transaction;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.verbose)?;

    info!("Starting txpipe submission pipeline");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = load_config(&args.config)?;
    config.validate().context("invalid configuration")?;

    if config.monitoring.enable_metrics {
        let port = config.monitoring.metrics_port;
        info!("Starting metrics server on port {}", port);
        tokio::spawn(async move {
            if let Err(e) = metrics_server(port).await {
                error!("Metrics server error: {}", e);
            }
        });
    }

    // Signing identity
    let signer: Arc<dyn TransactionSigner> =
        match LocalSigner::from_file(&config.signing.keypair_path) {
            Ok(signer) => Arc::new(signer),
            Err(e) => {
                warn!(
                    keypair_path = %config.signing.keypair_path,
                    error = %e,
                    "keypair unavailable, using ephemeral signing key"
                );
                Arc::new(LocalSigner::ephemeral())
            }
        };
    info!("Signer public key: {}", hex::encode(signer.pubkey()));

    let signing = Arc::new(SigningPool::new(
        signer,
        config.signing.workers,
        config.signing.queue_depth,
    ));
    info!("Signing pool running {} workers", signing.worker_count());

    // Connection pool
    info!(
        "Initializing connection pool with {} endpoints",
        config.endpoints.urls.len()
    );
    let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(
        std::time::Duration::from_secs(config.endpoints.request_timeout_secs),
    )?);
    let connections = Arc::new(
        ConnectionPool::new(
            config.endpoints.urls.clone(),
            transport,
            config.pool_config(),
        )
        .context("failed to build connection pool")?,
    );
    let health_task = Arc::clone(&connections).start_health_checks();

    // Pipeline
    let cache = Arc::new(ResultCache::new(config.cache.capacity));
    let pipeline = SubmissionPipeline::new(
        Arc::clone(&connections),
        cache,
        signing,
        FeeEstimator::new(
            config.fees.min_fee,
            config.fees.max_fee,
            config.fees.congestion_multiplier,
        ),
        Aggregator::new(config.submission.aggregate_threshold),
        Arc::new(FixedCongestion(config.submission.static_congestion)),
        config.pipeline_options(),
    );

    // Demonstration submission over a synthetic sample batch
    let samples: Vec<u64> = (0..10_000).map(|_| fastrand::u64(..2_000)).collect();
    let transaction = Transaction::new("demo-destination", 1, b"sample transaction data".to_vec());

    match pipeline
        .submit(SubmissionRequest {
            transaction,
            samples,
        })
        .await
    {
        Ok(report) => {
            info!("Submission acknowledged");
            info!("   Endpoint:      {}", report.endpoint);
            info!("   Ack:           {}", report.ack);
            info!("   Aggregate:     {}", report.aggregate);
            info!("   Priority fee:  {}", report.priority_fee);
            info!("   Elapsed:       {:.2?}", report.elapsed);
        }
        Err(e) => {
            error!(category = e.category(), "Submission failed: {}", e);
            let stats = connections.stats().await;
            error!(
                "Pool state: {}/{} endpoints connected, {} failed",
                stats.connected_endpoints, stats.total_endpoints, stats.failed_endpoints
            );
            health_task.abort();
            return Err(e.into());
        }
    }

    health_task.abort();
    info!("Shutting down");
    Ok(())
}

/// Initialize logging subsystem
fn init_logging(verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        "txpipe=debug,info"
    } else {
        "txpipe=info,warn,error"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();

    Ok(())
}

/// Load configuration from file with fallback to defaults
fn load_config(path: &str) -> Result<Config> {
    if std::path::Path::new(path).exists() {
        Config::from_file_with_env(path)
            .with_context(|| format!("Failed to load config from {}", path))
    } else {
        warn!("Config file '{}' not found, using defaults", path);
        Ok(Config::default())
    }
}
