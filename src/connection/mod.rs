//! Endpoint connection pooling with health probing and intelligent failover
//!
//! Endpoints come from a static configured list. Each one carries its own
//! lifecycle state machine (Disconnected → Connecting → Connected, with
//! Failed → Disconnected on cooldown expiry), a consecutive-failure counter,
//! and a reconnect backoff. `acquire` hands out one healthy connection per
//! request, rotating round-robin across the list.

pub mod backoff;
pub mod transport;

pub use transport::{HttpTransport, MemoryTransport, Transport, TransportError};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::metrics::{metrics, Timer};
use crate::types::SignedTransaction;
use backoff::ExponentialBackoff;

/// Lifecycle state of a single endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

#[derive(Error, Debug)]
pub enum PoolError {
    #[error("no endpoints configured")]
    NoEndpoints,

    #[error("no healthy endpoint available ({total} configured, {failed} failed)")]
    NoHealthyEndpoint { total: usize, failed: usize },
}

#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Consecutive failures before an endpoint trips into Failed
    pub failure_threshold: u64,

    /// Interval between background health probes
    pub health_check_interval: Duration,

    /// Initial cooldown after tripping, doubled per consecutive trip
    pub reconnect_initial_backoff_ms: u64,

    /// Cooldown ceiling
    pub reconnect_max_backoff_ms: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            health_check_interval: Duration::from_secs(30),
            reconnect_initial_backoff_ms: 500,
            reconnect_max_backoff_ms: 30_000,
        }
    }
}

struct EndpointSlot {
    url: String,
    state: RwLock<ConnectionState>,
    consecutive_failures: AtomicU64,
    total_submissions: AtomicU64,
    successful_submissions: AtomicU64,
    cooldown_until: RwLock<Option<Instant>>,
    reconnect_backoff: Mutex<ExponentialBackoff>,
    failure_threshold: u64,
}

impl EndpointSlot {
    fn new(url: String, config: &PoolConfig) -> Self {
        Self {
            url,
            state: RwLock::new(ConnectionState::Disconnected),
            consecutive_failures: AtomicU64::new(0),
            total_submissions: AtomicU64::new(0),
            successful_submissions: AtomicU64::new(0),
            cooldown_until: RwLock::new(None),
            reconnect_backoff: Mutex::new(ExponentialBackoff::new(
                config.reconnect_initial_backoff_ms,
                config.reconnect_max_backoff_ms,
            )),
            failure_threshold: config.failure_threshold,
        }
    }

    async fn is_in_cooldown(&self) -> bool {
        match *self.cooldown_until.read().await {
            Some(until) => Instant::now() < until,
            None => false,
        }
    }

    async fn mark_connected(&self) {
        self.consecutive_failures.store(0, Ordering::Relaxed);
        self.reconnect_backoff.lock().await.reset();
        *self.cooldown_until.write().await = None;
        *self.state.write().await = ConnectionState::Connected;
    }

    /// Count a failure; trips into Failed with a cooldown once the
    /// threshold is crossed, otherwise drops back to Disconnected.
    async fn record_failure(&self) {
        let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
        if failures >= self.failure_threshold {
            let cooldown = self.reconnect_backoff.lock().await.next_backoff();
            *self.cooldown_until.write().await = Some(Instant::now() + cooldown);
            *self.state.write().await = ConnectionState::Failed;
            warn!(
                endpoint = %self.url,
                failures,
                cooldown_ms = cooldown.as_millis() as u64,
                "endpoint tripped into cooldown"
            );
        } else {
            *self.state.write().await = ConnectionState::Disconnected;
        }
    }

    fn success_rate(&self) -> f64 {
        let total = self.total_submissions.load(Ordering::Relaxed);
        if total == 0 {
            return 1.0;
        }
        self.successful_submissions.load(Ordering::Relaxed) as f64 / total as f64
    }
}

/// Handle to one live endpoint.
///
/// Submission outcomes feed back into the endpoint's health tracking, so a
/// dying endpoint is evicted from rotation without a separate probe cycle.
pub struct Connection {
    slot: Arc<EndpointSlot>,
    transport: Arc<dyn Transport>,
}

impl Connection {
    pub fn endpoint(&self) -> &str {
        &self.slot.url
    }

    pub async fn submit(&self, signed: &SignedTransaction) -> Result<String, TransportError> {
        self.slot.total_submissions.fetch_add(1, Ordering::Relaxed);
        let timer = Timer::new();

        match self.transport.submit(&self.slot.url, signed).await {
            Ok(ack) => {
                self.slot
                    .successful_submissions
                    .fetch_add(1, Ordering::Relaxed);
                timer.observe_duration(&metrics().transport_latency);
                self.slot.mark_connected().await;
                Ok(ack)
            }
            Err(err) => {
                // A rejection means the endpoint is alive; only network-level
                // failures count against its health.
                if err.is_transient() {
                    self.slot.record_failure().await;
                }
                Err(err)
            }
        }
    }
}

pub struct ConnectionPool {
    endpoints: Vec<Arc<EndpointSlot>>,
    transport: Arc<dyn Transport>,
    cursor: AtomicU64,
    config: PoolConfig,
}

impl ConnectionPool {
    pub fn new(
        urls: Vec<String>,
        transport: Arc<dyn Transport>,
        config: PoolConfig,
    ) -> Result<Self, PoolError> {
        if urls.is_empty() {
            return Err(PoolError::NoEndpoints);
        }
        let endpoints = urls
            .into_iter()
            .map(|url| Arc::new(EndpointSlot::new(url, &config)))
            .collect();
        Ok(Self {
            endpoints,
            transport,
            cursor: AtomicU64::new(0),
            config,
        })
    }

    /// Hand out one healthy connection, probing cold endpoints on demand.
    ///
    /// Rotates round-robin; endpoints in cooldown are skipped, endpoints
    /// whose cooldown expired get one reconnect attempt.
    pub async fn acquire(&self) -> Result<Connection, PoolError> {
        let total = self.endpoints.len();

        for _ in 0..total {
            let idx = (self.cursor.fetch_add(1, Ordering::Relaxed) as usize) % total;
            let slot = &self.endpoints[idx];

            match *slot.state.read().await {
                ConnectionState::Connected => {
                    debug!(endpoint = %slot.url, "handing out connection");
                    return Ok(self.handle(slot));
                }
                ConnectionState::Failed => {
                    if slot.is_in_cooldown().await {
                        continue;
                    }
                    *slot.state.write().await = ConnectionState::Disconnected;
                }
                ConnectionState::Disconnected | ConnectionState::Connecting => {}
            }

            if self.probe_slot(slot).await {
                return Ok(self.handle(slot));
            }
        }

        let mut failed = 0;
        for slot in &self.endpoints {
            if *slot.state.read().await == ConnectionState::Failed {
                failed += 1;
            }
        }
        warn!(total, failed, "no healthy endpoint available");
        Err(PoolError::NoHealthyEndpoint { total, failed })
    }

    fn handle(&self, slot: &Arc<EndpointSlot>) -> Connection {
        Connection {
            slot: Arc::clone(slot),
            transport: Arc::clone(&self.transport),
        }
    }

    async fn probe_slot(&self, slot: &Arc<EndpointSlot>) -> bool {
        let was_connected = {
            let mut state = slot.state.write().await;
            let was = *state == ConnectionState::Connected;
            if !was {
                *state = ConnectionState::Connecting;
            }
            was
        };

        match self.transport.probe(&slot.url).await {
            Ok(()) => {
                if !was_connected {
                    info!(endpoint = %slot.url, "endpoint connected");
                }
                slot.mark_connected().await;
                true
            }
            Err(err) => {
                warn!(endpoint = %slot.url, error = %err, "endpoint probe failed");
                slot.record_failure().await;
                false
            }
        }
    }

    /// Spawn the background health checker. The returned handle lets the
    /// owner abort the task at shutdown.
    pub fn start_health_checks(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        let pool = self;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(pool.config.health_check_interval);
            loop {
                interval.tick().await;
                pool.check_all_endpoints().await;
            }
        })
    }

    async fn check_all_endpoints(&self) {
        for slot in &self.endpoints {
            if slot.is_in_cooldown().await {
                debug!(endpoint = %slot.url, "endpoint in cooldown, skipping probe");
                continue;
            }
            self.probe_slot(slot).await;
        }
        metrics()
            .healthy_endpoints
            .set(self.connected_count().await as i64);
    }

    pub async fn connected_count(&self) -> usize {
        let mut connected = 0;
        for slot in &self.endpoints {
            if *slot.state.read().await == ConnectionState::Connected {
                connected += 1;
            }
        }
        connected
    }

    pub async fn stats(&self) -> PoolStats {
        let mut stats = PoolStats {
            total_endpoints: self.endpoints.len(),
            connected_endpoints: 0,
            failed_endpoints: 0,
            endpoints: Vec::with_capacity(self.endpoints.len()),
        };

        for slot in &self.endpoints {
            let state = *slot.state.read().await;
            match state {
                ConnectionState::Connected => stats.connected_endpoints += 1,
                ConnectionState::Failed => stats.failed_endpoints += 1,
                _ => {}
            }
            stats.endpoints.push(EndpointStatus {
                url: slot.url.clone(),
                state,
                success_rate: slot.success_rate(),
                consecutive_failures: slot.consecutive_failures.load(Ordering::Relaxed),
                in_cooldown: slot.is_in_cooldown().await,
            });
        }

        stats
    }
}

#[derive(Debug, Clone)]
pub struct PoolStats {
    pub total_endpoints: usize,
    pub connected_endpoints: usize,
    pub failed_endpoints: usize,
    pub endpoints: Vec<EndpointStatus>,
}

#[derive(Debug, Clone)]
pub struct EndpointStatus {
    pub url: String,
    pub state: ConnectionState,
    pub success_rate: f64,
    pub consecutive_failures: u64,
    pub in_cooldown: bool,
}
