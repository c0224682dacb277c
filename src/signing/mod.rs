//! Off-thread signing worker pool
//!
//! Signing runs on dedicated OS threads, not on the async runtime. Jobs
//! cross to the workers over a bounded channel and results come back through
//! one-shot replies, so each request yields exactly one result and no memory
//! is shared between signer and caller. A full queue rejects new work
//! immediately instead of queueing without bound.

mod signer;

pub use signer::{LocalSigner, MockSigner, TransactionSigner};

use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel::{self, Receiver, Sender, TrySendError};
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::debug;

use crate::metrics::metrics;
use crate::types::{SignedTransaction, Transaction};

#[derive(Error, Debug)]
pub enum SignError {
    /// The signing algorithm rejected the payload
    #[error("signer rejected the payload: {0}")]
    Failed(String),

    /// The worker died before delivering a result
    #[error("signing worker terminated before replying")]
    WorkerTerminated,

    /// The job queue is full; the caller should shed load, not wait
    #[error("signing queue is full ({capacity} pending)")]
    PoolSaturated { capacity: usize },

    /// The caller's deadline elapsed while the job was outstanding
    #[error("signing timed out after {0:?}")]
    Timeout(Duration),

    /// The pool has been shut down
    #[error("signing pool is shut down")]
    ShutDown,

    /// Key material could not be loaded
    #[error("invalid signing key: {0}")]
    InvalidKey(String),
}

struct SignJob {
    transaction: Transaction,
    reply: oneshot::Sender<Result<SignedTransaction, SignError>>,
}

pub struct SigningPool {
    job_tx: Option<Sender<SignJob>>,
    workers: Vec<std::thread::JoinHandle<()>>,
    queue_capacity: usize,
}

impl SigningPool {
    /// Spawn `workers` signing threads sharing a queue of `queue_capacity`
    /// pending jobs.
    pub fn new(
        signer: Arc<dyn TransactionSigner>,
        workers: usize,
        queue_capacity: usize,
    ) -> Self {
        let queue_capacity = queue_capacity.max(1);
        let (job_tx, job_rx) = channel::bounded::<SignJob>(queue_capacity);

        let workers = (0..workers.max(1))
            .map(|index| {
                let rx = job_rx.clone();
                let signer = Arc::clone(&signer);
                std::thread::spawn(move || worker_loop(index, rx, signer))
            })
            .collect();

        Self {
            job_tx: Some(job_tx),
            workers,
            queue_capacity,
        }
    }

    /// Queue a transaction for signing and await the result.
    pub async fn sign(&self, transaction: Transaction) -> Result<SignedTransaction, SignError> {
        let reply_rx = self.dispatch(transaction)?;
        match reply_rx.await {
            Ok(result) => result,
            Err(_) => Err(SignError::WorkerTerminated),
        }
    }

    /// Like [`sign`](Self::sign), but abandon the wait after `timeout`.
    ///
    /// The worker still finishes the job and releases its slot; the late
    /// result is dropped on the floor.
    pub async fn sign_with_timeout(
        &self,
        transaction: Transaction,
        timeout: Duration,
    ) -> Result<SignedTransaction, SignError> {
        let reply_rx = self.dispatch(transaction)?;
        match tokio::time::timeout(timeout, reply_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(SignError::WorkerTerminated),
            Err(_) => Err(SignError::Timeout(timeout)),
        }
    }

    fn dispatch(
        &self,
        transaction: Transaction,
    ) -> Result<oneshot::Receiver<Result<SignedTransaction, SignError>>, SignError> {
        let job_tx = self.job_tx.as_ref().ok_or(SignError::ShutDown)?;
        let (reply_tx, reply_rx) = oneshot::channel();

        match job_tx.try_send(SignJob {
            transaction,
            reply: reply_tx,
        }) {
            Ok(()) => {
                metrics().sign_requests_total.inc();
                metrics().signing_inflight.inc();
                Ok(reply_rx)
            }
            Err(TrySendError::Full(_)) => Err(SignError::PoolSaturated {
                capacity: self.queue_capacity,
            }),
            Err(TrySendError::Disconnected(_)) => Err(SignError::ShutDown),
        }
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }
}

impl Drop for SigningPool {
    fn drop(&mut self) {
        // Closing the channel lets workers drain remaining jobs and exit.
        self.job_tx.take();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

fn worker_loop(index: usize, rx: Receiver<SignJob>, signer: Arc<dyn TransactionSigner>) {
    while let Ok(job) = rx.recv() {
        // The slot is released even if the signer panics mid-job.
        let _slot = scopeguard::guard((), |_| {
            metrics().signing_inflight.dec();
        });

        let SignJob { transaction, reply } = job;
        let result = signer
            .sign(&transaction.payload)
            .map(|signature| SignedTransaction::new(transaction, signature, signer.pubkey()));

        // The caller may have timed out and dropped the receiver.
        let _ = reply.send(result);
    }
    debug!(worker = index, "signing worker exiting");
}
