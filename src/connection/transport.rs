//! Transport seam for endpoint probing and payload submission
//!
//! The pool treats endpoints as opaque string addresses; everything about
//! the actual wire (TLS, handshake, encoding) lives behind [`Transport`].

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use dashmap::DashMap;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::types::SignedTransaction;

#[derive(Error, Debug)]
pub enum TransportError {
    /// Endpoint could not be reached at the network level
    #[error("endpoint unreachable: {0}")]
    Unreachable(String),

    /// Request exceeded the configured deadline
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Endpoint answered but refused the submission
    #[error("endpoint rejected submission: {0}")]
    Rejected(String),

    /// Endpoint answered with a body the transport could not decode
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl TransportError {
    /// Whether retrying against this or another endpoint may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unreachable(_) | Self::Timeout(_))
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Cheap liveness probe against an endpoint
    async fn probe(&self, endpoint: &str) -> Result<(), TransportError>;

    /// Submit a signed transaction; returns the endpoint's acknowledgment id
    async fn submit(
        &self,
        endpoint: &str,
        signed: &SignedTransaction,
    ) -> Result<String, TransportError>;
}

#[derive(Debug, Deserialize)]
struct AckResponse {
    id: String,
}

/// HTTP transport posting submissions as JSON
pub struct HttpTransport {
    client: reqwest::Client,
    request_timeout: Duration,
}

impl HttpTransport {
    pub fn new(request_timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        Ok(Self {
            client,
            request_timeout,
        })
    }

    fn map_error(&self, err: reqwest::Error) -> TransportError {
        if err.is_timeout() {
            TransportError::Timeout(self.request_timeout)
        } else {
            TransportError::Unreachable(err.to_string())
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn probe(&self, endpoint: &str) -> Result<(), TransportError> {
        let url = format!("{}/health", endpoint.trim_end_matches('/'));
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.map_error(e))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(TransportError::Rejected(format!(
                "probe returned status {}",
                response.status()
            )))
        }
    }

    async fn submit(
        &self,
        endpoint: &str,
        signed: &SignedTransaction,
    ) -> Result<String, TransportError> {
        let url = format!("{}/transactions", endpoint.trim_end_matches('/'));
        let body = serde_json::json!({
            "destination": signed.transaction.destination,
            "sequence": signed.transaction.sequence,
            "payload": BASE64.encode(&signed.transaction.payload),
            "signature": signed.signature_hex(),
            "signer": hex::encode(signed.signer_pubkey),
            "priority_fee": signed.priority_fee,
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Rejected(format!(
                "submission returned status {status}"
            )));
        }

        let ack: AckResponse = response
            .json()
            .await
            .map_err(|e| TransportError::MalformedResponse(e.to_string()))?;

        debug!(endpoint = %endpoint, ack = %ack.id, "submission acknowledged");
        Ok(ack.id)
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct EndpointBehavior {
    fail_probe: bool,
    fail_submit: bool,
}

/// In-memory transport for tests and offline runs.
///
/// Endpoints succeed by default; individual endpoints can be failed and
/// restored at runtime to simulate outages.
#[derive(Default)]
pub struct MemoryTransport {
    behaviors: DashMap<String, EndpointBehavior>,
    submissions: DashMap<String, u64>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a dead endpoint: probes and submissions both fail
    pub fn fail_endpoint(&self, endpoint: &str) {
        self.behaviors.insert(
            endpoint.to_string(),
            EndpointBehavior {
                fail_probe: true,
                fail_submit: true,
            },
        );
    }

    /// Endpoint probes fine but submissions fail
    pub fn fail_submissions(&self, endpoint: &str) {
        self.behaviors.insert(
            endpoint.to_string(),
            EndpointBehavior {
                fail_probe: false,
                fail_submit: true,
            },
        );
    }

    pub fn restore_endpoint(&self, endpoint: &str) {
        self.behaviors.remove(endpoint);
    }

    /// Number of successful submissions recorded against an endpoint
    pub fn submission_count(&self, endpoint: &str) -> u64 {
        self.submissions.get(endpoint).map(|c| *c).unwrap_or(0)
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn probe(&self, endpoint: &str) -> Result<(), TransportError> {
        let behavior = self
            .behaviors
            .get(endpoint)
            .map(|b| *b)
            .unwrap_or_default();
        if behavior.fail_probe {
            Err(TransportError::Unreachable(endpoint.to_string()))
        } else {
            Ok(())
        }
    }

    async fn submit(
        &self,
        endpoint: &str,
        _signed: &SignedTransaction,
    ) -> Result<String, TransportError> {
        let behavior = self
            .behaviors
            .get(endpoint)
            .map(|b| *b)
            .unwrap_or_default();
        if behavior.fail_submit {
            return Err(TransportError::Unreachable(endpoint.to_string()));
        }
        *self.submissions.entry(endpoint.to_string()).or_insert(0) += 1;
        Ok(format!("ack-{}", uuid::Uuid::new_v4()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Transaction;

    fn sample_signed() -> SignedTransaction {
        SignedTransaction::new(
            Transaction::new("dest", 1, vec![1, 2, 3]),
            [0x11; 64],
            [0x22; 32],
        )
    }

    #[tokio::test]
    async fn memory_transport_defaults_to_success() {
        let transport = MemoryTransport::new();
        assert!(transport.probe("mem://a").await.is_ok());
        let ack = transport.submit("mem://a", &sample_signed()).await.unwrap();
        assert!(ack.starts_with("ack-"));
        assert_eq!(transport.submission_count("mem://a"), 1);
    }

    #[tokio::test]
    async fn memory_transport_failure_injection() {
        let transport = MemoryTransport::new();
        transport.fail_endpoint("mem://down");

        let err = transport.probe("mem://down").await.unwrap_err();
        assert!(err.is_transient());

        transport.restore_endpoint("mem://down");
        assert!(transport.probe("mem://down").await.is_ok());
    }

    #[tokio::test]
    async fn http_transport_submits_and_parses_ack() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/transactions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id":"ack-123"}"#)
            .create_async()
            .await;

        let transport = HttpTransport::new(Duration::from_secs(2)).unwrap();
        let ack = transport
            .submit(&server.url(), &sample_signed())
            .await
            .unwrap();

        assert_eq!(ack, "ack-123");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn http_transport_maps_rejection() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/transactions")
            .with_status(400)
            .create_async()
            .await;

        let transport = HttpTransport::new(Duration::from_secs(2)).unwrap();
        let err = transport
            .submit(&server.url(), &sample_signed())
            .await
            .unwrap_err();

        assert!(matches!(err, TransportError::Rejected(_)));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn http_transport_probes_health() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/health")
            .with_status(200)
            .create_async()
            .await;

        let transport = HttpTransport::new(Duration::from_secs(2)).unwrap();
        assert!(transport.probe(&server.url()).await.is_ok());
    }
}
