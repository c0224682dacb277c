//! Common types used throughout the pipeline

use serde::{Deserialize, Serialize};

/// Length of the signature blob produced by the signing pool.
pub const SIGNATURE_LEN: usize = 64;

/// Opaque transaction payload plus submission metadata.
///
/// The payload's wire format is owned by the upstream blockchain client;
/// the pipeline never inspects it beyond checking it is non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Destination address the payload is bound for
    pub destination: String,

    /// Caller-assigned sequence number
    pub sequence: u64,

    /// Opaque payload bytes
    pub payload: Vec<u8>,
}

impl Transaction {
    pub fn new(destination: impl Into<String>, sequence: u64, payload: Vec<u8>) -> Self {
        Self {
            destination: destination.into(),
            sequence,
            payload,
        }
    }
}

/// A transaction with its signature blob attached.
///
/// Produced exactly once per sign request by the signing pool. The priority
/// fee is submission metadata set by the orchestrator after signing; it is
/// not part of the signed bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub transaction: Transaction,

    /// Signature over the payload bytes
    pub signature: [u8; SIGNATURE_LEN],

    /// Public key of the identity that produced the signature
    pub signer_pubkey: [u8; 32],

    /// Priority fee attached before submission
    pub priority_fee: Option<u64>,
}

impl SignedTransaction {
    pub fn new(
        transaction: Transaction,
        signature: [u8; SIGNATURE_LEN],
        signer_pubkey: [u8; 32],
    ) -> Self {
        Self {
            transaction,
            signature,
            signer_pubkey,
            priority_fee: None,
        }
    }

    /// Hex rendering of the signature for logs and wire bodies
    pub fn signature_hex(&self) -> String {
        hex::encode(self.signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_hex_roundtrip() {
        let tx = Transaction::new("dest", 7, vec![1, 2, 3]);
        let signed = SignedTransaction::new(tx, [0xAB; SIGNATURE_LEN], [0; 32]);
        assert_eq!(signed.signature_hex().len(), SIGNATURE_LEN * 2);
        assert!(signed.signature_hex().starts_with("abab"));
        assert!(signed.priority_fee.is_none());
    }
}
