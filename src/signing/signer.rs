//! Signer abstraction supplying the externally provided signing algorithm
//!
//! The pool never assumes a particular scheme; anything implementing
//! [`TransactionSigner`] can be plugged in. The local implementation signs
//! with an ed25519 key loaded from disk.

use anyhow::{Context, Result};
use ed25519_dalek::{Signer as _, SigningKey};
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

use super::SignError;
use crate::types::SIGNATURE_LEN;

/// Signing algorithm seam.
///
/// Implementations run on the pool's worker threads, so they must be cheap
/// to share and must not block on async runtimes.
pub trait TransactionSigner: Send + Sync {
    /// Public key identifying this signer
    fn pubkey(&self) -> [u8; 32];

    /// Sign an opaque message, returning the signature blob
    fn sign(&self, message: &[u8]) -> Result<[u8; SIGNATURE_LEN], SignError>;
}

/// Local ed25519 keypair signer
pub struct LocalSigner {
    key: SigningKey,
}

impl LocalSigner {
    pub fn new(key: SigningKey) -> Self {
        Self { key }
    }

    /// Generate a throwaway key, for tests and keyless demo runs
    pub fn ephemeral() -> Self {
        Self::new(SigningKey::from_bytes(&rand::random::<[u8; 32]>()))
    }

    /// Accepts a 32-byte secret key or a 64-byte keypair; rejects all-zero
    /// material.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SignError> {
        if bytes.iter().all(|&b| b == 0) {
            return Err(SignError::InvalidKey("all-zero key rejected".to_string()));
        }
        match bytes.len() {
            32 => {
                let mut secret = [0u8; 32];
                secret.copy_from_slice(bytes);
                let key = SigningKey::from_bytes(&secret);
                secret.zeroize();
                Ok(Self { key })
            }
            64 => {
                let mut keypair = [0u8; 64];
                keypair.copy_from_slice(bytes);
                let parsed = SigningKey::from_keypair_bytes(&keypair)
                    .map_err(|e| SignError::InvalidKey(e.to_string()));
                keypair.zeroize();
                Ok(Self { key: parsed? })
            }
            other => Err(SignError::InvalidKey(format!(
                "expected 32 or 64 bytes, got {other}"
            ))),
        }
    }

    /// Load a key from a raw-bytes or JSON-array file
    pub fn from_file(path: &str) -> Result<Self> {
        let mut raw =
            std::fs::read(path).with_context(|| format!("failed to read keypair file: {path}"))?;

        let signer = if raw.len() == 32 || raw.len() == 64 {
            Self::from_bytes(&raw)
        } else {
            let mut json: Vec<u8> = serde_json::from_slice(&raw)
                .with_context(|| format!("failed to parse keypair JSON: {path}"))?;
            let result = Self::from_bytes(&json);
            json.zeroize();
            result
        };
        raw.zeroize();

        Ok(signer?)
    }
}

impl TransactionSigner for LocalSigner {
    fn pubkey(&self) -> [u8; 32] {
        self.key.verifying_key().to_bytes()
    }

    fn sign(&self, message: &[u8]) -> Result<[u8; SIGNATURE_LEN], SignError> {
        Ok(self.key.sign(message).to_bytes())
    }
}

/// Mock signer for tests.
///
/// Signatures embed a digest of the message, so a result can be correlated
/// back to the request that produced it.
pub struct MockSigner {
    pubkey: [u8; 32],
    should_fail: bool,
}

impl MockSigner {
    pub fn new(pubkey: [u8; 32]) -> Self {
        Self {
            pubkey,
            should_fail: false,
        }
    }

    pub fn new_failing(pubkey: [u8; 32]) -> Self {
        Self {
            pubkey,
            should_fail: true,
        }
    }

    /// The signature [`sign`](TransactionSigner::sign) would produce for a
    /// message
    pub fn expected_signature(message: &[u8]) -> [u8; SIGNATURE_LEN] {
        let digest = Sha256::digest(message);
        let mut signature = [0u8; SIGNATURE_LEN];
        signature[..32].copy_from_slice(&digest);
        signature
    }
}

impl TransactionSigner for MockSigner {
    fn pubkey(&self) -> [u8; 32] {
        self.pubkey
    }

    fn sign(&self, message: &[u8]) -> Result<[u8; SIGNATURE_LEN], SignError> {
        if self.should_fail {
            return Err(SignError::Failed(
                "mock signer configured to fail".to_string(),
            ));
        }
        Ok(Self::expected_signature(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signature, Verifier, VerifyingKey};

    #[test]
    fn local_signer_produces_verifiable_signatures() {
        let signer = LocalSigner::ephemeral();
        let message = b"sample transaction data";
        let signature = signer.sign(message).unwrap();

        let verifying = VerifyingKey::from_bytes(&signer.pubkey()).unwrap();
        assert!(verifying
            .verify(message, &Signature::from_bytes(&signature))
            .is_ok());
    }

    #[test]
    fn from_bytes_rejects_bad_material() {
        assert!(matches!(
            LocalSigner::from_bytes(&[0u8; 32]),
            Err(SignError::InvalidKey(_))
        ));
        assert!(matches!(
            LocalSigner::from_bytes(&[1u8; 17]),
            Err(SignError::InvalidKey(_))
        ));
    }

    #[test]
    fn from_file_reads_json_keypair() {
        use std::io::Write;

        let signer = LocalSigner::ephemeral();
        let keypair_bytes = signer.key.to_keypair_bytes().to_vec();

        let mut file = tempfile::NamedTempFile::new().unwrap();
        serde_json::to_writer(&mut file, &keypair_bytes).unwrap();
        file.flush().unwrap();

        let loaded = LocalSigner::from_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(loaded.pubkey(), signer.pubkey());
    }

    #[test]
    fn mock_signer_signature_correlates_to_message() {
        let signer = MockSigner::new([7; 32]);
        let signature = signer.sign(b"abc").unwrap();
        assert_eq!(signature, MockSigner::expected_signature(b"abc"));
        assert_ne!(signature, MockSigner::expected_signature(b"abd"));
    }

    #[test]
    fn failing_mock_signer_fails() {
        let signer = MockSigner::new_failing([7; 32]);
        assert!(matches!(signer.sign(b"abc"), Err(SignError::Failed(_))));
    }
}
