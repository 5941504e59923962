//! The signing contract consumed by the transaction engine.
//!
//! Composers sign transaction payloads and the REST client signs queries
//! through this trait. Replica responses are checked with [`verify`] against
//! the certificate configured for the replica.

use ed25519_dalek::{Signature as DalekSignature, Verifier, VerifyingKey};
use thiserror::Error;

/// Errors surfaced by a [`Signer`].
#[derive(Debug, Error)]
pub enum SignerError {
    /// The backing key could not produce a signature (HSM offline, key
    /// revoked, ...).
    #[error("signing failed: {0}")]
    Failed(String),
}

/// Produces a signature over arbitrary message bytes.
///
/// Implementations must be shareable across transactions, hence
/// `Send + Sync`; the engine holds them behind `Arc<dyn Signer>`.
pub trait Signer: Send + Sync {
    /// Signs `message` and returns the raw signature bytes.
    fn sign(&self, message: &[u8]) -> Result<Vec<u8>, SignerError>;
}

/// Verifies an Ed25519 `signature` over `message` with a certificate.
///
/// The certificate is the signer's 32-byte public key. Anything malformed
/// (wrong lengths, invalid curve point) verifies as `false`.
pub fn verify(certificate: &[u8], message: &[u8], signature: &[u8]) -> bool {
    let Ok(key_bytes) = <[u8; 32]>::try_from(certificate) else {
        return false;
    };
    let Ok(sig_bytes) = <[u8; 64]>::try_from(signature) else {
        return false;
    };
    let Ok(verifying_key) = VerifyingKey::from_bytes(&key_bytes) else {
        return false;
    };
    verifying_key
        .verify(message, &DalekSignature::from_bytes(&sig_bytes))
        .is_ok()
}
