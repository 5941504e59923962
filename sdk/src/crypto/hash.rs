//! # Hashing & Transaction IDs
//!
//! A transaction ID is `hex(SHA-256(nonce || user_certificate))` with a
//! fresh random nonce per commit attempt. Binding the certificate ties the
//! ID to its author; the nonce keeps two attempts by the same user from
//! ever sharing an ID.
//!
//! Nothing stronger is promised: IDs are unique per commit attempt, not
//! coordinated across the cluster.

use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::config::TX_ID_NONCE_LENGTH;

/// SHA-256 of `data` as a fixed-size array.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Derives a transaction ID from an explicit nonce and certificate.
///
/// Deterministic: the same inputs always give the same ID.
pub fn compute_tx_id_with_nonce(nonce: &[u8], user_cert: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(nonce);
    hasher.update(user_cert);
    hex::encode(hasher.finalize())
}

/// Derives a fresh transaction ID for one commit attempt.
///
/// Fails only if the OS RNG cannot produce a nonce.
pub fn compute_tx_id(user_cert: &[u8]) -> Result<String, rand::Error> {
    let mut nonce = [0u8; TX_ID_NONCE_LENGTH];
    OsRng.try_fill_bytes(&mut nonce)?;
    Ok(compute_tx_id_with_nonce(&nonce, user_cert))
}
