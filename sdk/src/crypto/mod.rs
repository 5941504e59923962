//! # Cryptographic Collaborators
//!
//! The transaction engine never touches key material directly. It asks a
//! [`Signer`] for bytes and hands certificates to [`verify`]; which
//! algorithm sits behind those calls is a deployment decision.
//!
//! The SDK ships one implementation, [`UserKeypair`], backed by Ed25519
//! (`ed25519-dalek`): deterministic signatures, 32-byte public keys that
//! double as the user's and replicas' certificates on the wire.

pub mod hash;
pub mod keys;
pub mod signer;

pub use hash::{compute_tx_id, compute_tx_id_with_nonce, sha256};
pub use keys::{KeyError, UserKeypair};
pub use signer::{verify, Signer, SignerError};
