//! Envelope composition: the per-kind half of the commit protocol.

use thiserror::Error;

use crate::crypto::SignerError;
use crate::types::Envelope;

#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("failed to sign transaction payload: {0}")]
    Sign(#[from] SignerError),

    #[error("failed to encode transaction payload: {0}")]
    Encode(#[from] serde_json::Error),

    /// A configuration transaction must read the current configuration
    /// before it can propose a new one.
    #[error("cluster configuration was not read in this transaction")]
    ConfigNotRead,
}

/// Builds a signed envelope from a transaction's pending operations.
///
/// The context calls [`compose_envelope`](TxComposer::compose_envelope) once
/// per commit attempt with the freshly computed tx ID, and
/// [`clean_ctx`](TxComposer::clean_ctx) after a successful commit or on abort.
pub trait TxComposer {
    fn compose_envelope(&mut self, tx_id: &str) -> Result<Envelope, ComposeError>;

    /// Drops every pending operation.
    fn clean_ctx(&mut self);
}
