//! Error taxonomy of the transaction engine.

use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

use super::compose::ComposeError;
use super::context::TxState;
use crate::transport::TransportError;

/// Everything a transaction operation can fail with.
///
/// None of these are fatal to the process and none are retried here; the
/// caller decides whether to start over with a new transaction.
#[derive(Debug, Error)]
pub enum TxError {
    /// Envelope construction failed; nothing was sent.
    #[error("failed to compose transaction envelope: {0}")]
    Compose(#[from] ComposeError),

    /// The network call itself failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The network call did not finish before the deadline.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The server answered with a non-OK status.
    #[error("server returned: status: {status}, message: {message}")]
    ServerRejected { status: StatusCode, message: String },

    /// An OK response whose body does not match the expected shape.
    #[error("failed to decode server response: {0}")]
    Decode(String),

    #[error("can't access tx envelope, transaction not finalized")]
    NotFinalized,

    #[error("no replica available to send the request to")]
    NoReplicas,

    #[error("invalid endpoint {endpoint}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("failed to compute transaction id: {0}")]
    TxId(String),

    /// The transaction already reached a state that forbids the operation.
    #[error("transaction is {state}, operation not allowed")]
    TxClosed { state: TxState },

    /// A query response whose signature does not check out against the
    /// trusted certificate of the replica that claims to have sent it.
    #[error("untrusted response: {0}")]
    UntrustedResponse(String),

    /// The operation conflicts with the transaction's pending state.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// Configuration edits need the current configuration first.
    #[error("cluster configuration not loaded, call get_cluster_config first")]
    ConfigNotLoaded,
}

impl TxError {
    /// The message the server gave when it rejected the request.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::ServerRejected { message, .. } => Some(message),
            _ => None,
        }
    }
}

/// A failed commit attempt.
///
/// Carries the transaction ID whenever one had been computed, so callers
/// can correlate the failure with server-side logs.
#[derive(Debug, Error)]
#[error("failed to commit transaction {}: {error}", .tx_id.as_deref().unwrap_or("<none>"))]
pub struct CommitError {
    pub tx_id: Option<String>,
    #[source]
    pub error: TxError,
}

impl CommitError {
    pub fn new(tx_id: Option<String>, error: TxError) -> Self {
        Self { tx_id, error }
    }
}
