// Copyright (c) 2026 BCDB SDK Contributors. Apache-2.0 License.
// See LICENSE for details.

//! # BCDB SDK Client Transaction Engine
//!
//! Client side of the BCDB replicated database service. The SDK builds
//! transactions locally, signs them with the user's key, ships them to one
//! replica over HTTP, and decides from the reply whether the transaction
//! is finalized.
//!
//! ## Architecture
//!
//! - **config**: Wire constants (headers, endpoints) and connection options.
//! - **crypto**: The [`Signer`](crypto::Signer) contract, an Ed25519 keypair
//!   implementing it, and transaction ID derivation.
//! - **types**: Serializable wire messages: transactions, envelopes, queries
//!   and signed query responses.
//! - **transport**: The [`RestClient`](transport::RestClient) contract, a
//!   reqwest implementation and an in-memory mock.
//! - **tx**: The transaction context state machine, the composer contract,
//!   replica selection, response interpretation, and the two transaction
//!   kinds (data and configuration).
//! - **session**: Connector and per-database session that hand out
//!   transactions.
//! - **metrics**: Prometheus counters for commits, aborts and queries.
//!
//! ## Lifecycle
//!
//! A transaction is `Open` until it is committed or aborted. Commit walks
//! `Composing → Submitted → Committed | Failed`; only a server-acknowledged
//! commit makes the envelope retrievable through `tx_envelope()`. Abort never
//! touches the network and can be called any number of times.

pub mod config;
pub mod crypto;
pub mod metrics;
pub mod session;
pub mod transport;
pub mod tx;
pub mod types;

pub use session::{Connector, DbSession};
pub use tx::{CommitError, ConfigTx, DataTx, TxError, TxState};
