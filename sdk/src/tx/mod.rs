//! # Transactions
//!
//! The client-side commit protocol. [`context::CommonTxContext`] is the
//! shared state machine; [`data_tx::DataTx`] and [`config_tx::ConfigTx`]
//! are the transaction kinds built on it, each supplying a
//! [`compose::TxComposer`] for its pending operations.
//!
//! - [`replica`]: deterministic choice of the replica to talk to.
//! - [`response`]: turns status and body into success or a typed error.
//! - [`error`]: the error taxonomy shared by all of the above.

pub mod compose;
pub mod config_tx;
pub mod context;
pub mod data_tx;
pub mod error;
pub mod replica;
pub mod response;

pub use compose::{ComposeError, TxComposer};
pub use config_tx::{ConfigTx, ConfigTxOps};
pub use context::{CommonTxContext, TxResources, TxState};
pub use data_tx::{DataTx, DataTxOps};
pub use error::{CommitError, TxError};
pub use replica::ReplicaSet;
pub use response::UNPARSABLE_SERVER_ERROR;
