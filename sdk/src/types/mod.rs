//! # Wire Types
//!
//! Everything that crosses the network, as serde types. The server speaks
//! JSON; byte fields (values, certificates, signatures) travel hex-encoded.
//!
//! ```text
//! data.rs     : data transactions, reads/writes/deletes, data queries
//! config.rs   : cluster configuration and configuration transactions
//! envelope.rs : signed envelopes, the query union, error bodies, and
//!                signed query responses
//! ```
//!
//! Signatures always cover `serde_json::to_vec(payload)`. Struct field order
//! is fixed and collections are emitted in key order, so both sides compute
//! the same bytes.

pub mod config;
pub mod data;
pub mod envelope;

pub use config::{
    Admin, ClusterConfig, ConfigTx, GetConfigQuery, GetConfigResponse, GetConfigResponseEnvelope,
    NodeConfig,
};
pub use data::{
    AccessControl, DataDelete, DataRead, DataTx, DataWrite, GetDataQuery, GetDataResponse,
    GetDataResponseEnvelope, Metadata, Version,
};
pub use envelope::{
    ConfigTxEnvelope, DataTxEnvelope, Envelope, HttpResponseErr, Query, ResponseHeader,
    SignedResponse,
};
