//! # REST Transport
//!
//! The transaction engine talks to replicas only through [`RestClient`]:
//! one signed GET for queries, one POST for envelopes. Connection pooling,
//! TLS and retries belong to the implementation, not to the engine.
//!
//! - [`http::HttpRestClient`]: reqwest-backed client used in production.
//! - `mock::MockRestClient`: scripted in-memory client for tests, built
//!   under `cfg(test)` or the `test-util` feature.

pub mod http;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::StatusCode;
use thiserror::Error;
use url::Url;

use crate::crypto::SignerError;
use crate::types::{Envelope, Query};

pub use http::HttpRestClient;
#[cfg(any(test, feature = "test-util"))]
pub use mock::{MockRestClient, RecordedCall};

/// Failures of the network call itself. Anything the server *answered*,
/// even with an error status, is a [`RestResponse`] instead.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to encode request body: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("failed to sign request: {0}")]
    Sign(#[from] SignerError),

    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("connection failed: {0}")]
    Connection(String),
}

/// Status and raw body of a replica's reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestResponse {
    pub status: StatusCode,
    /// `None` when the reply carried no body at all.
    pub body: Option<Bytes>,
}

impl RestResponse {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: Some(body.into()),
        }
    }

    /// A reply without a body.
    pub fn empty(status: StatusCode) -> Self {
        Self { status, body: None }
    }

    /// A reply whose body is `value` encoded as JSON.
    pub fn json<T: serde::Serialize>(status: StatusCode, value: &T) -> Result<Self, serde_json::Error> {
        Ok(Self::new(status, serde_json::to_vec(value)?))
    }

    pub fn body_bytes(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }
}

/// Signed HTTP operations against a fully resolved replica URL.
#[async_trait]
pub trait RestClient: Send + Sync {
    /// GET `url`, carrying the user header and a signature over `query`.
    async fn query(&self, url: &Url, query: &Query) -> Result<RestResponse, TransportError>;

    /// POST `envelope` as JSON to `url`.
    async fn submit(&self, url: &Url, envelope: &Envelope) -> Result<RestResponse, TransportError>;
}
