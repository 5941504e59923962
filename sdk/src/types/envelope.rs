//! Signed envelopes, queries, and what replicas send back.

use serde::{Deserialize, Serialize};

use super::config::{ConfigTx, GetConfigQuery, GetConfigResponseEnvelope};
use super::data::{DataTx, GetDataQuery, GetDataResponseEnvelope};

// ---------------------------------------------------------------------------
// Envelopes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataTxEnvelope {
    pub payload: DataTx,
    #[serde(with = "hex::serde")]
    pub signature: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigTxEnvelope {
    pub payload: ConfigTx,
    #[serde(with = "hex::serde")]
    pub signature: Vec<u8>,
}

/// A signed, ready-to-submit transaction of any kind.
///
/// Serialized untagged: the request body is the inner envelope, so the
/// server routes on the endpoint rather than on a discriminant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Envelope {
    Data(DataTxEnvelope),
    Config(ConfigTxEnvelope),
}

impl Envelope {
    /// The transaction ID the envelope is addressed by.
    pub fn tx_id(&self) -> &str {
        match self {
            Self::Data(env) => &env.payload.tx_id,
            Self::Config(env) => &env.payload.tx_id,
        }
    }

    pub fn signature(&self) -> &[u8] {
        match self {
            Self::Data(env) => &env.signature,
            Self::Config(env) => &env.signature,
        }
    }

    /// The user the envelope was signed by.
    pub fn user_id(&self) -> &str {
        match self {
            Self::Data(env) => &env.payload.user_id,
            Self::Config(env) => &env.payload.user_id,
        }
    }

    /// Bytes the signature covers.
    pub fn signable_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        match self {
            Self::Data(env) => env.payload.signable_bytes(),
            Self::Config(env) => env.payload.signable_bytes(),
        }
    }

    pub fn as_data(&self) -> Option<&DataTxEnvelope> {
        match self {
            Self::Data(env) => Some(env),
            Self::Config(_) => None,
        }
    }

    pub fn as_config(&self) -> Option<&ConfigTxEnvelope> {
        match self {
            Self::Config(env) => Some(env),
            Self::Data(_) => None,
        }
    }

    /// JSON request body.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Every read request the SDK issues. Untagged for the same reason as
/// [`Envelope`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Query {
    GetData(GetDataQuery),
    GetConfig(GetConfigQuery),
}

impl Query {
    /// Bytes the query signature covers.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// Structured error body of every non-2xx response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpResponseErr {
    pub message: String,
}

impl HttpResponseErr {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Identifies the replica that produced a response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseHeader {
    pub node_id: String,
}

impl ResponseHeader {
    pub fn new(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
        }
    }
}

/// A query response signed by the replica that produced it.
pub trait SignedResponse {
    /// ID of the signing replica, taken from the response header.
    fn responder(&self) -> &str;

    /// Bytes the replica signed.
    fn signed_bytes(&self) -> Result<Vec<u8>, serde_json::Error>;

    fn signature(&self) -> &[u8];
}

impl SignedResponse for GetDataResponseEnvelope {
    fn responder(&self) -> &str {
        &self.payload.header.node_id
    }

    fn signed_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(&self.payload)
    }

    fn signature(&self) -> &[u8] {
        &self.signature
    }
}

impl SignedResponse for GetConfigResponseEnvelope {
    fn responder(&self) -> &str {
        &self.payload.header.node_id
    }

    fn signed_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(&self.payload)
    }

    fn signature(&self) -> &[u8] {
        &self.signature
    }
}
