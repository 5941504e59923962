//! # SDK Configuration & Wire Constants
//!
//! Every header name, endpoint path and default the SDK relies on lives
//! here. Header names and endpoint paths are part of the wire contract with
//! the server; changing one without the other side is a guaranteed outage.
//!
//! The option structs are plain serde types. Loading them from disk is the
//! caller's business; the SDK only validates what it is handed.

use std::path::PathBuf;
use std::time::Duration;

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Wire Contract
// ---------------------------------------------------------------------------

/// Request header carrying the acting user's identifier.
pub const USER_HEADER: &str = "UserID";

/// Request header carrying the base64-encoded signature over a query.
pub const SIGNATURE_HEADER: &str = "Signature";

/// Endpoint accepting signed data transaction envelopes (POST).
pub const POST_DATA_TX: &str = "/data/tx";

/// Endpoint accepting signed configuration transaction envelopes (POST).
pub const POST_CONFIG_TX: &str = "/config/tx";

/// Endpoint serving the current cluster configuration (GET).
pub const GET_CONFIG: &str = "/config/tx";

/// Builds the path serving a single key of a database (GET).
///
/// Both names are percent-encoded as single path segments, so keys holding
/// `/`, `?`, spaces or `+` reach the server byte for byte.
pub fn get_data_path(db_name: &str, key: &str) -> String {
    format!(
        "/data/{}/{}",
        utf8_percent_encode(db_name, PATH_SEGMENT),
        utf8_percent_encode(key, PATH_SEGMENT)
    )
}

/// Bytes escaped inside one path segment. `+` is included since some servers
/// still read it as a space.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'+')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

/// How long a single query or submission may wait on the network.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Quorum size used when the caller does not specify one.
pub const DEFAULT_QUORUM_SIZE: u32 = 1;

/// Length of the random nonce mixed into every transaction ID.
pub const TX_ID_NONCE_LENGTH: usize = 24;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Reasons an [`Options`] value is rejected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("no connection options configured")]
    NoConnections,

    #[error("duplicate replica id: {0}")]
    DuplicateReplica(String),

    #[error("user id must not be empty")]
    EmptyUserId,

    #[error("no signing key configured for user {0}")]
    MissingKey(String),

    #[error("quorum size must be at least 1")]
    ZeroQuorum,

    #[error("request timeout must be non-zero")]
    ZeroTimeout,
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// One replica the SDK may talk to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionOption {
    /// Replica identifier as the cluster knows it.
    pub replica_id: String,
    /// Base URL of the replica's REST endpoint.
    pub url: String,
    /// Hex-encoded Ed25519 public key the replica signs responses with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate: Option<String>,
}

impl ConnectionOption {
    pub fn new(replica_id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            replica_id: replica_id.into(),
            url: url.into(),
            certificate: None,
        }
    }

    /// Attaches the replica's trusted certificate (hex public key).
    pub fn with_certificate(mut self, certificate_hex: impl Into<String>) -> Self {
        self.certificate = Some(certificate_hex.into());
        self
    }
}

/// Where the user's signing key comes from.
///
/// `key_hex` wins when both are set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerOptions {
    /// Path to a file holding the hex-encoded 32-byte secret key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_file: Option<PathBuf>,
    /// Hex-encoded secret key, for tests and throwaway environments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_hex: Option<String>,
}

/// Identity of the acting user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityOptions {
    pub user_id: String,
    pub signer: SignerOptions,
}

/// Isolation level requested for transactions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Isolation {
    #[default]
    Serializable,
    ReadCommitted,
}

/// Read-side options. The quorum size is forwarded to the cluster as
/// configuration; the SDK itself talks to a single replica.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadOptions {
    pub quorum_size: u32,
}

/// Commit-side options, see [`ReadOptions`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitOptions {
    pub quorum_size: u32,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            quorum_size: DEFAULT_QUORUM_SIZE,
        }
    }
}

impl Default for CommitOptions {
    fn default() -> Self {
        Self {
            quorum_size: DEFAULT_QUORUM_SIZE,
        }
    }
}

/// Per-transaction options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOptions {
    #[serde(default)]
    pub isolation: Isolation,
    #[serde(default)]
    pub read: ReadOptions,
    #[serde(default)]
    pub commit: CommitOptions,
    /// Upper bound on every network call a transaction makes.
    #[serde(default = "default_request_timeout", with = "duration_millis")]
    pub request_timeout: Duration,
}

fn default_request_timeout() -> Duration {
    DEFAULT_REQUEST_TIMEOUT
}

impl Default for TxOptions {
    fn default() -> Self {
        Self {
            isolation: Isolation::default(),
            read: ReadOptions::default(),
            commit: CommitOptions::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl TxOptions {
    pub fn with_isolation(mut self, isolation: Isolation) -> Self {
        self.isolation = isolation;
        self
    }

    pub fn with_read_quorum(mut self, quorum_size: u32) -> Self {
        self.read.quorum_size = quorum_size;
        self
    }

    pub fn with_commit_quorum(mut self, quorum_size: u32) -> Self {
        self.commit.quorum_size = quorum_size;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Checks quorum sizes and timeout are usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.read.quorum_size == 0 || self.commit.quorum_size == 0 {
            return Err(ConfigError::ZeroQuorum);
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }
}

/// Everything a [`crate::session::Connector`] needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Options {
    pub connections: Vec<ConnectionOption>,
    pub user: IdentityOptions,
    #[serde(default)]
    pub tx_options: TxOptions,
}

impl Options {
    pub fn new(user_id: impl Into<String>, signer: SignerOptions) -> Self {
        Self {
            connections: Vec::new(),
            user: IdentityOptions {
                user_id: user_id.into(),
                signer,
            },
            tx_options: TxOptions::default(),
        }
    }

    pub fn with_connection(mut self, connection: ConnectionOption) -> Self {
        self.connections.push(connection);
        self
    }

    pub fn with_tx_options(mut self, tx_options: TxOptions) -> Self {
        self.tx_options = tx_options;
        self
    }

    /// Structural validation. URLs and keys are checked when the connector
    /// actually parses them.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_topology()?;
        if self.user.signer.key_file.is_none() && self.user.signer.key_hex.is_none() {
            return Err(ConfigError::MissingKey(self.user.user_id.clone()));
        }
        Ok(())
    }

    /// Everything [`validate`](Self::validate) checks except the signing
    /// key, for callers that bring their own signer.
    pub fn validate_topology(&self) -> Result<(), ConfigError> {
        if self.user.user_id.is_empty() {
            return Err(ConfigError::EmptyUserId);
        }
        if self.connections.is_empty() {
            return Err(ConfigError::NoConnections);
        }
        let mut seen = std::collections::BTreeSet::new();
        for conn in &self.connections {
            if !seen.insert(conn.replica_id.as_str()) {
                return Err(ConfigError::DuplicateReplica(conn.replica_id.clone()));
            }
        }
        self.tx_options.validate()
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_options() -> Options {
        Options::new(
            "alice",
            SignerOptions {
                key_hex: Some("11".repeat(32)),
                key_file: None,
            },
        )
        .with_connection(ConnectionOption::new("node1", "http://localhost:6001/"))
    }

    #[test]
    fn valid_options_pass() {
        assert_eq!(valid_options().validate(), Ok(()));
    }

    #[test]
    fn missing_connections_rejected() {
        let mut opts = valid_options();
        opts.connections.clear();
        assert_eq!(opts.validate(), Err(ConfigError::NoConnections));
    }

    #[test]
    fn duplicate_replicas_rejected() {
        let opts = valid_options().with_connection(ConnectionOption::new("node1", "http://other/"));
        assert_eq!(
            opts.validate(),
            Err(ConfigError::DuplicateReplica("node1".into()))
        );
    }

    #[test]
    fn missing_key_rejected() {
        let mut opts = valid_options();
        opts.user.signer = SignerOptions::default();
        assert_eq!(opts.validate(), Err(ConfigError::MissingKey("alice".into())));
    }

    #[test]
    fn zero_quorum_and_timeout_rejected() {
        let opts = valid_options().with_tx_options(TxOptions::default().with_commit_quorum(0));
        assert_eq!(opts.validate(), Err(ConfigError::ZeroQuorum));

        let opts = valid_options()
            .with_tx_options(TxOptions::default().with_request_timeout(Duration::ZERO));
        assert_eq!(opts.validate(), Err(ConfigError::ZeroTimeout));
    }

    #[test]
    fn tx_options_deserialize_with_defaults() {
        let opts: TxOptions = serde_json::from_str(r#"{"request_timeout": 2500}"#).unwrap();
        assert_eq!(opts.request_timeout, Duration::from_millis(2500));
        assert_eq!(opts.isolation, Isolation::Serializable);
        assert_eq!(opts.read.quorum_size, DEFAULT_QUORUM_SIZE);
    }

    #[test]
    fn data_path_escapes_key() {
        assert_eq!(get_data_path("bdb", "key1"), "/data/bdb/key1");
        assert_eq!(get_data_path("bdb", "a/b"), "/data/bdb/a%2Fb");
    }

    #[test]
    fn data_path_keeps_spaces_and_plus_distinct() {
        assert_eq!(get_data_path("bdb", "my key"), "/data/bdb/my%20key");
        assert_eq!(get_data_path("bdb", "a+b"), "/data/bdb/a%2Bb");
        assert_eq!(get_data_path("my db", "k?x=1#f"), "/data/my%20db/k%3Fx=1%23f");
        assert_eq!(get_data_path("bdb", "100%"), "/data/bdb/100%25");
    }
}
