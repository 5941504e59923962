//! # Sessions
//!
//! [`Connector`] is built once per user from [`Options`]: it loads the
//! signing key, parses replica addresses and trusted node certificates, and
//! owns the REST client and metrics. [`DbSession`] binds it to one database
//! and hands out transactions that share those resources.

use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;
use url::Url;

use crate::config::{ConfigError, ConnectionOption, Options, SignerOptions, TxOptions};
use crate::crypto::{KeyError, Signer, UserKeypair};
use crate::metrics::SdkMetrics;
use crate::transport::{HttpRestClient, RestClient, TransportError};
use crate::tx::{CommonTxContext, ConfigTx, DataTx, ReplicaSet, TxError, TxResources};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid options: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to load signing key: {0}")]
    Key(#[from] KeyError),

    #[error("invalid url {url:?} for replica {replica_id}: {source}")]
    InvalidUrl {
        replica_id: String,
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("invalid certificate for replica {replica_id}: {reason}")]
    InvalidCertificate { replica_id: String, reason: String },

    #[error("failed to set up metrics: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("failed to build rest client: {0}")]
    Transport(#[from] TransportError),
}

/// Entry point of the SDK for one user.
pub struct Connector {
    user_id: String,
    signer: Arc<dyn Signer>,
    user_cert: Vec<u8>,
    replicas: Arc<ReplicaSet>,
    node_certs: Arc<BTreeMap<String, Vec<u8>>>,
    rest_client: Arc<dyn RestClient>,
    tx_options: TxOptions,
    metrics: SdkMetrics,
}

impl Connector {
    /// Validates `options`, loads the user's key and builds an HTTP client.
    pub fn new(options: Options) -> Result<Self, SessionError> {
        options.validate()?;
        let keypair = load_keypair(&options.user.user_id, &options.user.signer)?;
        let user_cert = keypair.certificate();
        let signer: Arc<dyn Signer> = Arc::new(keypair);
        let rest_client = HttpRestClient::with_connect_timeout(
            options.user.user_id.clone(),
            Arc::clone(&signer),
            options.tx_options.request_timeout,
        )?;
        Self::assemble(options, signer, user_cert, Arc::new(rest_client))
    }

    /// Builds a connector around caller-supplied collaborators.
    ///
    /// The signing key settings in `options` are ignored; `user_cert` must
    /// be the certificate matching `signer`.
    pub fn with_client(
        options: Options,
        signer: Arc<dyn Signer>,
        user_cert: Vec<u8>,
        rest_client: Arc<dyn RestClient>,
    ) -> Result<Self, SessionError> {
        options.validate_topology()?;
        Self::assemble(options, signer, user_cert, rest_client)
    }

    fn assemble(
        options: Options,
        signer: Arc<dyn Signer>,
        user_cert: Vec<u8>,
        rest_client: Arc<dyn RestClient>,
    ) -> Result<Self, SessionError> {
        let mut replicas = ReplicaSet::new();
        let mut node_certs = BTreeMap::new();
        for conn in &options.connections {
            replicas.insert(conn.replica_id.clone(), parse_url(conn)?);
            if let Some(cert) = &conn.certificate {
                node_certs.insert(conn.replica_id.clone(), parse_certificate(&conn.replica_id, cert)?);
            }
        }

        tracing::info!(
            user_id = %options.user.user_id,
            replicas = replicas.len(),
            trusted_nodes = node_certs.len(),
            "connector ready"
        );

        Ok(Self {
            user_id: options.user.user_id,
            signer,
            user_cert,
            replicas: Arc::new(replicas),
            node_certs: Arc::new(node_certs),
            rest_client,
            tx_options: options.tx_options,
            metrics: SdkMetrics::new()?,
        })
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn replicas(&self) -> &ReplicaSet {
        &self.replicas
    }

    /// Transaction options used when a session does not override them.
    pub fn default_tx_options(&self) -> &TxOptions {
        &self.tx_options
    }

    pub fn metrics(&self) -> &SdkMetrics {
        &self.metrics
    }

    /// Opens a session on `db_name` with the given transaction options.
    pub fn open_db_session(&self, db_name: impl Into<String>, tx_options: TxOptions) -> Result<DbSession, SessionError> {
        tx_options.validate()?;
        let db_name = db_name.into();
        tracing::debug!(db = %db_name, user_id = %self.user_id, "opening db session");
        Ok(DbSession {
            db_name,
            tx_options: tx_options.clone(),
            resources: TxResources {
                user_id: self.user_id.clone(),
                signer: Arc::clone(&self.signer),
                user_cert: self.user_cert.clone(),
                replicas: Arc::clone(&self.replicas),
                node_certs: Arc::clone(&self.node_certs),
                rest_client: Arc::clone(&self.rest_client),
                timeout: tx_options.request_timeout,
                metrics: self.metrics.clone(),
            },
        })
    }
}

impl std::fmt::Debug for Connector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connector")
            .field("user_id", &self.user_id)
            .field("replicas", &self.replicas)
            .field("tx_options", &self.tx_options)
            .finish_non_exhaustive()
    }
}

/// A user's view of one database.
#[derive(Debug, Clone)]
pub struct DbSession {
    db_name: String,
    tx_options: TxOptions,
    resources: TxResources,
}

impl DbSession {
    pub fn db_name(&self) -> &str {
        &self.db_name
    }

    pub fn tx_options(&self) -> &TxOptions {
        &self.tx_options
    }

    /// Starts a data transaction on this database.
    pub fn begin(&self) -> DataTx {
        let span = tracing::info_span!("data_tx", db = %self.db_name, user_id = %self.resources.user_id);
        let ctx = CommonTxContext::new(self.resources.clone(), span);
        DataTx::new(ctx, self.db_name.clone(), self.tx_options.isolation)
    }

    /// Starts a cluster configuration transaction.
    pub fn config_tx(&self) -> ConfigTx {
        let span = tracing::info_span!("config_tx", user_id = %self.resources.user_id);
        ConfigTx::new(CommonTxContext::new(self.resources.clone(), span))
    }

    /// Reads one key outside of any caller-held transaction.
    pub async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, TxError> {
        let mut tx = self.begin();
        let value = tx.get(key).await;
        tx.abort()?;
        value
    }
}

fn load_keypair(user_id: &str, options: &SignerOptions) -> Result<UserKeypair, SessionError> {
    let keypair = match (&options.key_hex, &options.key_file) {
        (Some(hex_key), _) => UserKeypair::from_hex(hex_key)?,
        (None, Some(path)) => UserKeypair::from_file(path)?,
        (None, None) => return Err(ConfigError::MissingKey(user_id.to_string()).into()),
    };
    Ok(keypair)
}

fn parse_url(conn: &ConnectionOption) -> Result<Url, SessionError> {
    Url::parse(&conn.url).map_err(|source| SessionError::InvalidUrl {
        replica_id: conn.replica_id.clone(),
        url: conn.url.clone(),
        source,
    })
}

fn parse_certificate(replica_id: &str, cert_hex: &str) -> Result<Vec<u8>, SessionError> {
    let invalid = |reason: String| SessionError::InvalidCertificate {
        replica_id: replica_id.to_string(),
        reason,
    };
    let bytes = hex::decode(cert_hex.trim()).map_err(|e| invalid(e.to_string()))?;
    let key: [u8; 32] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| invalid(format!("expected 32 bytes, got {}", bytes.len())))?;
    ed25519_dalek::VerifyingKey::from_bytes(&key).map_err(|e| invalid(e.to_string()))?;
    Ok(bytes)
}
