//! # Transaction Context
//!
//! [`CommonTxContext`] owns the lifecycle of one transaction and drives the
//! state machine shared by every transaction kind:
//!
//! ```text
//!   Open ──commit──▶ Composing ──▶ Submitted ──200 OK──▶ Committed
//!    │                   │              │
//!    │                   └──── error ───┴──────────────▶ Failed ──commit──▶ ...
//!    └──abort──▶ Aborted ◀──abort── (any state but Committed)
//! ```
//!
//! The per-kind work (which operations are pending, how they are signed)
//! lives behind [`TxComposer`]; the context does replica selection, tx ID
//! generation, submission under a deadline, response interpretation and
//! cleanup. The signed envelope is retained only once the server has
//! acknowledged it, and is never rebuilt afterwards.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;

use super::compose::TxComposer;
use super::error::{CommitError, TxError};
use super::replica::ReplicaSet;
use super::response;
use crate::crypto::{compute_tx_id, verify, Signer};
use crate::metrics::SdkMetrics;
use crate::transport::RestClient;
use crate::types::{Envelope, Query, SignedResponse};

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TxState {
    /// Accepting operations; nothing submitted yet.
    Open,
    /// The envelope is being built and signed.
    Composing,
    /// The envelope is on the wire. A context left here by a dropped commit
    /// only accepts `abort`.
    Submitted,
    /// The server acknowledged the envelope. Terminal.
    Committed,
    /// The last commit attempt failed; pending operations are kept and the
    /// commit may be retried under a fresh tx ID.
    Failed,
    /// Discarded by the caller. Terminal.
    Aborted,
}

impl TxState {
    /// Whether operations and commits are accepted in this state.
    pub fn is_mutable(self) -> bool {
        matches!(self, Self::Open | Self::Failed)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Committed | Self::Aborted)
    }
}

impl fmt::Display for TxState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Open => "open",
            Self::Composing => "composing",
            Self::Submitted => "submitted",
            Self::Committed => "committed",
            Self::Failed => "failed",
            Self::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Shared resources
// ---------------------------------------------------------------------------

/// Everything a context borrows from the session that created it.
///
/// Replica addresses and node certificates are shared read-only across all
/// transactions of a session.
#[derive(Clone)]
pub struct TxResources {
    pub user_id: String,
    pub signer: Arc<dyn Signer>,
    /// The user's certificate; the tx ID is derived from it.
    pub user_cert: Vec<u8>,
    pub replicas: Arc<ReplicaSet>,
    /// Trusted certificate per replica ID, used to verify query responses.
    pub node_certs: Arc<BTreeMap<String, Vec<u8>>>,
    pub rest_client: Arc<dyn RestClient>,
    pub timeout: Duration,
    pub metrics: SdkMetrics,
}

impl fmt::Debug for TxResources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TxResources")
            .field("user_id", &self.user_id)
            .field("replicas", &self.replicas)
            .field("node_certs", &self.node_certs.keys().collect::<Vec<_>>())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

pub struct CommonTxContext {
    resources: TxResources,
    tx_envelope: Option<Envelope>,
    state: TxState,
    span: tracing::Span,
}

impl CommonTxContext {
    pub fn new(resources: TxResources, span: tracing::Span) -> Self {
        Self {
            resources,
            tx_envelope: None,
            state: TxState::Open,
            span,
        }
    }

    pub fn state(&self) -> TxState {
        self.state
    }

    pub fn user_id(&self) -> &str {
        &self.resources.user_id
    }

    pub fn signer(&self) -> Arc<dyn Signer> {
        Arc::clone(&self.resources.signer)
    }

    pub fn timeout(&self) -> Duration {
        self.resources.timeout
    }

    /// Overrides the deadline applied to each network call.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.resources.timeout = timeout;
    }

    pub fn span(&self) -> &tracing::Span {
        &self.span
    }

    /// Fails with [`TxError::TxClosed`] unless operations are still accepted.
    pub fn ensure_mutable(&self) -> Result<(), TxError> {
        if self.state.is_mutable() {
            Ok(())
        } else {
            Err(TxError::TxClosed { state: self.state })
        }
    }

    /// Composes, submits and finalizes the transaction.
    ///
    /// Returns the tx ID the server acknowledged. On failure the context
    /// moves to [`TxState::Failed`], keeps the pending operations, and the
    /// error carries the tx ID of the attempt when one was computed.
    pub async fn commit<T>(&mut self, tx: &mut T, endpoint: &str) -> Result<String, CommitError>
    where
        T: TxComposer + Send + ?Sized,
    {
        if !self.state.is_mutable() {
            return Err(CommitError::new(None, TxError::TxClosed { state: self.state }));
        }

        let resolved = self
            .resources
            .replicas
            .resolve(endpoint)
            .map(|(id, url)| (id.to_string(), url));
        let (replica_id, url) = match resolved {
            Ok(target) => target,
            Err(e) => return Err(self.fail(None, e)),
        };

        let tx_id = match compute_tx_id(&self.resources.user_cert) {
            Ok(id) => id,
            Err(e) => return Err(self.fail(None, TxError::TxId(e.to_string()))),
        };

        self.state = TxState::Composing;
        let envelope = match tx.compose_envelope(&tx_id) {
            Ok(envelope) => envelope,
            Err(e) => return Err(self.fail(Some(tx_id), e.into())),
        };
        tracing::debug!(parent: &self.span, tx_id = %tx_id, "composed transaction envelope");

        self.state = TxState::Submitted;
        tracing::debug!(parent: &self.span, tx_id = %tx_id, replica = %replica_id, url = %url, "submitting transaction");
        let timeout = self.resources.timeout;
        let started = Instant::now();
        let outcome = tokio::time::timeout(timeout, self.resources.rest_client.submit(&url, &envelope)).await;
        self.resources
            .metrics
            .request_latency_seconds
            .observe(started.elapsed().as_secs_f64());

        let response = match outcome {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Err(self.fail(Some(tx_id), e.into())),
            Err(_) => return Err(self.fail(Some(tx_id), TxError::Timeout(timeout))),
        };
        if let Err(e) = response::ensure_ok(&response) {
            return Err(self.fail(Some(tx_id), e));
        }

        self.tx_envelope = Some(envelope);
        tx.clean_ctx();
        self.state = TxState::Committed;
        self.resources.metrics.commits_total.inc();
        tracing::info!(parent: &self.span, tx_id = %tx_id, replica = %replica_id, "transaction committed");
        Ok(tx_id)
    }

    /// Discards pending operations without touching the network.
    ///
    /// Idempotent; only a committed transaction refuses.
    pub fn abort<T>(&mut self, tx: &mut T) -> Result<(), TxError>
    where
        T: TxComposer + ?Sized,
    {
        match self.state {
            TxState::Committed => Err(TxError::TxClosed { state: self.state }),
            TxState::Aborted => {
                tx.clean_ctx();
                Ok(())
            }
            _ => {
                tx.clean_ctx();
                self.state = TxState::Aborted;
                self.resources.metrics.aborts_total.inc();
                tracing::debug!(parent: &self.span, "transaction aborted");
                Ok(())
            }
        }
    }

    /// The envelope the server acknowledged.
    pub fn tx_envelope(&self) -> Result<&Envelope, TxError> {
        match (&self.tx_envelope, self.state) {
            (Some(envelope), TxState::Committed) => Ok(envelope),
            _ => Err(TxError::NotFinalized),
        }
    }

    /// Sends a signed query to the selected replica and decodes the reply.
    pub async fn handle_request<R: DeserializeOwned>(&self, path: &str, query: &Query) -> Result<R, TxError> {
        let (_, response) = self.send_query(path, query).await?;
        Ok(response)
    }

    /// Like [`handle_request`](Self::handle_request), then checks that the
    /// queried replica itself signed the reply.
    pub async fn query_verified<R>(&self, path: &str, query: &Query) -> Result<R, TxError>
    where
        R: DeserializeOwned + SignedResponse,
    {
        let (replica_id, response) = self.send_query(path, query).await?;
        self.verify_response(&replica_id, &response)?;
        Ok(response)
    }

    async fn send_query<R: DeserializeOwned>(&self, path: &str, query: &Query) -> Result<(String, R), TxError> {
        let (replica_id, url) = self.resources.replicas.resolve(path)?;
        let replica_id = replica_id.to_string();
        tracing::debug!(parent: &self.span, replica = %replica_id, url = %url, "sending query");

        let timeout = self.resources.timeout;
        self.resources.metrics.queries_total.inc();
        let started = Instant::now();
        let outcome = tokio::time::timeout(timeout, self.resources.rest_client.query(&url, query)).await;
        self.resources
            .metrics
            .request_latency_seconds
            .observe(started.elapsed().as_secs_f64());

        let response = match outcome {
            Ok(result) => result?,
            Err(_) => {
                tracing::error!(parent: &self.span, url = %url, "query timed out after {:?}", timeout);
                return Err(TxError::Timeout(timeout));
            }
        };
        Ok((replica_id, response::decode_body(&response)?))
    }

    /// Checks a response received from `replica_id` against that replica's
    /// certificate.
    ///
    /// The responder named in the response must be the queried replica. With
    /// no node certificates configured at all, the signature is not checked.
    pub fn verify_response<R: SignedResponse>(&self, replica_id: &str, response: &R) -> Result<(), TxError> {
        let node_id = response.responder();
        if node_id != replica_id {
            tracing::warn!(parent: &self.span, replica = %replica_id, node_id = %node_id, "response names another node");
            return Err(TxError::UntrustedResponse(format!(
                "queried replica {} but node {} responded",
                replica_id, node_id
            )));
        }
        if self.resources.node_certs.is_empty() {
            tracing::warn!(parent: &self.span, "no trusted node certificates configured, response not verified");
            return Ok(());
        }

        let Some(certificate) = self.resources.node_certs.get(replica_id) else {
            tracing::warn!(parent: &self.span, node_id = %node_id, "response signed by unknown node");
            return Err(TxError::UntrustedResponse(format!("unknown responder node {}", node_id)));
        };
        let signed = response
            .signed_bytes()
            .map_err(|e| TxError::Decode(e.to_string()))?;
        if !verify(certificate, &signed, response.signature()) {
            tracing::warn!(parent: &self.span, node_id = %node_id, "response signature does not verify");
            return Err(TxError::UntrustedResponse(format!(
                "invalid signature from node {}",
                node_id
            )));
        }
        Ok(())
    }

    fn fail(&mut self, tx_id: Option<String>, error: TxError) -> CommitError {
        self.state = TxState::Failed;
        self.resources.metrics.commit_failures_total.inc();
        tracing::error!(
            parent: &self.span,
            tx_id = tx_id.as_deref().unwrap_or("<none>"),
            "failed to commit transaction: {}",
            error
        );
        CommitError::new(tx_id, error)
    }
}

impl fmt::Debug for CommonTxContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommonTxContext")
            .field("user_id", &self.resources.user_id)
            .field("state", &self.state)
            .field("finalized", &self.tx_envelope.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::POST_DATA_TX;
    use crate::crypto::UserKeypair;
    use crate::transport::{MockRestClient, RecordedCall, RestResponse, TransportError};
    use crate::tx::compose::ComposeError;
    use crate::tx::response::UNPARSABLE_SERVER_ERROR;
    use crate::types::{
        DataTx, DataTxEnvelope, DataWrite, GetConfigQuery, GetDataResponse, GetDataResponseEnvelope,
        HttpResponseErr, ResponseHeader,
    };
    use reqwest::StatusCode;
    use url::Url;

    /// Minimal composer: a list of pending keys signed by a user keypair.
    struct Pending {
        keypair: UserKeypair,
        keys: Vec<String>,
        fail_compose: bool,
    }

    impl Pending {
        fn new(keys: &[&str]) -> Self {
            Self {
                keypair: UserKeypair::from_seed(&[3u8; 32]),
                keys: keys.iter().map(|k| k.to_string()).collect(),
                fail_compose: false,
            }
        }
    }

    impl TxComposer for Pending {
        fn compose_envelope(&mut self, tx_id: &str) -> Result<Envelope, ComposeError> {
            if self.fail_compose {
                return Err(ComposeError::Sign(crate::crypto::SignerError::Failed("hsm offline".into())));
            }
            let payload = DataTx {
                user_id: "alice".into(),
                db_name: "bdb".into(),
                tx_id: tx_id.to_string(),
                data_reads: vec![],
                data_writes: self
                    .keys
                    .iter()
                    .map(|k| DataWrite {
                        key: k.clone(),
                        value: k.as_bytes().to_vec(),
                        acl: None,
                    })
                    .collect(),
                data_deletes: vec![],
            };
            let signature = self.keypair.sign(&payload.signable_bytes()?)?;
            Ok(Envelope::Data(DataTxEnvelope { payload, signature }))
        }

        fn clean_ctx(&mut self) {
            self.keys.clear();
        }
    }

    fn resources(mock: Arc<MockRestClient>, replicas: ReplicaSet) -> TxResources {
        let keypair = UserKeypair::from_seed(&[3u8; 32]);
        TxResources {
            user_id: "alice".into(),
            user_cert: keypair.certificate(),
            signer: Arc::new(keypair),
            replicas: Arc::new(replicas),
            node_certs: Arc::new(BTreeMap::new()),
            rest_client: mock,
            timeout: Duration::from_secs(5),
            metrics: SdkMetrics::new().unwrap(),
        }
    }

    fn one_replica() -> ReplicaSet {
        ReplicaSet::new().with_replica("node1", Url::parse("http://localhost:6001/").unwrap())
    }

    fn context(mock: &Arc<MockRestClient>) -> CommonTxContext {
        CommonTxContext::new(resources(Arc::clone(mock), one_replica()), tracing::Span::none())
    }

    #[tokio::test]
    async fn successful_commit_retains_envelope_with_returned_id() {
        let mock = Arc::new(MockRestClient::new());
        mock.push_submit_reply(RestResponse::empty(StatusCode::OK));
        let mut ctx = context(&mock);
        let mut tx = Pending::new(&["key1", "key2"]);

        let tx_id = ctx.commit(&mut tx, POST_DATA_TX).await.unwrap();

        assert_eq!(ctx.state(), TxState::Committed);
        let envelope = ctx.tx_envelope().unwrap();
        assert_eq!(envelope.tx_id(), tx_id);
        let data = envelope.as_data().unwrap();
        let keys: Vec<_> = data.payload.data_writes.iter().map(|w| w.key.as_str()).collect();
        assert_eq!(keys, vec!["key1", "key2"]);
        assert!(tx.keys.is_empty(), "pending state is cleaned after commit");

        match &mock.calls()[0] {
            RecordedCall::Submit { url, envelope } => {
                assert_eq!(url.as_str(), "http://localhost:6001/data/tx");
                assert_eq!(envelope.tx_id(), tx_id);
            }
            other => panic!("unexpected call {:?}", other),
        }
    }

    #[tokio::test]
    async fn envelope_is_not_available_before_commit() {
        let mock = Arc::new(MockRestClient::new());
        let ctx = context(&mock);
        assert!(matches!(ctx.tx_envelope(), Err(TxError::NotFinalized)));
    }

    #[tokio::test]
    async fn server_rejection_keeps_tx_unfinalized() {
        let mock = Arc::new(MockRestClient::new());
        mock.push_submit_reply(
            RestResponse::json(StatusCode::INTERNAL_SERVER_ERROR, &HttpResponseErr::new("quorum not reached"))
                .unwrap(),
        );
        let mut ctx = context(&mock);
        let mut tx = Pending::new(&["key1"]);

        let err = ctx.commit(&mut tx, POST_DATA_TX).await.unwrap_err();

        let submitted = mock.submitted();
        assert_eq!(err.tx_id.as_deref(), Some(submitted[0].tx_id()));
        assert!(err.to_string().contains("quorum not reached"));
        assert_eq!(err.error.server_message(), Some("quorum not reached"));
        assert_eq!(ctx.state(), TxState::Failed);
        assert!(matches!(ctx.tx_envelope(), Err(TxError::NotFinalized)));
        assert_eq!(tx.keys, vec!["key1".to_string()], "pending state survives a failed commit");
    }

    #[tokio::test]
    async fn unparsable_rejection_body_yields_placeholder() {
        let mock = Arc::new(MockRestClient::new());
        mock.push_submit_reply(RestResponse::new(StatusCode::BAD_REQUEST, "not json"));
        mock.push_submit_reply(RestResponse::empty(StatusCode::SERVICE_UNAVAILABLE));
        let mut ctx = context(&mock);
        let mut tx = Pending::new(&["key1"]);

        let err = ctx.commit(&mut tx, POST_DATA_TX).await.unwrap_err();
        assert_eq!(err.error.server_message(), Some(UNPARSABLE_SERVER_ERROR));

        let err = ctx.commit(&mut tx, POST_DATA_TX).await.unwrap_err();
        assert_eq!(err.error.server_message(), Some(UNPARSABLE_SERVER_ERROR));
    }

    #[tokio::test]
    async fn retry_after_failure_uses_fresh_tx_id() {
        let mock = Arc::new(MockRestClient::new());
        mock.push_submit_failure("connection reset");
        mock.push_submit_reply(RestResponse::empty(StatusCode::OK));
        let mut ctx = context(&mock);
        let mut tx = Pending::new(&["key1"]);

        let err = ctx.commit(&mut tx, POST_DATA_TX).await.unwrap_err();
        assert!(matches!(err.error, TxError::Transport(_)));
        let first = err.tx_id.unwrap();

        let second = ctx.commit(&mut tx, POST_DATA_TX).await.unwrap();
        assert_ne!(first, second);
        assert_eq!(ctx.tx_envelope().unwrap().tx_id(), second);
    }

    #[tokio::test]
    async fn compose_failure_sends_nothing() {
        let mock = Arc::new(MockRestClient::new());
        let mut ctx = context(&mock);
        let mut tx = Pending::new(&["key1"]);
        tx.fail_compose = true;

        let err = ctx.commit(&mut tx, POST_DATA_TX).await.unwrap_err();
        assert!(matches!(err.error, TxError::Compose(ComposeError::Sign(_))));
        assert!(err.tx_id.is_some());
        assert_eq!(mock.call_count(), 0);
        assert!(matches!(ctx.tx_envelope(), Err(TxError::NotFinalized)));
    }

    #[tokio::test]
    async fn empty_replica_set_fails_without_network() {
        let mock = Arc::new(MockRestClient::new());
        let mut ctx = CommonTxContext::new(
            resources(Arc::clone(&mock), ReplicaSet::new()),
            tracing::Span::none(),
        );
        let mut tx = Pending::new(&["key1"]);

        let err = ctx.commit(&mut tx, POST_DATA_TX).await.unwrap_err();
        assert!(matches!(err.error, TxError::NoReplicas));
        assert!(err.tx_id.is_none());
        assert_eq!(ctx.state(), TxState::Failed);
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn commit_targets_lowest_replica_id() {
        let mock = Arc::new(MockRestClient::new());
        mock.push_submit_reply(RestResponse::empty(StatusCode::OK));
        let replicas = ReplicaSet::new()
            .with_replica("node2", Url::parse("http://b:6002/").unwrap())
            .with_replica("node1", Url::parse("http://a:6001/").unwrap());
        let mut ctx = CommonTxContext::new(resources(Arc::clone(&mock), replicas), tracing::Span::none());

        ctx.commit(&mut Pending::new(&["k"]), POST_DATA_TX).await.unwrap();
        match &mock.calls()[0] {
            RecordedCall::Submit { url, .. } => assert_eq!(url.host_str(), Some("a")),
            other => panic!("unexpected call {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slow_replica_times_out() {
        let mock = Arc::new(MockRestClient::new());
        mock.set_delay(Duration::from_secs(60));
        mock.push_submit_reply(RestResponse::empty(StatusCode::OK));
        let mut ctx = context(&mock);
        ctx.set_timeout(Duration::from_millis(100));
        let mut tx = Pending::new(&["key1"]);

        let err = ctx.commit(&mut tx, POST_DATA_TX).await.unwrap_err();
        assert!(matches!(err.error, TxError::Timeout(d) if d == Duration::from_millis(100)));
        assert!(err.tx_id.is_some());
        assert_eq!(ctx.state(), TxState::Failed);
    }

    #[tokio::test]
    async fn double_abort_is_silent_and_offline() {
        let mock = Arc::new(MockRestClient::new());
        let mut ctx = context(&mock);
        let mut tx = Pending::new(&["key1"]);

        ctx.abort(&mut tx).unwrap();
        ctx.abort(&mut tx).unwrap();

        assert_eq!(ctx.state(), TxState::Aborted);
        assert!(tx.keys.is_empty());
        assert_eq!(mock.call_count(), 0);
        assert!(matches!(ctx.tx_envelope(), Err(TxError::NotFinalized)));
    }

    #[tokio::test]
    async fn closed_transactions_refuse_commit_and_abort() {
        let mock = Arc::new(MockRestClient::new());
        mock.push_submit_reply(RestResponse::empty(StatusCode::OK));
        let mut ctx = context(&mock);
        let mut tx = Pending::new(&["key1"]);
        ctx.commit(&mut tx, POST_DATA_TX).await.unwrap();

        let err = ctx.commit(&mut tx, POST_DATA_TX).await.unwrap_err();
        assert!(matches!(
            err.error,
            TxError::TxClosed {
                state: TxState::Committed
            }
        ));
        assert!(matches!(ctx.abort(&mut tx), Err(TxError::TxClosed { .. })));
        assert_eq!(mock.call_count(), 1);

        let mut aborted = context(&mock);
        aborted.abort(&mut tx).unwrap();
        let err = aborted.commit(&mut tx, POST_DATA_TX).await.unwrap_err();
        assert!(matches!(
            err.error,
            TxError::TxClosed {
                state: TxState::Aborted
            }
        ));
    }

    #[tokio::test]
    async fn query_decodes_ok_body() {
        let mock = Arc::new(MockRestClient::new());
        let body = GetDataResponseEnvelope {
            payload: GetDataResponse {
                header: ResponseHeader::new("node1"),
                value: b"v".to_vec(),
                metadata: None,
            },
            signature: vec![],
        };
        mock.push_query_reply(RestResponse::json(StatusCode::OK, &body).unwrap());
        let ctx = context(&mock);

        let query = Query::GetConfig(GetConfigQuery {
            user_id: "alice".into(),
        });
        let decoded: GetDataResponseEnvelope = ctx.handle_request("/data/bdb/k", &query).await.unwrap();
        assert_eq!(decoded, body);
        assert_eq!(ctx.state(), TxState::Open, "queries do not move the state machine");
    }

    #[tokio::test]
    async fn query_with_unexpected_body_is_decode_error() {
        let mock = Arc::new(MockRestClient::new());
        mock.push_query_reply(RestResponse::new(StatusCode::OK, "[1,2,3]"));
        let ctx = context(&mock);
        let query = Query::GetConfig(GetConfigQuery {
            user_id: "alice".into(),
        });

        let err = ctx
            .handle_request::<GetDataResponseEnvelope>("/data/bdb/k", &query)
            .await
            .unwrap_err();
        assert!(matches!(err, TxError::Decode(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_query_times_out_and_leaves_tx_open() {
        let mock = Arc::new(MockRestClient::new());
        mock.set_delay(Duration::from_secs(60));
        mock.push_query_reply(RestResponse::new(StatusCode::OK, "{}"));
        let mut ctx = context(&mock);
        ctx.set_timeout(Duration::from_millis(100));
        let query = Query::GetConfig(GetConfigQuery {
            user_id: "alice".into(),
        });

        let err = ctx
            .handle_request::<GetDataResponseEnvelope>("/data/bdb/k", &query)
            .await
            .unwrap_err();
        assert!(matches!(err, TxError::Timeout(d) if d == Duration::from_millis(100)));
        assert_eq!(ctx.state(), TxState::Open);
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn query_transport_failure_passes_through() {
        let mock = Arc::new(MockRestClient::new());
        mock.push_query_failure("connection refused");
        let ctx = context(&mock);
        let query = Query::GetConfig(GetConfigQuery {
            user_id: "alice".into(),
        });

        let err = ctx
            .handle_request::<GetDataResponseEnvelope>("/data/bdb/k", &query)
            .await
            .unwrap_err();
        match err {
            TxError::Transport(TransportError::Connection(message)) => {
                assert!(message.contains("connection refused"))
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(ctx.state(), TxState::Open);
    }

    fn signed_by(node: &UserKeypair, node_id: &str) -> GetDataResponseEnvelope {
        let payload = GetDataResponse {
            header: ResponseHeader::new(node_id),
            value: b"v".to_vec(),
            metadata: None,
        };
        let signature = node.sign(&serde_json::to_vec(&payload).unwrap()).unwrap();
        GetDataResponseEnvelope { payload, signature }
    }

    #[test]
    fn response_verification_uses_node_certificate() {
        let node = UserKeypair::from_seed(&[9u8; 32]);
        let mock = Arc::new(MockRestClient::new());
        let mut res = resources(mock, one_replica());
        res.node_certs = Arc::new(BTreeMap::from([("node1".to_string(), node.certificate())]));
        let ctx = CommonTxContext::new(res, tracing::Span::none());

        let mut signed = signed_by(&node, "node1");
        ctx.verify_response("node1", &signed).unwrap();

        signed.payload.value = b"tampered".to_vec();
        assert!(matches!(
            ctx.verify_response("node1", &signed),
            Err(TxError::UntrustedResponse(_))
        ));

        let unknown = signed_by(&node, "node7");
        assert!(matches!(
            ctx.verify_response("node7", &unknown),
            Err(TxError::UntrustedResponse(_))
        ));
    }

    #[test]
    fn response_from_another_trusted_node_is_refused() {
        let node1 = UserKeypair::from_seed(&[9u8; 32]);
        let node2 = UserKeypair::from_seed(&[10u8; 32]);
        let mock = Arc::new(MockRestClient::new());
        let mut res = resources(mock, one_replica());
        res.node_certs = Arc::new(BTreeMap::from([
            ("node1".to_string(), node1.certificate()),
            ("node2".to_string(), node2.certificate()),
        ]));
        let ctx = CommonTxContext::new(res, tracing::Span::none());

        let from_node2 = signed_by(&node2, "node2");
        ctx.verify_response("node2", &from_node2).unwrap();
        let err = ctx.verify_response("node1", &from_node2).unwrap_err();
        assert!(matches!(&err, TxError::UntrustedResponse(m) if m.contains("node2")));
    }

    #[tokio::test]
    async fn verified_query_checks_the_queried_replica() {
        let node2 = UserKeypair::from_seed(&[10u8; 32]);
        let mock = Arc::new(MockRestClient::new());
        mock.push_query_reply(RestResponse::json(StatusCode::OK, &signed_by(&node2, "node2")).unwrap());
        let mut res = resources(Arc::clone(&mock), one_replica());
        res.node_certs = Arc::new(BTreeMap::from([("node2".to_string(), node2.certificate())]));
        let ctx = CommonTxContext::new(res, tracing::Span::none());
        let query = Query::GetConfig(GetConfigQuery {
            user_id: "alice".into(),
        });

        let err = ctx
            .query_verified::<GetDataResponseEnvelope>("/data/bdb/k", &query)
            .await
            .unwrap_err();
        assert!(matches!(err, TxError::UntrustedResponse(_)));
    }

    #[tokio::test]
    async fn metrics_track_outcomes() {
        let mock = Arc::new(MockRestClient::new());
        mock.push_submit_reply(RestResponse::empty(StatusCode::CONFLICT));
        mock.push_submit_reply(RestResponse::empty(StatusCode::OK));
        let res = resources(Arc::clone(&mock), one_replica());
        let metrics = res.metrics.clone();
        let mut ctx = CommonTxContext::new(res, tracing::Span::none());
        let mut tx = Pending::new(&["key1"]);

        let _ = ctx.commit(&mut tx, POST_DATA_TX).await;
        ctx.commit(&mut tx, POST_DATA_TX).await.unwrap();

        assert_eq!(metrics.commit_failures_total.get(), 1);
        assert_eq!(metrics.commits_total.get(), 1);
        assert_eq!(metrics.request_latency_seconds.get_sample_count(), 2);
    }
}
