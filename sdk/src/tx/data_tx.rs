//! Data transactions: reads, writes and deletes against one database.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use super::compose::{ComposeError, TxComposer};
use super::context::{CommonTxContext, TxState};
use super::error::{CommitError, TxError};
use crate::config::{get_data_path, Isolation, POST_DATA_TX};
use crate::crypto::Signer;
use crate::types::{
    AccessControl, DataDelete, DataRead, DataTx as DataTxPayload, DataTxEnvelope, DataWrite, Envelope,
    GetDataQuery, GetDataResponseEnvelope, Query, Version,
};

/// Pending operations of a data transaction.
///
/// A key is either written or deleted, never both: the later operation
/// replaces the earlier one. Everything is kept in key order so the
/// composed payload is deterministic.
pub struct DataTxOps {
    user_id: String,
    db_name: String,
    signer: Arc<dyn Signer>,
    reads: BTreeMap<String, Option<Version>>,
    writes: BTreeMap<String, DataWrite>,
    deletes: BTreeSet<String>,
}

impl DataTxOps {
    pub fn new(user_id: impl Into<String>, db_name: impl Into<String>, signer: Arc<dyn Signer>) -> Self {
        Self {
            user_id: user_id.into(),
            db_name: db_name.into(),
            signer,
            reads: BTreeMap::new(),
            writes: BTreeMap::new(),
            deletes: BTreeSet::new(),
        }
    }

    pub fn put(&mut self, key: impl Into<String>, value: Vec<u8>, acl: Option<AccessControl>) {
        let key = key.into();
        self.deletes.remove(&key);
        self.writes.insert(key.clone(), DataWrite { key, value, acl });
    }

    pub fn delete(&mut self, key: impl Into<String>) {
        let key = key.into();
        self.writes.remove(&key);
        self.deletes.insert(key);
    }

    /// Records the version a key was read at; `None` means it did not exist.
    pub fn record_read(&mut self, key: impl Into<String>, version: Option<Version>) {
        self.reads.insert(key.into(), version);
    }

    /// The answer pending operations give for `key`, if they give one:
    /// `Some(Some(value))` for a pending write, `Some(None)` for a pending
    /// delete.
    pub fn pending_value(&self, key: &str) -> Option<Option<&[u8]>> {
        if let Some(write) = self.writes.get(key) {
            return Some(Some(&write.value));
        }
        self.deletes.contains(key).then_some(None)
    }

    pub fn is_empty(&self) -> bool {
        self.reads.is_empty() && self.writes.is_empty() && self.deletes.is_empty()
    }

    fn payload(&self, tx_id: &str) -> DataTxPayload {
        DataTxPayload {
            user_id: self.user_id.clone(),
            db_name: self.db_name.clone(),
            tx_id: tx_id.to_string(),
            data_reads: self
                .reads
                .iter()
                .map(|(key, version)| DataRead {
                    key: key.clone(),
                    version: *version,
                })
                .collect(),
            data_writes: self.writes.values().cloned().collect(),
            data_deletes: self
                .deletes
                .iter()
                .map(|key| DataDelete { key: key.clone() })
                .collect(),
        }
    }
}

impl TxComposer for DataTxOps {
    fn compose_envelope(&mut self, tx_id: &str) -> Result<Envelope, ComposeError> {
        let payload = self.payload(tx_id);
        let signature = self.signer.sign(&payload.signable_bytes()?)?;
        Ok(Envelope::Data(DataTxEnvelope { payload, signature }))
    }

    fn clean_ctx(&mut self) {
        self.reads.clear();
        self.writes.clear();
        self.deletes.clear();
    }
}

/// A transaction over a single database.
///
/// ```ignore
/// let mut tx = session.begin();
/// tx.put("key1", b"value1".to_vec(), None)?;
/// let tx_id = tx.commit().await?;
/// ```
pub struct DataTx {
    ctx: CommonTxContext,
    ops: DataTxOps,
    db_name: String,
    isolation: Isolation,
}

impl DataTx {
    pub(crate) fn new(ctx: CommonTxContext, db_name: impl Into<String>, isolation: Isolation) -> Self {
        let db_name = db_name.into();
        let ops = DataTxOps::new(ctx.user_id(), db_name.clone(), ctx.signer());
        Self {
            ctx,
            ops,
            db_name,
            isolation,
        }
    }

    /// Overrides the per-request deadline for this transaction only.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.ctx.set_timeout(timeout);
        self
    }

    pub fn db_name(&self) -> &str {
        &self.db_name
    }

    pub fn state(&self) -> TxState {
        self.ctx.state()
    }

    pub fn put(&mut self, key: impl Into<String>, value: Vec<u8>, acl: Option<AccessControl>) -> Result<(), TxError> {
        self.ctx.ensure_mutable()?;
        self.ops.put(key, value, acl);
        Ok(())
    }

    pub fn delete(&mut self, key: impl Into<String>) -> Result<(), TxError> {
        self.ctx.ensure_mutable()?;
        self.ops.delete(key);
        Ok(())
    }

    /// Reads `key`, seeing this transaction's own pending writes and deletes.
    ///
    /// Otherwise queries the selected replica and verifies the signed
    /// response. Under [`Isolation::Serializable`] the observed version is
    /// recorded so the server can detect conflicting commits.
    pub async fn get(&mut self, key: &str) -> Result<Option<Vec<u8>>, TxError> {
        self.ctx.ensure_mutable()?;
        if let Some(pending) = self.ops.pending_value(key) {
            return Ok(pending.map(<[u8]>::to_vec));
        }

        let query = Query::GetData(GetDataQuery {
            user_id: self.ctx.user_id().to_string(),
            db_name: self.db_name.clone(),
            key: key.to_string(),
        });
        let response: GetDataResponseEnvelope = self
            .ctx
            .query_verified(&get_data_path(&self.db_name, key), &query)
            .await?;

        let payload = response.payload;
        if self.isolation == Isolation::Serializable {
            self.ops
                .record_read(key, payload.metadata.as_ref().map(|m| m.version));
        }
        Ok(payload.into_value())
    }

    /// Submits the transaction to `POST /data/tx` and returns its tx ID.
    pub async fn commit(&mut self) -> Result<String, CommitError> {
        self.ctx.commit(&mut self.ops, POST_DATA_TX).await
    }

    pub fn abort(&mut self) -> Result<(), TxError> {
        self.ctx.abort(&mut self.ops)
    }

    /// The envelope the server acknowledged. Fails until committed.
    pub fn tx_envelope(&self) -> Result<&DataTxEnvelope, TxError> {
        self.ctx
            .tx_envelope()?
            .as_data()
            .ok_or(TxError::NotFinalized)
    }
}

impl std::fmt::Debug for DataTx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataTx")
            .field("db_name", &self.db_name)
            .field("state", &self.ctx.state())
            .field("writes", &self.ops.writes.len())
            .field("deletes", &self.ops.deletes.len())
            .field("reads", &self.ops.reads.len())
            .finish()
    }
}
