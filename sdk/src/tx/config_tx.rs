//! Configuration transactions: read the cluster configuration, edit it,
//! submit the result.

use std::sync::Arc;
use std::time::Duration;

use super::compose::{ComposeError, TxComposer};
use super::context::{CommonTxContext, TxState};
use super::error::{CommitError, TxError};
use crate::config::{GET_CONFIG, POST_CONFIG_TX};
use crate::crypto::Signer;
use crate::types::{
    Admin, ClusterConfig, ConfigTx as ConfigTxPayload, ConfigTxEnvelope, Envelope, GetConfigQuery,
    GetConfigResponseEnvelope, NodeConfig, Query, Version,
};

/// Pending state of a configuration transaction: the version read and the
/// configuration being proposed.
pub struct ConfigTxOps {
    user_id: String,
    signer: Arc<dyn Signer>,
    read_version: Option<Version>,
    new_config: Option<ClusterConfig>,
}

impl ConfigTxOps {
    pub fn new(user_id: impl Into<String>, signer: Arc<dyn Signer>) -> Self {
        Self {
            user_id: user_id.into(),
            signer,
            read_version: None,
            new_config: None,
        }
    }

    /// Starts editing from `config`, read at `version`. Replaces any
    /// earlier read together with its pending edits.
    pub fn load(&mut self, config: ClusterConfig, version: Option<Version>) {
        self.read_version = version;
        self.new_config = Some(config);
    }

    pub fn new_config(&self) -> Option<&ClusterConfig> {
        self.new_config.as_ref()
    }

    fn config_mut(&mut self) -> Result<&mut ClusterConfig, TxError> {
        self.new_config.as_mut().ok_or(TxError::ConfigNotLoaded)
    }

    pub fn add_node(&mut self, node: NodeConfig) -> Result<(), TxError> {
        let config = self.config_mut()?;
        if config.node(&node.id).is_some() {
            return Err(TxError::InvalidOperation(format!("node {} already exists", node.id)));
        }
        config.nodes.push(node);
        Ok(())
    }

    pub fn update_node(&mut self, node: NodeConfig) -> Result<(), TxError> {
        let config = self.config_mut()?;
        let slot = config
            .nodes
            .iter_mut()
            .find(|n| n.id == node.id)
            .ok_or_else(|| TxError::InvalidOperation(format!("node {} does not exist", node.id)))?;
        *slot = node;
        Ok(())
    }

    pub fn delete_node(&mut self, node_id: &str) -> Result<(), TxError> {
        let config = self.config_mut()?;
        let before = config.nodes.len();
        config.nodes.retain(|n| n.id != node_id);
        if config.nodes.len() == before {
            return Err(TxError::InvalidOperation(format!("node {} does not exist", node_id)));
        }
        Ok(())
    }

    pub fn add_admin(&mut self, admin: Admin) -> Result<(), TxError> {
        let config = self.config_mut()?;
        if config.admin(&admin.id).is_some() {
            return Err(TxError::InvalidOperation(format!("admin {} already exists", admin.id)));
        }
        config.admins.push(admin);
        Ok(())
    }

    pub fn delete_admin(&mut self, admin_id: &str) -> Result<(), TxError> {
        let config = self.config_mut()?;
        let before = config.admins.len();
        config.admins.retain(|a| a.id != admin_id);
        if config.admins.len() == before {
            return Err(TxError::InvalidOperation(format!("admin {} does not exist", admin_id)));
        }
        Ok(())
    }
}

impl TxComposer for ConfigTxOps {
    fn compose_envelope(&mut self, tx_id: &str) -> Result<Envelope, ComposeError> {
        let new_config = self.new_config.clone().ok_or(ComposeError::ConfigNotRead)?;
        let payload = ConfigTxPayload {
            user_id: self.user_id.clone(),
            tx_id: tx_id.to_string(),
            read_old_config_version: self.read_version,
            new_config,
        };
        let signature = self.signer.sign(&payload.signable_bytes()?)?;
        Ok(Envelope::Config(ConfigTxEnvelope { payload, signature }))
    }

    fn clean_ctx(&mut self) {
        self.read_version = None;
        self.new_config = None;
    }
}

/// A transaction that replaces the cluster configuration.
///
/// Edits apply to the configuration returned by the last
/// [`get_cluster_config`](Self::get_cluster_config); the server rejects the
/// commit if the configuration changed since that read.
pub struct ConfigTx {
    ctx: CommonTxContext,
    ops: ConfigTxOps,
}

impl ConfigTx {
    pub(crate) fn new(ctx: CommonTxContext) -> Self {
        let ops = ConfigTxOps::new(ctx.user_id(), ctx.signer());
        Self { ctx, ops }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.ctx.set_timeout(timeout);
        self
    }

    pub fn state(&self) -> TxState {
        self.ctx.state()
    }

    /// Fetches the current cluster configuration and starts editing from it.
    pub async fn get_cluster_config(&mut self) -> Result<ClusterConfig, TxError> {
        self.ctx.ensure_mutable()?;
        let query = Query::GetConfig(GetConfigQuery {
            user_id: self.ctx.user_id().to_string(),
        });
        let response: GetConfigResponseEnvelope = self.ctx.query_verified(GET_CONFIG, &query).await?;

        let payload = response.payload;
        self.ops
            .load(payload.config.clone(), payload.metadata.map(|m| m.version));
        Ok(payload.config)
    }

    pub fn add_node(&mut self, node: NodeConfig) -> Result<(), TxError> {
        self.ctx.ensure_mutable()?;
        self.ops.add_node(node)
    }

    pub fn update_node(&mut self, node: NodeConfig) -> Result<(), TxError> {
        self.ctx.ensure_mutable()?;
        self.ops.update_node(node)
    }

    pub fn delete_node(&mut self, node_id: &str) -> Result<(), TxError> {
        self.ctx.ensure_mutable()?;
        self.ops.delete_node(node_id)
    }

    pub fn add_admin(&mut self, admin: Admin) -> Result<(), TxError> {
        self.ctx.ensure_mutable()?;
        self.ops.add_admin(admin)
    }

    pub fn delete_admin(&mut self, admin_id: &str) -> Result<(), TxError> {
        self.ctx.ensure_mutable()?;
        self.ops.delete_admin(admin_id)
    }

    /// Submits the edited configuration to `POST /config/tx`.
    pub async fn commit(&mut self) -> Result<String, CommitError> {
        self.ctx.commit(&mut self.ops, POST_CONFIG_TX).await
    }

    pub fn abort(&mut self) -> Result<(), TxError> {
        self.ctx.abort(&mut self.ops)
    }

    pub fn tx_envelope(&self) -> Result<&ConfigTxEnvelope, TxError> {
        self.ctx
            .tx_envelope()?
            .as_config()
            .ok_or(TxError::NotFinalized)
    }
}

impl std::fmt::Debug for ConfigTx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigTx")
            .field("state", &self.ctx.state())
            .field("loaded", &self.ops.new_config.is_some())
            .finish()
    }
}
