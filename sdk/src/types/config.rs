//! Cluster configuration and the transaction that replaces it.

use serde::{Deserialize, Serialize};

use super::data::{Metadata, Version};
use super::envelope::ResponseHeader;

/// One database replica as recorded in the cluster configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    pub id: String,
    pub address: String,
    pub port: u32,
    /// Public key the node signs responses with.
    #[serde(with = "hex::serde")]
    pub certificate: Vec<u8>,
}

/// A cluster administrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Admin {
    pub id: String,
    #[serde(with = "hex::serde")]
    pub certificate: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterConfig {
    #[serde(default)]
    pub nodes: Vec<NodeConfig>,
    #[serde(default)]
    pub admins: Vec<Admin>,
}

impl ClusterConfig {
    pub fn node(&self, id: &str) -> Option<&NodeConfig> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn admin(&self, id: &str) -> Option<&Admin> {
        self.admins.iter().find(|a| a.id == id)
    }
}

/// The signed payload of a configuration transaction.
///
/// `read_old_config_version` pins the configuration the change was computed
/// from; the server rejects the transaction if it has moved on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigTx {
    pub user_id: String,
    pub tx_id: String,
    pub read_old_config_version: Option<Version>,
    pub new_config: ClusterConfig,
}

impl ConfigTx {
    /// Bytes covered by the envelope signature.
    pub fn signable_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetConfigQuery {
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetConfigResponse {
    pub header: ResponseHeader,
    pub config: ClusterConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetConfigResponseEnvelope {
    pub payload: GetConfigResponse,
    #[serde(with = "hex::serde")]
    pub signature: Vec<u8>,
}
